use std::fmt::Write as _;
use std::io::{self, Write};

use serde::Serialize;

use crate::aggregate::Origin;
use crate::app::{RunPlan, RunResult};
use crate::domain::SourceTag;

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_plan(plan: &RunPlan) -> io::Result<()> {
        print_text(&render_plan(plan))
    }

    pub fn print_result(result: &RunResult) -> io::Result<()> {
        print_text(&render_summary(result))
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_result(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

fn print_text(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

/// The configuration block printed before fetching starts.
pub fn render_plan(plan: &RunPlan) -> String {
    let sources = plan
        .sources
        .iter()
        .map(|source| source.label())
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = String::from("Configuration:\n");
    let _ = writeln!(out, "  Data Sources: {sources}");
    if plan.includes(SourceTag::NcbiGeo) {
        let _ = writeln!(out, "  NCBI Max Results: {}", plan.max_results);
    }
    let _ = writeln!(out, "  Organization: {}", plan.organize_by);
    let _ = writeln!(out, "  Output File: {}", plan.output);
    out
}

pub fn render_summary(result: &RunResult) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\n  SUMMARY\n{rule}");
    let _ = writeln!(out, "Total Datasets: {}", result.total);

    let _ = writeln!(out, "\nBy Platform:");
    for (source, count) in &result.by_source {
        let _ = writeln!(out, "  - {source}: {count}");
    }

    let _ = writeln!(out, "\nRetrieval:");
    for contribution in &result.contributions {
        let origin = match contribution.origin {
            Origin::Live => "live",
            Origin::Fallback => "curated fallback",
        };
        let _ = writeln!(
            out,
            "  - {}: {} ({origin})",
            contribution.source, contribution.count
        );
    }

    let _ = writeln!(out, "\nBy Organism:");
    let _ = writeln!(out, "  - Human: {}", result.human);
    let _ = writeln!(out, "  - Other Organisms: {}", result.other);

    if !result.top_organisms.is_empty() {
        let _ = writeln!(out, "\nTop {} Organisms:", result.top_organisms.len());
        for (organism, count) in &result.top_organisms {
            let _ = writeln!(out, "  - {organism}: {count}");
        }
    }
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "\nCatalog ready: {}", result.output);
    out
}
