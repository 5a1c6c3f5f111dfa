use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use st_catalog_miner::app::{App, RunOverrides, RunPlan, SourceFlags};
use st_catalog_miner::config::ConfigLoader;
use st_catalog_miner::domain::OrganizeBy;
use st_catalog_miner::http::ReqwestHttpClient;
use st_catalog_miner::output::{JsonOutput, OutputMode, TextOutput};
use st_catalog_miner::workbook::XlsxSheetWriter;

const INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "st-miner")]
#[command(about = "Aggregate spatial transcriptomics datasets from NCBI GEO, 10x Genomics and HTAN into an Excel catalog")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    #[arg(long, help = "NCBI search query")]
    query: Option<String>,

    #[arg(long, value_parser = parse_max_results, help = "Maximum number of NCBI results")]
    max_results: Option<usize>,

    #[arg(long, help = "Email sent to NCBI E-utilities")]
    email: Option<String>,

    #[arg(short, long, help = "Output Excel file")]
    output: Option<Utf8PathBuf>,

    #[arg(long, value_enum, help = "How to organize output sheets [default: both]")]
    organize_by: Option<OrganizeBy>,

    #[arg(long, help = "Config file (JSON)")]
    config: Option<String>,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

#[derive(Args)]
#[command(next_help_heading = "Data Sources")]
struct SourceArgs {
    #[arg(long, help = "Fetch only from NCBI GEO")]
    only_ncbi: bool,

    #[arg(long = "only-10x", help = "Fetch only from 10x Genomics")]
    only_10x: bool,

    #[arg(long, help = "Fetch only from HTAN")]
    only_htan: bool,

    #[arg(long, help = "Include NCBI GEO")]
    include_ncbi: bool,

    #[arg(long = "include-10x", help = "Include 10x Genomics")]
    include_10x: bool,

    #[arg(long, help = "Include HTAN")]
    include_htan: bool,
}

impl From<&SourceArgs> for SourceFlags {
    fn from(args: &SourceArgs) -> Self {
        SourceFlags {
            only_ncbi: args.only_ncbi,
            only_10x: args.only_10x,
            only_htan: args.only_htan,
            include_ncbi: args.include_ncbi,
            include_10x: args.include_10x,
            include_htan: args.include_htan,
        }
    }
}

fn parse_max_results(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(limit) => Ok(limit),
        Err(err) => Err(err.to_string()),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    ctrlc::set_handler(|| {
        eprintln!("\nInterrupted by user. Exiting.");
        std::process::exit(INTERRUPTED);
    })
    .into_diagnostic()?;

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let plan = RunPlan::new(
        &config,
        SourceFlags::from(&cli.sources),
        RunOverrides {
            query: cli.query,
            max_results: cli.max_results,
            email: cli.email,
            output: cli.output,
            organize_by: cli.organize_by,
        },
    );
    if matches!(output_mode, OutputMode::Text) {
        TextOutput::print_plan(&plan).into_diagnostic()?;
    }

    let http = ReqwestHttpClient::new(&config.http)?;
    let app = App::new(http, config);
    let mut writer = XlsxSheetWriter::new(plan.output.clone());
    let result = app.run(&plan, &mut writer)?;

    match output_mode {
        OutputMode::Text => TextOutput::print_result(&result).into_diagnostic()?,
        OutputMode::Json => JsonOutput::print_result(&result).into_diagnostic()?,
    }
    Ok(())
}
