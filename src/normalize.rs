use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Label used for GEO platforms that are missing from [`PLATFORM_NAMES`].
pub const GEO_PLATFORM_LABEL: &str = "NCBI GEO";
pub const GEO_PLATFORM_PREFIX: &str = "GPL";

const HUMAN_ORGANISMS: [&str; 2] = ["homo sapiens", "human"];

const PLATFORM_NAMES: [(&str, &str); 7] = [
    ("GPL24676", "10x Genomics Visium"),
    ("GPL21263", "10x Genomics 3' v3"),
    ("GPL20301", "10x Genomics 3' v2"),
    ("GPL16791", "Illumina HiSeq"),
    ("GPL18573", "Illumina NextSeq"),
    ("GPL24247", "Slide-seq"),
    ("GPL29210", "Slide-seqV2"),
];

static BARE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{7,9})\b").expect("identifier pattern is valid"));

pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_human_organism(organism: &str) -> bool {
    let organism = organism.trim().to_lowercase();
    if organism.is_empty() {
        return false;
    }
    HUMAN_ORGANISMS
        .iter()
        .any(|designator| organism.contains(designator))
}

/// Maps a GEO platform code (or a `;`-separated list of codes) to a
/// readable platform name.
pub fn map_platform_code(code: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        return GEO_PLATFORM_LABEL.to_string();
    }

    let mut names: Vec<String> = Vec::new();
    for part in code.split(';').map(str::trim).filter(|part| !part.is_empty()) {
        let name = map_single_platform(part);
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return GEO_PLATFORM_LABEL.to_string();
    }
    names.join("; ")
}

fn map_single_platform(code: &str) -> String {
    let code = if code.chars().all(|ch| ch.is_ascii_digit()) {
        format!("{GEO_PLATFORM_PREFIX}{code}")
    } else {
        code.to_string()
    };

    if let Some((_, name)) = PLATFORM_NAMES
        .iter()
        .find(|(key, _)| code == *key || code.contains(key))
    {
        return name.to_string();
    }

    if code.starts_with(GEO_PLATFORM_PREFIX) {
        format!("{GEO_PLATFORM_LABEL} ({code})")
    } else {
        format!("{GEO_PLATFORM_LABEL} ({GEO_PLATFORM_PREFIX}{code})")
    }
}

/// Finds a PubMed-style identifier in free text.
///
/// The token right after a `PMID:` marker wins; otherwise the first
/// standalone run of 7 to 9 digits is returned.
pub fn extract_identifier(text: &str) -> String {
    if let Some((_, rest)) = text.split_once("PMID:") {
        let digits: String = rest
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|ch| ch.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return digits;
        }
    }

    BARE_IDENTIFIER
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Deterministic synthetic accession for upstream items without an id.
///
/// Hashes the cleaned `parts` joined by the unit separator, so the same item
/// yields the same accession on every run.
pub fn stable_id(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(clean_text(part).as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{prefix}-{}", &digest[..12])
}
