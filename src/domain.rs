use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::MinerError;
use crate::normalize::{clean_text, extract_identifier, is_human_organism};

/// Upstream provider a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "NCBI GEO")]
    NcbiGeo,
    #[serde(rename = "10x Genomics")]
    TenxGenomics,
    #[serde(rename = "HTAN")]
    Htan,
}

impl SourceTag {
    pub const ALL: [SourceTag; 3] = [SourceTag::NcbiGeo, SourceTag::TenxGenomics, SourceTag::Htan];

    pub fn label(self) -> &'static str {
        match self {
            SourceTag::NcbiGeo => "NCBI GEO",
            SourceTag::TenxGenomics => "10x Genomics",
            SourceTag::Htan => "HTAN",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeBy {
    #[default]
    Both,
    Platform,
    Organism,
    None,
}

impl fmt::Display for OrganizeBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrganizeBy::Both => write!(f, "both"),
            OrganizeBy::Platform => write!(f, "platform"),
            OrganizeBy::Organism => write!(f, "organism"),
            OrganizeBy::None => write!(f, "none"),
        }
    }
}

impl FromStr for OrganizeBy {
    type Err = MinerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(OrganizeBy::Both),
            "platform" => Ok(OrganizeBy::Platform),
            "organism" => Ok(OrganizeBy::Organism),
            "none" => Ok(OrganizeBy::None),
            _ => Err(MinerError::InvalidOrganizeBy(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrganismClass {
    Human,
    Other,
}

impl OrganismClass {
    pub fn of(organism: &str) -> Self {
        if is_human_organism(organism) {
            OrganismClass::Human
        } else {
            OrganismClass::Other
        }
    }

    /// Prefix used for combined "<class> - <source>" sheet names.
    pub fn label(self) -> &'static str {
        match self {
            OrganismClass::Human => "Human",
            OrganismClass::Other => "Other",
        }
    }

    pub fn sheet_name(self) -> &'static str {
        match self {
            OrganismClass::Human => "Human",
            OrganismClass::Other => "Other Organisms",
        }
    }
}

/// Canonical, source-tagged dataset description.
///
/// Built only through [`RecordDraft::finish`], which normalizes every field,
/// so a record never carries surrounding whitespace, never has an empty
/// title, and only ever holds a digit-only publication id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRecord {
    platform: String,
    accession: String,
    title: String,
    public_date: String,
    experiment_type: String,
    organism: String,
    tissue_summary: String,
    sample_count: String,
    publication: String,
    download_link: String,
    source: SourceTag,
    extra: Vec<(String, String)>,
}

impl DatasetRecord {
    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn accession(&self) -> &str {
        &self.accession
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn public_date(&self) -> &str {
        &self.public_date
    }

    pub fn experiment_type(&self) -> &str {
        &self.experiment_type
    }

    pub fn organism(&self) -> &str {
        &self.organism
    }

    pub fn tissue_summary(&self) -> &str {
        &self.tissue_summary
    }

    pub fn sample_count(&self) -> &str {
        &self.sample_count
    }

    pub fn publication(&self) -> &str {
        &self.publication
    }

    pub fn download_link(&self) -> &str {
        &self.download_link
    }

    pub fn source(&self) -> SourceTag {
        self.source
    }

    pub fn extra(&self) -> &[(String, String)] {
        &self.extra
    }

    pub fn organism_class(&self) -> OrganismClass {
        OrganismClass::of(&self.organism)
    }

    pub(crate) fn with_source(mut self, source: SourceTag) -> Self {
        self.source = source;
        self
    }
}

/// Raw field values collected from one upstream item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecordDraft {
    pub platform: String,
    pub accession: String,
    pub title: String,
    pub public_date: String,
    pub experiment_type: String,
    pub organism: String,
    pub tissue_summary: String,
    pub sample_count: String,
    pub publication: String,
    pub download_link: String,
    pub extra: Vec<(String, String)>,
}

impl RecordDraft {
    /// Normalizes the draft into a record. Drafts without a title are
    /// rejected.
    pub fn finish(self, source: SourceTag) -> Option<DatasetRecord> {
        let title = clean_text(&self.title);
        if title.is_empty() {
            return None;
        }
        let publication = clean_text(&self.publication);
        let publication = if publication.chars().all(|ch| ch.is_ascii_digit()) {
            publication
        } else {
            extract_identifier(&publication)
        };
        let extra = self
            .extra
            .into_iter()
            .map(|(name, value)| (clean_text(&name), clean_text(&value)))
            .filter(|(name, _)| !name.is_empty())
            .collect();

        Some(DatasetRecord {
            platform: clean_text(&self.platform),
            accession: clean_text(&self.accession),
            title,
            public_date: clean_text(&self.public_date),
            experiment_type: clean_text(&self.experiment_type),
            organism: clean_text(&self.organism),
            tissue_summary: clean_text(&self.tissue_summary),
            sample_count: clean_text(&self.sample_count),
            publication,
            download_link: clean_text(&self.download_link),
            source,
            extra,
        })
    }
}
