use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::OrganizeBy;
use crate::error::MinerError;
use crate::http::{HttpSettings, default_user_agent};
use crate::providers::CATALOG_REQUEST_DELAY;
use crate::providers::geo::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RESULTS, DEFAULT_QUERY, DEFAULT_REQUEST_DELAY, GeoSettings,
};

pub const LOCAL_CONFIG_FILE: &str = "st-miner.json";
pub const DEFAULT_OUTPUT_FILE: &str = "spatial_transcriptomics_catalog.xlsx";
pub const API_KEY_ENV: &str = "NCBI_API_KEY";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub organize_by: Option<String>,
    #[serde(default)]
    pub catalog_request_delay_ms: Option<u64>,
    #[serde(default)]
    pub ncbi: Option<NcbiConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NcbiConfig {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// File the values came from; `None` when only defaults apply.
    pub path: Option<PathBuf>,
    pub http: HttpSettings,
    pub geo: GeoSettings,
    pub catalog_request_delay: Duration,
    pub output: Utf8PathBuf,
    pub organize_by: OrganizeBy,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            path: None,
            http: HttpSettings::default(),
            geo: GeoSettings::default(),
            catalog_request_delay: CATALOG_REQUEST_DELAY,
            output: Utf8PathBuf::from(DEFAULT_OUTPUT_FILE),
            organize_by: OrganizeBy::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves `--config` (which must exist), then `./st-miner.json`, then
    /// the per-user config file, then built-in defaults. `NCBI_API_KEY`
    /// overrides the file's `api_key`.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MinerError> {
        let located = Self::locate(path)?;
        let mut config = match &located {
            Some(path) => Self::load(path)?,
            None => Config::default(),
        };
        if let Ok(api_key) = env::var(API_KEY_ENV) {
            if !api_key.trim().is_empty() {
                config.api_key = Some(api_key.trim().to_string());
            }
        }
        let mut resolved = Self::resolve_config(config)?;
        resolved.path = located;
        Ok(resolved)
    }

    pub fn locate(path: Option<&str>) -> Result<Option<PathBuf>, MinerError> {
        if let Some(path) = path {
            let path = PathBuf::from(path);
            if !path.is_file() {
                return Err(MinerError::ConfigRead(path));
            }
            return Ok(Some(path));
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Ok(Some(local));
        }
        Ok(user_config_path().filter(|path| path.is_file()))
    }

    pub fn load(path: &Path) -> Result<Config, MinerError> {
        debug!(path = %path.display(), "reading config");
        let content =
            fs::read_to_string(path).map_err(|_| MinerError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| MinerError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MinerError> {
        let ncbi = config.ncbi.unwrap_or_default();

        let chunk_size = ncbi.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(MinerError::ConfigParse(
                "ncbi.chunk_size must be at least 1".to_string(),
            ));
        }
        let max_results = ncbi.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            return Err(MinerError::ConfigParse(
                "ncbi.max_results must be at least 1".to_string(),
            ));
        }
        let timeout = match config.timeout_secs {
            Some(0) => {
                return Err(MinerError::ConfigParse(
                    "timeout_secs must be at least 1".to_string(),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => HttpSettings::default().timeout,
        };
        let organize_by = match config.organize_by.as_deref() {
            Some(value) => value.parse()?,
            None => OrganizeBy::default(),
        };

        Ok(ResolvedConfig {
            path: None,
            http: HttpSettings {
                user_agent: non_blank(config.user_agent).unwrap_or_else(default_user_agent),
                timeout,
            },
            geo: GeoSettings {
                query: non_blank(ncbi.query).unwrap_or_else(|| DEFAULT_QUERY.to_string()),
                max_results,
                chunk_size,
                request_delay: ncbi
                    .request_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_REQUEST_DELAY),
                email: non_blank(config.email),
                api_key: non_blank(config.api_key),
            },
            catalog_request_delay: config
                .catalog_request_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(CATALOG_REQUEST_DELAY),
            output: non_blank(config.output)
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_FILE)),
            organize_by,
        })
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "st-miner").map(|dirs| dirs.config_dir().join("config.json"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
