use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{ExtractTarget, ProjectId};
use crate::error::FetchError;
use crate::logging::{DEFAULT_LOG_FILE, LogOptions};
use crate::osf::DEFAULT_API_URL;
use crate::store::{DEFAULT_DATA_DIR, DEFAULT_RUNS_DIR, DEFAULT_STAGING_DIR, Store};

pub const DEFAULT_CONFIG_FILE: &str = "osf-fetch.json";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub staging_dir: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub runs_dir: Option<String>,
    #[serde(default)]
    pub extract_target: Option<ExtractTarget>,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub project_id: ProjectId,
    pub store: Store,
    pub extract_target: ExtractTarget,
    pub log: LogOptions,
    pub api_url: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        Self::resolve_config(Self::load(path)?)
    }

    /// An explicit path must exist; the default `osf-fetch.json` is optional.
    pub fn load(path: Option<&str>) -> Result<Config, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| FetchError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let project_id = match config.project_id {
            Some(id) => id.parse()?,
            None => ProjectId::default(),
        };

        let root = Utf8PathBuf::from(config.root.unwrap_or_else(|| ".".to_string()));
        let store = Store::new_with_paths(
            under_root(&root, config.staging_dir.as_deref(), DEFAULT_STAGING_DIR),
            under_root(&root, config.data_dir.as_deref(), DEFAULT_DATA_DIR),
            under_root(&root, config.runs_dir.as_deref(), DEFAULT_RUNS_DIR),
        );

        let log = LogOptions {
            file: under_root(&root, config.log_file.as_deref(), DEFAULT_LOG_FILE),
            ..LogOptions::default()
        };

        Ok(ResolvedConfig {
            project_id,
            store,
            extract_target: config.extract_target.unwrap_or_default(),
            log,
            api_url: config
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }
}

/// Absolute paths are kept as given; relative ones hang off `root`.
fn under_root(root: &Utf8Path, value: Option<&str>, default: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(value.unwrap_or(default));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
