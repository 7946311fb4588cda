//! Configuration file model and loading.
//!
//! The file is JSON or YAML (chosen by extension) with every section
//! optional:
//!
//! ```json
//! {
//!   "macros": [
//!     { "name": "movie", "sequence": [["tv", "KEY_POWER"], ["delay", 500], ["gpio", "lamp", 0]] },
//!     { "name": "tv on", "hidden": true, "sequence": [["tv", "KEY_POWER"]] }
//!   ],
//!   "gpios": [{ "name": "lamp", "pin": 17, "state": 0 }],
//!   "ir": { "irsend": "/usr/bin/irsend", "post_send_delay_ms": 100 },
//!   "blacklists": { "tv": ["KEY_SLEEP"] }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::devices::gpio::GpioPinConfig;
use crate::types::MacroDefinition;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "config.json";

/// File name looked up in `$HOME`.
pub const HOME_CONFIG: &str = ".lirc_web_config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("No configuration found (looked in {})", display_paths(.0))]
    NotFound(Vec<PathBuf>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Settings for the LIRC `irsend` transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrConfig {
    /// Program invoked for every send.
    pub irsend: String,

    /// LIRC daemon socket, passed as `--device` when set.
    pub socket: Option<String>,

    /// Pause after each IR send inside a macro, giving receivers time to
    /// settle before the next command.
    pub post_send_delay_ms: u64,
}

impl Default for IrConfig {
    fn default() -> Self {
        Self {
            irsend: "irsend".to_string(),
            socket: None,
            post_send_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub macros: Vec<MacroDefinition>,
    pub gpios: Vec<GpioPinConfig>,
    pub ir: IrConfig,
    /// Commands hidden from remote listings, per remote.
    pub blacklists: BTreeMap<String, Vec<String>>,
}

impl RemoteConfig {
    pub fn from_json_str(src: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn from_yaml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(src)?)
    }
}

/// Load a configuration file, picking the parser from its extension.
pub fn load_from_path(path: &Path) -> Result<RemoteConfig, ConfigError> {
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Format::Json,
        Some("yaml" | "yml") => Format::Yaml,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = match format {
        Format::Json => RemoteConfig::from_json_str(&content)?,
        Format::Yaml => RemoteConfig::from_yaml_str(&content)?,
    };

    info!(
        "Loaded configuration from {:?} ({} macros, {} gpios)",
        path,
        config.macros.len(),
        config.gpios.len()
    );
    Ok(config)
}

/// Load `./config.json`, falling back to `$HOME/.lirc_web_config.json`.
pub fn load_default() -> Result<RemoteConfig, ConfigError> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    load_first_existing(&default_candidates(home.as_deref()))
}

fn default_candidates(home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(home) = home {
        candidates.push(home.join(HOME_CONFIG));
    }
    candidates
}

fn load_first_existing(candidates: &[PathBuf]) -> Result<RemoteConfig, ConfigError> {
    for path in candidates {
        if path.is_file() {
            return load_from_path(path);
        }
        debug!("No configuration at {:?}", path);
    }
    Err(ConfigError::NotFound(candidates.to_vec()))
}

enum Format {
    Json,
    Yaml,
}
