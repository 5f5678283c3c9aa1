use std::path::{Path, PathBuf};

use nest_store::WalStoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestConfig {
    /// Directory holding the comment log.
    pub data_dir: PathBuf,
    pub wal: WalStoreConfig,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".nest"),
            wal: WalStoreConfig::default(),
        }
    }
}

impl NestConfig {
    /// Read a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> ServiceResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ServiceResult<Self> {
        toml::from_str(text).map_err(|e| ServiceError::Config(e.to_string()))
    }
}
