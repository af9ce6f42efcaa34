use crate::eligibility::EligibilityPolicy;
use crate::script::{ContractRegistry, RegistryError};
use crate::snapshot::SnapshotMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Settings of a toolbox run, read from a json file
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolboxConfig {
    /// Network whose contract aliases are used, e.g. `emulator` or `testnet`
    pub network: String,
    pub access_node_url: String,
    pub snapshot_service_url: String,
    #[serde(default = "default_timeout_secs")]
    pub snapshot_timeout_secs: u64,
    #[serde(default)]
    pub snapshot_mode: SnapshotMode,
    #[serde(default = "default_true")]
    pub enforce_minimum: bool,
    /// Project file holding the contract aliases of every network
    pub contracts_path: PathBuf,
}

impl ToolboxConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }

    pub fn policy(&self) -> EligibilityPolicy {
        EligibilityPolicy {
            enforce_minimum: self.enforce_minimum,
        }
    }

    pub fn registry(&self) -> Result<ContractRegistry, ConfigError> {
        Ok(ContractRegistry::load(&self.contracts_path, &self.network)?)
    }
}
