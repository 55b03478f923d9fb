//! `Kiln.toml`: where to deploy, who signs, and the plan itself.
//!
//! Values are layered: built-in defaults, then the TOML file, then `KILN_`
//! environment variables (`KILN_RPC__URL` sets `rpc.url`).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::PlanError,
    gateway::Confirmation,
    plan::{DeploymentPlan, Step},
    presets::Preset,
};

/// Name of the configuration file looked up inside a directory.
pub const KILN_CONFIG_FILENAME: &str = "Kiln.toml";

/// Default JSON-RPC endpoint (a local Hardhat or Anvil node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint of the node.
    pub url: String,
    /// Delay between two receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// How long a transaction may stay unconfirmed, in seconds.
    pub confirmation_timeout_secs: u64,
    /// How long to wait for the node to answer at startup, in seconds.
    pub ready_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            poll_interval_ms: 500,
            confirmation_timeout_secs: 120,
            ready_timeout_secs: 30,
        }
    }
}

impl RpcConfig {
    pub fn confirmation(&self) -> Confirmation {
        Confirmation {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Index into the node's accounts of the account that signs everything.
    pub signer_index: usize,
}

/// Complete deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub account: AccountConfig,
    /// Directory holding the compiled contract artifacts.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts: PathBuf,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            account: AccountConfig::default(),
            artifacts: default_artifacts_dir(),
            steps: Vec::new(),
        }
    }
}

impl DeploymentConfig {
    /// Default settings running the steps of `preset`.
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            steps: preset.steps(),
            ..Self::default()
        }
    }

    /// Validate the configured steps into a plan.
    pub fn plan(&self) -> Result<DeploymentPlan, PlanError> {
        DeploymentPlan::new(self.steps.clone())
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deployment config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a file, or from `Kiln.toml` inside a directory,
    /// with `KILN_` environment variables layered on top.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(KILN_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        if !config_path.is_file() {
            return Err(anyhow::anyhow!(
                "No {} found in {}",
                KILN_CONFIG_FILENAME,
                path.display()
            ));
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("KILN_").split("__").ignore(&["verbosity"]))
            .extract()
            .context(format!(
                "Failed to parse config file {}",
                config_path.display()
            ))?;

        tracing::info!(
            path = %config_path.display(),
            steps = config.steps.len(),
            "Configuration loaded"
        );
        Ok(config)
    }
}
