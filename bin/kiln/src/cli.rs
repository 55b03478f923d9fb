use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kiln_deploy::{DeploymentConfig, KILN_CONFIG_FILENAME, Preset};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Number of accounts made up for a simulated run.
pub const SIMULATED_ACCOUNTS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(
    version,
    about = "Deploy an ordered set of contracts, wiring each one to the addresses of the ones before it."
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "KILN_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a deployment plan.
    Deploy(DeployArgs),
    /// Check a deployment plan without touching the ledger.
    Validate(ValidateArgs),
    /// Write a configuration file for one of the built-in plans.
    Init(InitArgs),
}

/// Where the plan comes from.
#[derive(Args, Debug, Clone)]
pub struct PlanSource {
    /// Path to a Kiln.toml, or to a directory holding one.
    #[arg(short, long, alias = "conf", env = "KILN_CONFIG", default_value = ".")]
    pub config: PathBuf,

    /// Run a built-in plan with default settings instead of a configuration file.
    #[arg(long, env = "KILN_PRESET", conflicts_with = "config")]
    pub preset: Option<Preset>,
}

impl PlanSource {
    pub fn load(&self) -> anyhow::Result<DeploymentConfig> {
        match self.preset {
            Some(preset) => {
                tracing::info!(%preset, "Using built-in plan");
                Ok(DeploymentConfig::from_preset(preset))
            }
            None => DeploymentConfig::load(&self.config),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub source: PlanSource,

    /// JSON-RPC endpoint of the node. Overrides `rpc.url`.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<Url>,

    /// Index of the node account that signs every transaction. Overrides `account.signer_index`.
    #[arg(long)]
    pub signer_index: Option<usize>,

    /// Directory holding the compiled contract artifacts. Overrides `artifacts`.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Run against an in-memory ledger instead of a node.
    #[arg(long, env = "KILN_SIMULATE", default_value_t = false)]
    pub simulate: bool,

    /// Write the execution report as JSON to this path, whether the run succeeds or halts.
    #[arg(long, env = "KILN_REPORT_OUT")]
    pub report_out: Option<PathBuf>,
}

impl DeployArgs {
    /// Load the configuration and apply the command-line overrides.
    pub fn config(&self) -> anyhow::Result<DeploymentConfig> {
        let mut config = self.source.load()?;

        if let Some(url) = &self.rpc_url {
            config.rpc.url = url.to_string();
        }
        if let Some(signer_index) = self.signer_index {
            config.account.signer_index = signer_index;
        }
        if let Some(artifacts) = &self.artifacts {
            config.artifacts = artifacts.clone();
        }

        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub source: PlanSource,
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// The built-in plan to start from.
    #[arg(long, default_value_t = Preset::Rubi)]
    pub preset: Preset,

    /// Where to write the configuration. A directory gets a Kiln.toml inside it.
    #[arg(short, long, default_value = KILN_CONFIG_FILENAME)]
    pub out: PathBuf,

    /// Overwrite an existing file.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

impl InitArgs {
    pub fn out_path(&self) -> PathBuf {
        if self.out.is_dir() {
            self.out.join(KILN_CONFIG_FILENAME)
        } else {
            self.out.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_deploy_overrides() {
        let cli = Cli::try_parse_from([
            "kiln",
            "deploy",
            "--preset",
            "bunny",
            "--rpc-url",
            "http://localhost:9545",
            "--signer-index",
            "2",
            "--simulate",
        ])
        .unwrap();

        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(args.simulate);

        let config = args.config().unwrap();
        assert_eq!(config.rpc.url, "http://localhost:9545/");
        assert_eq!(config.account.signer_index, 2);
        assert_eq!(config.steps, Preset::Bunny.steps());
    }

    #[test]
    fn test_init_out_path() {
        let dir = TempDir::new("kiln-cli").unwrap();
        let path = dir.path().to_str().unwrap();

        let cli = Cli::try_parse_from(["kiln", "-v", "debug", "init", "--out", path]).unwrap();
        assert_eq!(cli.verbosity, LevelFilter::DEBUG);

        let Command::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.preset, Preset::Rubi);
        assert_eq!(args.out_path(), dir.path().join(KILN_CONFIG_FILENAME));
    }

    #[test]
    fn test_rejects_unknown_preset() {
        assert!(Cli::try_parse_from(["kiln", "validate", "--preset", "cake"]).is_err());
    }
}
