//! kiln deploys an ordered set of contracts, one step at a time, and halts on the first failure.

mod cli;

use std::{path::Path, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, DeployArgs, InitArgs, SIMULATED_ACCOUNTS, ValidateArgs};
use kiln_deploy::{
    Accounts, ArtifactStore, DEFAULT_REQUEST_TIMEOUT, DeploymentConfig, FactoryGateway, Reporter,
    RpcClient, RpcGateway, Sequencer, SimulatedGateway, Step, render_failure, summary_table,
};

/// How a deployment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Halted,
}

impl From<RunOutcome> for ExitCode {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => ExitCode::SUCCESS,
            RunOutcome::Halted => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Deploy(args) => Ok(deploy(args).await?.into()),
        Command::Validate(args) => validate(args).map(|_| ExitCode::SUCCESS),
        Command::Init(args) => init(args).map(|_| ExitCode::SUCCESS),
    }
}

async fn deploy(args: DeployArgs) -> Result<RunOutcome> {
    let config = args.config()?;
    let report_out = args.report_out.as_deref();

    if args.simulate {
        tracing::info!(steps = config.steps.len(), "Simulating deployment...");

        let accounts = Accounts::random(SIMULATED_ACCOUNTS, config.account.signer_index)?;
        return run(&SimulatedGateway::new(), &accounts, config.steps, report_out).await;
    }

    let (gateway, accounts) = connect(&config).await?;
    run(&gateway, &accounts, config.steps, report_out).await
}

/// Wait for the node, then gather the signer accounts and the artifacts.
async fn connect(config: &DeploymentConfig) -> Result<(RpcGateway, Accounts)> {
    let rpc = RpcClient::new(&config.rpc.url, DEFAULT_REQUEST_TIMEOUT)?;

    let chain_id = rpc
        .wait_until_ready(config.rpc.ready_timeout())
        .await
        .context(format!("Node at {} is not reachable", config.rpc.url))?;

    let accounts = Accounts::fetch(&rpc, config.account.signer_index)
        .await
        .context("Failed to fetch node accounts")?;

    let artifacts = ArtifactStore::load(&config.artifacts)?;

    tracing::info!(
        rpc_url = %config.rpc.url,
        chain_id,
        signer = %accounts.signer(),
        artifacts = artifacts.len(),
        "Connected to node"
    );

    Ok((
        RpcGateway::new(rpc, artifacts, config.rpc.confirmation()),
        accounts,
    ))
}

/// Execute `steps` and surface the outcome to the operator.
///
/// A halted run always prints its partial report and error to stderr, even
/// when the report file cannot be written.
async fn run<G: FactoryGateway>(
    gateway: &G,
    accounts: &Accounts,
    steps: Vec<Step>,
    report_out: Option<&Path>,
) -> Result<RunOutcome> {
    let mut reporter = Reporter::new();

    let result = Sequencer::new(gateway, accounts)
        .with_listener(&mut reporter)
        .execute_steps(steps)
        .await;

    match result {
        Ok(report) => {
            if let Some(path) = report_out {
                report.save_to_file(path)?;
            }
            println!("{}", summary_table(&report));
            Ok(RunOutcome::Completed)
        }
        Err(halted) => {
            eprintln!("{}", render_failure(&halted));
            if let Some(path) = report_out {
                if let Err(e) = halted.report.save_to_file(path) {
                    tracing::error!(path = %path.display(), "Failed to save the partial report: {:#}", e);
                }
            }
            Ok(RunOutcome::Halted)
        }
    }
}

fn validate(args: ValidateArgs) -> Result<()> {
    let config = args.source.load()?;
    let plan = config.plan().context("Invalid deployment plan")?;

    println!("Plan sha256:{} ({} steps)", plan.digest(), plan.len());
    for (index, step) in plan.steps().iter().enumerate() {
        println!(
            "  [{}] {} ({}): {} arg(s), {} call(s)",
            index,
            step.name(),
            step.resource_type,
            step.constructor_args.len(),
            step.init_calls.len()
        );
    }

    Ok(())
}

fn init(args: InitArgs) -> Result<()> {
    let path = args.out_path();

    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }

    let config = DeploymentConfig::from_preset(args.preset);
    config
        .plan()
        .context(format!("Preset {} is not a valid plan", args.preset))?;
    config.save_to_file(&path)?;

    println!("Wrote the {} plan to {}", args.preset, path.display());
    Ok(())
}
