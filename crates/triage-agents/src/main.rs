use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use incident_core::events::{EventBusExt, EventFilter};
use incident_core::{FailurePolicy, RunbookStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use triage_agents::demo::write_event_lines;
use triage_agents::{DemoRunner, RunOutcome, TriageConfig};

/// Simulated incident triage with a chair-driven agent call.
#[derive(Parser)]
#[command(name = "triage-agents", version, about)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run simulated checkouts and triage the first failure
    Run {
        /// Seed for the failure injector
        #[arg(long)]
        seed: Option<u64>,
        /// Force a failure rule by id on the first call
        #[arg(long)]
        force: Option<String>,
        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the event stream as JSON lines
        #[arg(long)]
        events: bool,
        /// Only print these event types (implies --events); the closing
        /// transition is always printed
        #[arg(
            long,
            value_delimiter = ',',
            value_parser = ["state-transition", "finding", "action"]
        )]
        event_types: Vec<String>,
    },

    /// Load the failure policy and runbooks and report problems
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective failure policy
    Policy {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_policy(config: &TriageConfig) -> Result<FailurePolicy> {
    let policy = match &config.policy_path {
        Some(path) => FailurePolicy::load_file(path)?,
        None => FailurePolicy::builtin()?,
    };
    Ok(policy)
}

fn load_runbooks(config: &TriageConfig) -> Result<RunbookStore> {
    let store = match &config.runbook_dir {
        Some(dir) => RunbookStore::from_dir(dir)?,
        None => RunbookStore::builtin()?,
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Run {
            seed,
            force,
            config,
            events,
            event_types,
        } => {
            let mut config = TriageConfig::load(config.as_deref())?;
            if seed.is_some() {
                config.seed = seed;
            }
            let filter = (events || !event_types.is_empty()).then(|| {
                let filter = EventFilter::new().until_terminal();
                if event_types.is_empty() {
                    filter
                } else {
                    filter.types(event_types.iter().map(String::as_str).collect())
                }
            });
            run(config, force, filter).await
        }
        Commands::Validate { config } => {
            let config = TriageConfig::load(config.as_deref())?;
            let policy = load_policy(&config).context("Failure policy is invalid")?;
            let runbooks = load_runbooks(&config).context("Runbooks are invalid")?;
            for rule_id in policy.rules_without_hint() {
                warn!(rule = rule_id, "Failure rule has no fix_hint");
            }
            info!(
                rules = policy.failure_modes.len(),
                enabled = policy.enabled,
                roles = ?runbooks.roles(),
                "Configuration OK"
            );
            Ok(())
        }
        Commands::Policy { config } => {
            let config = TriageConfig::load(config.as_deref())?;
            let policy = load_policy(&config)?;
            println!("{}", serde_json::to_string_pretty(&policy)?);
            Ok(())
        }
    }
}

async fn run(
    config: TriageConfig,
    force: Option<String>,
    event_filter: Option<EventFilter>,
) -> Result<()> {
    info!(
        seed = ?config.seed,
        max_calls = config.max_calls,
        max_agent_turns = config.max_agent_turns,
        "Triage demo starting"
    );
    let runner = DemoRunner::from_config(&config, None).context("Failed to start demo")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, aborting triage");
                cancel.cancel();
            }
        });
    }

    let printer = event_filter.map(|filter| {
        let rx = runner.events().subscribe_filtered(filter);
        tokio::spawn(write_event_lines(rx, std::io::stdout()))
    });

    let outcome = runner.run(force.as_deref(), &cancel).await?;

    if let Some(printer) = printer {
        // An idle run publishes nothing, so there is no terminal event to wait for.
        if outcome.is_idle() {
            printer.abort();
        } else if let Err(e) = printer.await {
            warn!("Event printer failed: {e}");
        }
    }

    match &outcome {
        RunOutcome::Idle { calls } => {
            println!("No failures in {calls} simulated checkouts; nothing to triage.");
        }
        RunOutcome::Triaged(call) => match &call.report {
            Some(report) => println!("{}", report.to_markdown()),
            None => println!("Triage call {} aborted: {}", call.call.ticket_id, call.call.summary()),
        },
    }
    Ok(())
}
