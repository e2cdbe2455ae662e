//! Nodewatch CLI
//!
//! Command-line interface for the Nodewatch alerting engine.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nodewatch::alerting::{
    http_client, sampler, AlertDispatcher, NotificationRegistry, NotificationThrottle,
    RuleEvaluator,
};
use nodewatch::db::Database;
use nodewatch::models::{AlertRule, CycleTransferStats, HostSnapshot, MetricKind};
use nodewatch::{telemetry, Config};
use serde::Deserialize;
use tracing::{info, warn};

/// Nodewatch - Alerting for server fleets
#[derive(Parser)]
#[command(name = "nodewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "NODEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate rules against host snapshots and dispatch alerts.
    ///
    /// Repeat muting only applies within a single run.
    Check {
        /// JSON file with an array of rule groups
        #[arg(long)]
        rules: PathBuf,

        /// JSON file with an array of host snapshots
        #[arg(long)]
        snapshots: PathBuf,

        /// Evaluate without sending notifications
        #[arg(long)]
        dry_run: bool,
    },

    /// List configured notification channels
    Channels,

    /// Run database migrations
    Migrate,
}

/// A named set of rules that alert together.
///
/// The group fires for a host only when every rule in it is breached.
#[derive(Debug, Deserialize)]
struct RuleGroup {
    name: String,
    #[serde(default = "default_muteable")]
    muteable: bool,
    rules: Vec<AlertRule>,
}

fn default_muteable() -> bool {
    true
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    telemetry::init(&config.logging);

    let result = match cli.command {
        Commands::Check {
            rules,
            snapshots,
            dry_run,
        } => run_check(config, &rules, &snapshots, dry_run).await,
        Commands::Channels => run_channels(config).await,
        Commands::Migrate => run_migrate(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn connect(config: &Config) -> anyhow::Result<Database> {
    let db = Database::new(config)
        .await
        .context("connecting to database")?;
    db.health_check().await.context("database health check")?;
    Ok(db)
}

fn describe(group: &RuleGroup, host: &HostSnapshot) -> String {
    let details: Vec<String> = group
        .rules
        .iter()
        .map(|rule| {
            if rule.kind == MetricKind::Offline {
                return "offline".to_string();
            }
            let mut bounds = Vec::new();
            if rule.min > 0.0 {
                bounds.push(format!("min {}", rule.min));
            }
            if rule.max > 0.0 {
                bounds.push(format!("max {}", rule.max));
            }
            if rule.is_cyclic() {
                format!("{} [{}]", rule.kind, bounds.join(", "))
            } else {
                format!(
                    "{} = {:.2} [{}]",
                    rule.kind,
                    sampler::sample(rule.kind, host),
                    bounds.join(", ")
                )
            }
        })
        .collect();

    format!(
        "[Alert] {} on {} (#{}): {}",
        group.name,
        host.name,
        host.id,
        details.join("; ")
    )
}

async fn run_check(
    config: Config,
    rules_path: &Path,
    snapshots_path: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let groups: Vec<RuleGroup> = read_json(rules_path)?;
    let hosts: Vec<HostSnapshot> = read_json(snapshots_path)?;

    for group in &groups {
        for rule in &group.rules {
            rule.validate()
                .with_context(|| format!("invalid rule in group {}", group.name))?;
        }
    }

    let db = connect(&config).await?;
    let evaluator = RuleEvaluator::from_config(Arc::new(db.transfer_ledger()), &config.alerting);

    let registry = Arc::new(NotificationRegistry::new(http_client()?));
    registry
        .load(&db.channel_store())
        .await
        .context("loading notification channels")?;
    let throttle = Arc::new(NotificationThrottle::from_config(&config.throttle));
    let dispatcher = AlertDispatcher::new(throttle, registry);

    info!(
        groups = groups.len(),
        hosts = hosts.len(),
        channels = dispatcher.registry().len().await,
        "Evaluating rules"
    );

    let mut fired = 0usize;
    for group in &groups {
        let stats: Vec<CycleTransferStats> =
            group.rules.iter().map(|_| CycleTransferStats::new()).collect();

        for host in &hosts {
            let mut breached = !group.rules.is_empty();
            for (rule, stats) in group.rules.iter().zip(&stats) {
                if !evaluator.evaluate(rule, host, stats).await {
                    breached = false;
                }
            }
            if !breached {
                continue;
            }

            fired += 1;
            let description = describe(group, host);
            if dry_run {
                println!("{description}");
                continue;
            }
            match dispatcher.send(&description, group.muteable).await {
                Some(report) if !report.is_success() => warn!(
                    host_id = host.id,
                    failures = report.failures.len(),
                    "Alert partially delivered"
                ),
                Some(report) => info!(host_id = host.id, delivered = report.delivered, "Alert sent"),
                None => info!(host_id = host.id, "Alert muted"),
            }
        }

        for (rule, stats) in group.rules.iter().zip(&stats) {
            if rule.is_cyclic() {
                let report = stats.snapshot();
                println!(
                    "{} / {}: {}",
                    group.name,
                    rule.kind,
                    serde_json::to_string_pretty(&report)?
                );
            }
        }
    }

    info!(fired, "Check complete");
    Ok(())
}

async fn run_channels(config: Config) -> anyhow::Result<()> {
    use nodewatch::alerting::ChannelStore;

    let db = connect(&config).await?;
    let channels = db
        .channel_store()
        .load_all()
        .await
        .context("loading notification channels")?;

    if channels.is_empty() {
        println!("No notification channels configured");
        return Ok(());
    }

    println!("{:<8} {:<10} {:<8} NAME", "ID", "TYPE", "ENABLED");
    for channel in channels {
        println!(
            "{:<8} {:<10} {:<8} {}",
            channel.id,
            channel.kind.type_name(),
            channel.enabled,
            channel.name
        );
    }
    Ok(())
}

async fn run_migrate(config: Config) -> anyhow::Result<()> {
    let db = connect(&config).await?;
    db.migrate().await.context("running migrations")?;
    println!("Migrations applied");
    Ok(())
}
