use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repovault::git::{ensure_git_available, GitCli};
use repovault::providers::redacted_url;
use repovault::sync::PlannedAction;
use repovault::{Config, MirrorOutcome, RepoFilter, SyncEngine};

#[derive(Parser)]
#[command(name = "repovault")]
#[command(about = "Mirror backup tool for GitHub and BitBucket repositories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every configured target (the default when no command is given)
    Sync {
        /// Show what would be done without running any git operation
        #[arg(long)]
        dry_run: bool,
    },

    /// List the repositories each target would back up
    List {
        /// Show clone URLs (credentials redacted) next to each repository
        #[arg(long)]
        details: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting RepoVault v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config)?;

    match cli.command {
        None => cmd_sync(config, false).await,
        Some(Commands::Sync { dry_run }) => cmd_sync(config, dry_run).await,
        Some(Commands::List { details }) => cmd_list(config, details).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from the specified path or the default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Back up every configured target
async fn cmd_sync(config: Config, dry_run: bool) -> Result<()> {
    if config.targets.is_empty() {
        println!("No targets configured. Add targets to your configuration file.");
        println!("   Config: {:?}", Config::default_config_path()?);
        return Ok(());
    }

    if dry_run {
        return cmd_dry_run(config).await;
    }

    ensure_git_available().await?;

    // Ctrl-C stops new git operations; in-flight ones finish or time out.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing in-flight operations");
            let _ = shutdown_tx.send(true);
        }
    });

    let engine = SyncEngine::with_git(config, Arc::new(GitCli::new()), shutdown_rx);
    let report = engine.run_all().await;

    println!("\n📊 Backup summary:");
    for summary in &report.summaries {
        println!(
            "   {}: {} ({:.1}s)",
            summary.target,
            summary.summary_line(),
            summary.duration.as_secs_f64()
        );
    }

    let mut failed_repos = Vec::new();
    for summary in &report.summaries {
        for repo_report in &summary.reports {
            if let MirrorOutcome::Failed { error } = &repo_report.outcome {
                failed_repos.push((summary.target.as_str(), repo_report.repo.as_str(), error));
            }
        }
    }
    if !failed_repos.is_empty() {
        println!("\n❌ Failed repositories:");
        for (target, repo, error) in &failed_repos {
            println!("   {}/{}: {}", target, repo, error);
        }
    }

    if !report.failures.is_empty() {
        println!("\n❌ Failed targets:");
        for failure in &report.failures {
            println!("   {}: {}", failure.target, failure.error);
        }
    }

    println!("\nBackups completed.");

    if !report.all_targets_ran() {
        bail!(
            "{} of {} targets failed",
            report.failures.len(),
            engine.config().targets.len()
        );
    }

    Ok(())
}

/// Discover and classify repositories without touching git
async fn cmd_dry_run(config: Config) -> Result<()> {
    println!("🔍 Dry run - no git operations will be performed\n");

    let engine = SyncEngine::new(config);
    let mut had_errors = false;

    for target in &engine.config().targets {
        println!(
            "Target {} ({} {}):",
            target.name, target.source, target.entity
        );

        match engine.plan_target(target).await {
            Ok(plans) => {
                let mut clones = 0;
                let mut updates = 0;
                let mut skips = 0;
                for plan in &plans {
                    let verb = match plan.action {
                        PlannedAction::Clone => {
                            clones += 1;
                            "📥 clone "
                        }
                        PlannedAction::Update => {
                            updates += 1;
                            "🔄 update"
                        }
                        PlannedAction::Skip => {
                            skips += 1;
                            "⏭️  skip  "
                        }
                    };
                    println!("   {} {}", verb, plan.repo);
                }
                println!(
                    "   {} to clone, {} to update, {} skipped\n",
                    clones, updates, skips
                );
            }
            Err(err) => {
                had_errors = true;
                println!("   ❌ {:#}\n", err);
            }
        }
    }

    if had_errors {
        bail!("dry run failed for at least one target");
    }
    Ok(())
}

/// List the repositories each target would back up
async fn cmd_list(config: Config, details: bool) -> Result<()> {
    let engine = SyncEngine::new(config);

    for target in &engine.config().targets {
        let filter = RepoFilter::from_target(target)?;
        let repos = engine.discover(target).await?;

        println!("Target {} ({} repositories):", target.name, repos.len());
        for repo in &repos {
            let marker = if filter.includes(&repo.name) {
                "📁"
            } else {
                "⏭️ "
            };
            println!("  {} {}", marker, repo.name);
            if details {
                println!("     🔗 {}", redacted_url(&repo.clone_url));
            }
        }
        println!();
    }

    Ok(())
}
