//! Sync engine - orchestrates backup of every configured target
//!
//! This module coordinates repository discovery, filtering, and parallel
//! mirroring for each target, and aggregates per-repository outcomes into
//! the summaries the operator sees.

use crate::config::{Config, Target};
use crate::filter::RepoFilter;
use crate::git::{GitCli, GitMirror, MirrorOutcome};
use crate::providers::{self, RemoteRepo};
use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Outcome of one repository within a target run
#[derive(Debug, Clone)]
pub struct RepoReport {
    pub repo: String,
    pub outcome: MirrorOutcome,
}

/// Aggregate result of backing up a single target
#[derive(Debug, Clone)]
pub struct TargetSummary {
    pub target: String,
    /// Repositories the provider listed, before filtering
    pub discovered: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
    pub reports: Vec<RepoReport>,
}

impl TargetSummary {
    /// The operator-facing summary line for this target
    pub fn summary_line(&self) -> String {
        format!(
            "Backed up {}/{} repositories successfully.",
            self.succeeded, self.discovered
        )
    }
}

/// Result of a full run across every configured target
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub summaries: Vec<TargetSummary>,
    pub failures: Vec<TargetFailure>,
}

/// A target that could not run at all (provider resolution or listing error)
#[derive(Debug, Clone)]
pub struct TargetFailure {
    pub target: String,
    pub error: String,
}

impl BatchReport {
    pub fn all_targets_ran(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a sync would do for one repository, decided without invoking git
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Clone,
    Update,
    Skip,
}

#[derive(Debug, Clone)]
pub struct RepoPlan {
    pub repo: String,
    pub action: PlannedAction,
}

/// The main engine that drives discovery, filtering, and mirroring
#[derive(Clone)]
pub struct SyncEngine {
    config: Arc<Config>,
    git: Arc<dyn GitMirror>,
    shutdown: watch::Receiver<bool>,
}

impl SyncEngine {
    /// Create an engine that shells out to the real `git` binary and never
    /// receives an external shutdown signal.
    pub fn new(config: Config) -> Self {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        Self::with_git(config, Arc::new(GitCli::new()), shutdown_rx)
    }

    /// Create an engine over an explicit git implementation and shutdown
    /// signal. `main` uses this to wire the Ctrl-C handler; tests substitute
    /// a scripted mirror.
    pub fn with_git(
        config: Config,
        git: Arc<dyn GitMirror>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            git,
            shutdown,
        }
    }

    /// Back up every configured target in order.
    ///
    /// Target failures are isolated: a target whose provider resolution or
    /// listing fails is recorded in the report and the remaining targets
    /// still run.
    pub async fn run_all(&self) -> BatchReport {
        let mut report = BatchReport::default();

        for target in &self.config.targets {
            if self.shutdown_requested() {
                warn!("Shutdown requested, leaving remaining targets untouched");
                break;
            }

            info!("Backing up target {}", target.name);

            match self.run_target(target).await {
                Ok(summary) => {
                    info!(
                        "Target {}: {} ({:.1}s)",
                        target.name,
                        summary.summary_line(),
                        summary.duration.as_secs_f64()
                    );
                    report.summaries.push(summary);
                }
                Err(err) => {
                    error!("Target {} failed: {:#}", target.name, err);
                    report.failures.push(TargetFailure {
                        target: target.name.clone(),
                        error: format!("{:#}", err),
                    });
                }
            }
        }

        report
    }

    /// Back up one target: list its repositories, filter them, and bring
    /// every included one to an up-to-date local mirror.
    ///
    /// A listing error aborts the whole target; individual repository
    /// failures are tallied in the summary without stopping the rest.
    pub async fn run_target(&self, target: &Target) -> Result<TargetSummary> {
        let started = Instant::now();

        // Patterns were validated with the config; recompiling is cheap.
        let filter = RepoFilter::from_target(target)?;
        let repos = self.discover(target).await?;

        info!(
            "Discovered {} repositories for target {}",
            repos.len(),
            target.name
        );

        Ok(self.back_up(target, repos, &filter, started).await)
    }

    /// List a target's repositories through its resolved provider.
    pub async fn discover(&self, target: &Target) -> Result<Vec<RemoteRepo>> {
        let provider = providers::for_target(target, self.http_timeout())?;
        debug!(
            "Listing repositories for {} via {}",
            target.name,
            provider.provider_name()
        );

        provider
            .list_repositories(target)
            .await
            .with_context(|| format!("Failed to list repositories for target {:?}", target.name))
    }

    /// Report what a sync would do for each discovered repository, without
    /// invoking git.
    pub async fn plan_target(&self, target: &Target) -> Result<Vec<RepoPlan>> {
        let filter = RepoFilter::from_target(target)?;
        let repos = self.discover(target).await?;

        let plans = repos
            .into_iter()
            .map(|repo| {
                let action = if !filter.includes(&repo.name) {
                    PlannedAction::Skip
                } else if self.config.mirror_path(&target.name, &repo.name).exists() {
                    PlannedAction::Update
                } else {
                    PlannedAction::Clone
                };
                RepoPlan {
                    repo: repo.name,
                    action,
                }
            })
            .collect();

        Ok(plans)
    }

    /// Configuration access for callers that hold only the engine
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mirror the listed repositories and compile the target summary.
    async fn back_up(
        &self,
        target: &Target,
        repos: Vec<RemoteRepo>,
        filter: &RepoFilter,
        started: Instant,
    ) -> TargetSummary {
        let discovered = repos.len();
        let reports = self.sync_repos(target, repos, filter).await;
        self.compile_summary(target, discovered, reports, started.elapsed())
    }

    /// Mirror repositories through a semaphore-bounded worker pool.
    ///
    /// Excluded names are tallied as skipped without touching the
    /// filesystem. A shutdown signal stops new git operations from
    /// starting; in-flight ones run to completion or their timeout.
    async fn sync_repos(
        &self,
        target: &Target,
        repos: Vec<RemoteRepo>,
        filter: &RepoFilter,
    ) -> Vec<RepoReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.sync.parallelism));
        let op_timeout = Duration::from_secs(self.config.sync.timeout_secs);

        let mut reports = Vec::with_capacity(repos.len());
        let mut futures = FuturesUnordered::new();

        for repo in repos {
            if !filter.includes(&repo.name) {
                debug!("Skipping {} (excluded by filter)", repo.name);
                reports.push(RepoReport {
                    repo: repo.name,
                    outcome: MirrorOutcome::Skipped {
                        reason: "excluded by filter".to_string(),
                    },
                });
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let engine = self.clone();
            let target_name = target.name.clone();

            futures.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");

                if engine.shutdown_requested() {
                    return RepoReport {
                        repo: repo.name,
                        outcome: MirrorOutcome::Skipped {
                            reason: "shutdown requested".to_string(),
                        },
                    };
                }

                let outcome = engine.sync_repo(&target_name, &repo, op_timeout).await;
                RepoReport {
                    repo: repo.name,
                    outcome,
                }
            });
        }

        while let Some(report) = futures.next().await {
            reports.push(report);
        }

        reports
    }

    /// Synchronize one repository into its mirror path, classifying the
    /// result rather than propagating errors so siblings keep running.
    async fn sync_repo(
        &self,
        target_name: &str,
        repo: &RemoteRepo,
        op_timeout: Duration,
    ) -> MirrorOutcome {
        let dest = self.config.mirror_path(target_name, &repo.name);
        let exists = dest.exists();

        let operation = if exists {
            self.git.update_mirror(&repo.clone_url, &dest)
        } else {
            self.git.clone_mirror(&repo.clone_url, &dest)
        };

        let result = match timeout(op_timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Backing up {} timed out after {}s",
                    repo.name,
                    op_timeout.as_secs()
                );
                return MirrorOutcome::Failed {
                    error: format!("operation timed out after {}s", op_timeout.as_secs()),
                };
            }
        };

        match result {
            Ok(()) if exists => {
                debug!("Updated mirror {}", dest.display());
                MirrorOutcome::Updated
            }
            Ok(()) => {
                info!("Cloned new mirror {}", dest.display());
                MirrorOutcome::Cloned
            }
            Err(err) => {
                error!("Failed to back up {}: {:#}", repo.name, err);
                MirrorOutcome::Failed {
                    error: format!("{:#}", err),
                }
            }
        }
    }

    /// Tally per-repository outcomes into the target aggregate
    fn compile_summary(
        &self,
        target: &Target,
        discovered: usize,
        reports: Vec<RepoReport>,
        duration: Duration,
    ) -> TargetSummary {
        let mut succeeded = 0;
        let mut skipped = 0;
        let mut failed = 0;

        for report in &reports {
            match &report.outcome {
                MirrorOutcome::Cloned | MirrorOutcome::Updated => succeeded += 1,
                MirrorOutcome::Skipped { .. } => skipped += 1,
                MirrorOutcome::Failed { .. } => failed += 1,
            }
        }

        TargetSummary {
            target: target.name.clone(),
            discovered,
            succeeded,
            skipped,
            failed,
            duration,
            reports,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.config.sync.http_timeout_secs)
    }
}
