//! RepoVault - Mirror Backups for Hosted Git Repositories
//!
//! RepoVault discovers every repository a user or organization owns on a
//! hosted git provider and keeps a local bare mirror of each one up to date,
//! tolerating partial failures across the batch.
//!
//! ## Core Features
//!
//! - **Provider Discovery**: Full repository listings from GitHub and
//!   BitBucket, following pagination to the last page
//! - **Inclusion Filters**: Regex-based skip/only rules per target
//! - **Mirror Synchronization**: Atomic first clones, credential-refreshing
//!   updates, bounded parallelism per target
//! - **Configuration Management**: YAML-based configuration with XDG compliance
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`providers`]: Provider API clients and clone-URL credentials
//! - [`filter`]: Repository inclusion rules
//! - [`git`]: Process-level mirror operations
//! - [`sync`]: The engine that drives a full backup run

pub mod config;
pub mod filter;
pub mod git;
pub mod providers;
pub mod sync;

pub use config::{Config, Target};
pub use filter::RepoFilter;
pub use git::{GitCli, GitMirror, MirrorOutcome};
pub use providers::{Provider, RemoteRepo};
pub use sync::{BatchReport, SyncEngine, TargetSummary};
