use anyhow::{bail, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use shellexpand;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::filter::RepoFilter;

/// Main configuration structure for RepoVault
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Base directory that receives one subdirectory per target
    pub backup_directory: String,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Backup targets (one entry per user or organization to back up)
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Maximum parallel mirror operations within a target
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Timeout for a single git operation in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for provider API requests in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

/// One backup target: a user or organization on a hosted git provider
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Target {
    /// Internal name, also the directory the target's mirrors live under
    pub name: String,

    /// Provider identifier ("github" or "bitbucket")
    pub source: String,

    /// Whether the entity is a user or an organization
    #[serde(rename = "type", default)]
    pub kind: EntityKind,

    /// Account or organization name on the provider
    pub entity: String,

    /// API root override for self-hosted instances (GitHub Enterprise,
    /// Bitbucket Server); the provider's public API when absent
    #[serde(default)]
    pub api_url: Option<String>,

    /// API token (GitHub)
    #[serde(default)]
    pub token: String,

    /// App password (BitBucket)
    #[serde(default)]
    pub password: String,

    /// Regex of repository names to skip (takes precedence over `only`)
    #[serde(default)]
    pub skip: Option<String>,

    /// Regex of repository names to back up exclusively
    #[serde(default)]
    pub only: Option<String>,
}

/// Entity kind, matching the path segment GitHub uses for repository listings
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityKind {
    #[default]
    #[serde(rename = "users", alias = "user")]
    Users,
    #[serde(rename = "orgs", alias = "org", alias = "organization")]
    Orgs,
}

impl EntityKind {
    /// The URL path segment for this kind in the GitHub listing endpoint
    pub fn api_segment(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Orgs => "orgs",
        }
    }
}

impl Target {
    /// The skip pattern, treating an empty string the same as absent
    pub fn skip_pattern(&self) -> Option<&str> {
        self.skip.as_deref().filter(|p| !p.is_empty())
    }

    /// The only pattern, treating an empty string the same as absent
    pub fn only_pattern(&self) -> Option<&str> {
        self.only.as_deref().filter(|p| !p.is_empty())
    }
}

// Default value functions
fn default_parallelism() -> usize {
    4
}
fn default_timeout() -> u64 {
    300
}
fn default_http_timeout() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            timeout_secs: default_timeout(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration: {:?}", path))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repovault").join("config.yml"))
    }

    /// Validate the configuration and expand paths.
    ///
    /// Every filter pattern is compiled here so that a bad regex aborts the
    /// run before any provider is contacted.
    pub fn validate(&mut self) -> Result<()> {
        self.expand_paths()?;

        if self.backup_directory.trim().is_empty() {
            bail!("backup_directory must not be empty");
        }
        if self.sync.parallelism == 0 {
            bail!("sync.parallelism must be at least 1");
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                bail!("Every target needs a non-empty name");
            }
            // The target name becomes a directory component under the backup root.
            if target.name.contains('/') || target.name.contains('\\') {
                bail!(
                    "Target name {:?} must not contain path separators",
                    target.name
                );
            }
            if !seen.insert(target.name.as_str()) {
                bail!("Duplicate target name: {:?}", target.name);
            }
            if target.entity.trim().is_empty() {
                bail!("Target {:?} needs a non-empty entity", target.name);
            }

            RepoFilter::from_target(target)
                .with_context(|| format!("Invalid filter for target {:?}", target.name))?;
        }

        Ok(())
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.backup_directory = shellexpand::full(&self.backup_directory)
            .context("Failed to expand backup_directory path")?
            .into_owned();

        Ok(())
    }

    /// Where the mirror of one repository lives on disk
    pub fn mirror_path(&self, target_name: &str, repo_name: &str) -> PathBuf {
        PathBuf::from(&self.backup_directory)
            .join(target_name)
            .join(repo_name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_directory: "${HOME}/backups/git".to_string(),
            sync: SyncConfig::default(),
            targets: Vec::new(),
        }
    }
}
