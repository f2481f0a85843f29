use anyhow::{Context, Result};
use regex::Regex;

use crate::config::Target;

/// Decides which of a target's repositories get backed up.
///
/// A target may carry a `skip` pattern (matching names are excluded) or an
/// `only` pattern (only matching names are included). When both are set,
/// `skip` is consulted and `only` is ignored. Patterns are unanchored
/// regular expressions matched against the repository name.
#[derive(Debug, Clone)]
pub struct RepoFilter {
    skip: Option<Regex>,
    only: Option<Regex>,
}

impl RepoFilter {
    /// Compile the filter for one target.
    ///
    /// Both patterns are compiled even though `skip` wins at match time, so
    /// a broken `only` pattern surfaces during config validation instead of
    /// after a credential change removes the `skip`.
    pub fn from_target(target: &Target) -> Result<Self> {
        let skip = target
            .skip_pattern()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| {
                    format!("\"skip\" is not a valid regular expression: {:?}", pattern)
                })
            })
            .transpose()?;

        let only = target
            .only_pattern()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| {
                    format!("\"only\" is not a valid regular expression: {:?}", pattern)
                })
            })
            .transpose()?;

        Ok(Self { skip, only })
    }

    /// Whether a repository with this name should be backed up
    pub fn includes(&self, repo_name: &str) -> bool {
        if let Some(skip) = &self.skip {
            return !skip.is_match(repo_name);
        }
        if let Some(only) = &self.only {
            return only.is_match(repo_name);
        }
        true
    }
}
