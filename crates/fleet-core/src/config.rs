//! Run configuration parser (`fleet.toml` / `fleet.json`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::policy::{DesiredStateMap, SelectBy};
use crate::predicate::TagPredicate;

/// Reference ceiling for the ECS UpdateService API.
pub const DEFAULT_CALLS_PER_SECOND: u32 = 20;

/// Everything one run applies, in order: tag groups, named targets, pipelines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default, rename = "group", alias = "groups")]
    pub groups: Vec<GroupConfig>,
    #[serde(default, rename = "target", alias = "targets")]
    pub targets: Vec<NamedTarget>,
    #[serde(default)]
    pub pipelines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum mutation calls per second across the whole run.
    #[serde(default = "default_calls_per_second")]
    pub calls_per_second: u32,
}

const fn default_calls_per_second() -> u32 {
    DEFAULT_CALLS_PER_SECOND
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_second: default_calls_per_second(),
        }
    }
}

impl RateLimitConfig {
    /// Minimum spacing between two consecutive call starts.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(1) / self.calls_per_second.max(1)
    }
}

/// A tag predicate plus the policy applied to every service it discovers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Label used in logs and the run report.
    #[serde(default)]
    pub name: String,
    pub predicate: TagPredicate,
    #[serde(default)]
    pub desired: DesiredStateMap,
    pub default_count: u32,
    #[serde(default)]
    pub select_by: SelectBy,
}

impl GroupConfig {
    pub fn new(name: impl Into<String>, predicate: TagPredicate, default_count: u32) -> Self {
        Self {
            name: name.into(),
            predicate,
            desired: DesiredStateMap::new(),
            default_count,
            select_by: SelectBy::TagValue,
        }
    }

    /// A group that scales every matching service to zero.
    pub fn stop(name: impl Into<String>, predicate: TagPredicate) -> Self {
        Self::new(name, predicate, 0)
    }

    pub fn with_desired(mut self, desired: DesiredStateMap) -> Self {
        self.desired = desired;
        self
    }

    pub fn with_select_by(mut self, select_by: SelectBy) -> Self {
        self.select_by = select_by;
        self
    }

    /// Whether resolving a count requires the service's tags.
    pub fn needs_service_tags(&self) -> bool {
        self.select_by == SelectBy::TagValue && !self.desired.is_empty()
    }
}

/// Literal service names in one cluster; no discovery or tag lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTarget {
    pub cluster: String,
    pub services: Vec<String>,
    #[serde(default)]
    pub desired: DesiredStateMap,
    pub default_count: u32,
}

impl RunConfig {
    /// Load a config file, picking the parser from the extension.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.rate_limit.calls_per_second == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.calls_per_second must be greater than zero".to_string(),
            ));
        }
        if let Some(t) = self.targets.iter().find(|t| t.cluster.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "target with services {:?} has an empty cluster name",
                t.services
            )));
        }
        if self.pipelines.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid("empty pipeline name".to_string()));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.targets.is_empty() && self.pipelines.is_empty()
    }
}
