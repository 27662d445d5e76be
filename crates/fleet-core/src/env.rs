//! Environment-variable configuration formats.
//!
//! Older deployments drive runs entirely from the environment:
//!
//! ```text
//! CLUSTERS='[{"tag_key":"Env","tag_value":"prod","services":{"worker":5}}]'
//! CLUSTERS='[{"name":"legacy","services":{"billing":2}}]'
//! CLUSTER_1=legacy  SERVICES_CLUSTER_1='["billing"]'  DESIRED_COUNTS_CLUSTER_1='{"billing":2}'
//! PIPELINES='["Pipeline1","Pipeline2"]'
//!
//! STOP_TAGS='[{"key":"Env","value":"dev"}]'
//! STOP_CLUSTER_1=legacy  STOP_SERVICES_1='["billing"]'
//! ```
//!
//! The stop loader also accepts `CLUSTERS`, scaling every entry to zero.
//!
//! Both loaders take a lookup function so tests don't touch the process
//! environment; pass `|k| std::env::var(k).ok()` in production.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{GroupConfig, NamedTarget, RunConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::policy::DesiredStateMap;
use crate::predicate::TagPredicate;
use crate::types::Tag;

/// Count applied to unmapped services by the start formats.
pub const LEGACY_START_DEFAULT: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClusterEntry {
    Tagged {
        tag_key: String,
        tag_value: String,
        #[serde(default)]
        services: DesiredStateMap,
    },
    Named {
        name: String,
        services: DesiredStateMap,
    },
}

/// Build a start run from `CLUSTERS`, `CLUSTER_{i}` and `PIPELINES`.
pub fn start_from_env<F>(lookup: F) -> ConfigResult<RunConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RunConfig::default();

    let entries: Vec<ClusterEntry> = parse_var(&lookup, "CLUSTERS")?.unwrap_or_default();
    for entry in entries {
        match entry {
            ClusterEntry::Tagged {
                tag_key,
                tag_value,
                services,
            } => {
                let name = format!("{tag_key}={tag_value}");
                config.groups.push(
                    GroupConfig::new(
                        name,
                        TagPredicate::all_of(tag_key, tag_value),
                        LEGACY_START_DEFAULT,
                    )
                    .with_desired(services),
                );
            }
            ClusterEntry::Named { name, services } => {
                config.targets.push(NamedTarget {
                    cluster: name,
                    services: sorted_names(&services),
                    desired: services,
                    default_count: LEGACY_START_DEFAULT,
                });
            }
        }
    }

    for i in 1.. {
        let Some(cluster) = non_empty(&lookup, &format!("CLUSTER_{i}")) else {
            break;
        };
        let services: Vec<String> =
            parse_var(&lookup, &format!("SERVICES_CLUSTER_{i}"))?.unwrap_or_default();
        let desired: DesiredStateMap =
            parse_var(&lookup, &format!("DESIRED_COUNTS_CLUSTER_{i}"))?.unwrap_or_default();
        config.targets.push(NamedTarget {
            cluster,
            services,
            desired,
            default_count: LEGACY_START_DEFAULT,
        });
    }

    config.pipelines = parse_var(&lookup, "PIPELINES")?.unwrap_or_default();
    config.validate()?;
    Ok(config)
}

/// Build a stop run from `CLUSTERS`, `STOP_TAGS` and `STOP_CLUSTER_{i}`.
///
/// All `STOP_TAGS` pairs form a single any-of group scaled to zero.
/// `CLUSTERS` entries are read in the start format but every count is
/// forced to zero.
pub fn stop_from_env<F>(lookup: F) -> ConfigResult<RunConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RunConfig::default();

    let entries: Vec<ClusterEntry> = parse_var(&lookup, "CLUSTERS")?.unwrap_or_default();
    for entry in entries {
        match entry {
            ClusterEntry::Tagged {
                tag_key, tag_value, ..
            } => {
                let name = format!("{tag_key}={tag_value}");
                config
                    .groups
                    .push(GroupConfig::stop(name, TagPredicate::all_of(tag_key, tag_value)));
            }
            ClusterEntry::Named { name, services } => {
                config.targets.push(NamedTarget {
                    cluster: name,
                    services: sorted_names(&services),
                    desired: DesiredStateMap::new(),
                    default_count: 0,
                });
            }
        }
    }

    let tags: Vec<Tag> = parse_var(&lookup, "STOP_TAGS")?.unwrap_or_default();
    if !tags.is_empty() {
        let name = tags
            .iter()
            .map(|t| format!("{}={}", t.key, t.value))
            .collect::<Vec<_>>()
            .join("|");
        config
            .groups
            .push(GroupConfig::stop(name, TagPredicate::any_of(tags)));
    }

    for i in 1.. {
        let Some(cluster) = non_empty(&lookup, &format!("STOP_CLUSTER_{i}")) else {
            break;
        };
        let services: Vec<String> =
            parse_var(&lookup, &format!("STOP_SERVICES_{i}"))?.unwrap_or_default();
        config.targets.push(NamedTarget {
            cluster,
            services,
            desired: DesiredStateMap::new(),
            default_count: 0,
        });
    }

    config.validate()?;
    Ok(config)
}

fn sorted_names(services: &DesiredStateMap) -> Vec<String> {
    let mut names: Vec<String> = services.keys().cloned().collect();
    names.sort();
    names
}

fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|v| !v.trim().is_empty())
}

fn parse_var<F, T>(lookup: &F, var: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: DeserializeOwned,
{
    match non_empty(lookup, var) {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| ConfigError::Env {
                var: var.to_string(),
                source,
            }),
        None => Ok(None),
    }
}
