//! Turn command-line arguments into a [`RunConfig`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, bail};
use tracing::debug;

use fleet_core::env::{start_from_env, stop_from_env};
use fleet_core::{
    DesiredStateMap, GroupConfig, NamedTarget, RunConfig, SelectBy, Tag, TagPredicate,
};

/// Parse `KEY=VALUE`. The value may itself contain `=`.
pub fn parse_tag(s: &str) -> Result<Tag, String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(Tag::new(key, value)),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

/// Parse `SELECTOR=COUNT` for a desired-state entry.
pub fn parse_desired(s: &str) -> Result<(String, u32), String> {
    let (selector, count) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected SELECTOR=COUNT, got `{s}`"))?;
    if selector.is_empty() {
        return Err(format!("empty selector in `{s}`"));
    }
    let count = count
        .parse()
        .map_err(|_| format!("`{count}` is not a non-negative task count"))?;
    Ok((selector.to_string(), count))
}

pub fn from_file(path: &Path) -> anyhow::Result<RunConfig> {
    RunConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

/// A single start group: clusters tagged `tag`, counts from `desired`.
pub fn start(
    tag: Tag,
    desired: Vec<(String, u32)>,
    default_count: u32,
    by_name: bool,
) -> RunConfig {
    let name = format!("{}={}", tag.key, tag.value);
    let select_by = if by_name {
        SelectBy::ServiceName
    } else {
        SelectBy::TagValue
    };
    let group = GroupConfig::new(name, TagPredicate::all_of(tag.key, tag.value), default_count)
        .with_desired(desired.into_iter().collect())
        .with_select_by(select_by);

    RunConfig {
        groups: vec![group],
        ..Default::default()
    }
}

/// Scale to zero every service in clusters carrying any of `tags`.
pub fn stop(tags: Vec<Tag>) -> anyhow::Result<RunConfig> {
    if tags.is_empty() {
        bail!("stop needs at least one --tag");
    }
    let name = tags
        .iter()
        .map(|t| format!("{}={}", t.key, t.value))
        .collect::<Vec<_>>()
        .join("|");
    Ok(RunConfig {
        groups: vec![GroupConfig::stop(name, TagPredicate::any_of(tags))],
        ..Default::default()
    })
}

/// Address services by literal name in one cluster.
pub fn services(
    cluster: String,
    services: Vec<String>,
    desired: DesiredStateMap,
    default_count: u32,
) -> RunConfig {
    RunConfig {
        targets: vec![NamedTarget {
            cluster,
            services,
            desired,
            default_count,
        }],
        ..Default::default()
    }
}

pub fn pipelines(names: Vec<String>) -> RunConfig {
    RunConfig {
        pipelines: names,
        ..Default::default()
    }
}

/// Read a legacy run from the process environment, falling back to
/// `dotenv_path` for variables the environment does not set.
pub fn from_env(start: bool, dotenv_path: &Path) -> anyhow::Result<RunConfig> {
    let file = read_dotenv(dotenv_path)?;
    let lookup = |k: &str| std::env::var(k).ok().or_else(|| file.get(k).cloned());
    let config = if start {
        start_from_env(lookup)
    } else {
        stop_from_env(lookup)
    };
    config.context("reading run configuration from the environment")
}

/// Variables from a `.env` file; a missing file is empty.
fn read_dotenv(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    match dotenvy::from_path_iter(path) {
        Ok(entries) => {
            let vars = entries
                .collect::<Result<HashMap<_, _>, _>>()
                .with_context(|| format!("parsing {}", path.display()))?;
            debug!(path = %path.display(), vars = vars.len(), "loaded env file");
            Ok(vars)
        }
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_splits_on_first_equals() {
        assert_eq!(parse_tag("Env=prod").unwrap(), Tag::new("Env", "prod"));
        assert_eq!(parse_tag("q=a=b").unwrap(), Tag::new("q", "a=b"));
        assert_eq!(parse_tag("Env=").unwrap(), Tag::new("Env", ""));
        assert!(parse_tag("Env").is_err());
        assert!(parse_tag("=prod").is_err());
    }

    #[test]
    fn desired_entry() {
        assert_eq!(parse_desired("worker=5").unwrap(), ("worker".to_string(), 5));
        assert!(parse_desired("worker=-1").is_err());
        assert!(parse_desired("worker").is_err());
        assert!(parse_desired("=3").is_err());
    }

    #[test]
    fn start_builds_one_all_of_group() {
        let config = start(
            Tag::new("Env", "prod"),
            vec![("worker".into(), 5)],
            1,
            false,
        );
        let group = &config.groups[0];
        assert_eq!(group.name, "Env=prod");
        assert_eq!(group.predicate, TagPredicate::all_of("Env", "prod"));
        assert_eq!(group.desired.get("worker"), Some(&5));
        assert_eq!(group.default_count, 1);
        assert_eq!(group.select_by, SelectBy::TagValue);
    }

    #[test]
    fn stop_is_any_of_with_zero_count() {
        let config = stop(vec![Tag::new("Env", "dev"), Tag::new("Env", "qa")]).unwrap();
        let group = &config.groups[0];
        assert_eq!(group.name, "Env=dev|Env=qa");
        assert_eq!(group.default_count, 0);
        assert!(group.desired.is_empty());
        assert!(matches!(group.predicate, TagPredicate::AnyOf { ref pairs } if pairs.len() == 2));
    }

    #[test]
    fn env_file_supplies_unset_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "CLUSTERS='[{\"name\":\"legacy\",\"services\":{\"billing\":2}}]'\n",
        )
        .unwrap();

        let config = from_env(false, &path).unwrap();
        assert_eq!(config.targets[0].cluster, "legacy");
        assert_eq!(config.targets[0].services, vec!["billing"]);
        assert_eq!(config.targets[0].default_count, 0);
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = from_env(true, &dir.path().join(".env")).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn stop_without_tags_is_rejected() {
        assert!(stop(Vec::new()).is_err());
    }
}
