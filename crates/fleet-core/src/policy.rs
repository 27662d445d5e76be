//! Desired-state policy: maps a discovered service to a target task count.
//!
//! Each tag value on the service is looked up in the caller's
//! [`DesiredStateMap`], in the order the tag resolver returned them. When
//! several values have entries the last one examined wins. Tag order is not
//! guaranteed stable across calls, so a service carrying two mapped values
//! with different counts may land on either; that case is logged rather than
//! masked.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::ServiceRef;

/// Selector (tag value or service name) → desired task count.
pub type DesiredStateMap = HashMap<String, u32>;

/// What a group's policy map is keyed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectBy {
    /// Values of the service's tags.
    #[default]
    TagValue,
    /// The service's display name.
    ServiceName,
}

/// Resolve the desired count for `service` from its tag values.
pub fn resolve_desired_count<'a>(
    service: &ServiceRef,
    tag_values: impl IntoIterator<Item = &'a str>,
    policy_map: &DesiredStateMap,
    default_count: u32,
) -> u32 {
    let mut resolved: Option<(&str, u32)> = None;

    for value in tag_values {
        let Some(&count) = policy_map.get(value) else {
            continue;
        };
        if let Some((prev_value, prev_count)) = resolved
            && prev_count != count
        {
            debug!(
                service = %service.display_name,
                cluster = %service.cluster,
                first = prev_value,
                first_count = prev_count,
                last = value,
                last_count = count,
                "conflicting policy entries, last tag value wins"
            );
        }
        resolved = Some((value, count));
    }

    resolved.map_or(default_count, |(_, count)| count)
}

/// Resolve the desired count for `service` by its display name.
pub fn resolve_by_name(service: &ServiceRef, policy_map: &DesiredStateMap, default_count: u32) -> u32 {
    policy_map
        .get(&service.display_name)
        .copied()
        .unwrap_or(default_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClusterRef;

    fn svc(name: &str) -> ServiceRef {
        ServiceRef::new(ClusterRef::new("c"), format!("arn:service/c/{name}"))
    }

    fn policy() -> DesiredStateMap {
        HashMap::from([("worker".to_string(), 5), ("api".to_string(), 2)])
    }

    #[test]
    fn unmapped_values_fall_back_to_default() {
        let n = resolve_desired_count(&svc("a"), ["cache", "prod"], &policy(), 1);
        assert_eq!(n, 1);
    }

    #[test]
    fn single_mapped_value_wins() {
        let n = resolve_desired_count(&svc("a"), ["prod", "worker"], &policy(), 1);
        assert_eq!(n, 5);
    }

    #[test]
    fn no_tags_yields_default() {
        let n = resolve_desired_count(&svc("a"), [], &policy(), 3);
        assert_eq!(n, 3);
    }

    #[test]
    fn last_mapped_value_wins_on_conflict() {
        assert_eq!(resolve_desired_count(&svc("a"), ["worker", "api"], &policy(), 1), 2);
        assert_eq!(resolve_desired_count(&svc("a"), ["api", "worker"], &policy(), 1), 5);
    }

    #[test]
    fn zero_is_a_valid_mapped_count() {
        let map = HashMap::from([("batch".to_string(), 0)]);
        assert_eq!(resolve_desired_count(&svc("a"), ["batch"], &map, 4), 0);
    }

    #[test]
    fn by_name_uses_display_name() {
        let map = HashMap::from([("worker".to_string(), 7)]);
        assert_eq!(resolve_by_name(&svc("worker"), &map, 1), 7);
        assert_eq!(resolve_by_name(&svc("api"), &map, 1), 1);
    }
}
