//! Domain types shared by discovery, policy resolution and mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single key/value label attached to a cloud resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The tags carried by one resource.
///
/// Keys are unique. Iteration follows the order the control plane returned
/// the tags in; a repeated key overwrites the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing the value of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.tags.iter_mut().find(|t| t.key == key) {
            Some(existing) => existing.value = value,
            None => self.tags.push(Tag { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Tag values in resolver order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag.key, tag.value);
        }
        set
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Opaque cluster identifier (usually an ARN).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterRef(String);

impl ClusterRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClusterRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClusterRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A service discovered inside a cluster during the current pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRef {
    pub cluster: ClusterRef,
    /// Full identifier as returned by the listing call.
    pub id: String,
    /// Last path segment of `id`.
    pub display_name: String,
}

impl ServiceRef {
    pub fn new(cluster: ClusterRef, id: impl Into<String>) -> Self {
        let id = id.into();
        let display_name = display_name(&id).to_string();
        Self {
            cluster,
            id,
            display_name,
        }
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.cluster)
    }
}

/// Substring after the final `/`, or the whole identifier.
pub fn display_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_takes_last_segment() {
        assert_eq!(
            display_name("arn:aws:ecs:eu-west-1:123:service/prod/api"),
            "api"
        );
        assert_eq!(display_name("worker"), "worker");
        assert_eq!(display_name("trailing/"), "");
    }

    #[test]
    fn service_ref_derives_display_name() {
        let svc = ServiceRef::new(ClusterRef::new("prod"), "arn:svc/prod/worker");
        assert_eq!(svc.display_name, "worker");
        assert_eq!(svc.to_string(), "worker (prod)");
    }

    #[test]
    fn tag_set_keeps_order_and_unique_keys() {
        let tags: TagSet = [("role", "api"), ("Env", "prod"), ("role", "worker")]
            .into_iter()
            .collect();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("role"), Some("worker"));
        assert_eq!(tags.values().collect::<Vec<_>>(), vec!["worker", "prod"]);
    }

    #[test]
    fn cluster_ref_serializes_as_plain_string() {
        let json = serde_json::to_string(&ClusterRef::new("c1")).unwrap();
        assert_eq!(json, "\"c1\"");
    }
}
