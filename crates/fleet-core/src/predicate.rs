//! Declarative tag match rules.

use serde::{Deserialize, Serialize};

use crate::types::{Tag, TagSet};

/// A match rule evaluated against a resource's tag set.
///
/// Serialized externally tagged, so a TOML config reads
/// `predicate = { all_of = { key = "Env", value = "prod" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagPredicate {
    /// The resource must carry exactly this pair.
    AllOf { key: String, value: String },
    /// The resource must carry at least one of these pairs.
    AnyOf { pairs: Vec<Tag> },
}

impl TagPredicate {
    pub fn all_of(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AllOf {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn any_of(pairs: impl IntoIterator<Item = Tag>) -> Self {
        Self::AnyOf {
            pairs: pairs.into_iter().collect(),
        }
    }

    pub fn matches(&self, tags: &TagSet) -> bool {
        matches(tags, self)
    }
}

/// Evaluate `predicate` against `tags`. Total: a missing key is a non-match,
/// and an empty `AnyOf` matches nothing.
pub fn matches(tags: &TagSet, predicate: &TagPredicate) -> bool {
    match predicate {
        TagPredicate::AllOf { key, value } => tags.get(key) == Some(value.as_str()),
        TagPredicate::AnyOf { pairs } => pairs
            .iter()
            .any(|pair| tags.get(&pair.key) == Some(pair.value.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn all_of_requires_exact_value() {
        let p = TagPredicate::all_of("Env", "prod");
        assert!(p.matches(&tags(&[("Env", "prod"), ("team", "core")])));
        assert!(!p.matches(&tags(&[("Env", "dev")])));
        assert!(!p.matches(&tags(&[("env", "prod")])));
    }

    #[test]
    fn all_of_is_false_without_key() {
        let p = TagPredicate::all_of("Env", "prod");
        assert!(!p.matches(&TagSet::new()));
        assert!(!p.matches(&tags(&[("team", "prod")])));
    }

    #[test]
    fn any_of_matches_one_pair() {
        let p = TagPredicate::any_of([Tag::new("Env", "dev"), Tag::new("Env", "qa")]);
        assert!(p.matches(&tags(&[("Env", "qa")])));
        assert!(!p.matches(&tags(&[("Env", "prod")])));
    }

    #[test]
    fn any_of_pairs_can_use_different_keys() {
        let p = TagPredicate::any_of([Tag::new("Env", "dev"), Tag::new("stop", "nightly")]);
        assert!(p.matches(&tags(&[("Env", "prod"), ("stop", "nightly")])));
    }

    #[test]
    fn empty_any_of_matches_nothing() {
        let p = TagPredicate::any_of([]);
        assert!(!p.matches(&TagSet::new()));
        assert!(!p.matches(&tags(&[("Env", "prod")])));
    }

    #[test]
    fn deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            predicate: TagPredicate,
        }
        let w: Wrapper = toml::from_str(
            r#"predicate = { any_of = { pairs = [{ key = "Env", value = "dev" }] } }"#,
        )
        .unwrap();
        assert_eq!(w.predicate, TagPredicate::any_of([Tag::new("Env", "dev")]));
    }
}
