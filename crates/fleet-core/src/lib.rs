//! fleet-core: domain types, tag predicates, desired-state policy and
//! run configuration for FleetSwitch.

pub mod config;
pub mod env;
pub mod error;
pub mod policy;
pub mod predicate;
pub mod types;

pub use config::{GroupConfig, NamedTarget, RateLimitConfig, RunConfig};
pub use error::{ConfigError, ConfigResult};
pub use policy::{DesiredStateMap, SelectBy, resolve_by_name, resolve_desired_count};
pub use predicate::{TagPredicate, matches};
pub use types::*;
