//! Zone query interface
//!
//! The region engine is owned by the host. Handlers see it only through
//! [`ZoneQuery`] (which zones apply at a location) and [`RegionSet`] (what a
//! flag resolves to inside those zones).

mod layout;

pub use layout::{ResolvedRegions, ZoneDefinition, ZoneLayout};

use std::sync::{Arc, LazyLock};

use dashmap::DashSet;

use crate::flags::{Flag, FlagType, FlagValue};
use crate::host::{EntityId, Location};

/// Tri-state policy result for state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    Allow,
    Deny,
    Force,
}

/// The zones that apply at one location, with flag resolution already
/// ordered by the host's priority rules.
pub trait RegionSet: Send + Sync {
    /// Effective raw value of `flag` for `entity`, if any zone defines it
    fn query_raw(&self, entity: EntityId, flag: &str) -> Option<FlagValue>;

    fn query_state(&self, entity: EntityId, flag: &str) -> Option<FlagState> {
        match self.query_raw(entity, flag)? {
            FlagValue::Bool(true) => Some(FlagState::Allow),
            FlagValue::Bool(false) => Some(FlagState::Deny),
            FlagValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "allow" => Some(FlagState::Allow),
                "deny" => Some(FlagState::Deny),
                "force" => Some(FlagState::Force),
                _ => None,
            },
            _ => None,
        }
    }

    /// Ids of the applicable zones, highest priority first
    fn region_ids(&self) -> Vec<String>;
}

pub trait ZoneQuery: Send + Sync {
    fn applicable_regions(&self, location: &Location) -> Arc<dyn RegionSet>;
}

/// Resolve `flag` to its typed value.
///
/// A value that does not convert is a configuration error: it is treated as
/// absent, and logged at warn level the first time that value is seen.
pub fn query_value<T: FlagType>(set: &dyn RegionSet, entity: EntityId, flag: &Flag<T>) -> Option<T> {
    let raw = set.query_raw(entity, flag.name())?;
    match T::from_raw(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            if first_report(flag.name(), &raw) {
                tracing::warn!(flag = flag.name(), %entity, error = %e, "Ignoring unparsable flag value");
            } else {
                tracing::debug!(flag = flag.name(), %entity, error = %e, "Ignoring unparsable flag value");
            }
            None
        }
    }
}

/// Malformed (flag, value) pairs already warned about
static REPORTED: LazyLock<DashSet<(String, String)>> = LazyLock::new(DashSet::new);

fn first_report(flag: &str, raw: &FlagValue) -> bool {
    REPORTED.insert((flag.to_string(), format!("{raw:?}")))
}

/// Region set outside every zone
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegionSet;

impl RegionSet for EmptyRegionSet {
    fn query_raw(&self, _entity: EntityId, _flag: &str) -> Option<FlagValue> {
        None
    }

    fn region_ids(&self) -> Vec<String> {
        Vec::new()
    }
}
