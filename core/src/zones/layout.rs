//! In-memory zone layout for the replay tool and the test suites.
//!
//! Zones are axis-aligned boxes. Where several zones overlap, the highest
//! priority zone that defines a flag wins; equal priorities fall back to
//! declaration order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{RegionSet, ZoneQuery};
use crate::flags::FlagValue;
use crate::host::{EntityId, Location};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub id: String,
    pub world: String,
    pub min: [f64; 3],
    pub max: [f64; 3],
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
}

impl ZoneDefinition {
    pub fn new(id: impl Into<String>, world: impl Into<String>, min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            id: id.into(),
            world: world.into(),
            min,
            max,
            priority: 0,
            flags: BTreeMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_flag(mut self, name: &str, value: FlagValue) -> Self {
        self.flags.insert(name.to_string(), value);
        self
    }

    /// Inclusive on every face; corners may be given in any order
    pub fn contains(&self, location: &Location) -> bool {
        if self.world != location.world {
            return false;
        }
        [location.x, location.y, location.z]
            .iter()
            .zip(self.min.iter().zip(self.max.iter()))
            .all(|(v, (a, b))| *v >= a.min(*b) && *v <= a.max(*b))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneLayout {
    #[serde(default, rename = "zone")]
    pub zones: Vec<ZoneDefinition>,
}

impl ZoneLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, zone: ZoneDefinition) -> Self {
        self.zones.push(zone);
        self
    }

    pub fn zone_mut(&mut self, id: &str) -> Option<&mut ZoneDefinition> {
        self.zones.iter_mut().find(|z| z.id == id)
    }

    /// Zones containing `location`, highest priority first
    pub fn resolve(&self, location: &Location) -> ResolvedRegions {
        let mut regions: Vec<ZoneDefinition> = self
            .zones
            .iter()
            .filter(|zone| zone.contains(location))
            .cloned()
            .collect();
        // Stable sort keeps declaration order among equal priorities
        regions.sort_by(|a, b| b.priority.cmp(&a.priority));
        ResolvedRegions { regions }
    }
}

impl ZoneQuery for ZoneLayout {
    fn applicable_regions(&self, location: &Location) -> Arc<dyn RegionSet> {
        Arc::new(self.resolve(location))
    }
}

/// Snapshot of the zones at one location
#[derive(Debug, Clone, Default)]
pub struct ResolvedRegions {
    regions: Vec<ZoneDefinition>,
}

impl RegionSet for ResolvedRegions {
    fn query_raw(&self, _entity: EntityId, flag: &str) -> Option<FlagValue> {
        self.regions
            .iter()
            .find_map(|zone| zone.flags.get(flag))
            .cloned()
    }

    fn region_ids(&self) -> Vec<String> {
        self.regions.iter().map(|zone| zone.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ZoneLayout {
        ZoneLayout::new()
            .with_zone(
                ZoneDefinition::new("town", "world", [0.0, 0.0, 0.0], [100.0, 255.0, 100.0])
                    .with_flag("walk-speed", FlagValue::Number(0.3))
                    .with_flag("disable-collision", FlagValue::Bool(true)),
            )
            .with_zone(
                ZoneDefinition::new("plaza", "world", [40.0, 0.0, 40.0], [60.0, 255.0, 60.0])
                    .with_priority(10)
                    .with_flag("walk-speed", FlagValue::Number(0.1)),
            )
    }

    #[test]
    fn test_highest_priority_wins() {
        let set = layout().resolve(&Location::new("world", 50.0, 64.0, 50.0));
        assert_eq!(set.region_ids(), vec!["plaza", "town"]);
        assert_eq!(
            set.query_raw(EntityId(1), "walk-speed"),
            Some(FlagValue::Number(0.1))
        );
        // Falls through to the lower priority zone
        assert_eq!(
            set.query_raw(EntityId(1), "disable-collision"),
            Some(FlagValue::Bool(true))
        );
    }

    #[test]
    fn test_outside_and_other_world() {
        let layout = layout();
        assert!(layout.resolve(&Location::new("world", 500.0, 64.0, 0.0)).region_ids().is_empty());
        assert!(layout.resolve(&Location::new("nether", 50.0, 64.0, 50.0)).region_ids().is_empty());
    }

    #[test]
    fn test_corners_in_any_order() {
        let zone = ZoneDefinition::new("z", "world", [10.0, 10.0, 10.0], [0.0, 0.0, 0.0]);
        assert!(zone.contains(&Location::new("world", 5.0, 5.0, 5.0)));
        assert!(zone.contains(&Location::new("world", 10.0, 0.0, 10.0)));
    }

    #[test]
    fn test_layout_from_toml() {
        let layout: ZoneLayout = toml::from_str(
            r#"
[[zone]]
id = "arena"
world = "world"
min = [0, 0, 0]
max = [10, 10, 10]
priority = 5

[zone.flags]
entry-min-level = "5 XP"
blocked-effects = ["speed", "jump_boost"]
"#,
        )
        .unwrap();
        assert_eq!(layout.zones.len(), 1);
        assert_eq!(layout.zones[0].priority, 5);
        assert_eq!(
            layout.zones[0].flags.get("entry-min-level"),
            Some(&FlagValue::Text("5 XP".into()))
        );
    }
}
