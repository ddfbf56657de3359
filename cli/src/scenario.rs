//! Scenario files
//!
//! A scenario is one TOML document: the zones, the entities standing in
//! them, placeholder values, and a script of steps to replay.
//!
//! ```toml
//! [[zone]]
//! id = "arena"
//! world = "world"
//! min = [0, 0, 0]
//! max = [10, 255, 10]
//! flags = { entry-min-level = "5 XP", walk-speed = 0.5 }
//!
//! [[entity]]
//! id = 1
//! level = 3
//! at = [50, 64, 50]
//!
//! [[step]]
//! action = "move"
//! entity = 1
//! to = [5, 64, 5]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use regionflags_core::flags::{self, ALL_FLAG_NAMES, FlagParseError};
use regionflags_core::host::{CrossingKind, EntityId, StatusEffect};
use regionflags_core::zones::ZoneDefinition;
use regionflags_types::EngineConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse error in {origin}: {source}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },
    #[error("zone '{zone}' flag '{flag}': {source}")]
    InvalidFlag {
        zone: String,
        flag: String,
        source: FlagParseError,
    },
    #[error("entity {0} is declared more than once")]
    DuplicateEntity(EntityId),
    #[error("step {step} refers to undeclared entity {entity}")]
    UnknownEntity { step: usize, entity: EntityId },
}

fn default_world() -> String {
    "world".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// World used wherever a position does not name one
    #[serde(default = "default_world")]
    pub world: String,

    /// Inline engine config; a config file given on the command line wins
    #[serde(default)]
    pub config: Option<EngineConfig>,

    #[serde(default, rename = "zone")]
    pub zones: Vec<ZoneDefinition>,

    #[serde(default, rename = "entity")]
    pub entities: Vec<EntitySpec>,

    #[serde(default, rename = "placeholder")]
    pub placeholders: Vec<PlaceholderSpec>,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitySpec {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub world: Option<String>,
    pub at: [f64; 3],
    #[serde(default)]
    pub bypass: bool,
    #[serde(default)]
    pub walk_speed: Option<f32>,
    #[serde(default)]
    pub fly_speed: Option<f32>,
    #[serde(default, rename = "effect")]
    pub effects: Vec<StatusEffect>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceholderSpec {
    pub entity: EntityId,
    pub descriptor: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Move {
        entity: EntityId,
        to: [f64; 3],
        #[serde(default)]
        world: Option<String>,
        #[serde(default)]
        kind: CrossingKind,
    },
    /// Re-evaluate one entity, or every tracked entity when none is named
    Tick {
        #[serde(default)]
        entity: Option<EntityId>,
    },
    Advance {
        ticks: u64,
    },
    SetLevel {
        entity: EntityId,
        level: i32,
    },
    AddEffect {
        entity: EntityId,
        effect: StatusEffect,
    },
    SetBypass {
        entity: EntityId,
        bypass: bool,
    },
    SetOnline {
        entity: EntityId,
        online: bool,
    },
    SetPlaceholder {
        entity: EntityId,
        descriptor: String,
        value: String,
    },
    Detach {
        entity: EntityId,
    },
}

impl Step {
    fn entity(&self) -> Option<EntityId> {
        match self {
            Self::Move { entity, .. }
            | Self::SetLevel { entity, .. }
            | Self::AddEffect { entity, .. }
            | Self::SetBypass { entity, .. }
            | Self::SetOnline { entity, .. }
            | Self::SetPlaceholder { entity, .. }
            | Self::Detach { entity } => Some(*entity),
            Self::Tick { entity } => *entity,
            Self::Advance { .. } => None,
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    /// Parse and validate scenario text. `origin` names the source in errors.
    pub fn parse(text: &str, origin: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(text).map_err(|e| ScenarioError::Parse {
            origin: origin.to_string(),
            source: e,
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Strict flag validation plus entity references. Unknown flag names are
    /// only reported, the host may carry flags this engine does not handle.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for zone in &self.zones {
            for (name, raw) in &zone.flags {
                if !ALL_FLAG_NAMES.contains(&name.as_str()) {
                    tracing::warn!(zone = %zone.id, flag = %name, "Unknown flag, ignoring");
                    continue;
                }
                flags::validate(name, raw).map_err(|e| ScenarioError::InvalidFlag {
                    zone: zone.id.clone(),
                    flag: name.clone(),
                    source: e,
                })?;
            }
        }

        let mut declared = HashSet::new();
        for entity in &self.entities {
            if !declared.insert(entity.id) {
                return Err(ScenarioError::DuplicateEntity(entity.id));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(entity) = step.entity()
                && !declared.contains(&entity)
            {
                return Err(ScenarioError::UnknownEntity {
                    step: index + 1,
                    entity,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
[[zone]]
id = "arena"
world = "world"
min = [0, 0, 0]
max = [10, 255, 10]
flags = { entry-min-level = "5 XP", walk-speed = 0.5, blocked-effects = ["speed"] }

[[entity]]
id = 1
level = 3
at = [50, 64, 50]

[[entity.effect]]
kind = "minecraft:speed"
duration_ticks = 200

[[step]]
action = "move"
entity = 1
to = [5, 64, 5]

[[step]]
action = "move"
entity = 1
to = [5, 64, 5]
kind = "teleport"

[[step]]
action = "advance"
ticks = 20

[[step]]
action = "tick"
"#;

    #[test]
    fn test_parse_basic_scenario() {
        let scenario = Scenario::parse(BASIC, "basic").unwrap();

        assert_eq!(scenario.world, "world");
        assert_eq!(scenario.zones.len(), 1);
        assert_eq!(scenario.zones[0].flags.len(), 3);
        assert_eq!(scenario.entities[0].effects[0].kind.as_str(), "speed");
        assert_eq!(scenario.entities[0].effects[0].amplifier, 0);
        assert_eq!(scenario.steps.len(), 4);
        assert_eq!(
            scenario.steps[1],
            Step::Move {
                entity: EntityId(1),
                to: [5.0, 64.0, 5.0],
                world: None,
                kind: CrossingKind::Teleport,
            }
        );
        assert_eq!(scenario.steps[3], Step::Tick { entity: None });
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let text = r#"
[[zone]]
id = "arena"
world = "world"
min = [0, 0, 0]
max = [10, 10, 10]
flags = { entry-min-level = "five XP" }
"#;
        let err = Scenario::parse(text, "bad").unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::InvalidFlag { ref zone, ref flag, .. } if zone == "arena" && flag == "entry-min-level"
        ));
    }

    #[test]
    fn test_unknown_flag_is_tolerated() {
        let text = r#"
[[zone]]
id = "arena"
world = "world"
min = [0, 0, 0]
max = [10, 10, 10]
flags = { greeting = "hello" }
"#;
        assert!(Scenario::parse(text, "unknown").is_ok());
    }

    #[test]
    fn test_step_for_undeclared_entity() {
        let text = r#"
[[step]]
action = "set_level"
entity = 7
level = 3
"#;
        let err = Scenario::parse(text, "steps").unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::UnknownEntity { step: 1, entity: EntityId(7) }
        ));
        assert_eq!(err.to_string(), "step 1 refers to undeclared entity #7");
    }

    #[test]
    fn test_duplicate_entity() {
        let text = r#"
[[entity]]
id = 1
at = [0, 0, 0]

[[entity]]
id = 1
at = [1, 0, 0]
"#;
        assert!(matches!(
            Scenario::parse(text, "dup"),
            Err(ScenarioError::DuplicateEntity(EntityId(1)))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let err = Scenario::parse("[[zone]\n", "broken").unwrap_err();
        assert!(err.to_string().starts_with("Parse error in broken"));
    }

    #[test]
    fn test_bundled_scenarios_parse() {
        for (name, text) in [
            ("level_gate", include_str!("../scenarios/level_gate.toml")),
            ("ambience", include_str!("../scenarios/ambience.toml")),
        ] {
            let scenario = Scenario::parse(text, name).unwrap();
            assert!(!scenario.steps.is_empty(), "{name}");
        }
    }
}
