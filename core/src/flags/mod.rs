//! Flag catalog and value parsing
//!
//! Zones store raw [`FlagValue`]s. Each handler reads its flag through a typed
//! [`Flag<T>`] key; the conversion from raw value to `T` lives in
//! [`FlagType::from_raw`]. Conversion failures are configuration errors: the
//! caller logs them and treats the flag as absent.

mod sound;
mod status;
mod threshold;

pub use sound::{SoundCategory, SoundDescriptor};
pub use status::{StatusEffectKind, parse_effect_set};
pub use threshold::{ThresholdRule, ThresholdSource, parse_lenient_int};

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Raw flag value as stored in zone configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FlagValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

/// Errors produced while turning flag text into typed values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagParseError {
    #[error("expected a {expected} value, got {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error(
        "Flag value cannot be empty. Format: <threshold> <source> where source is either 'XP' or a placeholder (e.g., 10 XP or 10 %battlepass_tier%)"
    )]
    EmptyThreshold,

    #[error(
        "Invalid format. Expected: <threshold> <source> where source is 'XP' or a placeholder (e.g., 10 XP or 10 %battlepass_tier%)"
    )]
    ThresholdArity,

    #[error("Threshold must be a valid integer. Got: '{0}'")]
    ThresholdNotInteger(String),

    #[error(
        "Source must be either 'XP' or a placeholder (e.g., %battlepass_tier%). Got: '{0}'"
    )]
    InvalidSource(String),

    #[error("invalid sound '{input}': {reason}")]
    InvalidSound { input: String, reason: String },

    #[error("unknown sound category '{0}'")]
    UnknownSoundCategory(String),

    #[error("invalid status effect name '{0}'")]
    InvalidStatusEffect(String),
}

/// A type a flag can resolve to
pub trait FlagType: Clone + PartialEq + Send + 'static {
    fn from_raw(raw: &FlagValue) -> Result<Self, FlagParseError>;
}

impl FlagType for bool {
    fn from_raw(raw: &FlagValue) -> Result<Self, FlagParseError> {
        match raw {
            FlagValue::Bool(value) => Ok(*value),
            FlagValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "allow" => Ok(true),
                "false" | "no" | "off" | "deny" => Ok(false),
                _ => Err(FlagParseError::WrongType {
                    expected: "boolean",
                    found: "text",
                }),
            },
            other => Err(FlagParseError::WrongType {
                expected: "boolean",
                found: other.type_name(),
            }),
        }
    }
}

impl FlagType for f64 {
    fn from_raw(raw: &FlagValue) -> Result<Self, FlagParseError> {
        match raw {
            FlagValue::Number(value) => Ok(*value),
            FlagValue::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| FlagParseError::NotANumber(text.clone())),
            other => Err(FlagParseError::WrongType {
                expected: "number",
                found: other.type_name(),
            }),
        }
    }
}

impl FlagType for String {
    fn from_raw(raw: &FlagValue) -> Result<Self, FlagParseError> {
        match raw {
            FlagValue::Text(text) => Ok(text.clone()),
            other => Err(FlagParseError::WrongType {
                expected: "text",
                found: other.type_name(),
            }),
        }
    }
}

impl FlagType for BTreeSet<StatusEffectKind> {
    fn from_raw(raw: &FlagValue) -> Result<Self, FlagParseError> {
        match raw {
            FlagValue::Text(text) => parse_effect_set(text),
            FlagValue::List(items) => items.iter().map(|s| StatusEffectKind::new(s)).collect(),
            other => Err(FlagParseError::WrongType {
                expected: "status effect list",
                found: other.type_name(),
            }),
        }
    }
}

impl FlagType for Vec<SoundDescriptor> {
    /// Parses every entry; the first descriptor wins when a sound is listed twice
    fn from_raw(raw: &FlagValue) -> Result<Self, FlagParseError> {
        let entries: Vec<&str> = match raw {
            FlagValue::Text(text) => text.split(',').collect(),
            FlagValue::List(items) => items.iter().map(String::as_str).collect(),
            other => {
                return Err(FlagParseError::WrongType {
                    expected: "sound list",
                    found: other.type_name(),
                });
            }
        };

        let mut sounds: Vec<SoundDescriptor> = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().filter(|e| !e.trim().is_empty()) {
            let sound: SoundDescriptor = entry.parse()?;
            if !sounds.iter().any(|s| s.identity() == sound.identity()) {
                sounds.push(sound);
            }
        }
        Ok(sounds)
    }
}

/// Typed key for a named flag
pub struct Flag<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Flag<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Flag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Flag<T> {}

impl<T> fmt::Debug for Flag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Flag").field(&self.name).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flag Catalog
// ─────────────────────────────────────────────────────────────────────────────

pub const WALK_SPEED: Flag<f64> = Flag::new("walk-speed");
pub const FLY_SPEED: Flag<f64> = Flag::new("fly-speed");
pub const BLOCKED_EFFECTS: Flag<BTreeSet<StatusEffectKind>> = Flag::new("blocked-effects");
pub const DISABLE_COLLISION: Flag<bool> = Flag::new("disable-collision");
pub const PLAY_SOUNDS: Flag<Vec<SoundDescriptor>> = Flag::new("play-sounds");
pub const ENTRY_MIN_LEVEL: Flag<String> = Flag::new("entry-min-level");
pub const ENTRY_MAX_LEVEL: Flag<String> = Flag::new("entry-max-level");

/// Names of every flag this crate reads
pub const ALL_FLAG_NAMES: &[&str] = &[
    WALK_SPEED.name(),
    FLY_SPEED.name(),
    BLOCKED_EFFECTS.name(),
    DISABLE_COLLISION.name(),
    PLAY_SOUNDS.name(),
    ENTRY_MIN_LEVEL.name(),
    ENTRY_MAX_LEVEL.name(),
];

/// Validate raw configuration for a known flag, with the strict rules used
/// when an operator sets a value (the runtime parse is more forgiving).
pub fn validate(name: &str, raw: &FlagValue) -> Result<(), FlagParseError> {
    match name {
        "walk-speed" | "fly-speed" => f64::from_raw(raw).map(drop),
        "blocked-effects" => BTreeSet::<StatusEffectKind>::from_raw(raw).map(drop),
        "disable-collision" => bool::from_raw(raw).map(drop),
        "play-sounds" => Vec::<SoundDescriptor>::from_raw(raw).map(drop),
        "entry-min-level" | "entry-max-level" => {
            String::from_raw(raw)?.parse::<ThresholdRule>().map(drop)
        }
        _ => Ok(()),
    }
}
