use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::FlagParseError;

/// Name of a status effect type, normalized to lowercase.
///
/// Accepts namespaced names (`minecraft:speed`) and strips the default
/// namespace so both spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StatusEffectKind(String);

impl StatusEffectKind {
    pub fn new(name: &str) -> Result<Self, FlagParseError> {
        let lowered = name.trim().to_ascii_lowercase();
        let bare = lowered.strip_prefix("minecraft:").unwrap_or(&lowered);
        let valid = !bare.is_empty()
            && bare
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':'));
        if !valid {
            return Err(FlagParseError::InvalidStatusEffect(name.trim().to_string()));
        }
        Ok(Self(bare.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StatusEffectKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse a comma and/or whitespace separated list of effect names
pub fn parse_effect_set(text: &str) -> Result<BTreeSet<StatusEffectKind>, FlagParseError> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(StatusEffectKind::new)
        .collect()
}
