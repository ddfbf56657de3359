//! Engine configuration
//!
//! Every field has a default so a partial (or empty) TOML file is a valid
//! configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::formatting::{apply_replacements, translate_color_codes};

/// Message key sent when an entity is below an entry minimum.
pub const ENTRY_MIN_LEVEL_DENIED: &str = "entry-min-level-denied";
/// Message key sent when an entity is above an entry maximum.
pub const ENTRY_MAX_LEVEL_DENIED: &str = "entry-max-level-denied";

const BUILTIN_MESSAGES: &[(&str, &str)] = &[
    (
        ENTRY_MIN_LEVEL_DENIED,
        "&cYour level ({current}) is too low to enter this area. &7Min: {required}",
    ),
    (
        ENTRY_MAX_LEVEL_DENIED,
        "&cYour level ({current}) is too high to enter this area. &7Max: {required}",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a resolved placeholder value is reused before asking the provider again
    pub placeholder_cache_ttl_secs: u64,

    /// Name of the shared collision group entities are moved into
    pub collision_group: String,

    /// Minimum gap between two identical messages to the same entity
    pub message_cooldown_secs: u64,

    /// Message template overrides (key -> template)
    pub messages: MessageCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placeholder_cache_ttl_secs: 30,
            collision_group: "RFLAGS_COLLISION".to_string(),
            message_cooldown_secs: 3,
            messages: MessageCatalog::default(),
        }
    }
}

/// Message templates keyed by message key.
///
/// Only overrides are stored; keys that are not overridden fall back to the
/// builtin templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCatalog {
    overrides: BTreeMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override (or add) the template for `key`. An empty template disables the message.
    pub fn set(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.overrides.insert(key.into(), template.into());
    }

    /// Raw template for `key` without color translation
    pub fn template(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str).or_else(|| {
            BUILTIN_MESSAGES
                .iter()
                .find(|(builtin, _)| *builtin == key)
                .map(|(_, template)| *template)
        })
    }

    /// Render the message for `key`.
    ///
    /// Returns `None` when the template is empty (message disabled). Unknown
    /// keys render a visible "not found" line instead of failing silently.
    pub fn render(&self, key: &str, replacements: &[(&str, &str)]) -> Option<String> {
        let fallback;
        let template = match self.template(key) {
            Some(template) => template,
            None => {
                fallback = format!("&cMessage not found: {key}");
                fallback.as_str()
            }
        };

        if template.trim().is_empty() {
            return None;
        }

        Some(translate_color_codes(&apply_replacements(template, replacements)))
    }
}
