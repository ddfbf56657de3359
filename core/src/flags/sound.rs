use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::FlagParseError;
use crate::scheduler::ticks;

/// Mixer channel a sound plays on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCategory {
    #[default]
    Master,
    Music,
    Records,
    Weather,
    Blocks,
    Hostile,
    Neutral,
    Players,
    Ambient,
    Voice,
}

impl SoundCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Music => "music",
            Self::Records => "records",
            Self::Weather => "weather",
            Self::Blocks => "blocks",
            Self::Hostile => "hostile",
            Self::Neutral => "neutral",
            Self::Players => "players",
            Self::Ambient => "ambient",
            Self::Voice => "voice",
        }
    }
}

impl FromStr for SoundCategory {
    type Err = FlagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = match s.to_ascii_lowercase().as_str() {
            "master" => Self::Master,
            "music" => Self::Music,
            "records" | "record" => Self::Records,
            "weather" => Self::Weather,
            "blocks" | "block" => Self::Blocks,
            "hostile" => Self::Hostile,
            "neutral" => Self::Neutral,
            "players" | "player" => Self::Players,
            "ambient" => Self::Ambient,
            "voice" => Self::Voice,
            _ => return Err(FlagParseError::UnknownSoundCategory(s.to_string())),
        };
        Ok(category)
    }
}

/// One looping sound requested by a zone.
///
/// Text form: `<sound> <interval-ticks> [volume] [pitch] [category]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundDescriptor {
    pub sound: String,
    #[serde(default)]
    pub category: SoundCategory,
    #[serde(default = "unit")]
    pub volume: f32,
    #[serde(default = "unit")]
    pub pitch: f32,
    pub interval_ticks: u32,
}

fn unit() -> f32 {
    1.0
}

impl SoundDescriptor {
    pub fn new(sound: impl Into<String>, interval_ticks: u32) -> Self {
        Self {
            sound: sound.into(),
            category: SoundCategory::Master,
            volume: 1.0,
            pitch: 1.0,
            interval_ticks,
        }
    }

    /// Key a running loop is tracked under
    pub fn identity(&self) -> &str {
        &self.sound
    }

    /// Time between two plays
    pub fn period(&self) -> Duration {
        ticks(self.interval_ticks.max(1))
    }
}

impl FromStr for SoundDescriptor {
    type Err = FlagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| FlagParseError::InvalidSound {
            input: s.trim().to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() < 2 || parts.len() > 5 {
            return Err(invalid("expected <sound> <interval> [volume] [pitch] [category]"));
        }

        let interval_ticks: u32 = parts[1]
            .parse()
            .map_err(|_| invalid("interval must be a whole number of ticks"))?;
        if interval_ticks == 0 {
            return Err(invalid("interval must be at least one tick"));
        }

        let mut sound = Self::new(parts[0].to_ascii_lowercase(), interval_ticks);
        if let Some(volume) = parts.get(2) {
            sound.volume = volume
                .parse()
                .ok()
                .filter(|v: &f32| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| invalid("volume must be a non-negative number"))?;
        }
        if let Some(pitch) = parts.get(3) {
            sound.pitch = pitch
                .parse()
                .ok()
                .filter(|p: &f32| p.is_finite() && *p > 0.0)
                .ok_or_else(|| invalid("pitch must be a positive number"))?;
        }
        if let Some(category) = parts.get(4) {
            sound.category = category.parse()?;
        }
        Ok(sound)
    }
}

impl fmt::Display for SoundDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.sound,
            self.interval_ticks,
            self.volume,
            self.pitch,
            self.category.as_str()
        )
    }
}
