use std::fmt;
use std::str::FromStr;

use super::FlagParseError;

/// Where a threshold rule reads the entity's value from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThresholdSource {
    /// Built-in experience level
    Xp,
    /// Percent-delimited external placeholder, kept with its delimiters
    Placeholder(String),
}

impl ThresholdSource {
    /// `XP` in any case, or `%name%` with a non-empty name
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("xp") {
            return Some(Self::Xp);
        }
        if text.len() > 2 && text.starts_with('%') && text.ends_with('%') {
            return Some(Self::Placeholder(text.to_string()));
        }
        None
    }
}

impl fmt::Display for ThresholdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xp => f.write_str("XP"),
            Self::Placeholder(descriptor) => f.write_str(descriptor),
        }
    }
}

/// `"<threshold> <source>"`, e.g. `10 XP` or `5 %battlepass_tier%`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdRule {
    pub threshold: i32,
    pub source: ThresholdSource,
}

impl ThresholdRule {
    /// Split into threshold text and source text. The source keeps any
    /// inner whitespace.
    fn split(text: &str) -> Option<(&str, &str)> {
        let text = text.trim();
        let (threshold, source) = text.split_once(char::is_whitespace)?;
        let source = source.trim();
        (!source.is_empty()).then_some((threshold, source))
    }

    /// Runtime parse: anything malformed is "no rule"
    pub fn parse_lenient(text: &str) -> Option<Self> {
        let (threshold, source) = Self::split(text)?;
        Some(Self {
            threshold: threshold.parse().ok()?,
            source: ThresholdSource::parse(source)?,
        })
    }
}

/// Strict parse used when an operator sets the flag
impl FromStr for ThresholdRule {
    type Err = FlagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(FlagParseError::EmptyThreshold);
        }
        let (threshold, source) = Self::split(s).ok_or(FlagParseError::ThresholdArity)?;
        let threshold = threshold
            .parse()
            .map_err(|_| FlagParseError::ThresholdNotInteger(threshold.to_string()))?;
        let source = ThresholdSource::parse(source)
            .ok_or_else(|| FlagParseError::InvalidSource(source.to_string()))?;
        Ok(Self { threshold, source })
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.threshold, self.source)
    }
}

/// Extract an integer from formatted text by dropping everything except
/// digits and `-`.
///
/// Separators are dropped too, so `"1,234"` reads as 1234 and `"12.5"` as 125.
pub fn parse_lenient_int(text: &str) -> Option<i32> {
    let kept: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if kept.is_empty() || kept == "-" {
        return None;
    }
    kept.parse().ok()
}
