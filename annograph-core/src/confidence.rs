//! Ordered provenance scale for competing offset proposals.
//!
//! # What Confidence Arbitrates
//!
//! Many passes touch the same temporal point: an importer reads a boundary
//! from a label file, a forced aligner proposes its own, a human corrects it
//! in an editor. Whoever is more certain wins, and a weaker proposal never
//! silently replaces a stronger one.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     CONFIDENCE LADDER                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   MANUAL     (100)  a person placed this point                  │
//! │      ▲                                                          │
//! │   DEFAULT     (75)  supplied by the source transcript as-is     │
//! │      ▲                                                          │
//! │   AUTOMATIC   (50)  computed by a tool (aligner, tokenizer)     │
//! │      ▲                                                          │
//! │   NONE         (0)  placeholder / interpolated / unknown        │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The numeric scores exist only for interchange with formats that store
//! confidence as an integer; comparisons use the enum's `Ord`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Certainty attached to an anchor offset or an annotation label.
///
/// Variants are declared in increasing order, so `Ord` is the ranking.
///
/// ```rust
/// use annograph_core::Confidence;
///
/// assert!(Confidence::Manual > Confidence::Automatic);
/// assert_eq!(Confidence::Automatic.max(Confidence::Default), Confidence::Default);
/// assert_eq!(Confidence::from_score(60), Confidence::Automatic);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Nothing is known about where this came from.
    #[default]
    None,
    /// Produced by an automatic process.
    Automatic,
    /// Taken from the source data without further checking.
    Default,
    /// Set or confirmed by a person.
    Manual,
}

impl Confidence {
    /// All levels, weakest first.
    pub const ALL: [Self; 4] = [Self::None, Self::Automatic, Self::Default, Self::Manual];

    /// Integer score used by interchange formats.
    #[must_use]
    #[inline]
    pub const fn score(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Automatic => 50,
            Self::Default => 75,
            Self::Manual => 100,
        }
    }

    /// Map an integer score to the highest level it reaches.
    ///
    /// Scores between levels round down; anything above 100 is `Manual`.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0..=49 => Self::None,
            50..=74 => Self::Automatic,
            75..=99 => Self::Default,
            _ => Self::Manual,
        }
    }

    /// True if a value carrying `self` may overwrite one carrying `current`.
    #[must_use]
    #[inline]
    pub fn may_overwrite(self, current: Self) -> bool {
        self >= current
    }

    /// Lowercase name, as used in JSON and task parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Automatic => "automatic",
            Self::Default => "default",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing a confidence name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidenceParseError {
    /// The text that did not name a level.
    pub value: String,
}

impl fmt::Display for ConfidenceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not a confidence level (none, automatic, default, manual)",
            self.value
        )
    }
}

impl std::error::Error for ConfidenceParseError {}

impl std::str::FromStr for Confidence {
    type Err = ConfidenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(score) = trimmed.parse::<u8>() {
            return Ok(Self::from_score(score));
        }
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfidenceParseError {
                value: s.to_string(),
            })
    }
}

impl From<Confidence> for u8 {
    #[inline]
    fn from(conf: Confidence) -> Self {
        conf.score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_certainty() {
        assert!(Confidence::None < Confidence::Automatic);
        assert!(Confidence::Automatic < Confidence::Default);
        assert!(Confidence::Default < Confidence::Manual);
    }

    #[test]
    fn scores_are_monotonic() {
        let scores: Vec<u8> = Confidence::ALL.iter().map(|c| c.score()).collect();
        assert!(scores.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn from_score_rounds_down() {
        assert_eq!(Confidence::from_score(0), Confidence::None);
        assert_eq!(Confidence::from_score(49), Confidence::None);
        assert_eq!(Confidence::from_score(50), Confidence::Automatic);
        assert_eq!(Confidence::from_score(99), Confidence::Default);
        assert_eq!(Confidence::from_score(255), Confidence::Manual);
    }

    #[test]
    fn from_score_inverts_score() {
        for c in Confidence::ALL {
            assert_eq!(Confidence::from_score(c.score()), c);
        }
    }

    #[test]
    fn may_overwrite_allows_equal() {
        assert!(Confidence::Automatic.may_overwrite(Confidence::Automatic));
        assert!(Confidence::Manual.may_overwrite(Confidence::Default));
        assert!(!Confidence::Automatic.may_overwrite(Confidence::Manual));
    }

    #[test]
    fn parse_names_and_scores() {
        assert_eq!("manual".parse::<Confidence>().unwrap(), Confidence::Manual);
        assert_eq!(" Default ".parse::<Confidence>().unwrap(), Confidence::Default);
        assert_eq!("50".parse::<Confidence>().unwrap(), Confidence::Automatic);
        assert!("sure".parse::<Confidence>().is_err());
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Confidence::Automatic).unwrap();
        assert_eq!(json, "\"automatic\"");
        let back: Confidence = serde_json::from_str("\"manual\"").unwrap();
        assert_eq!(back, Confidence::Manual);
    }
}
