//! Difficulty profiles controlling how the opponent reacts, aims and moves.
//!
//! A profile is immutable for the duration of a decision cycle. Tiers are
//! looked up by name in a [`DifficultyTable`]; an unknown name is a
//! configuration error and never silently falls back to a default.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tier-specific behaviour applied after the accuracy error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    /// Occasionally aims at the canvas centre or blunders by a large offset.
    Casual,
    /// Rare, small blunders.
    Standard,
    /// Counter-biases against the human paddle's displacement from centre.
    Expert,
}

/// Tunables for one named tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub name: String,
    pub skill: SkillLevel,
    pub reaction_latency_ms: u64,
    /// Targeting accuracy in `0..=1`.
    pub accuracy: f32,
    /// Below 1.0 this scales press intensity. The paddle velocity cap already
    /// binds at 1.0, so a larger value lengthens the longest single press
    /// instead. Also divides the dead-zone.
    pub speed_multiplier: f32,
    /// Number of wall bounces considered by trajectory prediction.
    pub prediction_depth: u32,
    /// Dead-zone in pixels before dividing by the speed multiplier.
    pub dead_zone_px: f32,
    pub correction_chance: f32,
    pub double_tap_chance: f32,
}

impl DifficultyProfile {
    pub fn casual() -> Self {
        Self {
            name: "casual".to_string(),
            skill: SkillLevel::Casual,
            reaction_latency_ms: 500,
            accuracy: 0.6,
            speed_multiplier: 0.7,
            prediction_depth: 1,
            dead_zone_px: 30.0,
            correction_chance: 0.15,
            double_tap_chance: 0.05,
        }
    }

    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            skill: SkillLevel::Standard,
            reaction_latency_ms: 300,
            accuracy: 0.8,
            speed_multiplier: 1.0,
            prediction_depth: 2,
            dead_zone_px: 20.0,
            correction_chance: 0.08,
            double_tap_chance: 0.03,
        }
    }

    pub fn expert() -> Self {
        Self {
            name: "expert".to_string(),
            skill: SkillLevel::Expert,
            reaction_latency_ms: 150,
            accuracy: 0.95,
            speed_multiplier: 1.3,
            prediction_depth: 4,
            dead_zone_px: 12.0,
            correction_chance: 0.03,
            double_tap_chance: 0.01,
        }
    }

    /// Checks the profile's tunables. `cadence_ms` is the opponent sampling
    /// interval; a reaction latency at or beyond it would let decisions pile up.
    pub fn validate(&self, cadence_ms: u64) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidProfile {
            tier: self.name.clone(),
            reason: reason.to_string(),
        };

        if !(0.0..=1.0).contains(&self.accuracy) {
            return Err(invalid("accuracy must be within 0..=1"));
        }
        if !(self.speed_multiplier.is_finite() && self.speed_multiplier > 0.0) {
            return Err(invalid("speed multiplier must be positive"));
        }
        if self.reaction_latency_ms >= cadence_ms {
            return Err(invalid("reaction latency must be shorter than the sampling cadence"));
        }
        if !(self.dead_zone_px.is_finite() && self.dead_zone_px >= 0.0) {
            return Err(invalid("dead-zone must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.correction_chance) || !(0.0..=1.0).contains(&self.double_tap_chance) {
            return Err(invalid("emission probabilities must be within 0..=1"));
        }
        Ok(())
    }
}

/// Named profiles available to the opponent engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifficultyTable {
    profiles: BTreeMap<String, DifficultyProfile>,
}

impl DifficultyTable {
    pub fn new(profiles: impl IntoIterator<Item = DifficultyProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn lookup(&self, tier: &str) -> Result<&DifficultyProfile, ConfigError> {
        self.profiles
            .get(tier)
            .ok_or_else(|| ConfigError::UnknownDifficulty(tier.to_string()))
    }

    pub fn tiers(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn validate(&self, cadence_ms: u64) -> Result<(), ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::EmptyDifficultyTable);
        }
        for (key, profile) in &self.profiles {
            if key != &profile.name {
                return Err(ConfigError::InvalidProfile {
                    tier: key.clone(),
                    reason: format!("entry is keyed as '{}' but named '{}'", key, profile.name),
                });
            }
            profile.validate(cadence_ms)?;
        }
        Ok(())
    }
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self::new([
            DifficultyProfile::casual(),
            DifficultyProfile::standard(),
            DifficultyProfile::expert(),
        ])
    }
}
