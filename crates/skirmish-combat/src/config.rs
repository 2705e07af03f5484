//! Combat tuning parameters.
//!
//! Tunables are loaded alongside the rest of the game configuration; fixed
//! properties of the combat model live here as constants.

use serde::{Deserialize, Serialize};
use skirmish_common::StateId;

/// Upper bound of the "close" distance band, in tiles.
pub const CLOSE_RANGE: f32 = 3.0;

/// Upper bound of the "safe" distance band, in tiles.
pub const SAFE_RANGE: f32 = 5.0;

/// Frames between regeneration ticks (a quarter second at 60 fps).
pub const REGEN_INTERVAL_FRAMES: u32 = 15;

/// Natural regen multiplier while a battler is in combat.
pub const IN_COMBAT_REGEN_FACTOR: f64 = 0.20;

/// Converts per-5-seconds state regen values to one regen tick.
pub const STATE_REGEN_DIVISOR: f64 = 20.0;

/// Combat configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === Engagement ===
    /// Frames between engagement re-evaluations
    pub engagement_throttle_frames: u32,
    /// Frames an alerted battler stays alerted
    pub alert_duration_frames: u32,
    /// Sight range bonus while alerted
    pub alert_sight_boost: f32,
    /// Pursuit range bonus while alerted
    pub alert_pursuit_boost: f32,

    // === Regeneration ===
    /// Frames after being hit during which regen is reduced
    pub last_hit_frames: u32,
    /// Aggro removed from every unlocked entry per regen tick (0 = off)
    pub aggro_decay: i32,

    // === Status Effects ===
    /// Frames a freshly applied state counts as "recently applied"
    pub recently_applied_frames: u32,
    /// Diminishing-returns window after a refresh
    pub refresh_diminish_frames: u32,
    /// State that marks a knocked-out combatant
    pub death_state: StateId,

    // === Dodge ===
    /// Steps used when a dodge skill carries no dodge data
    pub default_dodge_steps: u32,

    // === Events ===
    /// Undrained events a battler keeps before dropping the oldest
    pub max_pending_events: usize,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            // Engagement
            engagement_throttle_frames: 20,
            alert_duration_frames: 300,
            alert_sight_boost: 2.0,
            alert_pursuit_boost: 4.0,

            // Regeneration
            last_hit_frames: 300,
            aggro_decay: 0,

            // Status effects
            recently_applied_frames: 6,
            refresh_diminish_frames: 120,
            death_state: StateId::DEATH,

            // Dodge
            default_dodge_steps: 2,

            // Events
            max_pending_events: 256,
        }
    }
}

impl CombatConfig {
    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.engagement_throttle_frames = self.engagement_throttle_frames.clamp(1, 600);
        self.alert_duration_frames = self.alert_duration_frames.min(36_000);
        self.alert_sight_boost = sanitize_range(self.alert_sight_boost);
        self.alert_pursuit_boost = sanitize_range(self.alert_pursuit_boost);

        self.last_hit_frames = self.last_hit_frames.min(36_000);
        self.aggro_decay = self.aggro_decay.max(0);

        self.recently_applied_frames = self.recently_applied_frames.min(600);
        self.refresh_diminish_frames = self.refresh_diminish_frames.min(36_000);

        self.default_dodge_steps = self.default_dodge_steps.clamp(1, 16);

        self.max_pending_events = self.max_pending_events.clamp(16, 65_536);
    }

    /// Set the engagement throttle.
    #[must_use]
    pub fn with_engagement_throttle(mut self, frames: u32) -> Self {
        self.engagement_throttle_frames = frames;
        self
    }

    /// Set how many undrained events a battler keeps.
    #[must_use]
    pub fn with_max_pending_events(mut self, events: usize) -> Self {
        self.max_pending_events = events;
        self
    }

    /// Set the aggro decay per regen tick.
    #[must_use]
    pub fn with_aggro_decay(mut self, amount: i32) -> Self {
        self.aggro_decay = amount;
        self
    }
}

fn sanitize_range(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let mut config = CombatConfig::default();
        let before = config.clone();
        config.validate();
        assert_eq!(config, before);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = CombatConfig {
            engagement_throttle_frames: 0,
            alert_sight_boost: f32::NAN,
            alert_pursuit_boost: -3.0,
            aggro_decay: -5,
            default_dodge_steps: 99,
            max_pending_events: 0,
            ..CombatConfig::default()
        };
        config.validate();
        assert_eq!(config.engagement_throttle_frames, 1);
        assert_eq!(config.alert_sight_boost, 0.0);
        assert_eq!(config.alert_pursuit_boost, 0.0);
        assert_eq!(config.aggro_decay, 0);
        assert_eq!(config.default_dodge_steps, 16);
        assert_eq!(config.max_pending_events, 16);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: CombatConfig =
            ron::from_str("(engagement_throttle_frames: 5)").expect("parses");
        assert_eq!(config.engagement_throttle_frames, 5);
        assert_eq!(config.death_state, StateId::DEATH);
    }
}
