//! Engagement detection and target selection.
//!
//! This module provides:
//! - Two-state engagement (Disengaged / Engaged) with sight and pursuit
//!   hysteresis
//! - Throttled re-evaluation so large scenes do not rescan every frame
//! - Alert state that widens ranges after an unseen hit
//! - Aggro-driven retargeting while engaged
//! - Distance bands for AI consumers

use skirmish_common::BattlerId;
use tracing::debug;

use crate::aggro::AggroTable;
use crate::config::{CombatConfig, CLOSE_RANGE, SAFE_RANGE};
use crate::data::BattlerProfile;
use crate::events::CombatEvent;
use crate::services::TargetLookup;
use crate::timer::FrameTimer;

// ============================================================================
// Distance Bands
// ============================================================================

/// Coarse distance classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceBand {
    /// Within melee reach.
    Close,
    /// Between melee reach and the safe boundary.
    Safe,
    /// Beyond the safe boundary.
    Far,
}

impl DistanceBand {
    /// Classify a distance in tiles.
    #[must_use]
    pub fn classify(distance: f32) -> Self {
        if distance <= CLOSE_RANGE {
            Self::Close
        } else if distance <= SAFE_RANGE {
            Self::Safe
        } else {
            Self::Far
        }
    }
}

// ============================================================================
// Alert
// ============================================================================

/// Heightened awareness after being hit while disengaged.
#[derive(Debug)]
pub struct AlertState {
    timer: FrameTimer,
    attacker: Option<BattlerId>,
    sight_boost: f32,
    pursuit_boost: f32,
}

impl AlertState {
    /// Create an inactive alert state.
    #[must_use]
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            timer: FrameTimer::completed(config.alert_duration_frames),
            attacker: None,
            sight_boost: config.alert_sight_boost,
            pursuit_boost: config.alert_pursuit_boost,
        }
    }

    /// Become alerted, restarting the alert window.
    pub fn alert(&mut self, attacker: Option<BattlerId>) {
        self.timer.reset();
        self.attacker = attacker.or(self.attacker);
    }

    /// Advance one frame.
    pub fn tick(&mut self) {
        if self.timer.tick() {
            self.attacker = None;
        }
    }

    /// End the alert early.
    pub fn clear(&mut self) {
        self.timer.force_complete();
        self.attacker = None;
    }

    /// Whether the alert window is open.
    #[must_use]
    pub fn is_alerted(&self) -> bool {
        !self.timer.is_complete()
    }

    /// Attacker that raised the alert.
    #[must_use]
    pub fn attacker(&self) -> Option<BattlerId> {
        if self.is_alerted() {
            self.attacker
        } else {
            None
        }
    }

    /// Current sight bonus.
    #[must_use]
    pub fn sight_boost(&self) -> f32 {
        if self.is_alerted() {
            self.sight_boost
        } else {
            0.0
        }
    }

    /// Current pursuit bonus.
    #[must_use]
    pub fn pursuit_boost(&self) -> f32 {
        if self.is_alerted() {
            self.pursuit_boost
        } else {
            0.0
        }
    }
}

// ============================================================================
// Engagement
// ============================================================================

/// Engagement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngagementState {
    /// No target.
    #[default]
    Disengaged,
    /// Pursuing a target.
    Engaged,
}

/// Engagement state machine of one battler.
#[derive(Debug)]
pub struct EngagementTracker {
    state: EngagementState,
    target: Option<BattlerId>,
    throttle: FrameTimer,
    alert: AlertState,
}

impl EngagementTracker {
    /// Create a disengaged tracker whose first scan runs immediately.
    #[must_use]
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            state: EngagementState::Disengaged,
            target: None,
            throttle: FrameTimer::completed(config.engagement_throttle_frames.max(1)),
            alert: AlertState::new(config),
        }
    }

    /// Advance the throttle and alert timers one frame.
    pub fn tick_timers(&mut self) {
        self.throttle.tick();
        self.alert.tick();
    }

    /// Run one frame of engagement for battler `id`.
    ///
    /// Range checks wait for the throttle and restart it once they run, so
    /// a battler scans at most once per throttle window whether or not the
    /// scan finds anything. Aggro retargeting while engaged runs every
    /// frame.
    pub fn evaluate<W>(
        &mut self,
        id: BattlerId,
        profile: &BattlerProfile,
        aggro: &mut AggroTable,
        world: &W,
        events: &mut Vec<CombatEvent>,
    ) where
        W: TargetLookup + ?Sized,
    {
        if profile.skips_engagement() {
            return;
        }

        match self.state {
            EngagementState::Disengaged => {
                if !self.throttle.is_complete() {
                    return;
                }
                let sight = profile.sight_range + self.alert.sight_boost();
                self.throttle.reset();
                if let Some(target) = self.find_candidate(id, sight, world) {
                    self.engage(target, aggro, events);
                }
            },
            EngagementState::Engaged => {
                let pursuit = profile.pursuit_range + self.alert.pursuit_boost();
                let Some(current) = self.target else {
                    self.disengage(events);
                    return;
                };

                if self.throttle.is_complete() {
                    let in_range = world
                        .distance_between(id, current)
                        .is_some_and(|d| d <= pursuit);
                    if !in_range || !world.is_alive(current) {
                        aggro.remove(current);
                        self.disengage(events);
                        return;
                    }
                    self.throttle.reset();
                }

                self.retarget(id, current, pursuit, aggro, world, events);
            },
        }
    }

    /// Engage `target`, seeding its aggro entry.
    pub fn engage(
        &mut self,
        target: BattlerId,
        aggro: &mut AggroTable,
        events: &mut Vec<CombatEvent>,
    ) {
        debug!(%target, "Engaged");
        aggro.add_or_update(target, 0, true);
        self.state = EngagementState::Engaged;
        self.target = Some(target);
        self.throttle.reset();
        events.push(CombatEvent::Engaged { target });
    }

    /// Drop the target and return to Disengaged.
    pub fn disengage(&mut self, events: &mut Vec<CombatEvent>) {
        if self.state == EngagementState::Disengaged {
            return;
        }
        debug!(target = ?self.target, "Disengaged");
        self.state = EngagementState::Disengaged;
        self.target = None;
        events.push(CombatEvent::Disengaged);
    }

    /// Become alerted by a hit from `attacker`.
    pub fn alert(&mut self, attacker: Option<BattlerId>, events: &mut Vec<CombatEvent>) {
        self.alert.alert(attacker);
        events.push(CombatEvent::Alerted { attacker });
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EngagementState {
        self.state
    }

    /// Whether engaged.
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.state == EngagementState::Engaged
    }

    /// Current target.
    #[must_use]
    pub fn target(&self) -> Option<BattlerId> {
        self.target
    }

    /// Alert state.
    #[must_use]
    pub fn alert_state(&self) -> &AlertState {
        &self.alert
    }

    /// Distance band to the current target.
    #[must_use]
    pub fn target_band<W>(&self, id: BattlerId, world: &W) -> Option<DistanceBand>
    where
        W: TargetLookup + ?Sized,
    {
        let target = self.target?;
        world
            .distance_between(id, target)
            .map(DistanceBand::classify)
    }

    fn find_candidate<W>(&self, id: BattlerId, sight: f32, world: &W) -> Option<BattlerId>
    where
        W: TargetLookup + ?Sized,
    {
        let in_sight = |target: BattlerId| {
            target != id
                && world.is_alive(target)
                && world
                    .distance_between(id, target)
                    .is_some_and(|d| d <= sight)
        };

        if let Some(attacker) = self.alert.attacker().filter(|a| in_sight(*a)) {
            return Some(attacker);
        }
        world.nearest_opposing(id).filter(|t| in_sight(*t))
    }

    fn retarget<W>(
        &mut self,
        id: BattlerId,
        current: BattlerId,
        pursuit: f32,
        aggro: &mut AggroTable,
        world: &W,
        events: &mut Vec<CombatEvent>,
    ) where
        W: TargetLookup + ?Sized,
    {
        let purged = aggro.retain_valid(|target| {
            world.is_alive(target)
                && (target == current
                    || world
                        .distance_between(id, target)
                        .is_some_and(|d| d <= pursuit))
        });
        for target in purged {
            debug!(%target, "Purged invalid aggro entry");
            events.push(CombatEvent::AggroPurged { target });
        }

        let Some(top) = aggro.highest() else {
            self.disengage(events);
            return;
        };
        if top.target != current {
            debug!(from = %current, to = %top.target, "Switched target");
            self.target = Some(top.target);
            events.push(CombatEvent::TargetChanged {
                from: Some(current),
                to: top.target,
            });
        }
    }
}
