//! Status effect (state) duration and stack tracking.
//!
//! This module provides:
//! - [`StatusEffectInstance`]: one applied state with duration, stacks and
//!   refresh bookkeeping
//! - [`StatusEffectTracker`]: every state applied to one battler, ticked once
//!   per frame
//!
//! The tracker keeps the combatant's state flags in step with its instances:
//! applying a state sets the flag and removing the instance clears it.

use serde::{Deserialize, Serialize};
use skirmish_common::{BattlerId, StateId};
use tracing::debug;

use crate::config::CombatConfig;
use crate::data::{EffectDuration, StackLoss, StateData};
use crate::events::CombatEvent;
use crate::stats::CombatantStats;

/// Window lengths for the status bookkeeping counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimings {
    /// Frames a fresh application counts as recent.
    pub recently_applied: u32,
    /// Frames a refresh stays diminished.
    pub refresh_diminish: u32,
}

impl Default for StatusTimings {
    fn default() -> Self {
        Self::from_config(&CombatConfig::default())
    }
}

impl StatusTimings {
    /// Timings from combat configuration.
    #[must_use]
    pub fn from_config(config: &CombatConfig) -> Self {
        Self {
            recently_applied: config.recently_applied_frames,
            refresh_diminish: config.refresh_diminish_frames,
        }
    }
}

/// Outcome of one frame of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusTick {
    /// Stacks left, if the duration ran out and stacks were lost this frame.
    pub stacks_lost: Option<u32>,
    /// Whether the instance may now be removed.
    pub removable: bool,
}

// ============================================================================
// Instance
// ============================================================================

/// One state applied to a battler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffectInstance {
    state: StateId,
    base_duration: EffectDuration,
    remaining: u32,
    stacks: u32,
    max_stacks: u32,
    stack_loss: StackLoss,
    recently_applied: u32,
    refresh_diminish: u32,
    times_refreshed: u32,
    source: Option<BattlerId>,
    expired: bool,
    timings: StatusTimings,
}

impl StatusEffectInstance {
    /// Create a fresh instance of `data` with `stacks` stacks.
    #[must_use]
    pub fn new(
        data: &StateData,
        stacks: u32,
        source: Option<BattlerId>,
        timings: StatusTimings,
    ) -> Self {
        let max_stacks = data.max_stacks.max(1);
        Self {
            state: data.id,
            base_duration: data.duration,
            remaining: data.duration.frames(),
            stacks: stacks.clamp(1, max_stacks),
            max_stacks,
            stack_loss: data.stack_loss,
            recently_applied: timings.recently_applied,
            refresh_diminish: 0,
            times_refreshed: 0,
            source,
            expired: false,
            timings,
        }
    }

    /// Advance one frame.
    pub fn update(&mut self, death_state: StateId) -> StatusTick {
        let mut tick = StatusTick::default();

        self.recently_applied = self.recently_applied.saturating_sub(1);
        self.refresh_diminish = self.refresh_diminish.saturating_sub(1);

        if !self.is_eternal() {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 && self.stacks > 0 {
                self.stacks = match self.stack_loss {
                    StackLoss::One => self.stacks - 1,
                    StackLoss::All => 0,
                };
                if self.stacks > 0 {
                    self.remaining = self.base_frames();
                }
                tick.stacks_lost = Some(self.stacks);
            }
        }

        tick.removable = self.is_removable(death_state);

        if self.refresh_diminish == 0 {
            self.times_refreshed = 0;
        }
        tick
    }

    /// Re-apply: restore the duration (to `duration` or the base) and at
    /// least one stack, and restart the bookkeeping counters.
    pub fn refresh(&mut self, duration: Option<u32>) {
        self.remaining = duration.unwrap_or_else(|| self.base_frames());
        self.expired = false;
        if self.stacks == 0 {
            self.stacks = 1;
        }
        self.recently_applied = self.timings.recently_applied;
        self.refresh_diminish = self.timings.refresh_diminish;
        self.times_refreshed = self.times_refreshed.saturating_add(1);
    }

    /// Add stacks up to the maximum. Returns the new stack count.
    pub fn add_stacks(&mut self, count: u32) -> u32 {
        self.stacks = self.stacks.saturating_add(count).min(self.max_stacks);
        self.stacks
    }

    /// Remove stacks. Exhausting a timed state also ends its duration.
    pub fn remove_stacks(&mut self, count: u32) -> u32 {
        self.stacks = self.stacks.saturating_sub(count);
        if self.stacks == 0 && !self.is_eternal() {
            self.remaining = 0;
        }
        self.stacks
    }

    /// Whether the instance may be dropped.
    ///
    /// The death state is never removable this way. Otherwise stacks must be
    /// exhausted, and a timed state must also have run out.
    #[must_use]
    pub fn is_removable(&self, death_state: StateId) -> bool {
        if self.state == death_state || self.stacks > 0 {
            return false;
        }
        self.is_eternal() || self.remaining == 0
    }

    /// Whether the remaining duration is within the last fifth of the base.
    #[must_use]
    pub fn is_about_to_expire(&self) -> bool {
        !self.is_eternal() && self.remaining <= self.base_frames().div_ceil(5)
    }

    /// Whether the duration never elapses.
    #[must_use]
    pub fn is_eternal(&self) -> bool {
        self.base_duration.is_eternal()
    }

    /// Whether the instance was applied within the recent window.
    #[must_use]
    pub fn is_recently_applied(&self) -> bool {
        self.recently_applied > 0
    }

    /// Whether a refresh is still inside its diminishing-returns window.
    #[must_use]
    pub fn is_refresh_diminished(&self) -> bool {
        self.refresh_diminish > 0
    }

    /// State ID.
    #[must_use]
    pub fn state(&self) -> StateId {
        self.state
    }

    /// Base duration.
    #[must_use]
    pub fn base_duration(&self) -> EffectDuration {
        self.base_duration
    }

    /// Remaining frames; zero for eternal states.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Current stacks.
    #[must_use]
    pub fn stacks(&self) -> u32 {
        self.stacks
    }

    /// Refreshes since the diminishing window last elapsed.
    #[must_use]
    pub fn times_refreshed(&self) -> u32 {
        self.times_refreshed
    }

    /// Battler that applied the state.
    #[must_use]
    pub fn source(&self) -> Option<BattlerId> {
        self.source
    }

    /// Whether the state is no longer applied.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    fn base_frames(&self) -> u32 {
        self.base_duration.frames()
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Every state instance applied to one battler, in application order.
#[derive(Debug, Clone)]
pub struct StatusEffectTracker {
    instances: Vec<StatusEffectInstance>,
    timings: StatusTimings,
    death_state: StateId,
}

impl Default for StatusEffectTracker {
    fn default() -> Self {
        Self::new(&CombatConfig::default())
    }
}

impl StatusEffectTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            instances: Vec::new(),
            timings: StatusTimings::from_config(config),
            death_state: config.death_state,
        }
    }

    /// Apply `stacks` stacks of a state.
    ///
    /// An already-active state is refreshed and gains the stacks up to its
    /// maximum. Returns the stack count after application.
    pub fn apply(
        &mut self,
        data: &StateData,
        stacks: u32,
        source: Option<BattlerId>,
        stats: &mut CombatantStats,
    ) -> u32 {
        stats.add_state(data.id);
        if let Some(instance) = self.get_mut(data.id) {
            let before = instance.stacks;
            instance.refresh(None);
            instance.source = source.or(instance.source);
            let added = if before == 0 { stacks.saturating_sub(1) } else { stacks };
            return instance.add_stacks(added);
        }
        let instance = StatusEffectInstance::new(data, stacks, source, self.timings);
        let stacks = instance.stacks;
        self.instances.push(instance);
        stacks
    }

    /// Refresh an active state. Returns false if it is not tracked.
    pub fn refresh(&mut self, state: StateId, duration: Option<u32>) -> bool {
        self.get_mut(state).map(|i| i.refresh(duration)).is_some()
    }

    /// Remove stacks from an active state. Returns the stacks left.
    pub fn remove_stacks(&mut self, state: StateId, count: u32) -> Option<u32> {
        self.get_mut(state).map(|i| i.remove_stacks(count))
    }

    /// Remove a state outright, clearing the combatant's flag.
    pub fn remove(
        &mut self,
        state: StateId,
        stats: &mut CombatantStats,
    ) -> Option<StatusEffectInstance> {
        stats.remove_state(state);
        let index = self.instances.iter().position(|i| i.state == state)?;
        let mut instance = self.instances.remove(index);
        instance.expired = true;
        Some(instance)
    }

    /// Advance every instance one frame, dropping those that ran out.
    pub fn update(&mut self, stats: &mut CombatantStats, events: &mut Vec<CombatEvent>) {
        let death_state = self.death_state;
        let mut expired = Vec::new();

        for instance in &mut self.instances {
            let tick = instance.update(death_state);
            if let Some(stacks) = tick.stacks_lost {
                debug!(state = instance.state.raw(), stacks, "State lost stacks");
                events.push(CombatEvent::StatusStackLost {
                    state: instance.state,
                    stacks,
                });
            }
            if tick.removable {
                expired.push(instance.state);
            }
        }

        for state in expired {
            if self.remove(state, stats).is_some() {
                events.push(CombatEvent::StatusExpired { state });
            }
        }
    }

    /// Drop every instance and its flag, except the death state.
    pub fn clear(&mut self, stats: &mut CombatantStats) {
        let death_state = self.death_state;
        for instance in &self.instances {
            if instance.state != death_state {
                stats.remove_state(instance.state);
            }
        }
        self.instances.retain(|i| i.state == death_state);
    }

    /// Whether a state has a live instance.
    #[must_use]
    pub fn is_tracked(&self, state: StateId) -> bool {
        self.get(state).is_some()
    }

    /// Look up an instance.
    #[must_use]
    pub fn get(&self, state: StateId) -> Option<&StatusEffectInstance> {
        self.instances.iter().find(|i| i.state == state)
    }

    /// Iterate instances in application order.
    pub fn iter(&self) -> impl Iterator<Item = &StatusEffectInstance> {
        self.instances.iter()
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no states are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The state treated as death.
    #[must_use]
    pub fn death_state(&self) -> StateId {
        self.death_state
    }

    fn get_mut(&mut self, state: StateId) -> Option<&mut StatusEffectInstance> {
        self.instances.iter_mut().find(|i| i.state == state)
    }
}
