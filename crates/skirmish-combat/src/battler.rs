//! Per-battler combat orchestration.
//!
//! [`BattlerContext`] owns one combatant's session state and runs every
//! component once per frame in a fixed order:
//!
//! 1. cooldowns
//! 2. timers (status, alert, parry, last hit, cast, engagement throttle)
//! 3. engagement and aggro retargeting
//! 4. regeneration
//! 5. dodge movement
//! 6. death handling
//! 7. post-update hooks
//!
//! A battler that dies this frame still regenerates and dodges before death
//! is handled, and does nothing afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use skirmish_common::{BattlerId, Direction, SkillId, StateId, Team};
use tracing::{debug, warn};

use crate::aggro::AggroTable;
use crate::config::CombatConfig;
use crate::cooldown::{CooldownRegistry, CooldownSlot};
use crate::data::{BattlerProfile, DodgeData};
use crate::dodge::{DodgeState, DodgeUpdate};
use crate::engagement::{DistanceBand, EngagementState, EngagementTracker};
use crate::events::{BattlerEvent, CombatEvent};
use crate::guard::{GuardResolution, GuardState, GuardUpdate};
use crate::persistence::DurableCombatant;
use crate::regen::{purge_untracked_states, RegenProcessor, RegenServices};
use crate::services::{CombatWorld, MovementControl, SkillDataProvider, TargetLookup, VariableStore};
use crate::stats::{CombatantStats, Resource};
use crate::status::StatusEffectTracker;
use crate::timer::FrameTimer;

// ============================================================================
// Services and Hooks
// ============================================================================

/// Static services handed to a battler at construction.
#[derive(Clone)]
pub struct BattlerServices {
    /// Skill and state definitions.
    pub data: Arc<dyn SkillDataProvider>,
    /// Game variables.
    pub variables: Arc<dyn VariableStore>,
}

impl BattlerServices {
    /// Bundle the services.
    #[must_use]
    pub fn new(data: Arc<dyn SkillDataProvider>, variables: Arc<dyn VariableStore>) -> Self {
        Self { data, variables }
    }
}

/// Extension point run after the built-in per-frame steps.
pub trait BattlerHook: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called once per frame after death handling.
    fn after_update(&mut self, battler: &mut BattlerContext);
}

/// What an incoming hit met.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HitOutcome {
    /// Guard or parry response, if guarding.
    pub guard: Option<GuardResolution>,
    /// The battler was dodging with invincibility; the hit should miss.
    pub evaded: bool,
    /// A cast was interrupted.
    pub interrupted: Option<SkillId>,
}

#[derive(Debug)]
struct CastState {
    skill: SkillId,
    timer: FrameTimer,
}

// ============================================================================
// Battler Context
// ============================================================================

/// Session combat state of one battler.
///
/// Events accumulate until the host calls [`BattlerContext::drain_events`].
/// Past `max_pending_events` the oldest are dropped, so a host that only
/// polls [`BattlerContext::needs_refresh`] stays bounded.
pub struct BattlerContext {
    id: BattlerId,
    team: Team,
    profile: BattlerProfile,
    stats: CombatantStats,
    config: CombatConfig,
    data: Arc<dyn SkillDataProvider>,
    variables: Arc<dyn VariableStore>,

    equipped: BTreeMap<CooldownSlot, SkillId>,
    cooldowns: CooldownRegistry,
    aggro: AggroTable,
    engagement: EngagementTracker,
    guard: GuardState,
    dodge: DodgeState,
    regen: RegenProcessor,
    status: StatusEffectTracker,
    last_hit: FrameTimer,
    cast: Option<CastState>,

    dead: bool,
    frame: u64,
    events: Vec<CombatEvent>,
    needs_refresh: bool,
    hooks: Vec<Box<dyn BattlerHook>>,
}

impl BattlerContext {
    /// Create a battler with fresh session state.
    #[must_use]
    pub fn new(
        id: BattlerId,
        team: Team,
        stats: CombatantStats,
        profile: BattlerProfile,
        services: BattlerServices,
        config: &CombatConfig,
    ) -> Self {
        let mut aggro = AggroTable::new();
        if profile.aggro_locked {
            aggro.lock();
        }
        Self {
            id,
            team,
            profile,
            stats,
            config: config.clone(),
            data: services.data,
            variables: services.variables,
            equipped: BTreeMap::new(),
            cooldowns: CooldownRegistry::new(),
            aggro,
            engagement: EngagementTracker::new(config),
            guard: GuardState::new(),
            dodge: DodgeState::new(),
            regen: RegenProcessor::new(),
            status: StatusEffectTracker::new(config),
            last_hit: FrameTimer::completed(config.last_hit_frames),
            cast: None,
            dead: false,
            frame: 0,
            events: Vec::new(),
            needs_refresh: false,
            hooks: Vec::new(),
        }
    }

    /// Rebuild a battler from a snapshot. Timers start fresh, aggro and
    /// status tracking start empty.
    #[must_use]
    pub fn from_durable(
        snapshot: DurableCombatant,
        services: BattlerServices,
        config: &CombatConfig,
    ) -> Self {
        let mut battler = Self::new(
            snapshot.id,
            snapshot.team,
            snapshot.stats,
            snapshot.profile,
            services,
            config,
        );
        for (slot, skill) in snapshot.equipped {
            battler.equip(slot, skill);
        }
        battler.dead = battler.stats.is_dead();
        battler
    }

    /// Snapshot of the durable attributes.
    #[must_use]
    pub fn durable(&self) -> DurableCombatant {
        DurableCombatant::new(
            self.id,
            self.team,
            self.stats.clone(),
            self.profile.clone(),
            self.equipped.iter().map(|(slot, skill)| (*slot, *skill)).collect(),
        )
    }

    /// Bind a skill to a slot, configuring its cooldown.
    #[must_use]
    pub fn with_skill(mut self, slot: CooldownSlot, skill: SkillId) -> Self {
        self.equip(slot, skill);
        self
    }

    /// Bind a skill to a slot, configuring its cooldown.
    pub fn equip(&mut self, slot: CooldownSlot, skill: SkillId) {
        self.equipped.insert(slot, skill);
        self.cooldowns.register(slot);
    }

    /// Register a post-update hook.
    pub fn add_hook(&mut self, hook: Box<dyn BattlerHook>) {
        self.hooks.push(hook);
    }

    // ------------------------------------------------------------------------
    // Frame update
    // ------------------------------------------------------------------------

    /// Run one frame.
    pub fn update<W>(&mut self, world: &mut W)
    where
        W: CombatWorld + ?Sized,
    {
        if self.dead {
            return;
        }
        self.frame += 1;
        let first_event = self.events.len();

        self.cooldowns.update();
        self.update_timers(&*world);

        self.engagement.evaluate(
            self.id,
            &self.profile,
            &mut self.aggro,
            &*world,
            &mut self.events,
        );

        self.update_regen(&*world);
        self.update_dodge(world);
        self.update_death();
        self.run_hooks();

        if self.events.iter().skip(first_event).any(CombatEvent::affects_display) {
            self.needs_refresh = true;
        }
        self.trim_events();
    }

    fn trim_events(&mut self) {
        let cap = self.config.max_pending_events;
        if self.events.len() > cap {
            let dropped = self.events.len() - cap;
            self.events.drain(..dropped);
            debug!(battler = %self.id, dropped, "Dropped undrained combat events");
        }
    }

    fn update_timers<W>(&mut self, world: &W)
    where
        W: CombatWorld + ?Sized,
    {
        self.status.update(&mut self.stats, &mut self.events);
        self.engagement.tick_timers();

        match self.guard.update(world.is_movement_locked(self.id)) {
            GuardUpdate::ParryClosed => self.events.push(CombatEvent::ParryWindowClosed),
            GuardUpdate::Ended => self.events.push(CombatEvent::GuardEnded),
            GuardUpdate::Unchanged => {},
        }

        self.last_hit.tick();

        if let Some(cast) = self.cast.as_mut() {
            if cast.timer.tick() {
                let skill = cast.skill;
                self.cast = None;
                self.events.push(CombatEvent::CastCompleted { skill });
            }
        }
    }

    fn update_regen<W>(&mut self, world: &W)
    where
        W: CombatWorld + ?Sized,
    {
        if self.stats.is_dead() || !self.regen.tick() {
            return;
        }

        purge_untracked_states(&mut self.stats, &self.status, &mut self.events);

        let reduced = self.is_in_combat();
        let services = RegenServices {
            data: &*self.data,
            variables: &*self.variables,
        };
        let delta = self.regen.regenerate(
            self.id,
            &mut self.stats,
            &self.status,
            services,
            world,
            reduced,
        );
        if !delta.is_zero() {
            self.events.push(CombatEvent::RegenApplied { delta });
        }

        self.aggro.decay(self.config.aggro_decay);
    }

    fn update_dodge<W>(&mut self, world: &mut W)
    where
        W: CombatWorld + ?Sized,
    {
        if let DodgeUpdate::Ended { cancelled } = self.dodge.update(self.id, world) {
            self.events.push(CombatEvent::DodgeEnded { cancelled });
        }
    }

    fn update_death(&mut self) {
        if !self.stats.is_dead() {
            return;
        }
        self.dead = true;
        debug!(battler = %self.id, "Battler died");

        let death = self.config.death_state;
        match self.data.state(death) {
            Some(data) => {
                self.status.apply(data, 1, None, &mut self.stats);
            },
            None => {
                self.stats.add_state(death);
            },
        }

        if self.guard.end() {
            self.events.push(CombatEvent::GuardEnded);
        }
        if self.dodge.end() {
            self.events.push(CombatEvent::DodgeEnded { cancelled: true });
        }
        if let Some(cast) = self.cast.take() {
            self.events.push(CombatEvent::CastInterrupted { skill: cast.skill });
        }
        self.engagement.disengage(&mut self.events);
        self.aggro.clear();
        self.events.push(CombatEvent::Died);
    }

    fn run_hooks(&mut self) {
        if self.hooks.is_empty() {
            return;
        }
        let mut hooks = std::mem::take(&mut self.hooks);
        for hook in &mut hooks {
            hook.after_update(self);
        }
        hooks.append(&mut self.hooks);
        self.hooks = hooks;
    }

    // ------------------------------------------------------------------------
    // Readiness and actions
    // ------------------------------------------------------------------------

    /// Whether the slot can act now, through its base cooldown or a combo.
    pub fn is_action_ready(&self, slot: CooldownSlot) -> bool {
        if !self.cooldowns.contains(slot) {
            warn!(battler = %self.id, %slot, "Unconfigured cooldown slot");
            return false;
        }
        self.cooldowns.is_base_ready(slot) || self.cooldowns.is_combo_ready(slot)
    }

    /// Whether the slot's base cooldown has elapsed.
    #[must_use]
    pub fn is_base_ready(&self, slot: CooldownSlot) -> bool {
        self.cooldowns.is_base_ready(slot)
    }

    /// Whether the slot's combo window is ready.
    #[must_use]
    pub fn is_combo_ready(&self, slot: CooldownSlot) -> bool {
        self.cooldowns.is_combo_ready(slot)
    }

    /// Start a slot's base cooldown.
    pub fn start_cooldown(&mut self, slot: CooldownSlot, frames: u32) {
        self.cooldowns.start_cooldown(slot, frames);
    }

    /// Shift a slot's elapsed frames. Returns false if unconfigured.
    pub fn modify_cooldown(&mut self, slot: CooldownSlot, delta_frames: i64) -> bool {
        let modified = self.cooldowns.modify(slot, delta_frames);
        if !modified {
            warn!(battler = %self.id, %slot, "Cannot modify unconfigured cooldown slot");
        }
        modified
    }

    /// Open a combo window on a slot. Returns false if unconfigured.
    pub fn set_combo_window(
        &mut self,
        slot: CooldownSlot,
        frames: u32,
        next: Option<SkillId>,
    ) -> bool {
        self.cooldowns.set_combo_window(slot, frames, next)
    }

    /// Next skill of the slot's combo chain.
    #[must_use]
    pub fn next_combo_skill(&self, slot: CooldownSlot) -> Option<SkillId> {
        self.cooldowns.next_combo_skill(slot)
    }

    /// Skill bound to a slot.
    #[must_use]
    pub fn equipped(&self, slot: CooldownSlot) -> Option<SkillId> {
        self.equipped.get(&slot).copied()
    }

    /// Commit to acting with `slot`: pick the equipped skill (or the combo
    /// follow-up while only the combo is ready), pay its costs and start its
    /// cooldown and combo window.
    ///
    /// Returns the skill to execute, or `None` if the slot cannot act.
    pub fn commit_action(&mut self, slot: CooldownSlot) -> Option<SkillId> {
        if self.dead || self.is_casting() || !self.is_action_ready(slot) {
            return None;
        }
        let skill_id = if self.cooldowns.is_base_ready(slot) {
            self.equipped(slot)
        } else {
            self.cooldowns.next_combo_skill(slot)
        }?;

        let Some(skill) = self.data.skill(skill_id) else {
            warn!(battler = %self.id, skill = skill_id.raw(), "Missing skill data");
            return None;
        };
        if !self.stats.can_pay(skill.mp_cost, skill.tp_cost) {
            return None;
        }

        self.stats.gain(Resource::Mp, -skill.mp_cost);
        self.stats.gain(Resource::Tp, -skill.tp_cost);
        self.cooldowns.start_cooldown(slot, skill.cooldown_frames);
        match skill.combo {
            Some(combo) => {
                self.cooldowns
                    .set_combo_window(slot, combo.frames, Some(combo.next));
            },
            None => {
                self.cooldowns.clear_combo(slot);
            },
        }
        Some(skill_id)
    }

    /// Begin casting a skill. Returns false if the skill has no cast time
    /// or the battler cannot cast now.
    pub fn begin_cast(&mut self, skill_id: SkillId) -> bool {
        if self.dead || self.is_casting() {
            return false;
        }
        let Some(skill) = self.data.skill(skill_id) else {
            warn!(battler = %self.id, skill = skill_id.raw(), "Missing skill data");
            return false;
        };
        if skill.cast_frames == 0 {
            return false;
        }
        self.cast = Some(CastState {
            skill: skill_id,
            timer: FrameTimer::new(skill.cast_frames),
        });
        self.events.push(CombatEvent::CastStarted { skill: skill_id });
        true
    }

    /// Cancel the current cast. Returns the interrupted skill.
    pub fn interrupt_cast(&mut self) -> Option<SkillId> {
        let cast = self.cast.take()?;
        self.events.push(CombatEvent::CastInterrupted { skill: cast.skill });
        self.needs_refresh = true;
        Some(cast.skill)
    }

    /// Whether a cast is running.
    #[must_use]
    pub fn is_casting(&self) -> bool {
        self.cast.is_some()
    }

    /// Skill being cast.
    #[must_use]
    pub fn casting_skill(&self) -> Option<SkillId> {
        self.cast.as_ref().map(|c| c.skill)
    }

    /// Frames left on the current cast.
    #[must_use]
    pub fn cast_remaining(&self) -> u32 {
        self.cast.as_ref().map_or(0, |c| c.timer.remaining())
    }

    // ------------------------------------------------------------------------
    // Guard and dodge
    // ------------------------------------------------------------------------

    /// Raise a guard with the skill in `slot`, paying its cost and starting
    /// its cooldown.
    ///
    /// Returns false if the slot holds no usable guard skill.
    pub fn start_guarding(&mut self, slot: CooldownSlot) -> bool {
        if self.dead || self.guard.is_guarding() || !self.is_action_ready(slot) {
            return false;
        }
        let Some(skill_id) = self.equipped(slot) else {
            return false;
        };
        let Some(skill) = self.data.skill(skill_id) else {
            warn!(battler = %self.id, skill = skill_id.raw(), "Missing skill data");
            return false;
        };
        if !self.stats.can_pay(skill.mp_cost, skill.tp_cost) {
            return false;
        }
        let Some(parry_frames) = self.guard.start(skill, self.stats.eva) else {
            return false;
        };
        self.stats.gain(Resource::Mp, -skill.mp_cost);
        self.stats.gain(Resource::Tp, -skill.tp_cost);
        self.cooldowns.start_cooldown(slot, skill.cooldown_frames);
        self.events.push(CombatEvent::GuardStarted {
            skill: skill_id,
            parry_frames,
        });
        self.needs_refresh = true;
        true
    }

    /// Lower the guard. Returns false if not guarding.
    pub fn end_guarding(&mut self) -> bool {
        if !self.guard.end() {
            return false;
        }
        self.events.push(CombatEvent::GuardEnded);
        self.needs_refresh = true;
        true
    }

    /// Guard state.
    #[must_use]
    pub fn guard(&self) -> &GuardState {
        &self.guard
    }

    /// Whether a guard is up.
    #[must_use]
    pub fn is_guarding(&self) -> bool {
        self.guard.is_guarding()
    }

    /// Whether the precise-parry window is open.
    #[must_use]
    pub fn is_parrying(&self) -> bool {
        self.guard.is_parrying()
    }

    /// Flat guard reduction; zero unless guarding.
    #[must_use]
    pub fn flat_guard_reduction(&self) -> f64 {
        self.guard.flat_reduction()
    }

    /// Percent guard reduction; zero unless guarding.
    #[must_use]
    pub fn percent_guard_reduction(&self) -> f64 {
        self.guard.percent_reduction()
    }

    /// Dodge with the skill in the dodge slot.
    ///
    /// Only player battlers dodge. `input` is the held direction, used by
    /// directional dodges.
    pub fn start_dodge<M>(&mut self, input: Option<Direction>, movement: &M) -> bool
    where
        M: MovementControl + ?Sized,
    {
        if self.dead || !self.profile.is_player || self.dodge.is_dodging() {
            return false;
        }
        if movement.is_movement_locked(self.id) {
            return false;
        }
        let slot = CooldownSlot::Dodge;
        if self.commit_action(slot).is_none() {
            return false;
        }
        let data = self
            .equipped(slot)
            .and_then(|skill| self.data.skill(skill))
            .and_then(|skill| skill.dodge.clone())
            .unwrap_or_else(|| DodgeData {
                steps: self.config.default_dodge_steps,
                ..DodgeData::default()
            });

        let direction =
            DodgeState::resolve_direction(data.movement, movement.facing(self.id), input);
        if !self.dodge.start(direction, data.steps, data.invincible) {
            return false;
        }
        self.events.push(CombatEvent::DodgeStarted {
            direction,
            steps: data.steps,
        });
        self.needs_refresh = true;
        true
    }

    /// Stop dodging. Returns false if not dodging.
    pub fn end_dodge(&mut self) -> bool {
        if !self.dodge.end() {
            return false;
        }
        self.events.push(CombatEvent::DodgeEnded { cancelled: true });
        self.needs_refresh = true;
        true
    }

    /// Dodge state.
    #[must_use]
    pub fn dodge(&self) -> &DodgeState {
        &self.dodge
    }

    /// Whether the battler ignores collisions.
    #[must_use]
    pub fn is_invincible(&self) -> bool {
        self.dodge.is_invincible()
    }

    // ------------------------------------------------------------------------
    // Incoming hits
    // ------------------------------------------------------------------------

    /// Register an incoming hit from `attacker` carrying `threat` aggro.
    ///
    /// Interrupts casting, restarts the in-combat window, adds aggro and
    /// alerts a disengaged battler. Damage itself is the caller's concern.
    pub fn on_hit(&mut self, attacker: Option<BattlerId>, threat: i32) -> HitOutcome {
        if self.dead {
            return HitOutcome::default();
        }
        if self.dodge.is_invincible() {
            return HitOutcome {
                evaded: true,
                ..HitOutcome::default()
            };
        }

        let interrupted = self.interrupt_cast();
        self.last_hit.reset();
        if let Some(attacker) = attacker {
            self.aggro.add_or_update(attacker, threat, false);
        }
        if !self.engagement.is_engaged() {
            self.engagement.alert(attacker, &mut self.events);
        }
        self.needs_refresh = true;

        HitOutcome {
            guard: self.guard.resolve_hit(),
            evaded: false,
            interrupted,
        }
    }

    // ------------------------------------------------------------------------
    // Status effects
    // ------------------------------------------------------------------------

    /// Apply stacks of a state. Returns the stack count, or `None` if the
    /// state is undefined or the battler is dead.
    pub fn apply_state(
        &mut self,
        state: StateId,
        stacks: u32,
        source: Option<BattlerId>,
    ) -> Option<u32> {
        if self.dead {
            return None;
        }
        let Some(data) = self.data.state(state) else {
            warn!(battler = %self.id, state = state.raw(), "Missing state data");
            return None;
        };
        let stacks = self.status.apply(data, stacks, source, &mut self.stats);
        self.events.push(CombatEvent::StatusApplied { state, stacks });
        self.needs_refresh = true;
        Some(stacks)
    }

    /// Refresh an active state. Returns false if it is not tracked.
    pub fn refresh_state(&mut self, state: StateId, duration: Option<u32>) -> bool {
        let refreshed = self.status.refresh(state, duration);
        if refreshed {
            self.needs_refresh = true;
        }
        refreshed
    }

    /// Remove stacks from a state. Returns the stacks left.
    pub fn remove_state_stacks(&mut self, state: StateId, count: u32) -> Option<u32> {
        let left = self.status.remove_stacks(state, count)?;
        self.needs_refresh = true;
        Some(left)
    }

    /// Remove a state outright. Returns false if it was not applied.
    pub fn remove_state(&mut self, state: StateId) -> bool {
        let carried = self.stats.has_state(state);
        let tracked = self.status.remove(state, &mut self.stats).is_some();
        if carried || tracked {
            self.needs_refresh = true;
        }
        carried || tracked
    }

    /// Status tracker.
    #[must_use]
    pub fn status(&self) -> &StatusEffectTracker {
        &self.status
    }

    /// Bring a dead battler back with `hp` health.
    pub fn revive(&mut self, hp: f64) -> bool {
        if !self.dead {
            return false;
        }
        let death = self.config.death_state;
        self.status.remove(death, &mut self.stats);
        self.stats.current.hp = hp.clamp(1.0, self.stats.max.hp.max(1.0));
        self.dead = false;
        self.needs_refresh = true;
        true
    }

    // ------------------------------------------------------------------------
    // Aggro and engagement
    // ------------------------------------------------------------------------

    /// Add threat against `target`.
    pub fn add_aggro(&mut self, target: BattlerId, delta: i32, forced: bool) -> bool {
        self.aggro.add_or_update(target, delta, forced)
    }

    /// Zero threat against `target`.
    pub fn reset_aggro(&mut self, target: BattlerId, forced: bool) -> bool {
        self.aggro.reset(target, forced)
    }

    /// Zero threat against everyone but `except`.
    pub fn reset_all_aggro(&mut self, except: Option<BattlerId>, forced: bool) {
        self.aggro.reset_all(except, forced);
    }

    /// Lock or unlock the aggro table.
    pub fn set_aggro_locked(&mut self, locked: bool) {
        if locked {
            self.aggro.lock();
        } else {
            self.aggro.unlock();
        }
    }

    /// Aggro table.
    #[must_use]
    pub fn aggro(&self) -> &AggroTable {
        &self.aggro
    }

    /// Engagement state.
    #[must_use]
    pub fn engagement_state(&self) -> EngagementState {
        self.engagement.state()
    }

    /// Whether engaged.
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engagement.is_engaged()
    }

    /// Current target.
    #[must_use]
    pub fn target(&self) -> Option<BattlerId> {
        self.engagement.target()
    }

    /// Whether an alert is active.
    #[must_use]
    pub fn is_alerted(&self) -> bool {
        self.engagement.alert_state().is_alerted()
    }

    /// Distance band to the current target.
    #[must_use]
    pub fn distance_band<W>(&self, world: &W) -> Option<DistanceBand>
    where
        W: TargetLookup + ?Sized,
    {
        self.engagement.target_band(self.id, world)
    }

    /// Whether regen is reduced: a non-enemy that was hit recently or is
    /// engaged.
    #[must_use]
    pub fn is_in_combat(&self) -> bool {
        self.team != Team::Enemy && (!self.last_hit.is_complete() || self.engagement.is_engaged())
    }

    // ------------------------------------------------------------------------
    // Events and refresh
    // ------------------------------------------------------------------------

    /// Take the events raised since the last drain.
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take the events raised since the last drain, tagged with this battler.
    pub fn drain_tagged_events(&mut self) -> Vec<BattlerEvent> {
        let battler = self.id;
        let frame = self.frame;
        self.drain_events()
            .into_iter()
            .map(|event| BattlerEvent {
                battler,
                frame,
                event,
            })
            .collect()
    }

    /// Whether the UI should redraw this battler.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Clear the refresh flag.
    pub fn acknowledge_refresh(&mut self) {
        self.needs_refresh = false;
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Battler ID.
    #[must_use]
    pub fn id(&self) -> BattlerId {
        self.id
    }

    /// Allegiance.
    #[must_use]
    pub fn team(&self) -> Team {
        self.team
    }

    /// Engagement profile.
    #[must_use]
    pub fn profile(&self) -> &BattlerProfile {
        &self.profile
    }

    /// Stats.
    #[must_use]
    pub fn stats(&self) -> &CombatantStats {
        &self.stats
    }

    /// Mutable stats, for the damage pipeline.
    pub fn stats_mut(&mut self) -> &mut CombatantStats {
        &mut self.stats
    }

    /// Cooldowns.
    #[must_use]
    pub fn cooldowns(&self) -> &CooldownRegistry {
        &self.cooldowns
    }

    /// Whether death has been handled.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Frames updated so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Combat configuration.
    #[must_use]
    pub fn config(&self) -> &CombatConfig {
        &self.config
    }
}

impl fmt::Debug for BattlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BattlerContext")
            .field("id", &self.id)
            .field("team", &self.team)
            .field("name", &self.profile.name)
            .field("engagement", &self.engagement.state())
            .field("target", &self.engagement.target())
            .field("guard", &self.guard.phase())
            .field("dodging", &self.dodge.is_dodging())
            .field("dead", &self.dead)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        ComboData, ContentLibrary, EffectDuration, GuardData, RegenTerms, SkillData, StateData,
        StateRegen,
    };
    use crate::stats::ResourceTriple;
    use crate::services::NoVariables;

    const HERO: BattlerId = BattlerId::from_u128(1);
    const SLIME: BattlerId = BattlerId::from_u128(2);

    /// Nothing nearby; movement always free.
    struct Void {
        locked: bool,
    }

    impl TargetLookup for Void {
        fn nearest_opposing(&self, _seeker: BattlerId) -> Option<BattlerId> {
            None
        }

        fn distance_between(&self, _a: BattlerId, _b: BattlerId) -> Option<f32> {
            None
        }

        fn is_alive(&self, _id: BattlerId) -> bool {
            true
        }

        fn combatant_stats(&self, _id: BattlerId) -> Option<CombatantStats> {
            None
        }
    }

    impl MovementControl for Void {
        fn is_moving(&self, _id: BattlerId) -> bool {
            false
        }

        fn is_movement_locked(&self, _id: BattlerId) -> bool {
            self.locked
        }

        fn facing(&self, _id: BattlerId) -> Direction {
            Direction::Right
        }

        fn force_step(&mut self, _id: BattlerId, _direction: Direction) {}
    }

    fn library() -> ContentLibrary {
        let mut library = ContentLibrary::new();
        library.insert_skill(SkillData {
            id: SkillId::new(1),
            name: "Slash".to_string(),
            cooldown_frames: 30,
            combo: Some(ComboData {
                next: SkillId::new(2),
                frames: 10,
            }),
            ..SkillData::default()
        });
        library.insert_skill(SkillData {
            id: SkillId::new(2),
            name: "Slash II".to_string(),
            cooldown_frames: 40,
            ..SkillData::default()
        });
        library.insert_skill(SkillData {
            id: SkillId::new(3),
            name: "Buckler".to_string(),
            cooldown_frames: 30,
            mp_cost: 5.0,
            guard: Some(GuardData {
                flat_reduction: 3.0,
                percent_reduction: 25.0,
                parry_frames: 8,
                ..GuardData::default()
            }),
            ..SkillData::default()
        });
        library.insert_skill(SkillData {
            id: SkillId::new(4),
            name: "Fireball".to_string(),
            cast_frames: 20,
            mp_cost: 10.0,
            ..SkillData::default()
        });
        library.insert_skill(SkillData {
            id: SkillId::new(5),
            name: "Roll".to_string(),
            cooldown_frames: 60,
            dodge: Some(DodgeData::default()),
            ..SkillData::default()
        });
        library.insert_state(StateData {
            id: StateId::DEATH,
            name: "Knockout".to_string(),
            duration: EffectDuration::Eternal,
            ..StateData::default()
        });
        library.insert_state(StateData {
            id: StateId::new(6),
            name: "Haste".to_string(),
            duration: EffectDuration::Frames(10),
            ..StateData::default()
        });
        library.insert_state(StateData {
            id: StateId::new(7),
            name: "Bleed".to_string(),
            duration: EffectDuration::Eternal,
            regen: Some(StateRegen {
                hp: RegenTerms {
                    formula: Some("5".to_string()),
                    ..RegenTerms::default()
                },
                ..StateRegen::default()
            }),
            ..StateData::default()
        });
        library
    }

    fn hero() -> BattlerContext {
        let services = BattlerServices::new(Arc::new(library()), Arc::new(NoVariables));
        BattlerContext::new(
            HERO,
            Team::Ally,
            CombatantStats::new().with_regen(0.05, 0.0, 0.0),
            BattlerProfile::player("Hero"),
            services,
            &CombatConfig::default(),
        )
        .with_skill(CooldownSlot::MainHand, SkillId::new(1))
        .with_skill(CooldownSlot::OffHand, SkillId::new(3))
        .with_skill(CooldownSlot::Skill(0), SkillId::new(4))
        .with_skill(CooldownSlot::Dodge, SkillId::new(5))
    }

    fn run(battler: &mut BattlerContext, world: &mut Void, frames: u32) {
        for _ in 0..frames {
            battler.update(world);
        }
    }

    #[test]
    fn test_unconfigured_slot_not_ready() {
        let battler = hero();
        assert!(!battler.is_action_ready(CooldownSlot::Tool));
        assert!(battler.is_action_ready(CooldownSlot::MainHand));
    }

    #[test]
    fn test_combo_chain() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        assert_eq!(battler.commit_action(CooldownSlot::MainHand), Some(SkillId::new(1)));
        assert!(!battler.is_action_ready(CooldownSlot::MainHand));

        run(&mut battler, &mut world, 10);
        assert!(!battler.is_base_ready(CooldownSlot::MainHand));
        assert!(battler.is_combo_ready(CooldownSlot::MainHand));
        assert_eq!(
            battler.next_combo_skill(CooldownSlot::MainHand),
            Some(SkillId::new(2))
        );
        assert_eq!(battler.commit_action(CooldownSlot::MainHand), Some(SkillId::new(2)));
        assert!(!battler.is_action_ready(CooldownSlot::MainHand));

        run(&mut battler, &mut world, 40);
        assert_eq!(battler.commit_action(CooldownSlot::MainHand), Some(SkillId::new(1)));
    }

    #[test]
    fn test_modify_cooldown() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        battler.start_cooldown(CooldownSlot::MainHand, 30);
        run(&mut battler, &mut world, 30);
        assert!(battler.is_base_ready(CooldownSlot::MainHand));
        assert!(battler.modify_cooldown(CooldownSlot::MainHand, -30));
        assert!(!battler.is_base_ready(CooldownSlot::MainHand));
        assert!(!battler.modify_cooldown(CooldownSlot::Tool, 5));
    }

    #[test]
    fn test_guard_and_parry_hit() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        assert!(battler.start_guarding(CooldownSlot::OffHand));
        assert!(battler.is_parrying());
        assert_eq!(battler.flat_guard_reduction(), 3.0);

        let hit = battler.on_hit(Some(SLIME), 5);
        assert!(hit.guard.is_some());
        assert_eq!(battler.aggro().score(SLIME), 5);

        run(&mut battler, &mut world, 8);
        assert!(battler.is_guarding());
        assert!(!battler.is_parrying());

        world.locked = true;
        run(&mut battler, &mut world, 1);
        assert!(!battler.is_guarding());
        assert_eq!(battler.percent_guard_reduction(), 0.0);
    }

    #[test]
    fn test_guard_pays_cost_and_cools_down() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        assert!(battler.start_guarding(CooldownSlot::OffHand));
        assert_eq!(battler.stats().current.mp, 45.0);
        assert!(battler.end_guarding());
        assert!(!battler.start_guarding(CooldownSlot::OffHand));

        run(&mut battler, &mut world, 30);
        assert!(battler.start_guarding(CooldownSlot::OffHand));
        assert_eq!(battler.stats().current.mp, 40.0);
        assert!(battler.end_guarding());

        run(&mut battler, &mut world, 30);
        battler.stats_mut().current.mp = 4.0;
        assert!(!battler.start_guarding(CooldownSlot::OffHand));
        assert!(!battler.is_guarding());
        assert_eq!(battler.stats().current.mp, 4.0);
    }

    #[test]
    fn test_non_guard_slot_cannot_guard() {
        let mut battler = hero();
        assert!(!battler.start_guarding(CooldownSlot::MainHand));
        assert!(!battler.start_guarding(CooldownSlot::Tool));
    }

    #[test]
    fn test_cast_interrupted_by_hit() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        assert!(battler.begin_cast(SkillId::new(4)));
        run(&mut battler, &mut world, 5);
        assert_eq!(battler.cast_remaining(), 15);

        let hit = battler.on_hit(None, 0);
        assert_eq!(hit.interrupted, Some(SkillId::new(4)));
        assert!(!battler.is_casting());
        assert!(battler
            .drain_events()
            .contains(&CombatEvent::CastInterrupted { skill: SkillId::new(4) }));
    }

    #[test]
    fn test_cast_completes() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        assert!(battler.begin_cast(SkillId::new(4)));
        assert!(!battler.begin_cast(SkillId::new(4)));
        run(&mut battler, &mut world, 20);
        assert!(!battler.is_casting());
        assert!(battler
            .drain_events()
            .contains(&CombatEvent::CastCompleted { skill: SkillId::new(4) }));
        assert!(!battler.begin_cast(SkillId::new(1)));
    }

    #[test]
    fn test_player_dodge() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        assert!(battler.start_dodge(None, &world));
        assert!(battler.is_invincible());
        assert_eq!(battler.dodge().direction(), Some(Direction::Right));
        assert!(battler.on_hit(Some(SLIME), 10).evaded);

        run(&mut battler, &mut world, 3);
        assert!(!battler.dodge().is_dodging());
        assert!(!battler.is_invincible());
        assert!(!battler.start_dodge(None, &world));
    }

    #[test]
    fn test_in_combat_reduces_regen() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        battler.stats_mut().current.hp = 50.0;

        run(&mut battler, &mut world, 15);
        assert_eq!(battler.stats().current.hp, 50.25);

        battler.on_hit(Some(SLIME), 1);
        assert!(battler.is_in_combat());
        run(&mut battler, &mut world, 15);
        assert!((battler.stats().current.hp - 50.3).abs() < 1e-9);
    }

    fn regen_deltas(events: &[CombatEvent]) -> Vec<ResourceTriple> {
        events
            .iter()
            .filter_map(|event| match event {
                CombatEvent::RegenApplied { delta } => Some(*delta),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_regen_event_only_on_nonzero_tick() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        battler.stats_mut().current.hp = 50.0;

        run(&mut battler, &mut world, 14);
        assert!(regen_deltas(&battler.drain_events()).is_empty());

        run(&mut battler, &mut world, 1);
        let deltas = regen_deltas(&battler.drain_events());
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].hp, 0.25);
        assert_eq!(deltas[0].mp, 0.0);

        // Full HP clamps the tick to nothing
        let mut full = hero();
        run(&mut full, &mut world, 15);
        assert_eq!(full.stats().current.hp, 100.0);
        assert!(regen_deltas(&full.drain_events()).is_empty());
    }

    #[test]
    fn test_state_drain_cancelling_regen_is_silent() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        battler.stats_mut().current.hp = 50.0;
        assert_eq!(battler.apply_state(StateId::new(7), 1, None), Some(1));
        battler.drain_events();

        run(&mut battler, &mut world, 30);
        assert_eq!(battler.stats().current.hp, 50.0);
        assert!(regen_deltas(&battler.drain_events()).is_empty());
    }

    #[test]
    fn test_undrained_events_are_capped() {
        let services = BattlerServices::new(Arc::new(library()), Arc::new(NoVariables));
        let mut battler = BattlerContext::new(
            HERO,
            Team::Ally,
            CombatantStats::new().with_regen(0.05, 0.0, 0.0),
            BattlerProfile::player("Hero"),
            services,
            &CombatConfig::default().with_max_pending_events(16),
        );
        let mut world = Void { locked: false };
        battler.stats_mut().current.hp = 50.0;

        run(&mut battler, &mut world, 15 * 40);
        let events = battler.drain_events();
        assert_eq!(events.len(), 16);
        assert_eq!(regen_deltas(&events).len(), 16);
        assert_eq!(battler.stats().current.hp, 60.0);
    }

    #[test]
    fn test_death_ordering() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        run(&mut battler, &mut world, 14);
        battler.stats_mut().current.hp = 0.0;
        battler.drain_events();

        run(&mut battler, &mut world, 1);
        assert!(battler.is_dead());
        assert_eq!(battler.stats().current.hp, 0.0);
        assert!(battler.stats().has_state(StateId::DEATH));
        let events = battler.drain_events();
        assert_eq!(events.last(), Some(&CombatEvent::Died));
        assert!(!events
            .iter()
            .any(|e| matches!(e, CombatEvent::RegenApplied { .. })));

        let frame = battler.frame();
        run(&mut battler, &mut world, 10);
        assert_eq!(battler.frame(), frame);

        assert!(battler.revive(40.0));
        assert!(!battler.stats().has_state(StateId::DEATH));
    }

    #[test]
    fn test_status_and_refresh_flag() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        assert_eq!(battler.apply_state(StateId::new(6), 1, Some(SLIME)), Some(1));
        assert!(battler.needs_refresh());
        battler.acknowledge_refresh();
        assert!(!battler.needs_refresh());
        assert_eq!(battler.apply_state(StateId::new(99), 1, None), None);

        run(&mut battler, &mut world, 10);
        assert!(!battler.stats().has_state(StateId::new(6)));
        assert!(battler.needs_refresh());
    }

    #[test]
    fn test_durable_round_trip_rebuilds_session() {
        let mut battler = hero();
        battler.apply_state(StateId::new(6), 1, None);
        battler.add_aggro(SLIME, 30, false);

        let snapshot = battler.durable();
        let services = BattlerServices::new(Arc::new(library()), Arc::new(NoVariables));
        let mut restored =
            BattlerContext::from_durable(snapshot, services, &CombatConfig::default());
        assert_eq!(restored.equipped(CooldownSlot::OffHand), Some(SkillId::new(3)));
        assert!(restored.aggro().is_empty());
        assert!(restored.status().is_empty());
        assert!(restored.stats().has_state(StateId::new(6)));

        let mut world = Void { locked: false };
        run(&mut restored, &mut world, 15);
        assert!(!restored.stats().has_state(StateId::new(6)));
        assert!(restored
            .drain_events()
            .contains(&CombatEvent::StatusPurged { state: StateId::new(6) }));
    }

    struct CountingHook {
        calls: Arc<std::sync::atomic::AtomicU32>,
    }

    impl BattlerHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        fn after_update(&mut self, battler: &mut BattlerContext) {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            battler.add_aggro(SLIME, 1, true);
        }
    }

    #[test]
    fn test_hooks_run_after_update() {
        let mut battler = hero();
        let mut world = Void { locked: false };
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        battler.add_hook(Box::new(CountingHook {
            calls: Arc::clone(&calls),
        }));
        run(&mut battler, &mut world, 3);
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 3);
        assert_eq!(battler.aggro().score(SLIME), 3);
    }
}
