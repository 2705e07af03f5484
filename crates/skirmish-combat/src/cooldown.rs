//! Per-slot action readiness.
//!
//! This module provides:
//! - Action slots (main-hand, off-hand, skill slots, tool, dodge)
//! - Base cooldowns that gate each slot
//! - Combo windows that let a chained follow-up bypass the base gate

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use skirmish_common::SkillId;

use crate::timer::FrameTimer;

// ============================================================================
// Slots
// ============================================================================

/// A named action binding with its own readiness timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownSlot {
    /// Primary weapon attack.
    MainHand,
    /// Secondary weapon / shield (guard skills live here).
    OffHand,
    /// Numbered skill slot.
    Skill(u8),
    /// Usable tool or item.
    Tool,
    /// Dodge skill.
    Dodge,
}

impl std::fmt::Display for CooldownSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MainHand => write!(f, "main-hand"),
            Self::OffHand => write!(f, "off-hand"),
            Self::Skill(n) => write!(f, "skill-{n}"),
            Self::Tool => write!(f, "tool"),
            Self::Dodge => write!(f, "dodge"),
        }
    }
}

// ============================================================================
// Cooldown
// ============================================================================

/// Readiness state for a single slot.
#[derive(Debug, Default)]
pub struct Cooldown {
    base: FrameTimer,
    combo: Option<FrameTimer>,
    combo_next: Option<SkillId>,
}

impl Cooldown {
    /// A cooldown that is ready immediately.
    #[must_use]
    pub fn ready() -> Self {
        Self::default()
    }

    /// Restart the base cooldown. Any open combo window is kept.
    pub fn start(&mut self, duration: u32) {
        self.base.initialize(duration, true);
    }

    /// Open a combo window that becomes ready after `duration` frames.
    pub fn set_combo_window(&mut self, duration: u32, next: Option<SkillId>) {
        self.combo = Some(FrameTimer::new(duration));
        self.combo_next = next;
    }

    /// Drop the combo window.
    pub fn clear_combo(&mut self) {
        self.combo = None;
        self.combo_next = None;
    }

    /// Shift elapsed base frames by `delta` (positive moves toward ready).
    pub fn modify(&mut self, delta: i64) {
        self.base.modify(delta);
    }

    /// Advance one frame. The combo chain ends once the base cooldown is ready.
    pub fn update(&mut self) {
        self.base.tick();
        if let Some(combo) = self.combo.as_mut() {
            combo.tick();
        }
        if self.base.is_complete() {
            self.clear_combo();
        }
    }

    /// Whether the base cooldown has elapsed.
    #[must_use]
    pub fn is_base_ready(&self) -> bool {
        self.base.is_complete()
    }

    /// Whether a combo window is open and ready.
    #[must_use]
    pub fn is_combo_ready(&self) -> bool {
        self.combo.as_ref().is_some_and(FrameTimer::is_complete)
    }

    /// Next skill of the combo chain, if a window is open.
    #[must_use]
    pub fn combo_next(&self) -> Option<SkillId> {
        self.combo.as_ref().and(self.combo_next)
    }

    /// Frames elapsed on the base cooldown.
    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.base.current()
    }

    /// Base cooldown length in frames.
    #[must_use]
    pub fn duration(&self) -> u32 {
        self.base.max()
    }

    /// Frames left on the base cooldown.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.base.remaining()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// All cooldowns owned by one battler.
#[derive(Debug, Default)]
pub struct CooldownRegistry {
    slots: AHashMap<CooldownSlot, Cooldown>,
}

impl CooldownRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the given slots configured and ready.
    #[must_use]
    pub fn with_slots(slots: impl IntoIterator<Item = CooldownSlot>) -> Self {
        let mut registry = Self::new();
        for slot in slots {
            registry.register(slot);
        }
        registry
    }

    /// Configure a slot as ready if it is not already present.
    pub fn register(&mut self, slot: CooldownSlot) {
        self.slots.entry(slot).or_insert_with(Cooldown::ready);
    }

    /// Whether the slot is configured.
    #[must_use]
    pub fn contains(&self, slot: CooldownSlot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Look up a slot.
    #[must_use]
    pub fn get(&self, slot: CooldownSlot) -> Option<&Cooldown> {
        self.slots.get(&slot)
    }

    /// Base readiness; false for unconfigured slots.
    #[must_use]
    pub fn is_base_ready(&self, slot: CooldownSlot) -> bool {
        self.slots.get(&slot).is_some_and(Cooldown::is_base_ready)
    }

    /// Combo readiness; false for unconfigured slots.
    #[must_use]
    pub fn is_combo_ready(&self, slot: CooldownSlot) -> bool {
        self.slots.get(&slot).is_some_and(Cooldown::is_combo_ready)
    }

    /// Start (or restart) a slot's base cooldown, configuring it if needed.
    pub fn start_cooldown(&mut self, slot: CooldownSlot, duration: u32) {
        self.slots
            .entry(slot)
            .or_insert_with(Cooldown::ready)
            .start(duration);
    }

    /// Shift a slot's elapsed frames. Returns false if the slot is unconfigured.
    pub fn modify(&mut self, slot: CooldownSlot, delta_frames: i64) -> bool {
        match self.slots.get_mut(&slot) {
            Some(cooldown) => {
                cooldown.modify(delta_frames);
                true
            },
            None => false,
        }
    }

    /// Open a combo window on a slot. Returns false if the slot is unconfigured.
    pub fn set_combo_window(
        &mut self,
        slot: CooldownSlot,
        duration: u32,
        next: Option<SkillId>,
    ) -> bool {
        match self.slots.get_mut(&slot) {
            Some(cooldown) => {
                cooldown.set_combo_window(duration, next);
                true
            },
            None => false,
        }
    }

    /// End a slot's combo chain. Returns false if the slot is unconfigured.
    pub fn clear_combo(&mut self, slot: CooldownSlot) -> bool {
        match self.slots.get_mut(&slot) {
            Some(cooldown) => {
                cooldown.clear_combo();
                true
            },
            None => false,
        }
    }

    /// Next combo skill for a slot.
    #[must_use]
    pub fn next_combo_skill(&self, slot: CooldownSlot) -> Option<SkillId> {
        self.slots.get(&slot).and_then(Cooldown::combo_next)
    }

    /// Make every configured slot ready and drop all combo windows.
    pub fn reset_all(&mut self) {
        for cooldown in self.slots.values_mut() {
            *cooldown = Cooldown::ready();
        }
    }

    /// Advance every cooldown one frame.
    pub fn update(&mut self) {
        for cooldown in self.slots.values_mut() {
            cooldown.update();
        }
    }

    /// Iterate configured slots.
    pub fn slots(&self) -> impl Iterator<Item = (&CooldownSlot, &Cooldown)> {
        self.slots.iter()
    }
}
