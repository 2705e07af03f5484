//! Collaborator interfaces consumed by the combat core.
//!
//! Static services (content data, game variables) are handed to a battler
//! when it is built. The live scene is passed to every frame update as a
//! [`CombatWorld`], so battlers never reach into global state.

use ahash::AHashMap;
use skirmish_common::{BattlerId, Direction, SkillId, StateId};

use crate::data::{SkillData, StateData};
use crate::stats::CombatantStats;

/// Spatial and liveness queries against the active scene.
pub trait TargetLookup {
    /// Nearest living battler opposed to `seeker`, if any.
    fn nearest_opposing(&self, seeker: BattlerId) -> Option<BattlerId>;

    /// Distance between two battlers, `None` if either is gone.
    fn distance_between(&self, a: BattlerId, b: BattlerId) -> Option<f32>;

    /// Whether `id` is present and alive.
    fn is_alive(&self, id: BattlerId) -> bool;

    /// Snapshot of another battler's stats (formula sources).
    fn combatant_stats(&self, id: BattlerId) -> Option<CombatantStats>;
}

/// Character movement owned by the scene.
pub trait MovementControl {
    /// Whether the character is partway through a step.
    fn is_moving(&self, id: BattlerId) -> bool;

    /// Whether the character's movement is forcibly restricted.
    fn is_movement_locked(&self, id: BattlerId) -> bool;

    /// Direction the character faces.
    fn facing(&self, id: BattlerId) -> Direction;

    /// Force one straight-line step.
    fn force_step(&mut self, id: BattlerId, direction: Direction);
}

/// Everything a battler needs from the scene during its frame update.
pub trait CombatWorld: TargetLookup + MovementControl {}

impl<T: TargetLookup + MovementControl + ?Sized> CombatWorld for T {}

/// Skill and state definitions.
pub trait SkillDataProvider: Send + Sync {
    /// Look up a skill.
    fn skill(&self, id: SkillId) -> Option<&SkillData>;

    /// Look up a state.
    fn state(&self, id: StateId) -> Option<&StateData>;
}

/// Global game variables readable from formulas as `v[n]`.
pub trait VariableStore: Send + Sync {
    /// Value of variable `index`; unset variables read as zero.
    fn variable(&self, index: u32) -> f64;
}

/// A variable store where every variable is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl VariableStore for NoVariables {
    fn variable(&self, _index: u32) -> f64 {
        0.0
    }
}

impl VariableStore for AHashMap<u32, f64> {
    fn variable(&self, index: u32) -> f64 {
        self.get(&index).copied().unwrap_or(0.0)
    }
}
