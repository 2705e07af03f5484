//! Durable combatant statistics.
//!
//! This module provides:
//! - Resource pools (HP, MP, TP) with clamped gain
//! - Base parameters read by regen formulas
//! - Regeneration rates and the REC / EVA multipliers
//! - The set of state flags the combatant carries
//!
//! These values survive save/load; the timers that act on them do not.

use serde::{Deserialize, Serialize};
use skirmish_common::StateId;

// ============================================================================
// Resources
// ============================================================================

/// A regenerating combat resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Health points.
    Hp,
    /// Magic points.
    Mp,
    /// Technique points.
    Tp,
}

impl Resource {
    /// All resources, in processing order.
    pub const ALL: [Self; 3] = [Self::Hp, Self::Mp, Self::Tp];
}

/// Per-resource value triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceTriple {
    /// HP component.
    pub hp: f64,
    /// MP component.
    pub mp: f64,
    /// TP component.
    pub tp: f64,
}

impl ResourceTriple {
    /// Read one component.
    #[must_use]
    pub fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Hp => self.hp,
            Resource::Mp => self.mp,
            Resource::Tp => self.tp,
        }
    }

    /// Mutable access to one component.
    pub fn get_mut(&mut self, resource: Resource) -> &mut f64 {
        match resource {
            Resource::Hp => &mut self.hp,
            Resource::Mp => &mut self.mp,
            Resource::Tp => &mut self.tp,
        }
    }

    /// Whether every component is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.hp == 0.0 && self.mp == 0.0 && self.tp == 0.0
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Base battle parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseParams {
    /// Attack.
    pub atk: f64,
    /// Defense.
    pub def: f64,
    /// Magic attack.
    pub mat: f64,
    /// Magic defense.
    pub mdf: f64,
    /// Agility.
    pub agi: f64,
    /// Luck.
    pub luk: f64,
}

impl Default for BaseParams {
    fn default() -> Self {
        Self {
            atk: 10.0,
            def: 10.0,
            mat: 10.0,
            mdf: 10.0,
            agi: 10.0,
            luk: 10.0,
        }
    }
}

// ============================================================================
// Combatant Stats
// ============================================================================

/// Long-lived combat statistics for one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatantStats {
    /// Character level.
    pub level: u32,
    /// Current resources.
    pub current: ResourceTriple,
    /// Maximum resources.
    pub max: ResourceTriple,
    /// Regeneration rate per resource, as a fraction (0.05 = 5%).
    pub regen_rates: ResourceTriple,
    /// Recovery effect multiplier.
    pub rec: f64,
    /// Evasion rate (0.0-1.0); also extends parry windows.
    pub eva: f64,
    /// Base parameters.
    pub params: BaseParams,
    /// State flags currently carried.
    states: Vec<StateId>,
}

impl Default for CombatantStats {
    fn default() -> Self {
        Self {
            level: 1,
            current: ResourceTriple {
                hp: 100.0,
                mp: 50.0,
                tp: 0.0,
            },
            max: ResourceTriple {
                hp: 100.0,
                mp: 50.0,
                tp: 100.0,
            },
            regen_rates: ResourceTriple::default(),
            rec: 1.0,
            eva: 0.0,
            params: BaseParams::default(),
            states: Vec::new(),
        }
    }
}

impl CombatantStats {
    /// Create stats with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set current and maximum HP.
    #[must_use]
    pub fn with_hp(mut self, hp: f64) -> Self {
        self.current.hp = hp;
        self.max.hp = hp;
        self
    }

    /// Set current and maximum MP.
    #[must_use]
    pub fn with_mp(mut self, mp: f64) -> Self {
        self.current.mp = mp;
        self.max.mp = mp;
        self
    }

    /// Set current TP.
    #[must_use]
    pub fn with_tp(mut self, tp: f64) -> Self {
        self.current.tp = tp.clamp(0.0, self.max.tp);
        self
    }

    /// Set HP / MP / TP regeneration rates.
    #[must_use]
    pub fn with_regen(mut self, hrg: f64, mrg: f64, trg: f64) -> Self {
        self.regen_rates = ResourceTriple {
            hp: hrg,
            mp: mrg,
            tp: trg,
        };
        self
    }

    /// Set the recovery multiplier.
    #[must_use]
    pub fn with_rec(mut self, rec: f64) -> Self {
        self.rec = rec.max(0.0);
        self
    }

    /// Set the evasion rate.
    #[must_use]
    pub fn with_eva(mut self, eva: f64) -> Self {
        self.eva = eva.clamp(0.0, 1.0);
        self
    }

    /// Current value of a resource.
    #[must_use]
    pub fn resource(&self, resource: Resource) -> f64 {
        self.current.get(resource)
    }

    /// Maximum value of a resource.
    #[must_use]
    pub fn max_resource(&self, resource: Resource) -> f64 {
        self.max.get(resource)
    }

    /// Add `amount` (may be negative) to a resource, clamped to `[0, max]`.
    /// Returns the change actually applied.
    pub fn gain(&mut self, resource: Resource, amount: f64) -> f64 {
        let max = self.max.get(resource);
        let value = self.current.get_mut(resource);
        let before = *value;
        *value = (before + amount).clamp(0.0, max);
        *value - before
    }

    /// Whether the combatant can pay `mp` and `tp`.
    #[must_use]
    pub fn can_pay(&self, mp: f64, tp: f64) -> bool {
        self.current.mp >= mp && self.current.tp >= tp
    }

    /// Whether HP has run out.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current.hp <= 0.0
    }

    /// Whether the combatant carries a state flag.
    #[must_use]
    pub fn has_state(&self, state: StateId) -> bool {
        self.states.contains(&state)
    }

    /// Add a state flag. Returns false if already carried.
    pub fn add_state(&mut self, state: StateId) -> bool {
        if self.has_state(state) {
            return false;
        }
        self.states.push(state);
        true
    }

    /// Remove a state flag. Returns false if not carried.
    pub fn remove_state(&mut self, state: StateId) -> bool {
        let before = self.states.len();
        self.states.retain(|s| *s != state);
        self.states.len() != before
    }

    /// State flags currently carried.
    #[must_use]
    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    /// Look up a named value for formula evaluation.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<f64> {
        let value = match name {
            "hp" => self.current.hp,
            "mp" => self.current.mp,
            "tp" => self.current.tp,
            "mhp" => self.max.hp,
            "mmp" => self.max.mp,
            "mtp" | "maxTp" => self.max.tp,
            "atk" => self.params.atk,
            "def" => self.params.def,
            "mat" => self.params.mat,
            "mdf" => self.params.mdf,
            "agi" => self.params.agi,
            "luk" => self.params.luk,
            "hrg" => self.regen_rates.hp,
            "mrg" => self.regen_rates.mp,
            "trg" => self.regen_rates.tp,
            "rec" => self.rec,
            "eva" => self.eva,
            "level" => f64::from(self.level),
            "hpRate" => {
                if self.max.hp > 0.0 {
                    self.current.hp / self.max.hp
                } else {
                    0.0
                }
            },
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_clamps() {
        let mut stats = CombatantStats::new().with_hp(50.0);
        assert_eq!(stats.gain(Resource::Hp, 10.0), 0.0);
        assert_eq!(stats.gain(Resource::Hp, -20.0), -20.0);
        assert_eq!(stats.gain(Resource::Hp, -100.0), -30.0);
        assert!(stats.is_dead());
    }

    #[test]
    fn test_state_flags() {
        let mut stats = CombatantStats::new();
        let poison = StateId::new(4);
        assert!(stats.add_state(poison));
        assert!(!stats.add_state(poison));
        assert!(stats.has_state(poison));
        assert!(stats.remove_state(poison));
        assert!(!stats.remove_state(poison));
    }

    #[test]
    fn test_lookup() {
        let stats = CombatantStats::new().with_hp(80.0).with_regen(0.05, 0.0, 0.0);
        assert_eq!(stats.lookup("mhp"), Some(80.0));
        assert_eq!(stats.lookup("hrg"), Some(0.05));
        assert_eq!(stats.lookup("hpRate"), Some(1.0));
        assert_eq!(stats.lookup("nope"), None);
    }
}
