//! Periodic HP / MP / TP regeneration.
//!
//! This module provides:
//! - Natural regen from the combatant's regen rates, reduced in combat
//! - State regen from flat, percent-of-max and formula terms
//! - Purging of state flags the tracker no longer knows about
//!
//! Regen runs every [`REGEN_INTERVAL_FRAMES`] frames. Values authored "per
//! five seconds" are divided by [`STATE_REGEN_DIVISOR`] to get one tick.

use skirmish_common::{BattlerId, StateId};
use tracing::{debug, warn};

use crate::config::{IN_COMBAT_REGEN_FACTOR, REGEN_INTERVAL_FRAMES, STATE_REGEN_DIVISOR};
use crate::events::CombatEvent;
use crate::formula::{FormulaCache, FormulaScope};
use crate::services::{SkillDataProvider, TargetLookup, VariableStore};
use crate::stats::{CombatantStats, Resource, ResourceTriple};
use crate::status::{StatusEffectInstance, StatusEffectTracker};
use crate::timer::FrameTimer;

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Natural regen for one tick.
///
/// HP and MP drop to a fifth while `reduced`; TP is never reduced.
#[must_use]
pub fn natural_regen(stats: &CombatantStats, reduced: bool) -> ResourceTriple {
    let mut delta = ResourceTriple::default();
    for resource in Resource::ALL {
        let mut amount = stats.regen_rates.get(resource) * 100.0 * 0.05 * stats.rec;
        if reduced && resource != Resource::Tp {
            amount *= IN_COMBAT_REGEN_FACTOR;
        }
        *delta.get_mut(resource) = round2(amount);
    }
    delta
}

/// Read-only services state regen needs.
#[derive(Clone, Copy)]
pub struct RegenServices<'a> {
    /// State definitions.
    pub data: &'a dyn SkillDataProvider,
    /// Game variables for `v[n]`.
    pub variables: &'a dyn VariableStore,
}

/// Formula scope for one state's regen terms.
///
/// `a` is the battler that applied the state, `b` the afflicted battler and
/// `s` the state instance.
struct RegenScope<'a> {
    source: &'a CombatantStats,
    target: &'a CombatantStats,
    instance: &'a StatusEffectInstance,
    variables: &'a dyn VariableStore,
}

impl FormulaScope for RegenScope<'_> {
    fn resolve(&self, path: &[String]) -> Option<f64> {
        match path {
            [owner, name] => match owner.as_str() {
                "a" => self.source.lookup(name),
                "b" => self.target.lookup(name),
                "s" => match name.as_str() {
                    "id" => Some(f64::from(self.instance.state().raw())),
                    "stacks" => Some(f64::from(self.instance.stacks())),
                    "remaining" => Some(f64::from(self.instance.remaining())),
                    "duration" => Some(f64::from(self.instance.base_duration().frames())),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        }
    }

    fn variable(&self, index: u32) -> f64 {
        self.variables.variable(index)
    }
}

/// Regen cadence and formula cache of one battler.
#[derive(Debug)]
pub struct RegenProcessor {
    timer: FrameTimer,
    formulas: FormulaCache,
}

impl Default for RegenProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RegenProcessor {
    /// Create a processor whose first tick lands after one interval.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timer: FrameTimer::new(REGEN_INTERVAL_FRAMES),
            formulas: FormulaCache::new(),
        }
    }

    /// Advance the cadence timer. Returns true on regen frames.
    pub fn tick(&mut self) -> bool {
        if self.timer.tick() {
            self.timer.reset();
            true
        } else {
            false
        }
    }

    /// Frames until the next regen tick.
    #[must_use]
    pub fn frames_until_tick(&self) -> u32 {
        self.timer.remaining()
    }

    /// Compute and apply one regen tick. Returns the change applied.
    pub fn regenerate<W>(
        &mut self,
        id: BattlerId,
        stats: &mut CombatantStats,
        tracker: &StatusEffectTracker,
        services: RegenServices<'_>,
        world: &W,
        reduced: bool,
    ) -> ResourceTriple
    where
        W: TargetLookup + ?Sized,
    {
        let natural = natural_regen(stats, reduced);
        let from_states = self.state_regen(id, stats, tracker, services, world);

        let mut applied = ResourceTriple::default();
        for resource in Resource::ALL {
            let amount = natural.get(resource) + from_states.get(resource);
            if amount != 0.0 {
                *applied.get_mut(resource) = stats.gain(resource, amount);
            }
        }
        applied
    }

    /// Summed state regen for one tick, before it is applied.
    pub fn state_regen<W>(
        &mut self,
        id: BattlerId,
        stats: &CombatantStats,
        tracker: &StatusEffectTracker,
        services: RegenServices<'_>,
        world: &W,
    ) -> ResourceTriple
    where
        W: TargetLookup + ?Sized,
    {
        let mut total = ResourceTriple::default();

        for instance in tracker.iter().filter(|i| stats.has_state(i.state())) {
            let Some(data) = services.data.state(instance.state()) else {
                warn!(state = instance.state().raw(), "Missing state data for regen");
                continue;
            };
            let Some(regen) = data.regen.as_ref() else {
                continue;
            };

            let source_stats = instance
                .source()
                .filter(|source| *source != id)
                .and_then(|source| world.combatant_stats(source));
            let scope = RegenScope {
                source: source_stats.as_ref().unwrap_or(stats),
                target: stats,
                instance,
                variables: services.variables,
            };

            let static_terms = regen.static_terms(&stats.max);
            let stacks = f64::from(instance.stacks());
            for resource in Resource::ALL {
                let mut term = static_terms.get(resource);
                if let Some(source) = regen.terms(resource).formula.as_deref() {
                    term -= self.evaluate(instance.state(), source, &scope);
                }
                *total.get_mut(resource) += term * stacks;
            }
        }

        for resource in Resource::ALL {
            *total.get_mut(resource) *= stats.rec / STATE_REGEN_DIVISOR;
        }
        total
    }

    fn evaluate(&mut self, state: StateId, source: &str, scope: &RegenScope<'_>) -> f64 {
        match self
            .formulas
            .get_or_parse(source)
            .and_then(|formula| formula.evaluate(scope))
        {
            Ok(value) => value,
            Err(error) => {
                warn!(state = state.raw(), expression = source, %error, "Regen formula failed");
                0.0
            },
        }
    }
}

/// Drop state flags that have no live tracker instance.
///
/// This happens after restoring a combatant whose flags outlived the
/// session that tracked them. The death state is left alone.
pub fn purge_untracked_states(
    stats: &mut CombatantStats,
    tracker: &StatusEffectTracker,
    events: &mut Vec<CombatEvent>,
) {
    let stale: Vec<StateId> = stats
        .states()
        .iter()
        .copied()
        .filter(|state| *state != tracker.death_state() && !tracker.is_tracked(*state))
        .collect();
    for state in stale {
        debug!(state = state.raw(), "Purged untracked state");
        stats.remove_state(state);
        events.push(CombatEvent::StatusPurged { state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombatConfig;
    use crate::data::{ContentLibrary, EffectDuration, RegenTerms, StateData, StateRegen};
    use crate::services::NoVariables;
    use ahash::AHashMap;

    struct Empty;

    impl TargetLookup for Empty {
        fn nearest_opposing(&self, _seeker: BattlerId) -> Option<BattlerId> {
            None
        }

        fn distance_between(&self, _a: BattlerId, _b: BattlerId) -> Option<f32> {
            None
        }

        fn is_alive(&self, _id: BattlerId) -> bool {
            false
        }

        fn combatant_stats(&self, _id: BattlerId) -> Option<CombatantStats> {
            None
        }
    }

    const ID: BattlerId = BattlerId::from_u128(1);

    fn state(id: u32, terms: RegenTerms) -> StateData {
        StateData {
            id: StateId::new(id),
            duration: EffectDuration::Eternal,
            max_stacks: 5,
            regen: Some(StateRegen {
                hp: terms,
                ..StateRegen::default()
            }),
            ..StateData::default()
        }
    }

    #[test]
    fn test_natural_regen_rounding() {
        let stats = CombatantStats::new().with_regen(0.05, 0.05, 0.05);
        let delta = natural_regen(&stats, false);
        assert_eq!(delta.hp, 0.25);
        assert_eq!(delta.mp, 0.25);

        let reduced = natural_regen(&stats, true);
        assert_eq!(reduced.hp, 0.05);
        assert_eq!(reduced.mp, 0.05);
        assert_eq!(reduced.tp, 0.25);
    }

    #[test]
    fn test_regen_once_per_interval() {
        let mut processor = RegenProcessor::new();
        let mut stats = CombatantStats::new().with_hp(100.0).with_regen(0.05, 0.0, 0.0);
        stats.current.hp = 50.0;
        let tracker = StatusEffectTracker::default();
        let library = ContentLibrary::new();
        let services = RegenServices {
            data: &library,
            variables: &NoVariables,
        };

        let mut history = Vec::new();
        for _ in 0..30 {
            let before = stats.current.hp;
            if processor.tick() {
                processor.regenerate(ID, &mut stats, &tracker, services, &Empty, false);
            }
            history.push(stats.current.hp - before);
        }
        let ticks: Vec<usize> = history
            .iter()
            .enumerate()
            .filter(|(_, d)| **d != 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(ticks, vec![14, 29]);
        assert_eq!(history[14], 0.25);
        assert_eq!(stats.current.hp, 50.5);
    }

    #[test]
    fn test_state_regen_terms() {
        let mut library = ContentLibrary::new();
        let data = state(
            7,
            RegenTerms {
                flat: 10.0,
                percent: 10.0,
                formula: Some("b.mhp * 0.05".to_string()),
            },
        );
        library.insert_state(data.clone());

        let mut stats = CombatantStats::new().with_hp(200.0);
        let mut tracker = StatusEffectTracker::default();
        tracker.apply(&data, 2, None, &mut stats);

        let mut processor = RegenProcessor::new();
        let services = RegenServices {
            data: &library,
            variables: &NoVariables,
        };
        let total = processor.state_regen(ID, &stats, &tracker, services, &Empty);
        // (10 + 20 - 10) * 2 stacks * rec 1.0 / 20
        assert_eq!(total.hp, 2.0);
        assert_eq!(total.mp, 0.0);
    }

    #[test]
    fn test_failed_formula_contributes_zero() {
        let mut library = ContentLibrary::new();
        let bad = state(
            8,
            RegenTerms {
                flat: 20.0,
                percent: 0.0,
                formula: Some("b.hp / 0".to_string()),
            },
        );
        let unknown = state(
            9,
            RegenTerms {
                flat: 0.0,
                percent: 0.0,
                formula: Some("c.hp".to_string()),
            },
        );
        library.insert_state(bad.clone());
        library.insert_state(unknown.clone());

        let mut stats = CombatantStats::new();
        let mut tracker = StatusEffectTracker::default();
        tracker.apply(&bad, 1, None, &mut stats);
        tracker.apply(&unknown, 1, None, &mut stats);

        let mut processor = RegenProcessor::new();
        let services = RegenServices {
            data: &library,
            variables: &NoVariables,
        };
        let total = processor.state_regen(ID, &stats, &tracker, services, &Empty);
        assert_eq!(total.hp, 1.0);
    }

    #[test]
    fn test_formula_reads_variables() {
        let mut library = ContentLibrary::new();
        let drain = state(
            10,
            RegenTerms {
                flat: 0.0,
                percent: 0.0,
                formula: Some("v[3] * s.stacks".to_string()),
            },
        );
        library.insert_state(drain.clone());
        let mut variables: AHashMap<u32, f64> = AHashMap::new();
        variables.insert(3, 10.0);

        let mut stats = CombatantStats::new();
        let mut tracker = StatusEffectTracker::default();
        tracker.apply(&drain, 1, None, &mut stats);

        let mut processor = RegenProcessor::new();
        let services = RegenServices {
            data: &library,
            variables: &variables,
        };
        let total = processor.state_regen(ID, &stats, &tracker, services, &Empty);
        assert_eq!(total.hp, -0.5);
    }

    #[test]
    fn test_purge_untracked_states() {
        let mut stats = CombatantStats::new();
        stats.add_state(StateId::new(12));
        stats.add_state(StateId::DEATH);
        let tracker = StatusEffectTracker::new(&CombatConfig::default());
        let mut events = Vec::new();

        purge_untracked_states(&mut stats, &tracker, &mut events);
        assert!(!stats.has_state(StateId::new(12)));
        assert!(stats.has_state(StateId::DEATH));
        assert_eq!(
            events,
            vec![CombatEvent::StatusPurged {
                state: StateId::new(12)
            }]
        );
    }
}
