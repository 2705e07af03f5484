//! Guarding and the precise-parry window.
//!
//! A guard captures its mitigation values and counter lists from the guard
//! skill when it starts. If the skill defines a parry window, the battler
//! parries for the first frames of the guard; evasion lengthens that window.

use skirmish_common::SkillId;

use crate::data::SkillData;
use crate::timer::FrameTimer;

/// Guard phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardPhase {
    /// Not guarding.
    #[default]
    Idle,
    /// Guarding, parry window closed.
    Guarding,
    /// Guarding inside the precise-parry window.
    Parrying,
}

/// How an incoming hit met the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Landed inside the parry window.
    Parried,
    /// Landed on a plain guard.
    Guarded,
}

/// Mitigation and counter eligibility for one incoming hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardResolution {
    /// Parry or plain guard.
    pub outcome: GuardOutcome,
    /// Flat reduction to apply.
    pub flat_reduction: f64,
    /// Percent reduction to apply (0-100).
    pub percent_reduction: f64,
    /// Skills eligible to counter.
    pub counters: Vec<SkillId>,
}

/// Result of a guard frame update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardUpdate {
    /// Nothing changed.
    Unchanged,
    /// The parry window just closed; still guarding.
    ParryClosed,
    /// The guard was broken by a movement lock.
    Ended,
}

/// Guard state of one battler.
#[derive(Debug, Default)]
pub struct GuardState {
    skill: Option<SkillId>,
    flat_reduction: f64,
    percent_reduction: f64,
    counter_guard: Vec<SkillId>,
    counter_parry: Vec<SkillId>,
    parry: FrameTimer,
}

impl GuardState {
    /// Create an idle guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parry window length for a base window and an evasion rate.
    #[must_use]
    pub fn parry_window(base_frames: u32, eva: f64) -> u32 {
        let bonus = (eva.max(0.0) * f64::from(base_frames)).floor() as u32;
        base_frames.saturating_add(bonus)
    }

    /// Start guarding with `skill`.
    ///
    /// Returns the parry window length, or `None` if the skill cannot guard.
    pub fn start(&mut self, skill: &SkillData, eva: f64) -> Option<u32> {
        let data = skill.guard.as_ref()?;
        let parry_frames = Self::parry_window(data.parry_frames, eva);

        self.skill = Some(skill.id);
        self.flat_reduction = data.flat_reduction;
        self.percent_reduction = data.percent_reduction;
        self.counter_guard.clone_from(&data.counter_guard);
        self.counter_parry.clone_from(&data.counter_parry);
        self.parry.initialize(parry_frames, true);
        Some(parry_frames)
    }

    /// Stop guarding. Returns false if already idle.
    pub fn end(&mut self) -> bool {
        if self.skill.is_none() {
            return false;
        }
        self.skill = None;
        self.flat_reduction = 0.0;
        self.percent_reduction = 0.0;
        self.counter_guard.clear();
        self.counter_parry.clear();
        self.parry.force_complete();
        true
    }

    /// Advance one frame; a movement lock drops the guard.
    pub fn update(&mut self, movement_locked: bool) -> GuardUpdate {
        if !self.is_guarding() {
            return GuardUpdate::Unchanged;
        }
        if movement_locked {
            self.end();
            return GuardUpdate::Ended;
        }
        if self.parry.tick() {
            GuardUpdate::ParryClosed
        } else {
            GuardUpdate::Unchanged
        }
    }

    /// Resolve an incoming hit against the guard, `None` if idle.
    #[must_use]
    pub fn resolve_hit(&self) -> Option<GuardResolution> {
        let outcome = match self.phase() {
            GuardPhase::Idle => return None,
            GuardPhase::Parrying => GuardOutcome::Parried,
            GuardPhase::Guarding => GuardOutcome::Guarded,
        };
        Some(GuardResolution {
            outcome,
            flat_reduction: self.flat_reduction,
            percent_reduction: self.percent_reduction,
            counters: self.counter_skills(outcome).to_vec(),
        })
    }

    /// Counter skills eligible after `outcome`; empty while idle.
    #[must_use]
    pub fn counter_skills(&self, outcome: GuardOutcome) -> &[SkillId] {
        match outcome {
            GuardOutcome::Parried => &self.counter_parry,
            GuardOutcome::Guarded => &self.counter_guard,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> GuardPhase {
        if self.skill.is_none() {
            GuardPhase::Idle
        } else if self.parry.is_complete() {
            GuardPhase::Guarding
        } else {
            GuardPhase::Parrying
        }
    }

    /// Whether a guard is up.
    #[must_use]
    pub fn is_guarding(&self) -> bool {
        self.skill.is_some()
    }

    /// Whether the parry window is open.
    #[must_use]
    pub fn is_parrying(&self) -> bool {
        self.phase() == GuardPhase::Parrying
    }

    /// Frames left in the parry window.
    #[must_use]
    pub fn parry_remaining(&self) -> u32 {
        if self.is_parrying() {
            self.parry.remaining()
        } else {
            0
        }
    }

    /// Flat reduction; zero unless guarding.
    #[must_use]
    pub fn flat_reduction(&self) -> f64 {
        if self.is_guarding() {
            self.flat_reduction
        } else {
            0.0
        }
    }

    /// Percent reduction; zero unless guarding.
    #[must_use]
    pub fn percent_reduction(&self) -> f64 {
        if self.is_guarding() {
            self.percent_reduction
        } else {
            0.0
        }
    }

    /// Skill holding the guard.
    #[must_use]
    pub fn skill(&self) -> Option<SkillId> {
        self.skill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GuardData;

    fn guard_skill(parry_frames: u32) -> SkillData {
        SkillData {
            id: SkillId::new(20),
            name: "Buckler".to_string(),
            guard: Some(GuardData {
                flat_reduction: 5.0,
                percent_reduction: 50.0,
                parry_frames,
                counter_guard: vec![SkillId::new(21)],
                counter_parry: vec![SkillId::new(22)],
            }),
            ..SkillData::default()
        }
    }

    #[test]
    fn test_reductions_zero_when_idle() {
        let mut guard = GuardState::new();
        assert_eq!(guard.flat_reduction(), 0.0);

        guard.start(&guard_skill(0), 0.0);
        assert_eq!(guard.flat_reduction(), 5.0);
        assert_eq!(guard.percent_reduction(), 50.0);
        assert_eq!(guard.flat_reduction(), 5.0);

        guard.end();
        assert_eq!(guard.flat_reduction(), 0.0);
        assert_eq!(guard.percent_reduction(), 0.0);
        assert!(guard.resolve_hit().is_none());
    }

    #[test]
    fn test_parry_window_extended_by_evasion() {
        assert_eq!(GuardState::parry_window(10, 0.25), 12);
        assert_eq!(GuardState::parry_window(10, 0.0), 10);
        assert_eq!(GuardState::parry_window(0, 0.9), 0);
    }

    #[test]
    fn test_parry_then_guard() {
        let mut guard = GuardState::new();
        assert_eq!(guard.start(&guard_skill(4), 0.5), Some(6));
        assert_eq!(guard.phase(), GuardPhase::Parrying);

        let hit = guard.resolve_hit().expect("guarding");
        assert_eq!(hit.outcome, GuardOutcome::Parried);
        assert_eq!(hit.counters, vec![SkillId::new(22)]);

        for _ in 0..5 {
            assert_eq!(guard.update(false), GuardUpdate::Unchanged);
        }
        assert_eq!(guard.parry_remaining(), 1);
        assert_eq!(guard.update(false), GuardUpdate::ParryClosed);
        assert_eq!(guard.phase(), GuardPhase::Guarding);

        let hit = guard.resolve_hit().expect("guarding");
        assert_eq!(hit.outcome, GuardOutcome::Guarded);
        assert_eq!(hit.counters, vec![SkillId::new(21)]);
    }

    #[test]
    fn test_no_parry_window() {
        let mut guard = GuardState::new();
        guard.start(&guard_skill(0), 1.0);
        assert_eq!(guard.phase(), GuardPhase::Guarding);
    }

    #[test]
    fn test_movement_lock_ends_guard() {
        let mut guard = GuardState::new();
        guard.start(&guard_skill(4), 0.0);
        assert_eq!(guard.update(true), GuardUpdate::Ended);
        assert_eq!(guard.phase(), GuardPhase::Idle);
        assert!(guard.skill().is_none());
        assert!(guard.counter_skills(GuardOutcome::Parried).is_empty());
    }

    #[test]
    fn test_non_guard_skill_rejected() {
        let mut guard = GuardState::new();
        assert_eq!(guard.start(&SkillData::default(), 0.0), None);
        assert!(!guard.is_guarding());
    }
}
