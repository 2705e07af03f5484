//! Dodge execution: a short burst of forced straight-line steps.

use skirmish_common::{BattlerId, Direction};

use crate::data::DodgeMove;
use crate::services::MovementControl;

/// Result of a dodge frame update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DodgeUpdate {
    /// Not dodging, or waiting for the current step to finish.
    Unchanged,
    /// Forced one step.
    Stepped,
    /// Dodge finished.
    Ended {
        /// Whether a movement lock cut it short.
        cancelled: bool,
    },
}

/// Dodge state of one battler.
#[derive(Debug, Clone, Default)]
pub struct DodgeState {
    direction: Option<Direction>,
    steps: u32,
    invincible: bool,
}

impl DodgeState {
    /// Create an idle dodge state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the dodge direction for a movement policy.
    #[must_use]
    pub fn resolve_direction(
        movement: DodgeMove,
        facing: Direction,
        input: Option<Direction>,
    ) -> Direction {
        match movement {
            DodgeMove::Forward => facing,
            DodgeMove::Backward => facing.reverse(),
            DodgeMove::Directional => input.unwrap_or(facing),
        }
    }

    /// Begin dodging. Returns false if a dodge is already running or
    /// `steps` is zero.
    pub fn start(&mut self, direction: Direction, steps: u32, invincible: bool) -> bool {
        if self.is_dodging() || steps == 0 {
            return false;
        }
        self.direction = Some(direction);
        self.steps = steps;
        self.invincible = invincible;
        true
    }

    /// Advance one frame, forcing a step whenever the previous one is done.
    pub fn update<M>(&mut self, id: BattlerId, movement: &mut M) -> DodgeUpdate
    where
        M: MovementControl + ?Sized,
    {
        let Some(direction) = self.direction else {
            return DodgeUpdate::Unchanged;
        };

        if movement.is_movement_locked(id) {
            self.end();
            return DodgeUpdate::Ended { cancelled: true };
        }
        if movement.is_moving(id) {
            return DodgeUpdate::Unchanged;
        }
        if self.steps > 0 {
            movement.force_step(id, direction);
            self.steps -= 1;
            return DodgeUpdate::Stepped;
        }

        self.end();
        DodgeUpdate::Ended { cancelled: false }
    }

    /// Stop dodging. Returns false if not dodging.
    pub fn end(&mut self) -> bool {
        let was_dodging = self.is_dodging();
        self.direction = None;
        self.steps = 0;
        self.invincible = false;
        was_dodging
    }

    /// Whether a dodge is running.
    #[must_use]
    pub fn is_dodging(&self) -> bool {
        self.direction.is_some()
    }

    /// Whether the battler currently ignores collisions.
    #[must_use]
    pub fn is_invincible(&self) -> bool {
        self.invincible
    }

    /// Steps still to be forced.
    #[must_use]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Dodge direction while dodging.
    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Movement stub: each forced step takes `step_frames` frames.
    #[derive(Default)]
    struct Mover {
        step_frames: u32,
        moving_for: u32,
        locked: bool,
        steps: Vec<Direction>,
    }

    impl Mover {
        fn advance(&mut self) {
            self.moving_for = self.moving_for.saturating_sub(1);
        }
    }

    impl MovementControl for Mover {
        fn is_moving(&self, _id: BattlerId) -> bool {
            self.moving_for > 0
        }

        fn is_movement_locked(&self, _id: BattlerId) -> bool {
            self.locked
        }

        fn facing(&self, _id: BattlerId) -> Direction {
            Direction::Down
        }

        fn force_step(&mut self, _id: BattlerId, direction: Direction) {
            self.steps.push(direction);
            self.moving_for = self.step_frames;
        }
    }

    #[test]
    fn test_dodge_completes_after_steps() {
        let id = BattlerId::from_u128(1);
        let mut mover = Mover {
            step_frames: 2,
            ..Mover::default()
        };
        let mut dodge = DodgeState::new();
        assert!(dodge.start(Direction::Left, 2, true));
        assert!(dodge.is_invincible());

        let mut updates = Vec::new();
        for _ in 0..6 {
            updates.push(dodge.update(id, &mut mover));
            mover.advance();
        }
        assert_eq!(
            updates,
            vec![
                DodgeUpdate::Stepped,
                DodgeUpdate::Unchanged,
                DodgeUpdate::Stepped,
                DodgeUpdate::Unchanged,
                DodgeUpdate::Ended { cancelled: false },
                DodgeUpdate::Unchanged,
            ]
        );
        assert_eq!(mover.steps, vec![Direction::Left, Direction::Left]);
        assert!(!dodge.is_dodging());
        assert!(!dodge.is_invincible());
    }

    #[test]
    fn test_movement_lock_cancels() {
        let id = BattlerId::from_u128(1);
        let mut mover = Mover::default();
        let mut dodge = DodgeState::new();
        dodge.start(Direction::Up, 3, true);
        assert_eq!(dodge.update(id, &mut mover), DodgeUpdate::Stepped);

        mover.locked = true;
        assert_eq!(
            dodge.update(id, &mut mover),
            DodgeUpdate::Ended { cancelled: true }
        );
        assert_eq!(dodge.steps(), 0);
        assert!(!dodge.is_invincible());
    }

    #[test]
    fn test_start_rejected_while_dodging() {
        let mut dodge = DodgeState::new();
        assert!(!dodge.start(Direction::Up, 0, false));
        assert!(dodge.start(Direction::Up, 1, false));
        assert!(!dodge.start(Direction::Down, 1, false));
    }

    #[test]
    fn test_resolve_direction() {
        assert_eq!(
            DodgeState::resolve_direction(DodgeMove::Backward, Direction::Left, None),
            Direction::Right
        );
        assert_eq!(
            DodgeState::resolve_direction(DodgeMove::Directional, Direction::Left, Some(Direction::Up)),
            Direction::Up
        );
        assert_eq!(
            DodgeState::resolve_direction(DodgeMove::Directional, Direction::Left, None),
            Direction::Left
        );
    }
}
