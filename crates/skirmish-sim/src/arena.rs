//! In-memory scene: positions, stepping and liveness for every battler.

use skirmish_combat::{BattlerContext, CombatantStats, MovementControl, TargetLookup};
use skirmish_common::{BattlerId, Direction, MapPoint, Team};

/// One battler's physical presence in the arena.
#[derive(Debug, Clone)]
pub struct Body {
    /// Battler ID
    pub id: BattlerId,
    /// Display name
    pub name: String,
    /// Allegiance
    pub team: Team,
    /// Current tile
    pub position: MapPoint,
    /// Facing direction
    pub facing: Direction,
    /// Whether the battler is still standing
    pub alive: bool,
    /// Last synced stats
    pub stats: CombatantStats,
    moving: u32,
    stunned: u32,
}

/// Rectangular arena holding every body.
#[derive(Debug)]
pub struct Arena {
    bodies: Vec<Body>,
    width: f32,
    height: f32,
    step_frames: u32,
}

impl Arena {
    /// Create an empty arena.
    #[must_use]
    pub fn new(width: f32, height: f32, step_frames: u32) -> Self {
        Self {
            bodies: Vec::new(),
            width,
            height,
            step_frames: step_frames.max(1),
        }
    }

    /// Place a battler.
    pub fn spawn(
        &mut self,
        id: BattlerId,
        name: impl Into<String>,
        team: Team,
        position: MapPoint,
        stats: CombatantStats,
    ) {
        let position = self.clamp(position);
        self.bodies.push(Body {
            id,
            name: name.into(),
            team,
            position,
            facing: Direction::Down,
            alive: !stats.is_dead(),
            stats,
            moving: 0,
            stunned: 0,
        });
    }

    /// Look up a body.
    #[must_use]
    pub fn body(&self, id: BattlerId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    fn body_mut(&mut self, id: BattlerId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    /// Position of a battler.
    #[must_use]
    pub fn position(&self, id: BattlerId) -> Option<MapPoint> {
        self.body(id).map(|b| b.position)
    }

    /// Display name of a battler.
    #[must_use]
    pub fn name(&self, id: BattlerId) -> &str {
        self.body(id).map_or("?", |b| b.name.as_str())
    }

    /// Copy liveness and stats from the battler's combat state.
    pub fn sync(&mut self, battler: &BattlerContext) {
        if let Some(body) = self.body_mut(battler.id()) {
            body.alive = !battler.is_dead();
            body.stats.clone_from(battler.stats());
        }
    }

    /// Lock a battler's movement for `frames`.
    pub fn stun(&mut self, id: BattlerId, frames: u32) {
        if let Some(body) = self.body_mut(id) {
            body.stunned = body.stunned.max(frames);
        }
    }

    /// Take one chase step toward `goal`. Returns false if the battler is
    /// busy, locked, dead or already there.
    pub fn step_toward(&mut self, id: BattlerId, goal: MapPoint) -> bool {
        let Some(body) = self.body(id) else {
            return false;
        };
        if !body.alive || body.moving > 0 || body.stunned > 0 {
            return false;
        }
        let direction = body.position.direction_to(goal);
        let next = self.clamp(body.position.stepped(direction));
        if next == body.position || next.distance_to(goal) >= body.position.distance_to(goal) {
            return false;
        }
        let step_frames = self.step_frames;
        if let Some(body) = self.body_mut(id) {
            body.facing = direction;
            body.position = next;
            body.moving = step_frames;
        }
        true
    }

    /// Advance movement and stun counters one frame.
    pub fn advance(&mut self) {
        for body in &mut self.bodies {
            body.moving = body.moving.saturating_sub(1);
            body.stunned = body.stunned.saturating_sub(1);
        }
    }

    /// Living battlers on `team`.
    #[must_use]
    pub fn living(&self, team: Team) -> usize {
        self.bodies
            .iter()
            .filter(|b| b.alive && b.team == team)
            .count()
    }

    fn clamp(&self, point: MapPoint) -> MapPoint {
        MapPoint::new(
            point.x.clamp(0.0, self.width - 1.0),
            point.y.clamp(0.0, self.height - 1.0),
        )
    }
}

impl TargetLookup for Arena {
    fn nearest_opposing(&self, seeker: BattlerId) -> Option<BattlerId> {
        let me = self.body(seeker)?;
        self.bodies
            .iter()
            .filter(|b| b.alive && b.id != seeker && me.team.opposes(b.team))
            .min_by(|a, b| {
                let da = me.position.distance_to(a.position);
                let db = me.position.distance_to(b.position);
                da.total_cmp(&db)
            })
            .map(|b| b.id)
    }

    fn distance_between(&self, a: BattlerId, b: BattlerId) -> Option<f32> {
        Some(self.position(a)?.distance_to(self.position(b)?))
    }

    fn is_alive(&self, id: BattlerId) -> bool {
        self.body(id).is_some_and(|b| b.alive)
    }

    fn combatant_stats(&self, id: BattlerId) -> Option<CombatantStats> {
        self.body(id).map(|b| b.stats.clone())
    }
}

impl MovementControl for Arena {
    fn is_moving(&self, id: BattlerId) -> bool {
        self.body(id).is_some_and(|b| b.moving > 0)
    }

    fn is_movement_locked(&self, id: BattlerId) -> bool {
        self.body(id).is_some_and(|b| b.stunned > 0)
    }

    fn facing(&self, id: BattlerId) -> Direction {
        self.body(id).map_or(Direction::Down, |b| b.facing)
    }

    fn force_step(&mut self, id: BattlerId, direction: Direction) {
        let step_frames = self.step_frames;
        let Some(position) = self.position(id) else {
            return;
        };
        let next = self.clamp(position.stepped(direction));
        if let Some(body) = self.body_mut(id) {
            body.position = next;
            body.moving = step_frames;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERO: BattlerId = BattlerId::from_u128(1);
    const SLIME: BattlerId = BattlerId::from_u128(2);
    const BAT: BattlerId = BattlerId::from_u128(3);

    fn arena() -> Arena {
        let mut arena = Arena::new(10.0, 10.0, 2);
        arena.spawn(HERO, "Hero", Team::Ally, MapPoint::new(1.0, 1.0), CombatantStats::new());
        arena.spawn(SLIME, "Slime", Team::Enemy, MapPoint::new(4.0, 1.0), CombatantStats::new());
        arena.spawn(BAT, "Bat", Team::Enemy, MapPoint::new(1.0, 7.0), CombatantStats::new());
        arena
    }

    #[test]
    fn test_nearest_opposing_skips_dead_and_allies() {
        let mut arena = arena();
        assert_eq!(arena.nearest_opposing(HERO), Some(SLIME));
        assert_eq!(arena.nearest_opposing(SLIME), Some(HERO));

        if let Some(body) = arena.body_mut(SLIME) {
            body.alive = false;
        }
        assert_eq!(arena.nearest_opposing(HERO), Some(BAT));
        assert!(!arena.is_alive(SLIME));
        assert_eq!(arena.living(Team::Enemy), 1);
    }

    #[test]
    fn test_step_toward_waits_for_step() {
        let mut arena = arena();
        assert!(arena.step_toward(HERO, MapPoint::new(4.0, 1.0)));
        assert_eq!(arena.position(HERO), Some(MapPoint::new(2.0, 1.0)));
        assert_eq!(arena.facing(HERO), Direction::Right);
        assert!(arena.is_moving(HERO));
        assert!(!arena.step_toward(HERO, MapPoint::new(4.0, 1.0)));

        arena.advance();
        arena.advance();
        assert!(arena.step_toward(HERO, MapPoint::new(4.0, 1.0)));
        assert_eq!(arena.distance_between(HERO, SLIME), Some(1.0));
    }

    #[test]
    fn test_stun_locks_movement() {
        let mut arena = arena();
        arena.stun(HERO, 1);
        assert!(arena.is_movement_locked(HERO));
        assert!(!arena.step_toward(HERO, MapPoint::new(4.0, 1.0)));
        arena.advance();
        assert!(!arena.is_movement_locked(HERO));
    }

    #[test]
    fn test_force_step_clamps_to_bounds() {
        let mut arena = arena();
        arena.force_step(HERO, Direction::UpLeft);
        assert_eq!(arena.position(HERO), Some(MapPoint::new(0.0, 0.0)));
        arena.force_step(HERO, Direction::UpLeft);
        assert_eq!(arena.position(HERO), Some(MapPoint::new(0.0, 0.0)));
    }
}
