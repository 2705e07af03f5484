//! End-to-end tests: whole battlers running against the arena.

#![cfg(test)]

use std::sync::Arc;

use skirmish_combat::{
    BattlerContext, BattlerProfile, BattlerServices, CombatConfig, CombatEvent, CombatantStats,
    ContentLibrary, DurableCombatant, EngagementState, NoVariables, SkillDataProvider,
};
use skirmish_common::{BattlerId, Direction, MapPoint, SkirmishError, StateId, Team};
use tempfile::TempDir;

use crate::arena::Arena;
use crate::config::SimConfig;
use crate::load_content;
use crate::runner::{Simulation, SNAPSHOT_EXTENSION};
use skirmish_combat::MovementControl;

const CONTENT: &str = include_str!("../assets/default_content.ron");

const HUNTER: BattlerId = BattlerId::from_u128(10);
const PREY: BattlerId = BattlerId::from_u128(20);

fn library() -> Arc<ContentLibrary> {
    Arc::new(ContentLibrary::from_ron_str(CONTENT).expect("bundled content parses"))
}

fn services() -> BattlerServices {
    let data: Arc<dyn SkillDataProvider> = library();
    BattlerServices::new(data, Arc::new(NoVariables))
}

fn hunter(sight: f32, pursuit: f32) -> BattlerContext {
    BattlerContext::new(
        HUNTER,
        Team::Enemy,
        CombatantStats::new(),
        BattlerProfile::ai("Hunter", sight, pursuit),
        services(),
        &CombatConfig::default(),
    )
}

fn arena_with(prey_at: MapPoint) -> Arena {
    let mut arena = Arena::new(40.0, 10.0, 1);
    arena.spawn(HUNTER, "Hunter", Team::Enemy, MapPoint::new(0.0, 0.0), CombatantStats::new());
    arena.spawn(PREY, "Prey", Team::Ally, prey_at, CombatantStats::new());
    arena
}

mod engagement_tests {
    use super::*;

    #[test]
    fn e2e_engages_in_sight_and_gives_up_out_of_pursuit() {
        let mut hunter = hunter(10.0, 12.0);
        let mut arena = arena_with(MapPoint::new(8.0, 0.0));

        hunter.update(&mut arena);
        assert_eq!(hunter.engagement_state(), EngagementState::Engaged);
        assert_eq!(hunter.target(), Some(PREY));

        // Prey runs to 15 tiles, beyond pursuit
        for _ in 0..7 {
            arena.force_step(PREY, Direction::Right);
        }
        assert_eq!(arena.position(PREY), Some(MapPoint::new(15.0, 0.0)));

        for _ in 0..25 {
            hunter.update(&mut arena);
        }
        assert_eq!(hunter.engagement_state(), EngagementState::Disengaged);
        assert_eq!(hunter.target(), None);
        assert!(hunter.aggro().get(PREY).is_none());
    }

    #[test]
    fn e2e_hit_from_outside_sight_alerts_and_engages() {
        let mut hunter = hunter(4.0, 6.0);
        let mut arena = arena_with(MapPoint::new(5.0, 0.0));

        hunter.update(&mut arena);
        assert_eq!(hunter.engagement_state(), EngagementState::Disengaged);

        hunter.on_hit(Some(PREY), 10);
        assert!(hunter.is_alerted());

        // The empty scan on the first frame restarted the throttle
        for _ in 0..25 {
            hunter.update(&mut arena);
        }
        assert_eq!(hunter.target(), Some(PREY));
        let events = hunter.drain_events();
        assert!(events.contains(&CombatEvent::Alerted {
            attacker: Some(PREY)
        }));
        assert!(events.contains(&CombatEvent::Engaged { target: PREY }));
    }
}

mod persistence_tests {
    use super::*;

    #[test]
    fn e2e_restored_battler_purges_carried_states() {
        let mut original = hunter(4.0, 6.0);
        assert_eq!(original.apply_state(StateId::new(3), 2, Some(PREY)), Some(2));

        let bytes = original.durable().to_bytes().expect("snapshot encodes");
        let snapshot = DurableCombatant::from_bytes(&bytes).expect("snapshot decodes");
        let mut restored =
            BattlerContext::from_durable(snapshot, services(), &CombatConfig::default());
        assert!(restored.stats().has_state(StateId::new(3)));
        assert!(restored.status().is_empty());

        let mut arena = arena_with(MapPoint::new(30.0, 0.0));
        for _ in 0..15 {
            restored.update(&mut arena);
        }
        assert!(!restored.stats().has_state(StateId::new(3)));
        assert_eq!(restored.stats().current.hp, 100.0);
    }

    #[test]
    fn e2e_simulation_snapshots_restore() {
        let config = SimConfig {
            frames: 120,
            log_interval: 0,
            ..SimConfig::default()
        };
        let mut simulation = Simulation::new(&config, library());
        let summary = simulation.run(config.frames);

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("snapshots");
        assert_eq!(simulation.save_snapshots(&dir).expect("snapshots written"), 3);

        let hero_id = BattlerId::from_u128(1);
        let bytes = std::fs::read(dir.join(format!("{hero_id}.{SNAPSHOT_EXTENSION}")))
            .expect("hero snapshot exists");
        let snapshot = DurableCombatant::from_bytes(&bytes).expect("snapshot decodes");
        assert_eq!(snapshot.id, hero_id);
        assert_eq!(snapshot.profile.name, "Hero");

        let restored = BattlerContext::from_durable(snapshot, services(), &config.combat);
        assert_eq!(restored.stats().current.hp, summary.fighters[0].hp);
        assert!(restored.aggro().is_empty());
        assert_eq!(restored.engagement_state(), EngagementState::Disengaged);
    }
}

mod content_tests {
    use super::*;

    #[test]
    fn e2e_bundled_content_loads() {
        let library = load_content(None).expect("bundled content loads");
        assert_eq!(library.skill_count(), 5);
        assert_eq!(library.state_count(), 3);
    }

    #[test]
    fn e2e_content_errors_surface_as_skirmish_errors() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let missing = load_content(Some(temp_dir.path().join("absent.ron").as_path()));
        assert!(matches!(missing, Err(SkirmishError::Io(_))));

        let future = temp_dir.path().join("future.ron");
        std::fs::write(&future, "(version: (major: 9, minor: 0, patch: 0))")
            .expect("Failed to write content");
        assert!(matches!(
            load_content(Some(future.as_path())),
            Err(SkirmishError::VersionMismatch { .. })
        ));

        let broken = temp_dir.path().join("broken.ron");
        std::fs::write(&broken, "(skills: [(id: )])").expect("Failed to write content");
        assert!(matches!(
            load_content(Some(broken.as_path())),
            Err(SkirmishError::Content(_))
        ));
    }
}

mod simulation_tests {
    use super::*;

    #[test]
    fn e2e_default_skirmish_fights() {
        let config = SimConfig {
            log_interval: 0,
            ..SimConfig::default()
        };
        let mut simulation = Simulation::new(&config, library());
        let summary = simulation.run(config.frames);

        assert!(summary.frames_run > 0);
        assert!(summary.events.get("engaged").copied().unwrap_or(0) >= 1);
        let dealt: f64 = summary.fighters.iter().map(|f| f.damage_dealt).sum();
        assert!(dealt > 0.0);

        if let Some(team) = summary.winner {
            assert!(summary
                .fighters
                .iter()
                .filter(|f| f.team != team)
                .all(|f| !f.alive));
        }
    }

    #[test]
    fn e2e_summary_serializes_to_json() {
        let config = SimConfig {
            frames: 60,
            log_interval: 0,
            ..SimConfig::default()
        };
        let mut simulation = Simulation::new(&config, library());
        let summary = simulation.run(config.frames);

        let json = serde_json::to_value(&summary).expect("summary serializes");
        assert_eq!(json["frames_run"], 60);
        assert_eq!(json["fighters"][0]["name"], "Hero");
        assert_eq!(json["fighters"][0]["team"], "ally");
    }
}
