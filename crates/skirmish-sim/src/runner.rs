//! Headless skirmish runner.
//!
//! Drives every battler through [`BattlerContext::update`], then lets a
//! simple policy act on the core's readiness and target queries: chase the
//! target, attack when in range, guard while the attack recovers and dodge
//! away when hurt. Hits are resolved here, since damage belongs to the host.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use skirmish_combat::{
    BattlerContext, BattlerProfile, BattlerServices, CombatEventBus, CombatantStats, ContentLibrary,
    CooldownSlot, DistanceBand, GuardOutcome, NoVariables, Resource, SkillDataProvider,
    TargetLookup,
};
use skirmish_common::{BattlerId, SkillId, SkirmishResult, Team};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::config::{BattlerSpec, SimConfig};

/// File extension of durable battler snapshots.
pub const SNAPSHOT_EXTENSION: &str = "skcb";

/// Fraction of max HP under which the player dodges away.
const DODGE_HP_RATE: f64 = 0.35;

/// Fraction of max HP under which a rally state is used.
const RALLY_HP_RATE: f64 = 0.5;

/// End-of-run report for one battler.
#[derive(Debug, Clone, Serialize)]
pub struct FighterSummary {
    /// Display name
    pub name: String,
    /// Allegiance
    pub team: Team,
    /// HP at the end of the run
    pub hp: f64,
    /// Maximum HP
    pub max_hp: f64,
    /// Whether the battler survived
    pub alive: bool,
    /// Damage dealt
    pub damage_dealt: f64,
    /// Damage taken from hits
    pub damage_taken: f64,
    /// Engaged target at the end of the run
    pub target: Option<String>,
}

/// End-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Frames simulated
    pub frames_run: u64,
    /// Last team standing, if any
    pub winner: Option<Team>,
    /// Per-battler results
    pub fighters: Vec<FighterSummary>,
    /// Event counts by kind
    pub events: BTreeMap<String, usize>,
}

struct Fighter {
    ctx: BattlerContext,
    spec: BattlerSpec,
    rallied: bool,
    damage_dealt: f64,
    damage_taken: f64,
}

struct PendingHit {
    attacker: usize,
    target: BattlerId,
    skill: SkillId,
}

/// A running skirmish.
pub struct Simulation {
    arena: Arena,
    fighters: Vec<Fighter>,
    library: Arc<ContentLibrary>,
    bus: CombatEventBus,
    event_counts: BTreeMap<String, usize>,
    hit_stun_frames: u32,
    log_interval: u32,
    frame: u64,
}

impl Simulation {
    /// Spawn the configured roster.
    #[must_use]
    pub fn new(config: &SimConfig, library: Arc<ContentLibrary>) -> Self {
        let mut arena = Arena::new(config.arena_width, config.arena_height, config.step_frames);
        let data: Arc<dyn SkillDataProvider> = library.clone();
        let services = BattlerServices::new(data, Arc::new(NoVariables));

        let mut fighters = Vec::with_capacity(config.battlers.len());
        for (index, spec) in config.battlers.iter().enumerate() {
            let id = BattlerId::from_u128(index as u128 + 1);
            let ctx = build_battler(id, spec, services.clone(), config, &library);
            arena.spawn(id, spec.name.clone(), spec.team, spec.position, ctx.stats().clone());
            fighters.push(Fighter {
                ctx,
                spec: spec.clone(),
                rallied: false,
                damage_dealt: 0.0,
                damage_taken: 0.0,
            });
        }

        info!(battlers = fighters.len(), "Skirmish ready");

        Self {
            arena,
            fighters,
            library,
            bus: CombatEventBus::default(),
            event_counts: BTreeMap::new(),
            hit_stun_frames: config.hit_stun_frames,
            log_interval: config.log_interval,
            frame: 0,
        }
    }

    /// Run until `frames` elapse or one side is wiped out.
    pub fn run(&mut self, frames: u32) -> RunSummary {
        for _ in 0..frames {
            self.step();
            if self.winner().is_some() {
                break;
            }
        }
        let summary = self.summary();
        info!(
            frames = summary.frames_run,
            winner = ?summary.winner,
            "Skirmish finished"
        );
        summary
    }

    /// Simulate one frame.
    pub fn step(&mut self) {
        self.frame += 1;

        for fighter in &mut self.fighters {
            fighter.ctx.update(&mut self.arena);
            self.arena.sync(&fighter.ctx);
        }

        let mut hits = Vec::new();
        for index in 0..self.fighters.len() {
            if let Some(hit) = self.act(index) {
                hits.push(hit);
            }
        }
        for hit in hits {
            self.resolve_hit(&hit);
        }

        self.collect_events();
        self.arena.advance();

        if self.log_interval > 0 && self.frame % u64::from(self.log_interval) == 0 {
            self.log_progress();
        }
    }

    /// Last team standing, if only one remains.
    #[must_use]
    pub fn winner(&self) -> Option<Team> {
        let allies = self.arena.living(Team::Ally);
        let enemies = self.arena.living(Team::Enemy);
        match (allies, enemies) {
            (0, 0) => None,
            (_, 0) => Some(Team::Ally),
            (0, _) => Some(Team::Enemy),
            _ => None,
        }
    }

    /// Current report.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let fighters = self
            .fighters
            .iter()
            .map(|f| {
                let stats = f.ctx.stats();
                FighterSummary {
                    name: f.spec.name.clone(),
                    team: f.spec.team,
                    hp: stats.current.hp,
                    max_hp: stats.max.hp,
                    alive: !f.ctx.is_dead(),
                    damage_dealt: f.damage_dealt,
                    damage_taken: f.damage_taken,
                    target: f.ctx.target().map(|t| self.arena.name(t).to_string()),
                }
            })
            .collect();

        RunSummary {
            frames_run: self.frame,
            winner: self.winner(),
            fighters,
            events: self.event_counts.clone(),
        }
    }

    /// Write every battler's durable snapshot into `dir`, one file per
    /// battler named after its ID. Returns the number written.
    pub fn save_snapshots(&self, dir: &Path) -> SkirmishResult<usize> {
        fs::create_dir_all(dir)?;
        for fighter in &self.fighters {
            let bytes = fighter.ctx.durable().to_bytes()?;
            let path = dir.join(format!("{}.{SNAPSHOT_EXTENSION}", fighter.ctx.id()));
            fs::write(&path, bytes)?;
            debug!(path = %path.display(), "Saved battler snapshot");
        }
        info!(
            count = self.fighters.len(),
            dir = %dir.display(),
            "Saved battler snapshots"
        );
        Ok(self.fighters.len())
    }

    /// Decide what fighter `index` does this frame.
    fn act(&mut self, index: usize) -> Option<PendingHit> {
        let fighter = &mut self.fighters[index];
        if fighter.ctx.is_dead() {
            return None;
        }
        let id = fighter.ctx.id();

        if let Some(state) = fighter.spec.rally_state {
            if !fighter.rallied && hp_rate(fighter.ctx.stats()) < RALLY_HP_RATE {
                fighter.rallied = fighter.ctx.apply_state(state, 1, Some(id)).is_some();
            }
        }

        let target = if fighter.ctx.profile().is_player {
            self.arena.nearest_opposing(id)
        } else {
            fighter.ctx.target()
        }?;
        let distance = self.arena.distance_between(id, target)?;
        let ctx = &mut fighter.ctx;

        if ctx.dodge().is_dodging() || ctx.is_casting() {
            return None;
        }

        if ctx.profile().is_player
            && DistanceBand::classify(distance) == DistanceBand::Close
            && hp_rate(ctx.stats()) < DODGE_HP_RATE
            && ctx.cooldowns().contains(CooldownSlot::Dodge)
            && ctx.is_action_ready(CooldownSlot::Dodge)
        {
            let away = self
                .arena
                .position(target)
                .zip(self.arena.position(id))
                .map(|(from, to)| from.direction_to(to));
            if ctx.start_dodge(away, &self.arena) {
                debug!(battler = %id, "Dodging away");
                return None;
            }
        }

        let skill = ctx.equipped(CooldownSlot::MainHand)?;
        let range = self.library.skill(skill).map_or(1.0, |s| s.range);
        let attack_ready = ctx.is_action_ready(CooldownSlot::MainHand);

        if ctx.equipped(CooldownSlot::OffHand).is_some() {
            if attack_ready && ctx.is_guarding() {
                ctx.end_guarding();
            } else if !attack_ready && !ctx.is_guarding() && distance <= range + 1.0 {
                ctx.start_guarding(CooldownSlot::OffHand);
            }
        }

        if distance <= range {
            if !attack_ready || ctx.is_guarding() {
                return None;
            }
            let used = ctx.commit_action(CooldownSlot::MainHand)?;
            return Some(PendingHit {
                attacker: index,
                target,
                skill: used,
            });
        }

        if !ctx.is_guarding() {
            let goal = self.arena.position(target)?;
            self.arena.step_toward(id, goal);
        }
        None
    }

    fn resolve_hit(&mut self, hit: &PendingHit) {
        let Some(target_index) = self.index_of(hit.target) else {
            return;
        };
        let (attacker_id, atk, on_hit_state) = {
            let attacker = &self.fighters[hit.attacker];
            if attacker.ctx.is_dead() {
                return;
            }
            (
                attacker.ctx.id(),
                attacker.ctx.stats().params.atk,
                attacker.spec.on_hit_state,
            )
        };
        let threat = self.library.skill(hit.skill).map_or(0, |s| s.aggro);

        let defender = &mut self.fighters[target_index];
        if defender.ctx.is_dead() {
            return;
        }
        let outcome = defender.ctx.on_hit(Some(attacker_id), threat);
        if outcome.evaded {
            debug!(attacker = %attacker_id, target = %hit.target, "Hit evaded");
            return;
        }

        let raw = (atk - defender.ctx.stats().params.def * 0.5).max(1.0);
        let damage = match &outcome.guard {
            Some(guard) if guard.outcome == GuardOutcome::Parried => {
                if !guard.counters.is_empty() {
                    debug!(target = %hit.target, counters = ?guard.counters, "Parried with counters");
                }
                0.0
            },
            Some(guard) => {
                (raw - guard.flat_reduction).max(0.0) * (1.0 - guard.percent_reduction / 100.0)
            },
            None => raw,
        };

        let dealt = -defender.ctx.stats_mut().gain(Resource::Hp, -damage);
        defender.damage_taken += dealt;
        if dealt > 0.0 {
            if let Some(state) = on_hit_state {
                defender.ctx.apply_state(state, 1, Some(attacker_id));
            }
            self.arena.stun(hit.target, self.hit_stun_frames);
        }
        self.arena.sync(&self.fighters[target_index].ctx);
        self.fighters[hit.attacker].damage_dealt += dealt;

        debug!(
            attacker = %attacker_id,
            target = %hit.target,
            skill = hit.skill.raw(),
            damage = dealt,
            "Hit resolved"
        );
    }

    fn collect_events(&mut self) {
        for fighter in &mut self.fighters {
            let events = fighter.ctx.drain_tagged_events();
            let count = events.len();
            if self.bus.publish_all(events) < count {
                warn!(battler = fighter.spec.name.as_str(), "Event bus full, events dropped");
            }
            fighter.ctx.acknowledge_refresh();
        }

        for tagged in self.bus.drain() {
            *self
                .event_counts
                .entry(tagged.event.kind().to_string())
                .or_insert(0) += 1;
            debug!(
                battler = self.arena.name(tagged.battler),
                frame = tagged.frame,
                event = tagged.event.kind(),
                "Combat event"
            );
        }
    }

    fn log_progress(&self) {
        for fighter in &self.fighters {
            let stats = fighter.ctx.stats();
            info!(
                frame = self.frame,
                battler = fighter.spec.name.as_str(),
                hp = stats.current.hp,
                engagement = ?fighter.ctx.engagement_state(),
                "Progress"
            );
        }
    }

    fn index_of(&self, id: BattlerId) -> Option<usize> {
        self.fighters.iter().position(|f| f.ctx.id() == id)
    }
}

fn build_battler(
    id: BattlerId,
    spec: &BattlerSpec,
    services: BattlerServices,
    config: &SimConfig,
    library: &ContentLibrary,
) -> BattlerContext {
    let mut stats = CombatantStats::new()
        .with_hp(spec.max_hp)
        .with_mp(spec.max_mp)
        .with_regen(spec.hp_regen, spec.mp_regen, spec.tp_regen)
        .with_eva(spec.eva);
    stats.params.atk = spec.atk;
    stats.params.def = spec.def;

    let profile = if spec.player {
        BattlerProfile::player(spec.name.clone())
    } else {
        BattlerProfile::ai(spec.name.clone(), spec.sight_range, spec.pursuit_range)
    };

    let mut ctx = BattlerContext::new(id, spec.team, stats, profile, services, &config.combat);
    let loadout = [
        (CooldownSlot::MainHand, spec.attack_skill),
        (CooldownSlot::OffHand, spec.guard_skill),
        (CooldownSlot::Dodge, spec.dodge_skill),
    ];
    for (slot, skill) in loadout {
        let Some(skill) = skill else {
            continue;
        };
        if library.skill(skill).is_none() {
            warn!(battler = spec.name.as_str(), %slot, skill = skill.raw(), "Unknown skill in loadout");
            continue;
        }
        ctx.equip(slot, skill);
    }
    ctx
}

fn hp_rate(stats: &CombatantStats) -> f64 {
    if stats.max.hp > 0.0 {
        stats.current.hp / stats.max.hp
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_common::MapPoint;

    const CONTENT: &str = include_str!("../assets/default_content.ron");

    fn library() -> Arc<ContentLibrary> {
        Arc::new(ContentLibrary::from_ron_str(CONTENT).expect("bundled content parses"))
    }

    #[test]
    fn test_unknown_loadout_skill_skipped() {
        let mut config = SimConfig::default();
        config.battlers = vec![BattlerSpec {
            attack_skill: Some(SkillId::new(99)),
            ..BattlerSpec::hero()
        }];
        let sim = Simulation::new(&config, library());
        assert!(sim.fighters[0].ctx.equipped(CooldownSlot::MainHand).is_none());
        assert!(sim.fighters[0].ctx.equipped(CooldownSlot::OffHand).is_some());
    }

    #[test]
    fn test_adjacent_attack_deals_damage() {
        let mut config = SimConfig::default();
        config.battlers = vec![
            BattlerSpec {
                guard_skill: None,
                dodge_skill: None,
                ..BattlerSpec::hero()
            },
            BattlerSpec::slime("Slime", MapPoint::new(3.0, 6.0)),
        ];
        let mut sim = Simulation::new(&config, library());
        sim.step();

        let summary = sim.summary();
        assert!(summary.fighters[0].damage_dealt > 0.0);
        assert!(summary.fighters[1].damage_taken > 0.0);
        assert!(summary.fighters[1].hp < summary.fighters[1].max_hp);
    }

    #[test]
    fn test_winner_when_one_side_remains() {
        let mut config = SimConfig::default();
        config.battlers = vec![BattlerSpec::hero()];
        let sim = Simulation::new(&config, library());
        assert_eq!(sim.winner(), Some(Team::Ally));
    }
}
