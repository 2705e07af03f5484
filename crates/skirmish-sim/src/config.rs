//! Simulation configuration.
//!
//! Arena size, run length, combat tunables and the battler roster. Loaded
//! from TOML; a missing or broken file falls back to the built-in skirmish.

use serde::{Deserialize, Serialize};
use skirmish_combat::CombatConfig;
use skirmish_common::{MapPoint, SkillId, SkirmishError, SkirmishResult, StateId, Team};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One battler in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattlerSpec {
    /// Display name
    pub name: String,
    /// Allegiance
    pub team: Team,
    /// Player-controlled (never engages, may dodge)
    pub player: bool,

    // === Stats ===
    /// Maximum HP
    pub max_hp: f64,
    /// Maximum MP
    pub max_mp: f64,
    /// HP regen rate
    pub hp_regen: f64,
    /// MP regen rate
    pub mp_regen: f64,
    /// TP regen rate
    pub tp_regen: f64,
    /// Evasion rate (widens the parry window)
    pub eva: f64,
    /// Attack power
    pub atk: f64,
    /// Defense
    pub def: f64,

    // === Engagement ===
    /// Sight range in tiles
    pub sight_range: f32,
    /// Pursuit range in tiles
    pub pursuit_range: f32,

    // === Skills ===
    /// Main-hand attack skill
    pub attack_skill: Option<SkillId>,
    /// Off-hand guard skill
    pub guard_skill: Option<SkillId>,
    /// Dodge skill
    pub dodge_skill: Option<SkillId>,
    /// State inflicted on whoever this battler damages
    pub on_hit_state: Option<StateId>,
    /// State applied to self once HP drops below half
    pub rally_state: Option<StateId>,

    /// Starting position
    pub position: MapPoint,
}

impl Default for BattlerSpec {
    fn default() -> Self {
        Self {
            name: "Battler".to_string(),
            team: Team::Enemy,
            player: false,

            // Stats
            max_hp: 60.0,
            max_mp: 0.0,
            hp_regen: 0.0,
            mp_regen: 0.0,
            tp_regen: 0.0,
            eva: 0.0,
            atk: 10.0,
            def: 2.0,

            // Engagement
            sight_range: 4.0,
            pursuit_range: 6.0,

            // Skills
            attack_skill: None,
            guard_skill: None,
            dodge_skill: None,
            on_hit_state: None,
            rally_state: None,

            position: MapPoint::default(),
        }
    }
}

impl BattlerSpec {
    /// The bundled hero.
    #[must_use]
    pub fn hero() -> Self {
        Self {
            name: "Hero".to_string(),
            team: Team::Ally,
            player: true,
            max_hp: 120.0,
            max_mp: 30.0,
            hp_regen: 0.05,
            mp_regen: 0.02,
            tp_regen: 0.05,
            eva: 0.1,
            atk: 14.0,
            def: 4.0,
            attack_skill: Some(SkillId::new(1)),
            guard_skill: Some(SkillId::new(4)),
            dodge_skill: Some(SkillId::new(5)),
            rally_state: Some(StateId::new(2)),
            position: MapPoint::new(2.0, 6.0),
            ..Self::default()
        }
    }

    /// A bundled slime at `position`.
    #[must_use]
    pub fn slime(name: &str, position: MapPoint) -> Self {
        Self {
            name: name.to_string(),
            team: Team::Enemy,
            max_hp: 60.0,
            atk: 9.0,
            def: 2.0,
            sight_range: 6.0,
            pursuit_range: 9.0,
            attack_skill: Some(SkillId::new(3)),
            on_hit_state: Some(StateId::new(3)),
            position,
            ..Self::default()
        }
    }

    fn validate(&mut self) {
        self.max_hp = finite_or(self.max_hp, 1.0).max(1.0);
        self.max_mp = finite_or(self.max_mp, 0.0).max(0.0);
        self.eva = finite_or(self.eva, 0.0).clamp(0.0, 1.0);
        self.sight_range = finite_or(self.sight_range, 0.0).clamp(0.0, 100.0);
        self.pursuit_range = finite_or(self.pursuit_range, 0.0).clamp(self.sight_range, 100.0);
    }
}

/// Simulation configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Run ===
    /// Frames to simulate
    pub frames: u32,
    /// Frames between progress log lines (0 = off)
    pub log_interval: u32,

    // === Arena ===
    /// Arena width in tiles
    pub arena_width: f32,
    /// Arena height in tiles
    pub arena_height: f32,
    /// Frames one step takes
    pub step_frames: u32,
    /// Frames a damaging hit locks the target's movement
    pub hit_stun_frames: u32,

    // === Combat ===
    /// Combat tunables
    pub combat: CombatConfig,

    // === Roster ===
    /// Battlers to spawn
    pub battlers: Vec<BattlerSpec>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // Run
            frames: 3600, // one minute at 60 fps
            log_interval: 600,

            // Arena
            arena_width: 20.0,
            arena_height: 12.0,
            step_frames: 8,
            hit_stun_frames: 4,

            // Combat
            combat: CombatConfig::default(),

            // Roster
            battlers: default_roster(),
        }
    }
}

fn default_roster() -> Vec<BattlerSpec> {
    vec![
        BattlerSpec::hero(),
        BattlerSpec::slime("Slime A", MapPoint::new(12.0, 5.0)),
        BattlerSpec::slime("Slime B", MapPoint::new(15.0, 8.0)),
    ]
}

impl SimConfig {
    /// Load configuration from a TOML file.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to load config file: {e}");
                Self::default()
            },
        }
    }

    /// Read and parse a TOML file without falling back.
    pub fn try_load<P: AsRef<Path>>(path: P) -> SkirmishResult<Self> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| SkirmishError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> SkirmishResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| SkirmishError::Config(e.to_string()))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Run
        self.frames = self.frames.clamp(1, 216_000);

        // Arena
        self.arena_width = finite_or(self.arena_width, 20.0).clamp(4.0, 256.0);
        self.arena_height = finite_or(self.arena_height, 12.0).clamp(4.0, 256.0);
        self.step_frames = self.step_frames.clamp(1, 60);
        self.hit_stun_frames = self.hit_stun_frames.min(120);

        // Combat
        self.combat.validate();

        // Roster
        if self.battlers.is_empty() {
            warn!("Config has no battlers, using the default roster");
            self.battlers = default_roster();
        }
        for battler in &mut self.battlers {
            battler.validate();
        }
    }
}

fn finite_or<T: Into<f64> + Copy>(value: T, fallback: T) -> T {
    if value.into().is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.frames, 3600);
        assert_eq!(config.battlers.len(), 3);
        assert!(config.battlers[0].player);
        assert_eq!(config.combat.engagement_throttle_frames, 20);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimConfig::default();
        config.frames = 0;
        config.step_frames = 0;
        config.arena_width = f32::NAN;
        config.battlers = vec![BattlerSpec {
            max_hp: -5.0,
            sight_range: 8.0,
            pursuit_range: 3.0,
            ..BattlerSpec::default()
        }];

        config.validate();

        assert_eq!(config.frames, 1);
        assert_eq!(config.step_frames, 1);
        assert_eq!(config.arena_width, 20.0);
        assert_eq!(config.battlers[0].max_hp, 1.0);
        assert_eq!(config.battlers[0].pursuit_range, 8.0);
    }

    #[test]
    fn test_empty_roster_replaced() {
        let mut config = SimConfig {
            battlers: Vec::new(),
            ..SimConfig::default()
        };
        config.validate();
        assert_eq!(config.battlers.len(), 3);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("skirmish.toml");

        let mut config = SimConfig::default();
        config.frames = 900;
        config.combat.aggro_decay = 2;
        config.battlers[1].sight_range = 7.5;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = SimConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(
            &config_path,
            "frames = 120\n\n[combat]\nengagement_throttle_frames = 5\n\n[[battlers]]\nname = \"Lone\"\nteam = \"ally\"\n",
        )
        .expect("Failed to write config");

        let config = SimConfig::load_from(&config_path);
        assert_eq!(config.frames, 120);
        assert_eq!(config.combat.engagement_throttle_frames, 5);
        assert_eq!(config.combat.alert_duration_frames, 300);
        assert_eq!(config.battlers.len(), 1);
        assert_eq!(config.battlers[0].team, Team::Ally);
        assert_eq!(config.battlers[0].max_hp, 60.0);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = SimConfig::load_from("/nonexistent/path/skirmish.toml");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "frames = \"many\"").expect("Failed to write config");

        let config = SimConfig::load_from(&config_path);
        assert_eq!(config, SimConfig::default());
        assert!(matches!(
            SimConfig::try_load(&config_path),
            Err(SkirmishError::Config(_))
        ));
    }

    #[test]
    fn test_try_load_missing_file_is_io_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result = SimConfig::try_load(temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(SkirmishError::Io(_))));
    }
}
