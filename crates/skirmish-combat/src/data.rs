//! Read-only views of content definitions.
//!
//! The combat core never owns or mutates content. It reads skills, states and
//! battler profiles through [`SkillDataProvider`]; [`ContentLibrary`] is the
//! in-memory provider, loadable from RON.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use skirmish_common::{SchemaVersion, SkillId, SkirmishError, StateId};
use thiserror::Error;
use tracing::debug;

use crate::services::SkillDataProvider;
use crate::stats::{Resource, ResourceTriple};

/// Errors that can occur while loading content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Failed to parse RON.
    #[error("Failed to parse content RON: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Duplicate skill ID.
    #[error("Duplicate skill ID: {0}")]
    DuplicateSkill(u32),

    /// Duplicate state ID.
    #[error("Duplicate state ID: {0}")]
    DuplicateState(u32),

    /// Content written for an incompatible schema.
    #[error("Unsupported content version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version this build reads
        expected: SchemaVersion,
        /// Version declared by the file
        found: SchemaVersion,
    },
}

impl From<ContentError> for SkirmishError {
    fn from(error: ContentError) -> Self {
        match error {
            ContentError::UnsupportedVersion { expected, found } => Self::VersionMismatch {
                expected: expected.to_string(),
                actual: found.to_string(),
            },
            other => Self::Content(other.to_string()),
        }
    }
}

// ============================================================================
// Skills
// ============================================================================

/// Mitigation and counter data carried by guard-type skills.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardData {
    /// Flat damage removed from each guarded hit.
    pub flat_reduction: f64,
    /// Percentage of damage removed from each guarded hit (0-100).
    pub percent_reduction: f64,
    /// Base precise-parry window in frames; zero disables parrying.
    pub parry_frames: u32,
    /// Skills eligible to counter after a plain guard.
    pub counter_guard: Vec<SkillId>,
    /// Skills eligible to counter after a precise parry.
    pub counter_parry: Vec<SkillId>,
}

/// How a dodge picks its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DodgeMove {
    /// Along the facing direction.
    Forward,
    /// Opposite the facing direction.
    Backward,
    /// Along the direction supplied with the input.
    #[default]
    Directional,
}

/// Movement data carried by dodge-type skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DodgeData {
    /// Forced straight-line steps.
    pub steps: u32,
    /// Whether the battler is collision-immune while dodging.
    pub invincible: bool,
    /// Direction policy.
    pub movement: DodgeMove,
}

impl Default for DodgeData {
    fn default() -> Self {
        Self {
            steps: 2,
            invincible: true,
            movement: DodgeMove::Directional,
        }
    }
}

/// Follow-up link of a combo chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboData {
    /// Skill that continues the chain.
    pub next: SkillId,
    /// Frames until the follow-up becomes available.
    pub frames: u32,
}

/// Combat-relevant view of a skill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillData {
    /// Skill ID.
    pub id: SkillId,
    /// Display name.
    pub name: String,
    /// Base cooldown after use, in frames.
    pub cooldown_frames: u32,
    /// Combo continuation, if any.
    pub combo: Option<ComboData>,
    /// MP cost.
    pub mp_cost: f64,
    /// TP cost.
    pub tp_cost: f64,
    /// Cast time in frames; zero executes immediately.
    pub cast_frames: u32,
    /// Threat generated on hit.
    pub aggro: i32,
    /// Reach in tiles.
    pub range: f32,
    /// Whether this is a weapon's basic attack.
    pub basic_attack: bool,
    /// Guard data; present only on guard-type skills.
    pub guard: Option<GuardData>,
    /// Dodge data; present only on dodge-type skills.
    pub dodge: Option<DodgeData>,
}

impl Default for SkillData {
    fn default() -> Self {
        Self {
            id: SkillId::new(0),
            name: String::new(),
            cooldown_frames: 0,
            combo: None,
            mp_cost: 0.0,
            tp_cost: 0.0,
            cast_frames: 0,
            aggro: 0,
            range: 1.0,
            basic_attack: false,
            guard: None,
            dodge: None,
        }
    }
}

impl SkillData {
    /// Whether this is a guard-type skill.
    #[must_use]
    pub fn is_guard(&self) -> bool {
        self.guard.is_some()
    }

    /// Whether this is a dodge-type skill.
    #[must_use]
    pub fn is_dodge(&self) -> bool {
        self.dodge.is_some()
    }
}

// ============================================================================
// States
// ============================================================================

/// How long a state lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectDuration {
    /// Expires after this many frames per stack.
    Frames(u32),
    /// Never expires by duration.
    Eternal,
}

impl EffectDuration {
    /// Whether the duration never elapses.
    #[must_use]
    pub fn is_eternal(self) -> bool {
        matches!(self, Self::Eternal)
    }

    /// Frame count, zero for eternal effects.
    #[must_use]
    pub fn frames(self) -> u32 {
        match self {
            Self::Frames(frames) => frames,
            Self::Eternal => 0,
        }
    }
}

impl Default for EffectDuration {
    fn default() -> Self {
        Self::Frames(300)
    }
}

/// What happens to stacks when the duration runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackLoss {
    /// Lose one stack and restart the duration.
    #[default]
    One,
    /// Lose every stack at once.
    All,
}

/// Regen contribution of one resource, expressed per 5 seconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenTerms {
    /// Flat amount.
    pub flat: f64,
    /// Percentage of the resource's maximum.
    pub percent: f64,
    /// Drain formula; its result is negated before it is applied.
    pub formula: Option<String>,
}

impl RegenTerms {
    /// Whether this contributes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flat == 0.0 && self.percent == 0.0 && self.formula.is_none()
    }
}

/// Regen metadata carried by a state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRegen {
    /// HP terms.
    pub hp: RegenTerms,
    /// MP terms.
    pub mp: RegenTerms,
    /// TP terms.
    pub tp: RegenTerms,
}

impl StateRegen {
    /// Terms for one resource.
    #[must_use]
    pub fn terms(&self, resource: Resource) -> &RegenTerms {
        match resource {
            Resource::Hp => &self.hp,
            Resource::Mp => &self.mp,
            Resource::Tp => &self.tp,
        }
    }

    /// Flat and percent parts evaluated against a maximum triple.
    #[must_use]
    pub fn static_terms(&self, max: &ResourceTriple) -> ResourceTriple {
        let mut out = ResourceTriple::default();
        for resource in Resource::ALL {
            let terms = self.terms(resource);
            *out.get_mut(resource) = terms.flat + max.get(resource) * terms.percent / 100.0;
        }
        out
    }
}

/// Combat-relevant view of a state definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateData {
    /// State ID.
    pub id: StateId,
    /// Display name.
    pub name: String,
    /// Duration per stack.
    pub duration: EffectDuration,
    /// Maximum stacks.
    pub max_stacks: u32,
    /// Stack-loss behaviour on expiry.
    pub stack_loss: StackLoss,
    /// Regen metadata, if any.
    pub regen: Option<StateRegen>,
}

impl Default for StateData {
    fn default() -> Self {
        Self {
            id: StateId::new(0),
            name: String::new(),
            duration: EffectDuration::default(),
            max_stacks: 1,
            stack_loss: StackLoss::One,
            regen: None,
        }
    }
}

// ============================================================================
// Battler Profiles
// ============================================================================

/// Static AI and engagement configuration of a battler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattlerProfile {
    /// Display name.
    pub name: String,
    /// Distance at which a disengaged battler notices an opponent.
    pub sight_range: f32,
    /// Distance beyond which an engaged battler gives up.
    pub pursuit_range: f32,
    /// Player-controlled battlers never run engagement.
    pub is_player: bool,
    /// Inanimate battlers (training dummies, totems) never engage.
    pub inanimate: bool,
    /// Engagement disabled for this battler.
    pub engagement_locked: bool,
    /// Aggro starts locked.
    pub aggro_locked: bool,
}

impl Default for BattlerProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            sight_range: 4.0,
            pursuit_range: 6.0,
            is_player: false,
            inanimate: false,
            engagement_locked: false,
            aggro_locked: false,
        }
    }
}

impl BattlerProfile {
    /// Profile for the player-controlled battler.
    #[must_use]
    pub fn player(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_player: true,
            ..Self::default()
        }
    }

    /// Profile for an AI battler with the given ranges.
    #[must_use]
    pub fn ai(name: impl Into<String>, sight_range: f32, pursuit_range: f32) -> Self {
        Self {
            name: name.into(),
            sight_range,
            pursuit_range,
            ..Self::default()
        }
    }

    /// Whether engagement never runs for this battler.
    #[must_use]
    pub fn skips_engagement(&self) -> bool {
        self.is_player || self.inanimate || self.engagement_locked
    }
}

// ============================================================================
// Content Library
// ============================================================================

/// On-disk layout of a content file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFile {
    /// Schema version the file was written for.
    pub version: SchemaVersion,
    /// Skill definitions.
    pub skills: Vec<SkillData>,
    /// State definitions.
    pub states: Vec<StateData>,
}

impl Default for ContentFile {
    fn default() -> Self {
        Self {
            version: SchemaVersion::CONTENT,
            skills: Vec::new(),
            states: Vec::new(),
        }
    }
}

/// In-memory skill and state registry.
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    skills: AHashMap<SkillId, SkillData>,
    states: AHashMap<StateId, StateData>,
}

impl ContentLibrary {
    /// Create an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a RON content file.
    pub fn from_ron_str(source: &str) -> Result<Self, ContentError> {
        let file: ContentFile = ron::from_str(source)?;
        Self::from_file(file)
    }

    /// Build a library from parsed content, rejecting duplicate IDs and
    /// files from another major schema version.
    pub fn from_file(file: ContentFile) -> Result<Self, ContentError> {
        if !SchemaVersion::CONTENT.can_read(&file.version) {
            return Err(ContentError::UnsupportedVersion {
                expected: SchemaVersion::CONTENT,
                found: file.version,
            });
        }
        let mut library = Self::new();
        for skill in file.skills {
            let id = skill.id;
            if library.skills.insert(id, skill).is_some() {
                return Err(ContentError::DuplicateSkill(id.raw()));
            }
        }
        for state in file.states {
            let id = state.id;
            if library.states.insert(id, state).is_some() {
                return Err(ContentError::DuplicateState(id.raw()));
            }
        }
        debug!(
            skills = library.skills.len(),
            states = library.states.len(),
            "Loaded content library"
        );
        Ok(library)
    }

    /// Add or replace a skill.
    pub fn insert_skill(&mut self, skill: SkillData) {
        self.skills.insert(skill.id, skill);
    }

    /// Add or replace a state.
    pub fn insert_state(&mut self, state: StateData) {
        self.states.insert(state.id, state);
    }

    /// Number of skills.
    #[must_use]
    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }

    /// Number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl SkillDataProvider for ContentLibrary {
    fn skill(&self, id: SkillId) -> Option<&SkillData> {
        self.skills.get(&id)
    }

    fn state(&self, id: StateId) -> Option<&StateData> {
        self.states.get(&id)
    }
}
