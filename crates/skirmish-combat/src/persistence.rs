//! Durable combatant snapshots.
//!
//! Only long-lived attributes cross the save boundary: identity, stats,
//! profile, equipped skills and carried state flags. Timers, aggro and
//! status instances are session state and are rebuilt fresh on load.

use serde::{Deserialize, Serialize};
use skirmish_common::{BattlerId, MagicBytes, SchemaVersion, SkillId, SkirmishError, Team};
use thiserror::Error;

use crate::cooldown::CooldownSlot;
use crate::data::BattlerProfile;
use crate::stats::CombatantStats;

/// Errors that can occur while encoding or decoding a snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid magic bytes
    #[error("Invalid combatant snapshot format")]
    InvalidFormat,

    /// Version mismatch
    #[error("Incompatible snapshot version: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: SchemaVersion,
        /// Found version
        found: SchemaVersion,
    },

    /// Snapshot corrupted
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<PersistenceError> for SkirmishError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::VersionMismatch { expected, found } => Self::VersionMismatch {
                expected: expected.to_string(),
                actual: found.to_string(),
            },
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Everything about a combatant that survives save and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableCombatant {
    /// Snapshot schema version
    pub version: SchemaVersion,
    /// Battler ID
    pub id: BattlerId,
    /// Allegiance
    pub team: Team,
    /// Stats, including carried state flags
    pub stats: CombatantStats,
    /// Engagement profile
    pub profile: BattlerProfile,
    /// Skills bound to cooldown slots
    pub equipped: Vec<(CooldownSlot, SkillId)>,
}

impl DurableCombatant {
    /// Create a snapshot at the current schema version.
    #[must_use]
    pub fn new(
        id: BattlerId,
        team: Team,
        stats: CombatantStats,
        profile: BattlerProfile,
        equipped: Vec<(CooldownSlot, SkillId)>,
    ) -> Self {
        Self {
            version: SchemaVersion::DURABLE_COMBATANT,
            id,
            team,
            stats,
            profile,
            equipped,
        }
    }

    /// Serializes to binary format.
    pub fn to_bytes(&self) -> PersistenceResult<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&MagicBytes::COMBATANT.0);

        let data = bincode::serialize(self)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        buffer.extend(data);

        Ok(buffer)
    }

    /// Deserializes from binary format.
    pub fn from_bytes(bytes: &[u8]) -> PersistenceResult<Self> {
        if !MagicBytes::COMBATANT.matches(bytes) {
            return Err(PersistenceError::InvalidFormat);
        }

        let snapshot: Self = bincode::deserialize(&bytes[4..])
            .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;

        if !SchemaVersion::DURABLE_COMBATANT.can_read(&snapshot.version) {
            return Err(PersistenceError::VersionMismatch {
                expected: SchemaVersion::DURABLE_COMBATANT,
                found: snapshot.version,
            });
        }

        Ok(snapshot)
    }
}
