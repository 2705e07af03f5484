//! ID types for battlers and content definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a battler on the active map.
///
/// Other battlers hold this id instead of a reference, so a despawned
/// battler simply stops resolving through the target lookup service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BattlerId(Uuid);

impl BattlerId {
    /// Creates a new random battler ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID (for deserialization and tests).
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic ID from a small integer.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.0
    }

    /// Nil battler ID, never assigned to a live battler.
    pub const NIL: Self = Self(Uuid::nil());

    /// Checks if this is a valid (non-nil) battler ID.
    #[must_use]
    pub fn is_valid(self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for BattlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BattlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a skill definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(u32);

impl SkillId {
    /// Creates a skill ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier for a status effect (state) definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(u32);

impl StateId {
    /// Creates a state ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Conventional "knockout" state.
    pub const DEATH: Self = Self(1);
}

/// Allegiance of a battler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// The player and their followers.
    Ally,
    /// Hostile battlers.
    #[default]
    Enemy,
    /// Battlers that never pick a side.
    Neutral,
}

impl Team {
    /// Whether battlers of this team treat `other` as an opponent.
    #[must_use]
    pub const fn opposes(self, other: Self) -> bool {
        matches!((self, other), (Self::Ally, Self::Enemy) | (Self::Enemy, Self::Ally))
    }
}
