//! # Skirmish Common
//!
//! Common types shared by the Skirmish combat runtime.
//!
//! This crate provides foundational types used across all Skirmish crates:
//! - ID types (BattlerId, SkillId, StateId) and team allegiance
//! - Map points and eight-way directions
//! - Version information for durable snapshots
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
