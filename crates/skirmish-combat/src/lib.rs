//! # Skirmish Combat
//!
//! Frame-ticked combat core for real-time map battlers.
//!
//! This crate provides:
//! - Frame timers and per-slot cooldowns with combo windows
//! - Aggro tables and proximity engagement with hysteresis
//! - Guard / precise parry and dodge movement
//! - Stackable status effects with durations
//! - Natural and state-driven HP / MP / TP regeneration
//! - A small expression language for authored regen formulas
//! - Durable combatant snapshots
//! - [`BattlerContext`], which runs all of the above once per frame
//!
//! The host game supplies positions, movement and skill data through the
//! traits in [`services`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod aggro;
pub mod battler;
pub mod config;
pub mod cooldown;
pub mod data;
pub mod dodge;
pub mod engagement;
pub mod events;
pub mod formula;
pub mod guard;
pub mod persistence;
pub mod regen;
pub mod services;
pub mod stats;
pub mod status;
pub mod timer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggro::*;
    pub use crate::battler::*;
    pub use crate::config::*;
    pub use crate::cooldown::*;
    pub use crate::data::*;
    pub use crate::dodge::*;
    pub use crate::engagement::*;
    pub use crate::events::*;
    pub use crate::formula::*;
    pub use crate::guard::*;
    pub use crate::persistence::*;
    pub use crate::regen::*;
    pub use crate::services::*;
    pub use crate::stats::*;
    pub use crate::status::*;
    pub use crate::timer::*;
}

pub use prelude::*;
