//! Combat events for UI, audio and logging consumers.
//!
//! Each battler collects the events it raises during a frame. The scene
//! drains them and, if several systems listen, fans them into a
//! [`CombatEventBus`].

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use skirmish_common::{BattlerId, Direction, SkillId, StateId};

use crate::stats::ResourceTriple;

/// Something meaningful that happened to a battler this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Battler engaged a target
    Engaged {
        /// Target chosen
        target: BattlerId,
    },
    /// Battler gave up its target
    Disengaged,
    /// Aggro switched the engaged target
    TargetChanged {
        /// Previous target
        from: Option<BattlerId>,
        /// New target
        to: BattlerId,
    },
    /// Battler was alerted by an unseen attacker
    Alerted {
        /// Attacker, if known
        attacker: Option<BattlerId>,
    },
    /// Aggro entry dropped because its target became invalid
    AggroPurged {
        /// Dropped target
        target: BattlerId,
    },
    /// Guard raised
    GuardStarted {
        /// Guard skill
        skill: SkillId,
        /// Parry window length in frames
        parry_frames: u32,
    },
    /// Precise-parry window elapsed while still guarding
    ParryWindowClosed,
    /// Guard lowered
    GuardEnded,
    /// Dodge began
    DodgeStarted {
        /// Dodge direction
        direction: Direction,
        /// Steps to take
        steps: u32,
    },
    /// Dodge ended
    DodgeEnded {
        /// Whether a movement lock cut it short
        cancelled: bool,
    },
    /// Regen tick changed resources
    RegenApplied {
        /// Applied change per resource
        delta: ResourceTriple,
    },
    /// State applied or re-applied
    StatusApplied {
        /// State ID
        state: StateId,
        /// Stacks after application
        stacks: u32,
    },
    /// State lost stacks on expiry
    StatusStackLost {
        /// State ID
        state: StateId,
        /// Stacks left
        stacks: u32,
    },
    /// State ran out and was removed
    StatusExpired {
        /// State ID
        state: StateId,
    },
    /// State flag carried without live tracking was dropped
    StatusPurged {
        /// State ID
        state: StateId,
    },
    /// Cast began
    CastStarted {
        /// Skill being cast
        skill: SkillId,
    },
    /// Cast finished; the skill may now execute
    CastCompleted {
        /// Skill cast
        skill: SkillId,
    },
    /// Cast was interrupted by a hit
    CastInterrupted {
        /// Skill that was being cast
        skill: SkillId,
    },
    /// Battler died
    Died,
}

impl CombatEvent {
    /// Whether the UI should redraw after this event.
    #[must_use]
    pub fn affects_display(&self) -> bool {
        !matches!(self, Self::AggroPurged { .. } | Self::CastStarted { .. })
    }

    /// Short snake_case name of the event kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Engaged { .. } => "engaged",
            Self::Disengaged => "disengaged",
            Self::TargetChanged { .. } => "target_changed",
            Self::Alerted { .. } => "alerted",
            Self::AggroPurged { .. } => "aggro_purged",
            Self::GuardStarted { .. } => "guard_started",
            Self::ParryWindowClosed => "parry_window_closed",
            Self::GuardEnded => "guard_ended",
            Self::DodgeStarted { .. } => "dodge_started",
            Self::DodgeEnded { .. } => "dodge_ended",
            Self::RegenApplied { .. } => "regen_applied",
            Self::StatusApplied { .. } => "status_applied",
            Self::StatusStackLost { .. } => "status_stack_lost",
            Self::StatusExpired { .. } => "status_expired",
            Self::StatusPurged { .. } => "status_purged",
            Self::CastStarted { .. } => "cast_started",
            Self::CastCompleted { .. } => "cast_completed",
            Self::CastInterrupted { .. } => "cast_interrupted",
            Self::Died => "died",
        }
    }
}

/// An event tagged with the battler and frame that raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattlerEvent {
    /// Battler that raised the event
    pub battler: BattlerId,
    /// Battler-local frame number
    pub frame: u64,
    /// The event
    pub event: CombatEvent,
}

/// Event bus collecting battler events across a scene.
#[derive(Debug)]
pub struct CombatEventBus {
    /// Sender for broadcasting events
    sender: Sender<BattlerEvent>,
    /// Receiver for collecting events
    receiver: Receiver<BattlerEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for CombatEventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl CombatEventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. Returns false if the bus is full and it was dropped.
    pub fn publish(&self, event: BattlerEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    /// Publishes a batch of events, returning how many were accepted.
    pub fn publish_all(&self, events: impl IntoIterator<Item = BattlerEvent>) -> usize {
        events.into_iter().filter(|e| self.publish(e.clone())).count()
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<BattlerEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<BattlerEvent> {
        self.sender.clone()
    }
}
