//! Threat ("aggro") table.
//!
//! Each battler keeps one entry per opponent it has interacted with. The
//! entry with the highest score is the battler's preferred target.
//!
//! Mutation is a no-op while the table (the owning battler's aggro) or the
//! individual entry is locked, unless the caller forces it.

use serde::{Deserialize, Serialize};
use skirmish_common::BattlerId;

/// Threat held against one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggroEntry {
    /// The target this threat is held against.
    pub target: BattlerId,
    /// Threat score, never negative.
    pub score: i32,
    /// Locked entries ignore unforced mutation.
    pub locked: bool,
}

impl AggroEntry {
    /// Create an unlocked entry, clamping the score at zero.
    #[must_use]
    pub fn new(target: BattlerId, score: i32) -> Self {
        Self {
            target,
            score: score.max(0),
            locked: false,
        }
    }
}

/// Per-battler threat table.
///
/// Entries keep insertion order; ties in score resolve to the earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggroTable {
    entries: Vec<AggroEntry>,
    locked: bool,
}

impl AggroTable {
    /// Create an empty, unlocked table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the whole table is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock the table against unforced mutation.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Unlock the table.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Lock a single entry. Returns false if the target has no entry.
    pub fn lock_entry(&mut self, target: BattlerId) -> bool {
        self.entry_mut(target).map(|e| e.locked = true).is_some()
    }

    /// Unlock a single entry. Returns false if the target has no entry.
    pub fn unlock_entry(&mut self, target: BattlerId) -> bool {
        self.entry_mut(target).map(|e| e.locked = false).is_some()
    }

    /// Add `delta` threat against `target`, creating the entry if needed.
    ///
    /// Returns true if the table changed.
    pub fn add_or_update(&mut self, target: BattlerId, delta: i32, forced: bool) -> bool {
        if self.locked && !forced {
            return false;
        }
        match self.entry_mut(target) {
            Some(entry) => {
                if entry.locked && !forced {
                    return false;
                }
                entry.score = entry.score.saturating_add(delta).max(0);
            },
            None => self.entries.push(AggroEntry::new(target, delta)),
        }
        true
    }

    /// Zero the threat against `target`. Returns true if the table changed.
    pub fn reset(&mut self, target: BattlerId, forced: bool) -> bool {
        if self.locked && !forced {
            return false;
        }
        match self.entry_mut(target) {
            Some(entry) if forced || !entry.locked => {
                entry.score = 0;
                true
            },
            _ => false,
        }
    }

    /// Zero every entry except the one for `except`.
    pub fn reset_all(&mut self, except: Option<BattlerId>, forced: bool) {
        if self.locked && !forced {
            return;
        }
        for entry in &mut self.entries {
            if Some(entry.target) == except || (entry.locked && !forced) {
                continue;
            }
            entry.score = 0;
        }
    }

    /// Reduce every unlocked entry by `amount`, flooring at zero.
    pub fn decay(&mut self, amount: i32) {
        if self.locked || amount <= 0 {
            return;
        }
        for entry in self.entries.iter_mut().filter(|e| !e.locked) {
            entry.score = entry.score.saturating_sub(amount).max(0);
        }
    }

    /// Entries ordered by descending score; ties keep insertion order.
    #[must_use]
    pub fn sorted_descending(&self) -> Vec<AggroEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.score.cmp(&a.score));
        sorted
    }

    /// The entry with the highest score.
    ///
    /// When the top two scores are equal, the first is bumped by one so the
    /// order stays total and repeated calls keep returning the same target.
    pub fn highest(&mut self) -> Option<AggroEntry> {
        let sorted = self.sorted_descending();
        let mut top = *sorted.first()?;
        if sorted.get(1).is_some_and(|second| second.score == top.score) {
            if let Some(entry) = self.entry_mut(top.target) {
                entry.score = entry.score.saturating_add(1);
                top = *entry;
            }
        }
        Some(top)
    }

    /// Remove `target`'s entry if `is_valid` rejects it. Returns true if removed.
    pub fn remove_if_invalid(
        &mut self,
        target: BattlerId,
        is_valid: impl Fn(BattlerId) -> bool,
    ) -> bool {
        if self.get(target).is_none() || is_valid(target) {
            return false;
        }
        self.remove(target)
    }

    /// Remove every entry `is_valid` rejects, returning the purged targets.
    pub fn retain_valid(&mut self, mut is_valid: impl FnMut(BattlerId) -> bool) -> Vec<BattlerId> {
        let mut purged = Vec::new();
        self.entries.retain(|entry| {
            let keep = is_valid(entry.target);
            if !keep {
                purged.push(entry.target);
            }
            keep
        });
        purged
    }

    /// Drop `target`'s entry. Returns true if it existed.
    pub fn remove(&mut self, target: BattlerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.target != target);
        self.entries.len() != before
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up the entry for `target`.
    #[must_use]
    pub fn get(&self, target: BattlerId) -> Option<&AggroEntry> {
        self.entries.iter().find(|e| e.target == target)
    }

    /// Score held against `target`, zero if untracked.
    #[must_use]
    pub fn score(&self, target: BattlerId) -> i32 {
        self.get(target).map_or(0, |e| e.score)
    }

    /// Number of tracked targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no targets are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AggroEntry> {
        self.entries.iter()
    }

    fn entry_mut(&mut self, target: BattlerId) -> Option<&mut AggroEntry> {
        self.entries.iter_mut().find(|e| e.target == target)
    }
}
