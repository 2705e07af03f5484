//! Restartable frame countdown.
//!
//! Every countdown-to-completion in the combat core (cooldowns, parry
//! windows, engagement throttling, regen cadence, cast times) is a
//! [`FrameTimer`]. A timer counts up from zero; it is complete once the
//! counter reaches `max`.

use std::fmt;

/// Callback fired once when a timer transitions to complete.
pub type CompletionHook = Box<dyn FnMut() + Send>;

/// A frame counter with a completion flag.
pub struct FrameTimer {
    current: u32,
    max: u32,
    complete: bool,
    stop_at_cap: bool,
    on_complete: Option<CompletionHook>,
}

impl FrameTimer {
    /// Create a timer that stops counting once it reaches `max`.
    #[must_use]
    pub fn new(max: u32) -> Self {
        let mut timer = Self {
            current: 0,
            max: 0,
            complete: false,
            stop_at_cap: true,
            on_complete: None,
        };
        timer.initialize(max, true);
        timer
    }

    /// Create a timer that is already complete.
    #[must_use]
    pub fn completed(max: u32) -> Self {
        let mut timer = Self::new(max);
        timer.current = max;
        timer.complete = true;
        timer
    }

    /// Attach a one-shot completion hook.
    #[must_use]
    pub fn with_hook(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Replace the completion hook.
    pub fn set_hook(&mut self, hook: Option<CompletionHook>) {
        self.on_complete = hook;
    }

    /// Restart the timer with a new maximum.
    ///
    /// A zero maximum is complete immediately, without firing the hook.
    pub fn initialize(&mut self, max: u32, stop_at_cap: bool) {
        self.current = 0;
        self.max = max;
        self.stop_at_cap = stop_at_cap;
        self.complete = max == 0;
    }

    /// Advance one frame. Returns true on the frame the timer completes.
    pub fn tick(&mut self) -> bool {
        if self.complete && self.stop_at_cap {
            return false;
        }
        self.current = self.current.saturating_add(1);
        self.check_completion()
    }

    /// Restart from zero with the same maximum.
    pub fn reset(&mut self) {
        self.current = 0;
        self.complete = self.max == 0;
    }

    /// Jump straight to completion.
    pub fn force_complete(&mut self) {
        self.current = self.max;
        self.check_completion();
    }

    /// Set the counter directly.
    ///
    /// Dropping below `max` re-opens a completed timer.
    pub fn set_current(&mut self, frames: u32) {
        self.current = frames;
        if self.current < self.max {
            self.complete = false;
        } else {
            self.check_completion();
        }
    }

    /// Shift the counter by `delta` frames, flooring at zero.
    pub fn modify(&mut self, delta: i64) {
        let shifted = (i64::from(self.current) + delta).clamp(0, i64::from(u32::MAX));
        self.set_current(shifted as u32);
    }

    /// Change the maximum, keeping the current count.
    pub fn set_max(&mut self, max: u32) {
        self.max = max;
        self.set_current(self.current);
    }

    /// Whether the counter has reached the maximum.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Frames counted so far.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Frames required for completion.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Frames left before completion.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.current)
    }

    /// Completion ratio from 0.0 to 1.0.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.max == 0 {
            1.0
        } else {
            (self.current as f32 / self.max as f32).min(1.0)
        }
    }

    fn check_completion(&mut self) -> bool {
        if self.current < self.max {
            return false;
        }
        if self.stop_at_cap {
            self.current = self.max;
        }
        if self.complete {
            return false;
        }
        self.complete = true;
        if let Some(hook) = self.on_complete.as_mut() {
            hook();
        }
        true
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for FrameTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTimer")
            .field("current", &self.current)
            .field("max", &self.max)
            .field("complete", &self.complete)
            .field("stop_at_cap", &self.stop_at_cap)
            .field("has_hook", &self.on_complete.is_some())
            .finish()
    }
}
