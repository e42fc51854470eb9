use embassy_time::Duration;

use crate::time::Millis;

/// MIDI clock ticks per animation step; 24 ticks per quarter note gives eight steps per beat.
const TICKS_PER_STEP: u8 = 3;

/// Step counter that paces LED animations.
///
/// While the host sends MIDI clock the counter follows it. Otherwise it free-runs from the sampler clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnimationClock {
    synced: bool,
    ticks: u8,
    step: u32,
    last_free_step: Millis,
}

impl AnimationClock {
    /// A free-running clock at step 0.
    pub const fn new() -> Self {
        Self {
            synced: false,
            ticks: 0,
            step: 0,
            last_free_step: Millis::ZERO,
        }
    }

    /// MIDI timing clock (0xF8). Receiving clock is enough to switch to synced mode.
    pub fn tick(&mut self) {
        self.synced = true;
        self.ticks += 1;
        if self.ticks >= TICKS_PER_STEP {
            self.ticks = 0;
            self.step = self.step.wrapping_add(1);
        }
    }

    /// MIDI start (0xFA).
    pub fn start(&mut self) {
        self.synced = true;
        self.ticks = 0;
    }

    /// MIDI stop (0xFC); the counter resumes free-running from `now`.
    pub fn stop(&mut self, now: Millis) {
        self.synced = false;
        self.last_free_step = now;
    }

    /// Advance the free-running counter; no effect while synced.
    pub fn advance(&mut self, now: Millis, step_len: Duration) {
        if !self.synced && now.has_elapsed(self.last_free_step, step_len) {
            self.step = self.step.wrapping_add(1);
            self.last_free_step = now;
        }
    }

    /// Current step.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Whether the counter is following MIDI clock.
    pub fn is_synced(&self) -> bool {
        self.synced
    }
}
