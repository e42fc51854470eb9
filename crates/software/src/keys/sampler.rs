use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

use super::{DebounceRing, KeyBitset};
use crate::time::Millis;

#[derive(Clone, Copy)]
struct SamplerState {
    ring: DebounceRing,
    now: Millis,
}

/// The only state shared between interrupt context and the main loop.
///
/// The interrupt side calls [`tick`](Self::tick) at a fixed rate of one sample per millisecond. It stores the raw
/// matrix reading and advances the millisecond clock that every other timer in the crate is measured against. The
/// main loop reads the clock and takes copies of the ring.
///
/// Every access happens inside a critical section, so the 32-bit clock never tears and a ring copy is always
/// consistent. Each critical section copies at most eleven words.
pub struct Sampler {
    state: Mutex<CriticalSectionRawMutex, RefCell<SamplerState>>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    /// A sampler with an empty ring and a clock at zero; `const` so it can live in a `static`.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SamplerState {
                ring: DebounceRing::new(),
                now: Millis::ZERO,
            })),
        }
    }

    /// Record one raw reading and advance the clock by a millisecond.
    pub fn tick(&self, raw: KeyBitset) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.ring.push(raw);
            state.now = state.now.wrapping_add(1);
        });
    }

    /// Current time.
    pub fn now(&self) -> Millis {
        self.state.lock(|state| state.borrow().now)
    }

    /// A copy of the ring buffer.
    pub fn snapshot(&self) -> DebounceRing {
        self.state.lock(|state| state.borrow().ring)
    }

    /// Debounced key state together with the time it was read.
    pub fn debounced(&self) -> (KeyBitset, Millis) {
        self.state.lock(|state| {
            let state = state.borrow();
            (state.ring.stable(), state.now)
        })
    }
}
