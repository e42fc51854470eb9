use super::KeyBitset;

/// Number of consecutive samples a key must agree on before its stable state changes.
pub const DEBOUNCE_DEPTH: usize = 10;

/// The most recent raw samples of the key matrix, oldest overwritten first.
///
/// The stable state is the bitwise AND of every sample: a key reads as pressed only if it was pressed in all of them.
/// This errs toward missing a very short press rather than reporting one caused by contact bounce. A pressed key
/// that drops out for one sample reads as released until the ring has refilled with pressed samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebounceRing<const N: usize = DEBOUNCE_DEPTH> {
    samples: [KeyBitset; N],
    next: usize,
}

impl<const N: usize> Default for DebounceRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DebounceRing<N> {
    /// An empty ring; every key reads as released until `N` pressed samples have arrived.
    pub const fn new() -> Self {
        Self {
            samples: [KeyBitset::EMPTY; N],
            next: 0,
        }
    }

    /// Store a raw sample in the next slot.
    pub fn push(&mut self, raw: KeyBitset) {
        self.samples[self.next] = raw;
        self.next = (self.next + 1) % N;
    }

    /// The debounced key state. Pure; may be called any number of times between pushes.
    pub fn stable(&self) -> KeyBitset {
        self.samples
            .iter()
            .fold(KeyBitset::ALL, |stable, &sample| stable & sample)
    }
}
