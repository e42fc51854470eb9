use super::KeyBitset;

/// Keys that changed between two consecutive stable states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edges {
    /// Keys pressed since the last poll.
    pub down: KeyBitset,
    /// Keys released since the last poll.
    pub up: KeyBitset,
    /// The stable state these edges lead to.
    pub stable: KeyBitset,
}

impl Edges {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.down.is_empty() && self.up.is_empty()
    }
}

/// Remembers the previous stable state so that each poll yields only the changes.
///
/// Call [`advance`](Self::advance) once per polling cycle. Calling it twice before the debounced state changes
/// reports the change once and then nothing; presses and releases that happen entirely between two calls are never
/// seen.
#[derive(Clone, Copy, Debug, Default)]
pub struct EdgeTracker {
    previous: KeyBitset,
}

impl EdgeTracker {
    /// A tracker that assumes every key starts released.
    pub const fn new() -> Self {
        Self {
            previous: KeyBitset::EMPTY,
        }
    }

    /// Diff `stable` against the previous state, then remember `stable`.
    pub fn advance(&mut self, stable: KeyBitset) -> Edges {
        let changed = self.previous ^ stable;
        let edges = Edges {
            down: changed & stable,
            up: changed & self.previous,
            stable,
        };
        self.previous = stable;
        edges
    }

    /// The state recorded by the last call to [`advance`](Self::advance).
    pub fn previous(&self) -> KeyBitset {
        self.previous
    }
}
