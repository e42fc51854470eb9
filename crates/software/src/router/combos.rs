use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::keys::{Edges, KeyBitset};

/// Note sent for [`Combo::A`]; the other combos follow consecutively.
pub const COMBO_BASE_NOTE: u8 = 8;

/// One of the five recognizable key combinations.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Combo {
    /// First combo.
    A,
    /// Second combo.
    B,
    /// Third combo.
    C,
    /// Fourth combo.
    D,
    /// Fifth combo.
    E,
}

impl Combo {
    /// Number of combos.
    pub const COUNT: usize = 5;

    /// The synthetic note this combo sends, independent of the grid mapping.
    pub fn note(self) -> u8 {
        COMBO_BASE_NOTE + self as u8
    }
}

/// A combo starting or ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComboAction {
    /// Which combo.
    pub combo: Combo,
    /// `true` when the combo was entered, `false` when it was left.
    pub pressed: bool,
}

/// Recognizes multi-key gestures from the key edges of each poll.
pub trait ComboRecognizer {
    /// Report at most one combo transition for this poll.
    fn recognize(&mut self, edges: &Edges) -> Option<ComboAction>;
}

/// Treats each combo as a chord: it is entered when every key of its mask is held and left when any is released.
///
/// Only one transition is reported per poll; if several combos change at once the rest are reported on the
/// following polls, in order A to E.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChordCombos {
    chords: [KeyBitset; Combo::COUNT],
    active: [bool; Combo::COUNT],
}

impl Default for ChordCombos {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHORDS)
    }
}

impl ChordCombos {
    /// All four corners; the centre 2x2; both top corners; both bottom corners; both left corners.
    pub const DEFAULT_CHORDS: [KeyBitset; Combo::COUNT] = [
        KeyBitset::from_bits(1 << 0 | 1 << 7 | 1 << 56 | 1 << 63),
        KeyBitset::from_bits(1 << 27 | 1 << 28 | 1 << 35 | 1 << 36),
        KeyBitset::from_bits(1 << 0 | 1 << 7),
        KeyBitset::from_bits(1 << 56 | 1 << 63),
        KeyBitset::from_bits(1 << 0 | 1 << 56),
    ];

    /// A recognizer for the given chords. Empty chords never match.
    pub const fn new(chords: [KeyBitset; Combo::COUNT]) -> Self {
        Self {
            chords,
            active: [false; Combo::COUNT],
        }
    }
}

impl ComboRecognizer for ChordCombos {
    fn recognize(&mut self, edges: &Edges) -> Option<ComboAction> {
        for (index, (chord, active)) in self.chords.iter().zip(self.active.iter_mut()).enumerate() {
            let held = !chord.is_empty() && edges.stable.is_superset(*chord);
            if held != *active {
                *active = held;
                let combo = FromPrimitive::from_usize(index)?;
                return Some(ComboAction {
                    combo,
                    pressed: held,
                });
            }
        }
        None
    }
}
