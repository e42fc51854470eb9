use num_derive::{FromPrimitive, ToPrimitive};

/// Which MIDI messages a key press produces.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Note On/Off only.
    #[default]
    NotesOnly,
    /// Note On/Off, each mirrored by a Control Change.
    NotesAndCcs,
    /// Control Change only.
    CcsOnly,
}

impl OutputMode {
    /// Whether Note On/Off messages are sent.
    pub fn sends_notes(self) -> bool {
        self != Self::CcsOnly
    }

    /// Whether Control Change mirrors are sent.
    pub fn sends_ccs(self) -> bool {
        self != Self::NotesOnly
    }
}
