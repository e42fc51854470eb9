use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// How the two bank-select keys switch banks.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SideBank {
    /// Bank-select keys behave like every other key.
    #[default]
    Off,
    /// The bank switches once its key has been held for the configured duration.
    Hold,
    /// The bank switches as soon as its key is pressed.
    Instant,
}

impl SideBank {
    /// Decode a setting byte. Values past [`Hold`](Self::Hold) all mean [`Instant`](Self::Instant).
    pub fn from_setting(value: u8) -> Self {
        FromPrimitive::from_u8(value).unwrap_or(Self::Instant)
    }

    /// Whether the bank-select keys switch banks at all.
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}
