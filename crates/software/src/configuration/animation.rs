use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// The geometric animations the display can play, centered on a key.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnimationKind {
    /// Expanding square.
    Square,
    /// Expanding circle.
    Circle,
    /// Star burst.
    Star,
    /// Triangle; also used to confirm a settings change.
    Triangle,
}

impl AnimationKind {
    /// Decode a stored or transmitted animation setting. Any value past the last kind means "no animation".
    pub fn from_setting(value: u8) -> Option<Self> {
        FromPrimitive::from_u8(value)
    }

    /// Encode an animation setting; `None` is written as the first value past the last kind.
    pub fn to_setting(kind: Option<Self>) -> u8 {
        kind.map_or(ANIMATION_DISABLED, |kind| kind as u8)
    }
}

/// Setting value that turns key-press animations off.
pub const ANIMATION_DISABLED: u8 = 4;
