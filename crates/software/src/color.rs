//! Per-key colors: the idle and active color tables, the device palette, and the amplitude scaling used on the wire.

mod palette;
pub use palette::*;

mod scale;
pub use scale::*;

mod table;
pub use table::*;

/// One LED color at internal amplitude, where `48` is full brightness for a palette color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb {
    /// All channels off.
    pub const OFF: Self = Self::new(0, 0, 0);

    /// Build a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The channels in wire order.
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Build from the first three bytes of `bytes`; `None` if fewer are available.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [r, g, b, ..] => Some(Self::new(*r, *g, *b)),
            _ => None,
        }
    }
}
