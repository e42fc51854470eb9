/// Largest internal channel level used by palette colors.
pub const INTERNAL_MAX: u8 = 48;
/// Largest value a SysEx data byte can carry.
pub const WIRE_MAX: u8 = 127;

/// Linear rescaling between internal color amplitude (`0..=48`) and the 7-bit wire range (`0..=127`).
///
/// Encoding truncates, as the host tooling expects. Decoding rounds to the nearest internal level, which makes it the
/// best available inverse: every internal level survives an encode/decode round trip within one unit.
pub struct ColorScale;

impl ColorScale {
    /// Scale an internal level up to the wire range. Levels above [`INTERNAL_MAX`] saturate at [`WIRE_MAX`].
    pub fn encode(level: u8) -> u8 {
        let scaled = u16::from(level) * u16::from(WIRE_MAX) / u16::from(INTERNAL_MAX);
        scaled.min(u16::from(WIRE_MAX)) as u8
    }

    /// Scale a wire value back down to the internal range.
    pub fn decode(value: u8) -> u8 {
        let value = u16::from(value.min(WIRE_MAX));
        let wire_max = u16::from(WIRE_MAX);
        ((value * u16::from(INTERNAL_MAX) + wire_max / 2) / wire_max) as u8
    }
}
