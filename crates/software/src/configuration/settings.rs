use super::{AnimationKind, OutputMode, SideBank};
use num_traits::FromPrimitive;

/// Layout version written as the first byte of a [`Settings::to_image`] image.
pub const SETTINGS_IMAGE_VERSION: u8 = 1;

/// Size in bytes of a persisted settings image.
pub const SETTINGS_IMAGE_LEN: usize = 24;

/// The live device configuration.
///
/// Fields are stored in their natural internal form: the MIDI channel is 0-based, and the tilt directions and
/// rotation are separate values even though persistent storage packs them into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Listening/sending channel, 0-based. Bank 1 sends on the channel below it, animations arrive on the one above.
    pub channel: u8,
    /// Velocity sent with every Note On and Note Off.
    pub velocity: u8,
    /// Whether pressed keys light up locally.
    pub keypress_leds: bool,
    /// Four-bank layout flag, kept for host tooling compatibility.
    pub four_banks: bool,
    /// Digital expansion port mode.
    pub expansion_digital: u8,
    /// Analog expansion port mode.
    pub expansion_analog: u8,
    /// Whether the host editor should refresh automatically.
    pub auto_update: bool,
    /// Which messages key presses produce.
    pub output_mode: OutputMode,
    /// Whether multi-key combos are recognized.
    pub combos: bool,
    /// Multiplexer setting.
    pub multiplexer: u8,
    /// Animation played when a key is pressed, if any.
    pub animation: Option<AnimationKind>,
    /// Grid rotation, two bits.
    pub rotation: u8,
    /// Enabled tilt directions, four bits.
    pub tilt: u8,
    /// Tilt sensor mode, 0-based.
    pub tilt_mode: u8,
    /// Tilt sensitivity.
    pub tilt_sensitivity: u8,
    /// Pitch sensitivity.
    pub pitch_sensitivity: u8,
    /// Tilt range.
    pub tilt_range: u8,
    /// Pitch range.
    pub pitch_range: u8,
    /// Tilt dead zone.
    pub tilt_deadzone: u8,
    /// Pitch dead zone.
    pub pitch_deadzone: u8,
    /// Tilt axis selection.
    pub tilt_axis: u8,
    /// Pick sensitivity.
    pub pick_sensitivity: u8,
    /// Idle time before the display sleeps.
    pub sleep_time: u8,
    /// How the bank-select keys behave.
    pub side_bank: SideBank,
}

impl Default for Settings {
    fn default() -> Self {
        Self::FACTORY
    }
}

impl Settings {
    /// Factory defaults, restored by a factory reset or when storage holds no valid image.
    pub const FACTORY: Self = Self {
        channel: 2,
        velocity: 127,
        keypress_leds: false,
        four_banks: false,
        expansion_digital: 0,
        expansion_analog: 0,
        auto_update: false,
        output_mode: OutputMode::NotesOnly,
        combos: true,
        multiplexer: 0,
        animation: None,
        rotation: 0x1,
        tilt: 0xF,
        tilt_mode: 1,
        tilt_sensitivity: 0x1E,
        pitch_sensitivity: 0x7F,
        tilt_range: 0x46,
        pitch_range: 0x3C,
        tilt_deadzone: 0x0C,
        pitch_deadzone: 0x7F,
        tilt_axis: 0,
        pick_sensitivity: 0x40,
        sleep_time: 0x3C,
        side_bank: SideBank::Off,
    };

    /// Tilt directions and rotation packed as they are persisted: directions in the high nibble.
    pub fn tilt_mask(&self) -> u8 {
        (self.tilt & 0x0F) << 4 | (self.rotation & 0x03)
    }

    /// Inverse of [`tilt_mask`](Self::tilt_mask).
    pub fn set_tilt_mask(&mut self, mask: u8) {
        self.tilt = mask >> 4;
        self.rotation = mask & 0x03;
    }

    /// Serialize for persistent storage.
    pub fn to_image(&self) -> [u8; SETTINGS_IMAGE_LEN] {
        [
            SETTINGS_IMAGE_VERSION,
            self.channel,
            self.velocity,
            self.keypress_leds as u8,
            self.four_banks as u8,
            self.expansion_digital,
            self.expansion_analog,
            self.auto_update as u8,
            self.output_mode as u8,
            self.combos as u8,
            self.multiplexer,
            AnimationKind::to_setting(self.animation),
            self.tilt_mask(),
            self.tilt_mode,
            self.tilt_sensitivity,
            self.pitch_sensitivity,
            self.tilt_range,
            self.pitch_range,
            self.tilt_deadzone,
            self.pitch_deadzone,
            self.tilt_axis,
            self.pick_sensitivity,
            self.sleep_time,
            self.side_bank as u8,
        ]
    }

    /// Deserialize an image written by [`to_image`](Self::to_image).
    ///
    /// Returns `None` for short images, images from another layout version, and erased storage.
    pub fn from_image(image: &[u8]) -> Option<Self> {
        let image: &[u8; SETTINGS_IMAGE_LEN] = image.get(..SETTINGS_IMAGE_LEN)?.try_into().ok()?;
        if image[0] != SETTINGS_IMAGE_VERSION {
            return None;
        }
        let mut settings = Self {
            channel: image[1] & 0x0F,
            velocity: image[2] & 0x7F,
            keypress_leds: image[3] != 0,
            four_banks: image[4] != 0,
            expansion_digital: image[5],
            expansion_analog: image[6],
            auto_update: image[7] != 0,
            output_mode: FromPrimitive::from_u8(image[8])?,
            combos: image[9] != 0,
            multiplexer: image[10],
            animation: AnimationKind::from_setting(image[11]),
            rotation: 0,
            tilt: 0,
            tilt_mode: image[13],
            tilt_sensitivity: image[14],
            pitch_sensitivity: image[15],
            tilt_range: image[16],
            pitch_range: image[17],
            tilt_deadzone: image[18],
            pitch_deadzone: image[19],
            tilt_axis: image[20],
            pick_sensitivity: image[21],
            sleep_time: image[22],
            side_bank: SideBank::from_setting(image[23]),
        };
        settings.set_tilt_mask(image[12]);
        Some(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_tilt_mask_matches_packed_default() {
        assert_eq!(0xF1, Settings::FACTORY.tilt_mask(), "Expected left but got right");
    }

    #[test]
    fn image_round_trip() {
        let mut settings = Settings::FACTORY;
        settings.channel = 9;
        settings.output_mode = OutputMode::CcsOnly;
        settings.animation = Some(AnimationKind::Star);
        settings.side_bank = SideBank::Hold;
        settings.tilt = 0x5;
        settings.rotation = 0x2;

        let restored = Settings::from_image(&settings.to_image());
        assert_eq!(Some(settings), restored, "Expected left but got right");
    }

    #[test]
    fn erased_or_foreign_images_are_rejected() {
        assert_eq!(None, Settings::from_image(&[0xFF; SETTINGS_IMAGE_LEN]));
        assert_eq!(None, Settings::from_image(&[SETTINGS_IMAGE_VERSION; 3]));
        let mut image = Settings::FACTORY.to_image();
        image[8] = 7; // no such output mode
        assert_eq!(None, Settings::from_image(&image));
    }
}
