use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use super::{Command, CommandHandler, SYSEX_END, SysexBuffer, vendor_message};
use crate::{
    configuration::{AnimationKind, OutputMode, Settings, SideBank},
    device::Device,
    io::Board,
};

/// Number of tags in the config protocol; higher tags are ignored.
pub const TAG_COUNT: usize = 24;

/// Marks a config message as the device's response to a pull.
const CONFIG_RESPONSE: u8 = 0x01;

/// One setting's position in the config protocol.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Tag {
    Channel = 0,
    Velocity,
    KeypressLeds,
    FourBanks,
    ExpansionDigital,
    ExpansionAnalog,
    AutoUpdate,
    OutputMode,
    Combos,
    Multiplexer,
    Animation,
    Rotation,
    Tilt,
    TiltMode,
    TiltSensitivity,
    PitchSensitivity,
    TiltRange,
    PitchRange,
    TiltDeadzone,
    PitchDeadzone,
    TiltAxis,
    PickSensitivity,
    SleepTime,
    SideBank,
}

/// Tags reported in a config response, in order. Keypress LEDs, the expansion ports, auto update and the
/// multiplexer are write-only.
pub const RESPONSE_TAGS: [Tag; 19] = [
    Tag::Channel,
    Tag::Velocity,
    Tag::FourBanks,
    Tag::OutputMode,
    Tag::Combos,
    Tag::Animation,
    Tag::Rotation,
    Tag::Tilt,
    Tag::TiltMode,
    Tag::TiltSensitivity,
    Tag::PitchSensitivity,
    Tag::TiltRange,
    Tag::PitchRange,
    Tag::TiltDeadzone,
    Tag::PitchDeadzone,
    Tag::TiltAxis,
    Tag::PickSensitivity,
    Tag::SleepTime,
    Tag::SideBank,
];

/// Settings in wire form, one byte per [`Tag`].
///
/// The channel is 1-based here; everything else matches the internal representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTable([u8; TAG_COUNT]);

impl TagTable {
    /// Wire form of `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut table = Self([0; TAG_COUNT]);
        table.set(Tag::Channel, settings.channel + 1);
        table.set(Tag::Velocity, settings.velocity);
        table.set(Tag::KeypressLeds, settings.keypress_leds.into());
        table.set(Tag::FourBanks, settings.four_banks.into());
        table.set(Tag::ExpansionDigital, settings.expansion_digital);
        table.set(Tag::ExpansionAnalog, settings.expansion_analog);
        table.set(Tag::AutoUpdate, settings.auto_update.into());
        table.set(Tag::OutputMode, settings.output_mode as u8);
        table.set(Tag::Combos, settings.combos.into());
        table.set(Tag::Multiplexer, settings.multiplexer);
        table.set(Tag::Animation, AnimationKind::to_setting(settings.animation));
        table.set(Tag::Rotation, settings.rotation);
        table.set(Tag::Tilt, settings.tilt);
        table.set(Tag::TiltMode, settings.tilt_mode);
        table.set(Tag::TiltSensitivity, settings.tilt_sensitivity);
        table.set(Tag::PitchSensitivity, settings.pitch_sensitivity);
        table.set(Tag::TiltRange, settings.tilt_range);
        table.set(Tag::PitchRange, settings.pitch_range);
        table.set(Tag::TiltDeadzone, settings.tilt_deadzone);
        table.set(Tag::PitchDeadzone, settings.pitch_deadzone);
        table.set(Tag::TiltAxis, settings.tilt_axis);
        table.set(Tag::PickSensitivity, settings.pick_sensitivity);
        table.set(Tag::SleepTime, settings.sleep_time);
        table.set(Tag::SideBank, settings.side_bank as u8);
        table
    }

    /// Value of one tag.
    pub fn get(&self, tag: Tag) -> u8 {
        self.0[tag as usize]
    }

    /// Overwrite one tag.
    pub fn set(&mut self, tag: Tag, value: u8) {
        self.0[tag as usize] = value;
    }

    /// Overlay `(tag, value)` pairs. Unknown tags and a trailing odd byte are skipped.
    pub fn decode(&mut self, pairs: &[u8]) {
        for pair in pairs.chunks_exact(2) {
            let &[tag, value] = pair else { continue };
            match self.0.get_mut(usize::from(tag)) {
                Some(slot) => *slot = value,
                None => debug!("Ignoring unknown config tag {}", tag),
            }
        }
    }

    /// Internal form. Values that cannot be represented keep their setting from `current`.
    pub fn to_settings(&self, current: &Settings) -> Settings {
        let value = |tag| self.get(tag);
        Settings {
            channel: value(Tag::Channel)
                .checked_sub(1)
                .map_or(current.channel, |channel| channel & 0x0F),
            velocity: value(Tag::Velocity) & 0x7F,
            keypress_leds: value(Tag::KeypressLeds) != 0,
            four_banks: value(Tag::FourBanks) != 0,
            expansion_digital: value(Tag::ExpansionDigital),
            expansion_analog: value(Tag::ExpansionAnalog),
            auto_update: value(Tag::AutoUpdate) != 0,
            output_mode: OutputMode::from_u8(value(Tag::OutputMode)).unwrap_or(current.output_mode),
            combos: value(Tag::Combos) != 0,
            multiplexer: value(Tag::Multiplexer),
            animation: AnimationKind::from_setting(value(Tag::Animation)),
            rotation: value(Tag::Rotation) & 0x03,
            tilt: value(Tag::Tilt) & 0x0F,
            tilt_mode: value(Tag::TiltMode),
            tilt_sensitivity: value(Tag::TiltSensitivity),
            pitch_sensitivity: value(Tag::PitchSensitivity),
            tilt_range: value(Tag::TiltRange),
            pitch_range: value(Tag::PitchRange),
            tilt_deadzone: value(Tag::TiltDeadzone),
            pitch_deadzone: value(Tag::PitchDeadzone),
            tilt_axis: value(Tag::TiltAxis),
            pick_sensitivity: value(Tag::PickSensitivity),
            sleep_time: value(Tag::SleepTime),
            side_bank: SideBank::from_setting(value(Tag::SideBank)),
        }
    }

    /// The config response: `F0 00 01 79 02 01`, a pair for each of [`RESPONSE_TAGS`], then `F7`.
    pub fn response(&self) -> SysexBuffer {
        let mut message = vendor_message(Command::PullConfig);
        message.push(CONFIG_RESPONSE);
        for tag in RESPONSE_TAGS {
            message.push(tag as u8);
            message.push(self.get(tag) & 0x7F);
        }
        message.push(SYSEX_END);
        message
    }
}

/// Command 1: overwrite settings with the tags present in the payload, then persist and echo them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushConfig;

impl CommandHandler for PushConfig {
    fn handle<B: Board>(&self, device: &mut Device<B>, payload: &[u8]) {
        let mut table = TagTable::from_settings(device.settings());
        table.decode(payload);
        let settings = table.to_settings(device.settings());
        device.apply_settings(settings);
    }
}

/// Command 2: report the current settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullConfig;

impl CommandHandler for PullConfig {
    fn handle<B: Board>(&self, device: &mut Device<B>, payload: &[u8]) {
        match payload.first() {
            Some(0) => device.send_config(),
            other => debug!("Ignoring config pull with argument {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_response() {
        let response = TagTable::from_settings(&Settings::FACTORY).response();
        assert_eq!(
            &[
                0xF0, 0x00, 0x01, 0x79, 0x02, 0x01, //
                0, 3, 1, 127, 3, 0, 7, 0, 8, 1, 10, 4, 11, 1, 12, 0xF, 13, 1, //
                14, 0x1E, 15, 0x7F, 16, 0x46, 17, 0x3C, 18, 0x0C, 19, 0x7F, //
                20, 0, 21, 0x40, 22, 0x3C, 23, 0, //
                0xF7,
            ],
            response.as_slice(),
            "Expected left but got right"
        );
    }

    #[test]
    fn decode_overlays_pairs() {
        let current = Settings::FACTORY;
        let mut table = TagTable::from_settings(&current);
        table.decode(&[0, 10, 7, 2, 10, 1, 23, 1, 12, 0x3]);
        let settings = table.to_settings(&current);
        assert_eq!(9, settings.channel, "Wire channels are 1-based; expected left but got right");
        assert_eq!(OutputMode::CcsOnly, settings.output_mode, "Expected left but got right");
        assert_eq!(Some(AnimationKind::Circle), settings.animation, "Expected left but got right");
        assert_eq!(SideBank::Hold, settings.side_bank, "Expected left but got right");
        assert_eq!(0x3, settings.tilt, "Expected left but got right");
        assert_eq!(current.rotation, settings.rotation, "Expected left but got right");
        assert_eq!(current.velocity, settings.velocity, "Expected left but got right");
    }

    #[test]
    fn out_of_range_tags_are_skipped() {
        let current = Settings::FACTORY;
        let mut table = TagTable::from_settings(&current);
        table.decode(&[24, 99, 1, 64, 200, 5, 23]);
        let settings = table.to_settings(&current);
        assert_eq!(
            Settings {
                velocity: 64,
                ..current
            },
            settings,
            "Only the in-range tag should change; expected left but got right"
        );
    }

    #[test]
    fn invalid_values_keep_current_settings() {
        let mut current = Settings::FACTORY;
        current.channel = 5;
        current.output_mode = OutputMode::NotesAndCcs;
        let mut table = TagTable::from_settings(&current);
        table.decode(&[0, 0, 7, 9]);
        let settings = table.to_settings(&current);
        assert_eq!(5, settings.channel, "Expected left but got right");
        assert_eq!(OutputMode::NotesAndCcs, settings.output_mode, "Expected left but got right");
    }
}
