//! Decoding of inbound USB-MIDI packets and the state they drive: per-key velocities and the animation clock.

use wmidi::{Channel, MidiMessage, Note};

use crate::NUM_KEYS;

mod clock;
pub use clock::*;

mod note_state;
pub use note_state::*;

mod packet;
pub use packet::*;

/// Control Change number the host uses to select a bank, and the device uses to announce bank changes.
pub const BANK_SELECT_CC: u8 = 3;

/// Where an inbound note lands in the [`NoteStateTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NoteTarget {
    /// Flattened key id in the control table (`0..64` bank 0, `64..128` bank 1).
    Key(u8),
    /// Raw note number in the animation table.
    Animation(u8),
}

/// Real-time clock messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockEvent {
    /// 0xF8
    Tick,
    /// 0xFA
    Start,
    /// 0xFC
    Stop,
}

/// A packet the device acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Inbound {
    /// Light a key or set an animation velocity.
    NoteOn {
        /// Destination entry.
        target: NoteTarget,
        /// Velocity, 1..=127.
        velocity: u8,
    },
    /// Release a key or clear an animation velocity.
    NoteOff {
        /// Destination entry.
        target: NoteTarget,
    },
    /// Host-initiated bank change; applied without echoing a notification.
    BankSelect(u8),
    /// MIDI clock.
    Clock(ClockEvent),
    /// A piece of a SysEx message, to be handed to the reassembler.
    Sysex(UsbMidiPacket),
    /// A well-formed packet the device has no use for.
    Ignored,
}

/// Turns raw packets into [`Inbound`] events according to the listening channel and base note.
///
/// The listening channel carries bank 0 keys, the channel below it bank 1 keys, and the channel above it the
/// animation table. Notes on any other channel are ignored.
#[derive(Clone, Copy, Debug)]
pub struct MidiPacketInterpreter {
    channel: u8,
    base_note: u8,
}

impl MidiPacketInterpreter {
    /// An interpreter listening on 0-based `channel` with key 0 mapped to `base_note`.
    pub fn new(channel: u8, base_note: Note) -> Self {
        Self {
            channel: channel & 0x0F,
            base_note: base_note as u8,
        }
    }

    /// Decode one packet.
    ///
    /// Returns `None` only for an empty (code index 0) packet, which callers draining a receive buffer treat as
    /// "caught up". Anything else yields an event, possibly [`Inbound::Ignored`].
    pub fn decode(&self, packet: UsbMidiPacket) -> Option<Inbound> {
        let code_index = packet.code_index();
        let inbound = match code_index {
            CodeIndex::Misc => return None,
            CodeIndex::SysexContinue
            | CodeIndex::SysexEnd1
            | CodeIndex::SysexEnd2
            | CodeIndex::SysexEnd3 => Inbound::Sysex(packet),
            CodeIndex::NoteOff | CodeIndex::NoteOn | CodeIndex::ControlChange | CodeIndex::SingleByte => {
                match MidiMessage::from_bytes(packet.payload()) {
                    Ok(message) => self.decode_message(message),
                    Err(_) => {
                        debug!("Malformed {} packet: {}", code_index, packet.data);
                        Inbound::Ignored
                    }
                }
            }
            _ => Inbound::Ignored,
        };
        Some(inbound)
    }

    fn decode_message(&self, message: MidiMessage<'_>) -> Inbound {
        match message {
            MidiMessage::NoteOn(channel, note, velocity) if u8::from(velocity) > 0 => {
                match self.target(channel, note) {
                    Some(target) => Inbound::NoteOn {
                        target,
                        velocity: u8::from(velocity),
                    },
                    None => Inbound::Ignored,
                }
            }
            // Note-On with zero velocity is a Note-Off
            MidiMessage::NoteOn(channel, note, _) | MidiMessage::NoteOff(channel, note, _) => {
                match self.target(channel, note) {
                    Some(target) => Inbound::NoteOff { target },
                    None => Inbound::Ignored,
                }
            }
            MidiMessage::ControlChange(channel, function, value)
                if channel.index() == self.channel && u8::from(function.0) == BANK_SELECT_CC =>
            {
                let bank = u8::from(u8::from(value) > 0);
                info!("Host selected bank {}", bank);
                Inbound::BankSelect(bank)
            }
            MidiMessage::TimingClock => Inbound::Clock(ClockEvent::Tick),
            MidiMessage::Start => Inbound::Clock(ClockEvent::Start),
            MidiMessage::Stop => Inbound::Clock(ClockEvent::Stop),
            _ => Inbound::Ignored,
        }
    }

    fn target(&self, channel: Channel, note: Note) -> Option<NoteTarget> {
        let channel = channel.index();
        let note = note as u8;
        if channel == self.channel.wrapping_add(1) & 0x0F {
            return Some(NoteTarget::Animation(note));
        }
        let bank = if channel == self.channel {
            0
        } else if channel == self.channel.wrapping_sub(1) & 0x0F {
            1
        } else {
            return None;
        };
        let key = note.checked_sub(self.base_note).filter(|&key| usize::from(key) < NUM_KEYS)?;
        Some(NoteTarget::Key(key + bank * NUM_KEYS as u8))
    }
}

/// A [`Channel`] from a 0-based index, wrapping into the 16 available channels.
pub fn channel(index: u8) -> Channel {
    Channel::from_index(index & 0x0F).unwrap_or(Channel::Ch1)
}
