use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use wmidi::MidiMessage;

/// Code Index Number: the low nibble of a USB-MIDI packet header, classifying the three bytes that follow.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodeIndex {
    /// Reserved for future extensions.
    Misc = 0x0,
    /// Reserved for cable events.
    CableEvent = 0x1,
    /// Two-byte system common message.
    SystemCommon2 = 0x2,
    /// Three-byte system common message.
    SystemCommon3 = 0x3,
    /// SysEx starts or continues; three data bytes.
    SysexContinue = 0x4,
    /// SysEx ends with one byte, or a single-byte system common message.
    SysexEnd1 = 0x5,
    /// SysEx ends with two bytes.
    SysexEnd2 = 0x6,
    /// SysEx ends with three bytes.
    SysexEnd3 = 0x7,
    /// Note Off.
    NoteOff = 0x8,
    /// Note On.
    NoteOn = 0x9,
    /// Polyphonic key pressure.
    PolyPressure = 0xA,
    /// Control Change.
    ControlChange = 0xB,
    /// Program Change.
    ProgramChange = 0xC,
    /// Channel pressure.
    ChannelPressure = 0xD,
    /// Pitch bend.
    PitchBend = 0xE,
    /// A single byte, typically real-time.
    SingleByte = 0xF,
}

impl CodeIndex {
    /// Number of meaningful bytes in the packet body.
    pub fn data_len(self) -> usize {
        match self {
            Self::Misc | Self::CableEvent => 0,
            Self::SysexEnd1 | Self::SingleByte => 1,
            Self::SystemCommon2 | Self::SysexEnd2 | Self::ProgramChange | Self::ChannelPressure => 2,
            _ => 3,
        }
    }

    /// The code index carrying a channel or real-time message with this status byte.
    pub fn for_status(status: u8) -> Self {
        match status {
            0x80..=0xEF => FromPrimitive::from_u8(status >> 4).unwrap_or(Self::Misc),
            0xF1 | 0xF3 => Self::SystemCommon2,
            0xF2 => Self::SystemCommon3,
            0xF6 | 0xF8..=0xFF => Self::SingleByte,
            _ => Self::Misc,
        }
    }
}

/// One 32-bit USB-MIDI event packet: a header (cable number and code index) and three body bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsbMidiPacket {
    /// Cable number in the high nibble, code index in the low nibble.
    pub header: u8,
    /// Body bytes; unused trailing bytes are zero.
    pub data: [u8; 3],
}

impl UsbMidiPacket {
    /// Build a packet on `cable`.
    pub const fn new(cable: u8, code_index: CodeIndex, data: [u8; 3]) -> Self {
        Self {
            header: (cable & 0x0F) << 4 | code_index as u8,
            data,
        }
    }

    /// Parse four raw bytes as received from the USB endpoint.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            header: bytes[0],
            data: [bytes[1], bytes[2], bytes[3]],
        }
    }

    /// The four bytes to hand to the USB endpoint.
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.header, self.data[0], self.data[1], self.data[2]]
    }

    /// Virtual cable number.
    pub const fn cable(self) -> u8 {
        self.header >> 4
    }

    /// The header's code index.
    pub fn code_index(self) -> CodeIndex {
        FromPrimitive::from_u8(self.header & 0x0F).unwrap_or(CodeIndex::Misc)
    }

    /// The meaningful body bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.code_index().data_len()]
    }

    /// Wrap a channel or real-time message. Returns `None` for SysEx, which must be fragmented instead.
    pub fn from_message(cable: u8, message: &MidiMessage<'_>) -> Option<Self> {
        let mut data = [0_u8; 3];
        let len = message.bytes_size();
        if len == 0 || len > data.len() {
            return None;
        }
        message.copy_to_slice(&mut data[..len]).ok()?;
        Some(Self::new(cable, CodeIndex::for_status(data[0]), data))
    }
}
