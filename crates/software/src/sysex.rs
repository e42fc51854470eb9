//! System Exclusive messaging: reassembly of fragmented messages, command dispatch, and the vendor protocols.
//!
//! USB-MIDI carries SysEx three bytes at a time. The [`Reassembler`] stitches fragments back together into a
//! [`SysexMessage`], which is either a universal identity request or a vendor message of the form
//! `F0 00 01 79 <command> <payload...> F7`. Vendor commands are looked up in a [`Registry`] and handed to a
//! [`Handler`].

use embassy_time::Duration;
use enum_dispatch::enum_dispatch;
use num_derive::{FromPrimitive, ToPrimitive};
use tinyvec::ArrayVec;

use crate::{
    device::Device,
    error::SysexError,
    io::Board,
    midi_state::{CodeIndex, UsbMidiPacket},
    time::Millis,
};

mod bulk;
pub use bulk::*;

mod config;
pub use config::*;

mod system;
pub use system::*;

/// First byte of every SysEx message.
pub const SYSEX_START: u8 = 0xF0;
/// Last byte of every SysEx message.
pub const SYSEX_END: u8 = 0xF7;
/// Manufacturer id that prefixes every vendor message.
pub const MANUFACTURER_ID: [u8; 3] = [0x00, 0x01, 0x79];
/// Longest message the reassembler accepts, framing bytes included.
pub const MAX_SYSEX_LEN: usize = 64;

const REGISTRY_LEN: usize = 16;

/// A complete SysEx message, either reassembled or about to be sent.
pub type SysexBuffer = ArrayVec<[u8; MAX_SYSEX_LEN]>;

/// Reply to a universal identity request: family 0x0006, model 0x0001, firmware dated 2017-07-24.
pub const IDENTITY_REPLY: [u8; 17] = [
    SYSEX_START,
    0x7E,
    0x7F,
    0x06,
    0x02,
    MANUFACTURER_ID[0],
    MANUFACTURER_ID[1],
    MANUFACTURER_ID[2],
    0x06,
    0x00,
    0x01,
    0x00,
    0x20,
    0x17,
    0x07,
    0x24,
    SYSEX_END,
];

/// Vendor command bytes.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Host writes settings.
    PushConfig = 1,
    /// Host reads settings; also the command byte of the response.
    PullConfig = 2,
    /// Menu, bootloader and factory reset.
    System = 3,
    /// Multi-part color table transfer.
    BulkTransfer = 4,
}

/// Start an outgoing vendor message: `F0 00 01 79 <command>`. The caller appends the payload and [`SYSEX_END`].
pub fn vendor_message(command: Command) -> SysexBuffer {
    let mut message = SysexBuffer::new();
    message.push(SYSEX_START);
    message.extend_from_slice(&MANUFACTURER_ID);
    message.push(command as u8);
    message
}

/// Split a complete message into USB-MIDI packets on `cable`.
pub fn fragment(cable: u8, bytes: &[u8]) -> impl Iterator<Item = UsbMidiPacket> + '_ {
    let count = bytes.len().div_ceil(3);
    bytes.chunks(3).enumerate().map(move |(i, chunk)| {
        let code_index = if i + 1 < count {
            CodeIndex::SysexContinue
        } else {
            match chunk.len() {
                1 => CodeIndex::SysexEnd1,
                2 => CodeIndex::SysexEnd2,
                _ => CodeIndex::SysexEnd3,
            }
        };
        let mut data = [0; 3];
        data[..chunk.len()].copy_from_slice(chunk);
        UsbMidiPacket::new(cable, code_index, data)
    })
}

/// What a complete message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// Universal identity request, `F0 7E <device> 06 01 F7`.
    Identity,
    /// A command addressed to this manufacturer.
    Vendor {
        /// Command byte.
        command: u8,
        /// Bytes between the command and the closing [`SYSEX_END`].
        payload: &'a [u8],
    },
}

/// A reassembled message, `F0` through `F7` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexMessage(SysexBuffer);

impl SysexMessage {
    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Classify the message by its header.
    pub fn request(&self) -> Result<Request<'_>, SysexError> {
        match self.as_bytes() {
            [SYSEX_START, 0x7E, _, 0x06, 0x01, SYSEX_END] => Ok(Request::Identity),
            [SYSEX_START, m0, m1, m2, command, payload @ .., SYSEX_END] if [*m0, *m1, *m2] == MANUFACTURER_ID => {
                Ok(Request::Vendor {
                    command: *command,
                    payload,
                })
            }
            _ => Err(SysexError::Header),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assembly {
    Idle,
    Open(Millis),
    /// Too long to keep; bytes are discarded until the message ends.
    Overflowed(Millis),
}

/// Collects SysEx fragments until the end of a message.
///
/// A fragment that starts with [`SYSEX_START`] always begins a new message, discarding anything left open, so an
/// unterminated message can never bleed into the next one.
#[derive(Debug, Clone)]
pub struct Reassembler {
    buffer: SysexBuffer,
    state: Assembly,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    /// An idle reassembler.
    pub fn new() -> Self {
        Self {
            buffer: SysexBuffer::new(),
            state: Assembly::Idle,
        }
    }

    /// Feed one fragment (code index 0x4 to 0x7). Returns the message once its last fragment arrives.
    pub fn push(&mut self, packet: UsbMidiPacket, now: Millis) -> Result<Option<SysexMessage>, SysexError> {
        let code_index = packet.code_index();
        if !matches!(
            code_index,
            CodeIndex::SysexContinue | CodeIndex::SysexEnd1 | CodeIndex::SysexEnd2 | CodeIndex::SysexEnd3
        ) {
            return Err(SysexError::Framing);
        }

        let bytes = packet.payload();
        if bytes.first() == Some(&SYSEX_START) {
            if self.state != Assembly::Idle {
                debug!("SysEx restarted before the previous message ended");
            }
            self.buffer.clear();
            self.state = Assembly::Open(now);
        } else if self.state == Assembly::Idle {
            return Err(SysexError::Framing);
        }

        self.append(bytes);
        match code_index {
            CodeIndex::SysexContinue => Ok(None),
            _ => self.close(),
        }
    }

    /// Abandon a message that has been open for longer than `timeout`. Returns whether one was abandoned.
    pub fn expire(&mut self, now: Millis, timeout: Duration) -> bool {
        match self.state {
            Assembly::Open(since) | Assembly::Overflowed(since) if now.has_elapsed(since, timeout) => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Whether a message is in progress.
    pub fn is_open(&self) -> bool {
        self.state != Assembly::Idle
    }

    /// Drop any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = Assembly::Idle;
    }

    fn append(&mut self, bytes: &[u8]) {
        if let Assembly::Open(since) = self.state {
            if self.buffer.len() + bytes.len() > self.buffer.capacity() {
                self.buffer.clear();
                self.state = Assembly::Overflowed(since);
            } else {
                self.buffer.extend_from_slice(bytes);
            }
        }
    }

    fn close(&mut self) -> Result<Option<SysexMessage>, SysexError> {
        let state = core::mem::replace(&mut self.state, Assembly::Idle);
        let buffer = core::mem::take(&mut self.buffer);
        match state {
            Assembly::Open(_) if buffer.last() == Some(&SYSEX_END) => Ok(Some(SysexMessage(buffer))),
            Assembly::Overflowed(_) => Err(SysexError::Overflow),
            _ => Err(SysexError::Framing),
        }
    }
}

/// Something that acts on one vendor command.
#[enum_dispatch]
pub trait CommandHandler {
    /// Act on `payload`, the bytes between the command byte and the closing [`SYSEX_END`].
    ///
    /// Invalid payloads are logged and ignored; the protocol has no way to report them to the host.
    fn handle<B: Board>(&self, device: &mut Device<B>, payload: &[u8]);
}

/// The built-in command handlers.
#[enum_dispatch(CommandHandler)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// See [`PushConfig`].
    PushConfig,
    /// See [`PullConfig`].
    PullConfig,
    /// See [`SystemCommand`].
    SystemCommand,
    /// See [`BulkTransfer`].
    BulkTransfer,
}

/// Maps command bytes to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registry {
    handlers: [Option<Handler>; REGISTRY_LEN],
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// A registry that knows no commands.
    pub const fn empty() -> Self {
        Self {
            handlers: [None; REGISTRY_LEN],
        }
    }

    /// The registry installed at startup.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.install(Command::PushConfig as u8, PushConfig.into());
        registry.install(Command::PullConfig as u8, PullConfig.into());
        registry.install(Command::System as u8, SystemCommand.into());
        registry.install(Command::BulkTransfer as u8, BulkTransfer.into());
        registry
    }

    /// Route `command` to `handler`, replacing any previous handler. Returns `false` if `command` is out of range.
    pub fn install(&mut self, command: u8, handler: Handler) -> bool {
        match self.handlers.get_mut(usize::from(command)) {
            Some(slot) => {
                *slot = Some(handler);
                true
            }
            None => false,
        }
    }

    /// The handler for `command`.
    pub fn lookup(&self, command: u8) -> Result<Handler, SysexError> {
        self.handlers
            .get(usize::from(command))
            .copied()
            .flatten()
            .ok_or(SysexError::UnknownCommand(command))
    }
}
