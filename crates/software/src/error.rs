//! Reasons a message or packet is dropped.
//!
//! None of these ever reach the host: the protocol has no negative acknowledgement, so a rejected command simply has
//! no effect. They exist so that the drop can be logged and so that the validation code can use `?`.

use thiserror::Error;

/// Problems reassembling or routing a SysEx message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysexError {
    /// A continuation or end fragment arrived while no message was open, or a message did not end with 0xF7.
    #[error("fragment outside of a SysEx message")]
    Framing,
    /// The message outgrew the reassembly buffer and was discarded.
    #[error("SysEx message longer than the reassembly buffer")]
    Overflow,
    /// The message does not carry this device's manufacturer header.
    #[error("SysEx header does not match this device")]
    Header,
    /// No handler is registered for the command byte.
    #[error("no handler for SysEx command {0}")]
    UnknownCommand(u8),
    /// The payload is too short for the command.
    #[error("SysEx payload too short")]
    Truncated,
}

/// Reasons a bulk-transfer request is rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BulkError {
    /// The sub-command is neither push nor pull.
    #[error("unknown bulk transfer command {0}")]
    UnknownCommand(u8),
    /// Tag 0 introduces extended tags, which this device does not support.
    #[error("extended bulk transfer tags are not supported")]
    ExtendedTag,
    /// The tag names no color table.
    #[error("unknown bulk transfer tag {0}")]
    UnknownTag(u8),
    /// Parts are numbered from 1.
    #[error("bulk transfer part numbers start at 1")]
    PartZero,
    /// The part would land past the end of the table.
    #[error("bulk transfer part {0} is past the end of the table")]
    PartOutOfRange(u8),
    /// The declared size is larger than the bytes that arrived, or larger than a part.
    #[error("bulk transfer size {size} exceeds the {available} bytes available")]
    SizeMismatch {
        /// Declared size.
        size: u8,
        /// Bytes that can be accepted.
        available: usize,
    },
    /// The request is shorter than its fixed header.
    #[error("bulk transfer request truncated")]
    Truncated,
}

/// Reasons an outgoing packet could not be handed to the transport.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The outbound queue has no room; the caller may retry.
    #[error("outbound queue full")]
    Full,
    /// No host is connected.
    #[error("host disconnected")]
    Disconnected,
}

/// Persistent storage failures. The device keeps running on the settings it has in memory.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Erasing or writing the backing store failed.
    #[error("failed to write persistent storage")]
    Write,
    /// Reading the backing store failed.
    #[error("failed to read persistent storage")]
    Read,
}
