//! This crate contains the architecture-agnostic core of Gridkey, a USB-MIDI controller with an 8×8 grid of
//! backlit buttons. It debounces the button matrix, turns key presses into [MIDI](https://midi.org/midi-1-0)
//! messages across two banks, lights the grid from notes sent by the host, and implements the SysEx protocols the
//! host editor uses to read and write settings and color tables.
//!
//! Hardware is reached only through the traits in [`io`], so everything here runs and is tested on the host.

#![deny(missing_docs)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod color;
pub mod configuration;
pub mod device;
pub mod error;
pub mod io;
pub mod keys;
/// Data structures for tracking MIDI messages the device has received.
pub mod midi_state;
pub mod router;
pub mod sysex;
pub mod time;

/// Buttons in the grid.
pub const NUM_KEYS: usize = 64;

/// Banks of notes the grid can switch between.
pub const NUM_BANKS: usize = 2;
