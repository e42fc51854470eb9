//! Traits for the device's collaborators: the USB-MIDI link, persistent storage, and the LED display.
//!
//! The core never talks to hardware directly. Firmware implements these traits over real peripherals; tests
//! implement them over vectors.

use crate::{
    NUM_KEYS,
    color::{ColorTables, Rgb, palette_remap},
    configuration::{AnimationKind, Settings},
    error::{StorageError, TransportError},
    keys::KeyBitset,
    midi_state::{NoteStateTable, UsbMidiPacket},
};

#[cfg(test)]
pub(crate) mod mock;

/// Attempts made to hand a packet to the transport before it is dropped.
pub const SEND_RETRY_LIMIT: usize = 8;

/// The USB-MIDI link. Every method returns immediately.
pub trait Transport {
    /// Next packet from the host, if one is waiting.
    fn try_receive_packet(&mut self) -> Option<UsbMidiPacket>;

    /// Queue a packet for the host.
    fn send_packet(&mut self, packet: UsbMidiPacket) -> Result<(), TransportError>;

    /// Push anything queued out to the host.
    fn flush(&mut self);

    /// Send `packet`, retrying a bounded number of times while the queue is full.
    ///
    /// Returns `false` if the packet was dropped.
    fn deliver(&mut self, packet: UsbMidiPacket) -> bool {
        for _ in 0..SEND_RETRY_LIMIT {
            match self.send_packet(packet) {
                Ok(()) => return true,
                Err(TransportError::Full) => continue,
                Err(e @ TransportError::Disconnected) => {
                    trace!("Dropping outbound packet: {}", e);
                    return false;
                }
            }
        }
        warn!("Outbound queue stayed full; dropped {}", packet);
        false
    }
}

/// Persistent storage for settings and color tables.
pub trait Storage {
    /// Settings saved by a previous [`save`](Self::save), if any.
    fn load_settings(&mut self) -> Option<Settings>;

    /// Overwrite `colors` with the saved tables. Returns `false`, leaving `colors` untouched, if none are saved.
    fn load_colors(&mut self, colors: &mut ColorTables) -> bool;

    /// Persist settings and colors together.
    fn save(&mut self, settings: &Settings, colors: &ColorTables) -> Result<(), StorageError>;

    /// Erase everything saved so the next boot starts from factory defaults.
    fn factory_reset(&mut self) -> Result<(), StorageError>;
}

/// The LED grid. Calls are fire-and-forget.
pub trait Display {
    /// A key's resting color changed.
    fn set_idle_color(&mut self, bank: u8, key: u8, rgb: Rgb);

    /// A key's active color changed.
    fn set_active_color(&mut self, bank: u8, key: u8, rgb: Rgb);

    /// Play a geometric animation centered on `key`.
    fn trigger_animation(&mut self, key: u8, kind: AnimationKind);

    /// Adjust a host-supplied color so the grid stays within its power budget.
    fn remap_for_power(&self, rgb: Rgb) -> Rgb {
        palette_remap(rgb)
    }

    /// Draw the current state; called once per refresh interval.
    fn render(&mut self, frame: &Frame<'_>);
}

/// Everything the [`Device`](crate::device::Device) needs from the board it runs on.
pub trait Board {
    /// USB-MIDI link.
    type Transport: Transport;
    /// Persistent storage.
    type Storage: Storage;
    /// LED grid.
    type Display: Display;

    /// The USB-MIDI link.
    fn transport(&mut self) -> &mut Self::Transport;
    /// Persistent storage.
    fn storage(&mut self) -> &mut Self::Storage;
    /// The LED grid.
    fn display(&mut self) -> &mut Self::Display;
    /// Hand control to the bootloader. May not return.
    fn enter_bootloader(&mut self);
}

/// A read-only view of what the display should show.
pub struct Frame<'a> {
    /// Active bank.
    pub bank: u8,
    /// Debounced key state.
    pub keys: KeyBitset,
    /// Velocities received from the host.
    pub notes: &'a NoteStateTable,
    /// Idle and active colors.
    pub colors: &'a ColorTables,
    /// Live settings.
    pub settings: &'a Settings,
    /// Animation clock step.
    pub step: u32,
}

impl Frame<'_> {
    /// Whether `key` should show its active color: the host lit it, or it is held and local feedback is on.
    pub fn is_active(&self, key: u8) -> bool {
        let id = usize::from(self.bank) * NUM_KEYS + usize::from(key);
        self.notes.velocity(id) > 0 || (self.settings.keypress_leds && self.keys.contains(key))
    }

    /// The color `key` should show.
    pub fn key_color(&self, key: u8) -> Rgb {
        let table = if self.is_active(key) {
            &self.colors.active
        } else {
            &self.colors.idle
        };
        table
            .get(usize::from(self.bank), usize::from(key))
            .unwrap_or(Rgb::OFF)
    }
}
