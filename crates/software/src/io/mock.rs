//! Collaborators that record everything the device asks of them.

use std::{collections::VecDeque, vec::Vec};

use super::{Board, Display, Frame, Storage, Transport};
use crate::{
    NUM_KEYS,
    color::{ColorTables, Rgb, palette_remap},
    configuration::{AnimationKind, Settings},
    error::{StorageError, TransportError},
    midi_state::{CodeIndex, UsbMidiPacket},
    sysex::fragment,
};

#[derive(Default)]
pub struct MockTransport {
    pub inbound: VecDeque<UsbMidiPacket>,
    pub sent: Vec<UsbMidiPacket>,
    pub flushes: usize,
}

impl MockTransport {
    pub fn queue(&mut self, bytes: [u8; 4]) {
        self.inbound.push_back(UsbMidiPacket::from_bytes(bytes));
    }

    pub fn queue_sysex(&mut self, message: &[u8]) {
        self.inbound.extend(fragment(0, message));
    }

    /// Channel and real-time messages sent so far, in order.
    pub fn messages(&self) -> Vec<[u8; 3]> {
        self.sent
            .iter()
            .filter(|packet| !is_sysex(packet))
            .map(|packet| packet.data)
            .collect()
    }

    /// SysEx messages sent so far, reassembled.
    pub fn sysex(&self) -> Vec<Vec<u8>> {
        let mut messages = Vec::new();
        let mut current = Vec::new();
        for packet in self.sent.iter().filter(|packet| is_sysex(packet)) {
            current.extend_from_slice(packet.payload());
            if packet.code_index() != CodeIndex::SysexContinue {
                messages.push(core::mem::take(&mut current));
            }
        }
        messages
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

fn is_sysex(packet: &UsbMidiPacket) -> bool {
    matches!(
        packet.code_index(),
        CodeIndex::SysexContinue | CodeIndex::SysexEnd1 | CodeIndex::SysexEnd2 | CodeIndex::SysexEnd3
    )
}

impl Transport for MockTransport {
    fn try_receive_packet(&mut self) -> Option<UsbMidiPacket> {
        self.inbound.pop_front()
    }

    fn send_packet(&mut self, packet: UsbMidiPacket) -> Result<(), TransportError> {
        self.sent.push(packet);
        Ok(())
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

#[derive(Default)]
pub struct MockStorage {
    pub settings: Option<Settings>,
    pub colors: Option<ColorTables>,
    pub saves: usize,
    pub resets: usize,
}

impl Storage for MockStorage {
    fn load_settings(&mut self) -> Option<Settings> {
        self.settings
    }

    fn load_colors(&mut self, colors: &mut ColorTables) -> bool {
        match self.colors {
            Some(saved) => {
                *colors = saved;
                true
            }
            None => false,
        }
    }

    fn save(&mut self, settings: &Settings, colors: &ColorTables) -> Result<(), StorageError> {
        self.settings = Some(*settings);
        self.colors = Some(*colors);
        self.saves += 1;
        Ok(())
    }

    fn factory_reset(&mut self) -> Result<(), StorageError> {
        self.settings = None;
        self.colors = None;
        self.resets += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDisplay {
    pub identity_remap: bool,
    pub idle: Vec<(u8, u8, Rgb)>,
    pub active: Vec<(u8, u8, Rgb)>,
    pub animations: Vec<(u8, AnimationKind)>,
    pub frames: usize,
    /// Bank and per-key colors of the last rendered frame.
    pub last_frame: Option<(u8, Vec<Rgb>)>,
}

impl Display for MockDisplay {
    fn set_idle_color(&mut self, bank: u8, key: u8, rgb: Rgb) {
        self.idle.push((bank, key, rgb));
    }

    fn set_active_color(&mut self, bank: u8, key: u8, rgb: Rgb) {
        self.active.push((bank, key, rgb));
    }

    fn trigger_animation(&mut self, key: u8, kind: AnimationKind) {
        self.animations.push((key, kind));
    }

    fn remap_for_power(&self, rgb: Rgb) -> Rgb {
        if self.identity_remap { rgb } else { palette_remap(rgb) }
    }

    fn render(&mut self, frame: &Frame<'_>) {
        self.frames += 1;
        let colors = (0..NUM_KEYS as u8).map(|key| frame.key_color(key)).collect();
        self.last_frame = Some((frame.bank, colors));
    }
}

#[derive(Default)]
pub struct MockBoard {
    pub transport: MockTransport,
    pub storage: MockStorage,
    pub display: MockDisplay,
    pub bootloader_requests: usize,
}

impl Board for MockBoard {
    type Transport = MockTransport;
    type Storage = MockStorage;
    type Display = MockDisplay;

    fn transport(&mut self) -> &mut MockTransport {
        &mut self.transport
    }

    fn storage(&mut self) -> &mut MockStorage {
        &mut self.storage
    }

    fn display(&mut self) -> &mut MockDisplay {
        &mut self.display
    }

    fn enter_bootloader(&mut self) {
        self.bootloader_requests += 1;
    }
}
