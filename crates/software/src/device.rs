//! The main-loop side of the controller.
//!
//! [`Device`] owns all state that is not shared with interrupt context and drives the board's collaborators. Firmware
//! calls [`Device::poll`] in a tight loop; each call drains inbound MIDI, turns newly debounced key edges into
//! outbound MIDI, and every refresh interval runs the periodic service (bank-select timers, delayed note-offs,
//! one-shot animations, stale SysEx, and a display frame).

use crate::{
    NUM_BANKS, NUM_KEYS,
    color::{ColorTables, ColorTarget},
    configuration::{AnimationKind, Settings, Tuning},
    io::{Board, Display, Frame, Storage, Transport},
    keys::{EdgeTracker, Edges, KeyBitset, Sampler},
    midi_state::{
        AnimationClock, ClockEvent, Inbound, MidiPacketInterpreter, NoteStateTable, NoteTarget, UsbMidiPacket,
    },
    router::{KeyEvent, KeyEventRouter},
    sysex::{CommandHandler, IDENTITY_REPLY, Part, Reassembler, Registry, Request, SysexMessage, TagTable, fragment},
    time::Millis,
};

/// Most packets taken from the transport in one poll.
pub const RX_PACKETS_PER_POLL: usize = 512;
/// Consecutive empty reads after which a poll stops waiting for more input.
pub const RX_IDLE_LIMIT: usize = 120;
/// Virtual cable every outbound packet is sent on.
pub const MIDI_CABLE: u8 = 0;

/// The controller: settings, colors, note state and protocol state, bound to a [`Board`].
pub struct Device<B: Board> {
    board: B,
    settings: Settings,
    tuning: Tuning,
    colors: ColorTables,
    notes: NoteStateTable,
    clock: AnimationClock,
    router: KeyEventRouter,
    edges: EdgeTracker,
    reassembler: Reassembler,
    registry: Registry,
    interpreter: MidiPacketInterpreter,
    now: Millis,
    last_service: Millis,
}

impl<B: Board> Device<B> {
    /// Load settings and colors from the board's storage, falling back to factory defaults, and publish the colors
    /// to the display.
    pub fn new(mut board: B, tuning: Tuning) -> Self {
        let settings = board.storage().load_settings().unwrap_or_else(|| {
            info!("No saved settings; using factory defaults");
            Settings::FACTORY
        });
        let mut colors = ColorTables::FACTORY;
        if !board.storage().load_colors(&mut colors) {
            info!("No saved colors; using factory defaults");
        }

        let mut device = Self {
            board,
            settings,
            tuning,
            colors,
            notes: NoteStateTable::new(),
            clock: AnimationClock::new(),
            router: KeyEventRouter::default(),
            edges: EdgeTracker::new(),
            reassembler: Reassembler::new(),
            registry: Registry::standard(),
            interpreter: MidiPacketInterpreter::new(settings.channel, tuning.base_note),
            now: Millis::ZERO,
            last_service: Millis::ZERO,
        };
        device.publish_colors();
        device
    }

    /// One pass of the main loop.
    pub fn poll(&mut self, sampler: &Sampler) {
        let (stable, now) = sampler.debounced();
        self.now = now;

        self.receive();

        let edges = self.edges.advance(stable);
        if !edges.is_empty() {
            self.route(&edges);
        }

        if now.has_elapsed(self.last_service, self.tuning.refresh_interval) {
            self.last_service = now;
            self.service(stable);
        }

        self.flush();
    }

    /// Act on one inbound packet. Returns `false` for the empty packet that marks the end of the host's data.
    pub fn interpret(&mut self, packet: UsbMidiPacket) -> bool {
        let Some(inbound) = self.interpreter.decode(packet) else {
            return false;
        };
        match inbound {
            Inbound::NoteOn {
                target: NoteTarget::Key(id),
                velocity,
            } => self.notes.note_on(usize::from(id), velocity),
            Inbound::NoteOn {
                target: NoteTarget::Animation(note),
                velocity,
            } => self.notes.set_animation(usize::from(note), velocity),
            Inbound::NoteOff {
                target: NoteTarget::Key(id),
            } => self
                .notes
                .note_off(usize::from(id), self.now, self.tuning.note_off_delay),
            Inbound::NoteOff {
                target: NoteTarget::Animation(note),
            } => self.notes.set_animation(usize::from(note), 0),
            Inbound::BankSelect(bank) => self.router.select_bank(bank),
            Inbound::Clock(ClockEvent::Tick) => self.clock.tick(),
            Inbound::Clock(ClockEvent::Start) => self.clock.start(),
            Inbound::Clock(ClockEvent::Stop) => self.clock.stop(self.now),
            Inbound::Sysex(packet) => match self.reassembler.push(packet, self.now) {
                Ok(Some(message)) => self.dispatch(&message),
                Ok(None) => {}
                Err(e) => debug!("Dropped SysEx fragment: {}", e),
            },
            Inbound::Ignored => {}
        }
        true
    }

    /// Live settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build-time tuning.
    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Idle and active color tables.
    pub fn colors(&self) -> &ColorTables {
        &self.colors
    }

    /// Velocities received from the host.
    pub fn notes(&self) -> &NoteStateTable {
        &self.notes
    }

    /// The active bank.
    pub fn bank(&self) -> u8 {
        self.router.bank()
    }

    /// The board's collaborators.
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Mutable access to the board's collaborators.
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Replace the live settings, then persist them, play the confirmation animation, and echo them to the host.
    ///
    /// Turning side-bank switching off returns the grid to bank 0.
    pub fn apply_settings(&mut self, settings: Settings) {
        let previous = core::mem::replace(&mut self.settings, settings);
        self.interpreter = MidiPacketInterpreter::new(settings.channel, self.tuning.base_note);
        if previous.side_bank.is_enabled() && !settings.side_bank.is_enabled() {
            let Self {
                router, settings, board, ..
            } = self;
            router.change_bank(0, settings, |event| emit(board, event));
        }
        info!("Settings updated");
        self.persist();
        self.board.display().trigger_animation(0, AnimationKind::Triangle);
        self.send_config();
    }

    /// Store a bulk-transfer part in its color table and tell the display about every key it changed.
    pub fn write_colors(&mut self, part: &Part<'_>) {
        let display = self.board.display();
        let table = self.colors.table_mut(part.target);
        let keys = part.write(table, |rgb| display.remap_for_power(rgb));
        let bank = part.bank();
        for key in keys {
            if let Some(rgb) = table.get(bank, key) {
                match part.target {
                    ColorTarget::Idle => display.set_idle_color(bank as u8, key as u8, rgb),
                    ColorTarget::Active => display.set_active_color(bank as u8, key as u8, rgb),
                }
            }
        }
        if part.number == part.total {
            self.persist();
        }
    }

    /// Restore factory settings and colors, erase storage, and confirm as for a settings push.
    pub fn factory_reset(&mut self) {
        info!("Factory reset");
        if let Err(e) = self.board.storage().factory_reset() {
            warn!("Failed to erase storage: {}", e);
        }
        self.colors = ColorTables::FACTORY;
        self.publish_colors();
        self.apply_settings(Settings::FACTORY);
    }

    /// Hand control to the board's bootloader.
    pub fn enter_bootloader(&mut self) {
        self.flush();
        self.board.enter_bootloader();
    }

    /// Send the current settings to the host.
    pub fn send_config(&mut self) {
        let message = TagTable::from_settings(&self.settings).response();
        self.send_sysex(&message);
        self.flush();
    }

    /// Fragment and queue a complete SysEx message.
    pub fn send_sysex(&mut self, message: &[u8]) {
        let transport = self.board.transport();
        for packet in fragment(MIDI_CABLE, message) {
            transport.deliver(packet);
        }
    }

    /// Push queued packets out to the host.
    pub fn flush(&mut self) {
        self.board.transport().flush();
    }

    fn receive(&mut self) {
        let mut idle = 0;
        for _ in 0..RX_PACKETS_PER_POLL {
            match self.board.transport().try_receive_packet() {
                Some(packet) => {
                    idle = 0;
                    if !self.interpret(packet) {
                        break;
                    }
                }
                None => {
                    idle += 1;
                    if idle >= RX_IDLE_LIMIT {
                        break;
                    }
                }
            }
        }
    }

    fn route(&mut self, edges: &Edges) {
        let Self {
            router,
            settings,
            tuning,
            board,
            now,
            ..
        } = self;
        router.route(edges, *now, settings, tuning, |event| emit(board, event));
    }

    fn service(&mut self, keys: KeyBitset) {
        let now = self.now;
        {
            let Self {
                router,
                settings,
                tuning,
                board,
                ..
            } = self;
            router.sweep(now, settings, tuning, |event| emit(board, event));
        }

        if let Some(delay) = self.tuning.note_off_delay {
            self.notes.sweep(now, delay);
        }

        let base = usize::from(self.tuning.base_note as u8);
        let display = self.board.display();
        self.notes
            .dispatch_one_shots(base..base + NUM_KEYS, |key, kind| display.trigger_animation(key, kind));

        if self.reassembler.expire(now, self.tuning.sysex_timeout) {
            debug!("Discarded a stale SysEx message");
        }

        self.clock.advance(now, self.tuning.free_run_step);

        let frame = Frame {
            bank: self.router.bank(),
            keys,
            notes: &self.notes,
            colors: &self.colors,
            settings: &self.settings,
            step: self.clock.step(),
        };
        self.board.display().render(&frame);
    }

    fn dispatch(&mut self, message: &SysexMessage) {
        let (handler, payload) = match message.request() {
            Ok(Request::Identity) => {
                debug!("Identity request");
                self.send_sysex(&IDENTITY_REPLY);
                self.flush();
                return;
            }
            Ok(Request::Vendor { command, payload }) => match self.registry.lookup(command) {
                Ok(handler) => (handler, payload),
                Err(e) => {
                    debug!("Dropped SysEx: {}", e);
                    return;
                }
            },
            Err(e) => {
                debug!("Dropped SysEx: {}", e);
                return;
            }
        };
        handler.handle(self, payload);
    }

    fn persist(&mut self) {
        if let Err(e) = self.board.storage().save(&self.settings, &self.colors) {
            warn!("Failed to save settings: {}", e);
        }
    }

    fn publish_colors(&mut self) {
        let display = self.board.display();
        for bank in 0..NUM_BANKS {
            for key in 0..NUM_KEYS {
                if let Some(rgb) = self.colors.idle.get(bank, key) {
                    display.set_idle_color(bank as u8, key as u8, rgb);
                }
                if let Some(rgb) = self.colors.active.get(bank, key) {
                    display.set_active_color(bank as u8, key as u8, rgb);
                }
            }
        }
    }
}

fn emit<B: Board>(board: &mut B, event: KeyEvent) {
    match event {
        KeyEvent::Midi(message) => {
            if let Some(packet) = UsbMidiPacket::from_message(MIDI_CABLE, &message) {
                board.transport().deliver(packet);
            }
        }
        KeyEvent::Animate { key, kind } => board.display().trigger_animation(key, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color::{OFF, WHITE},
        configuration::SideBank,
        io::mock::MockBoard,
        sysex::PART_COUNT,
    };
    use std::vec::Vec;

    fn device() -> Device<MockBoard> {
        Device::new(MockBoard::default(), Tuning::DEFAULT)
    }

    /// Tick the sampler once per millisecond with `raw`, polling after every tick.
    fn run(device: &mut Device<MockBoard>, sampler: &Sampler, raw: KeyBitset, ms: u32) {
        for _ in 0..ms {
            sampler.tick(raw);
            device.poll(sampler);
        }
    }

    #[test]
    fn glitch_shorter_than_debounce_window_is_silent() {
        let sampler = Sampler::new();
        let mut device = device();
        run(&mut device, &sampler, KeyBitset::single(5), 3);
        run(&mut device, &sampler, KeyBitset::EMPTY, 20);
        assert!(
            device.board().transport.messages().is_empty(),
            "A glitch must not produce MIDI"
        );
    }

    #[test]
    fn held_key_sends_note_on_and_off() {
        let sampler = Sampler::new();
        let mut device = device();
        run(&mut device, &sampler, KeyBitset::single(5), 15);
        assert_eq!(
            Vec::from([[0x92, 41, 127]]),
            device.board().transport.messages(),
            "Expected left but got right"
        );
        run(&mut device, &sampler, KeyBitset::EMPTY, 15);
        assert_eq!(
            Vec::from([[0x92, 41, 127], [0x82, 41, 127]]),
            device.board().transport.messages(),
            "Expected left but got right"
        );
    }

    #[test]
    fn note_off_then_on_within_delay_keeps_key_lit() {
        let sampler = Sampler::new();
        let mut device = device();
        let transport = &mut device.board_mut().transport;
        transport.queue([0x09, 0x92, 46, 100]);
        transport.queue([0x08, 0x82, 46, 0]);
        transport.queue([0x09, 0x92, 46, 90]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(90, device.notes().velocity(10), "Expected left but got right");
        run(&mut device, &sampler, KeyBitset::EMPTY, 30);
        assert_eq!(90, device.notes().velocity(10), "Expected left but got right");

        device.board_mut().transport.queue([0x08, 0x82, 46, 0]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 30);
        assert_eq!(0, device.notes().velocity(10), "Expected left but got right");
    }

    #[test]
    fn rendered_frame_follows_host_notes_and_bank() {
        let sampler = Sampler::new();
        let mut device = device();
        device.board_mut().transport.queue([0x09, 0x92, 36, 127]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 25);
        let (bank, colors) = device.board().display.last_frame.clone().unwrap();
        assert_eq!(0, bank, "Expected left but got right");
        assert_eq!(crate::color::BLUE, colors[0], "Expected left but got right");
        assert_eq!(OFF, colors[1], "Expected left but got right");

        // host selects bank 1 with CC 3
        device.board_mut().transport.queue([0x0B, 0xB2, 3, 127]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 25);
        let (bank, colors) = device.board().display.last_frame.clone().unwrap();
        assert_eq!(1, bank, "Expected left but got right");
        assert_eq!(WHITE, colors[0], "Expected left but got right");
        assert!(
            device.board().transport.messages().is_empty(),
            "A host bank change is not announced"
        );
    }

    #[test]
    fn identity_request_is_answered() {
        let sampler = Sampler::new();
        let mut device = device();
        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(
            Vec::from([IDENTITY_REPLY.to_vec()]),
            device.board().transport.sysex(),
            "Expected left but got right"
        );
    }

    #[test]
    fn config_push_applies_persists_and_echoes() {
        let sampler = Sampler::new();
        let mut device = device();
        // channel 5 (wire 5 = index 4), velocity 100, unknown tag 30
        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x00, 0x01, 0x79, 0x01, 0, 5, 1, 100, 30, 7, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);

        assert_eq!(4, device.settings().channel, "Expected left but got right");
        assert_eq!(100, device.settings().velocity, "Expected left but got right");
        let board = device.board();
        assert_eq!(1, board.storage.saves, "Expected left but got right");
        assert_eq!(
            Some(*device.settings()),
            board.storage.settings,
            "Expected left but got right"
        );
        assert_eq!(
            Some(&(0, AnimationKind::Triangle)),
            board.display.animations.last(),
            "Expected left but got right"
        );
        let echoed = board.transport.sysex();
        assert_eq!(1, echoed.len(), "Expected left but got right");
        assert_eq!(
            &[0xF0, 0x00, 0x01, 0x79, 0x02, 0x01, 0, 5, 1, 100],
            &echoed[0][..10],
            "Expected left but got right"
        );

        // notes are now read on the new channel
        device.board_mut().transport.queue([0x09, 0x94, 37, 64]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(64, device.notes().velocity(1), "Expected left but got right");
    }

    #[test]
    fn config_pull_needs_zero_argument() {
        let sampler = Sampler::new();
        let mut device = device();
        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x00, 0x01, 0x79, 0x02, 0x01, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert!(device.board().transport.sysex().is_empty(), "Expected no response");

        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x00, 0x01, 0x79, 0x02, 0x00, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(
            Vec::from([TagTable::from_settings(&Settings::FACTORY).response().to_vec()]),
            device.board().transport.sysex(),
            "Expected left but got right"
        );
    }

    #[test]
    fn disabling_side_bank_returns_to_bank_zero() {
        let mut board = MockBoard::default();
        board.storage.settings = Some(Settings {
            side_bank: SideBank::Instant,
            ..Settings::FACTORY
        });
        let mut device = Device::new(board, Tuning::DEFAULT);
        let sampler = Sampler::new();

        // press bank 1's select key
        run(&mut device, &sampler, KeyBitset::single(63), 30);
        assert_eq!(1, device.bank(), "Expected left but got right");
        run(&mut device, &sampler, KeyBitset::EMPTY, 15);

        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x00, 0x01, 0x79, 0x01, 23, 0, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(0, device.bank(), "Expected left but got right");
        assert_eq!(SideBank::Off, device.settings().side_bank, "Expected left but got right");
    }

    #[test]
    fn bulk_push_then_pull() {
        let mut board = MockBoard::default();
        board.display.identity_remap = true;
        let mut device = Device::new(board, Tuning::DEFAULT);
        let sampler = Sampler::new();

        let mut push = std::vec![0xF0, 0x00, 0x01, 0x79, 0x04, 0x00, 0x01, 1, PART_COUNT, 24];
        push.extend_from_slice(&[24; 24]);
        push.push(0xF7);
        device.board_mut().display.idle.clear();
        device.board_mut().transport.queue_sysex(&push);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);

        assert_eq!(
            Some(crate::color::Rgb::new(48, 48, 48)),
            device.colors().idle.get(0, 7),
            "Expected left but got right"
        );
        assert_eq!(8, device.board().display.idle.len(), "Expected left but got right");
        assert_eq!(0, device.board().storage.saves, "Only the last part persists");

        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x00, 0x01, 0x79, 0x04, 0x01, 0x01, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        let parts = device.board().transport.sysex();
        assert_eq!(usize::from(PART_COUNT), parts.len(), "Expected left but got right");
        assert_eq!(
            &[0xF0, 0x00, 0x01, 0x79, 0x04, 0x00, 0x01, 1, 16, 24],
            &parts[0][..10],
            "Expected left but got right"
        );
        assert!(parts[0][10..34].iter().all(|&b| b == 127), "Expected 24 bytes of 127");
        assert_eq!(2, parts[1][7], "Expected left but got right");
    }

    #[test]
    fn factory_reset_restores_defaults() {
        let mut board = MockBoard::default();
        board.storage.settings = Some(Settings {
            velocity: 12,
            ..Settings::FACTORY
        });
        let mut device = Device::new(board, Tuning::DEFAULT);
        let sampler = Sampler::new();
        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x00, 0x01, 0x79, 0x03, 0x02, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(Settings::FACTORY, *device.settings(), "Expected left but got right");
        assert_eq!(1, device.board().storage.resets, "Expected left but got right");
        assert_eq!(1, device.board().storage.saves, "Expected left but got right");
        assert_eq!(1, device.board().transport.sysex().len(), "Expected left but got right");
    }

    #[test]
    fn bootloader_request_reaches_board() {
        let sampler = Sampler::new();
        let mut device = device();
        device
            .board_mut()
            .transport
            .queue_sysex(&[0xF0, 0x00, 0x01, 0x79, 0x03, 0x01, 0xF7]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(1, device.board().bootloader_requests, "Expected left but got right");
    }

    #[test]
    fn receive_is_bounded_per_poll() {
        let sampler = Sampler::new();
        let mut device = device();
        for _ in 0..RX_PACKETS_PER_POLL + 10 {
            device.board_mut().transport.queue([0x0F, 0xF8, 0, 0]);
        }
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(10, device.board().transport.inbound.len(), "Expected left but got right");
    }

    #[test]
    fn empty_packet_ends_the_drain() {
        let sampler = Sampler::new();
        let mut device = device();
        let transport = &mut device.board_mut().transport;
        transport.queue([0x09, 0x92, 36, 1]);
        transport.queue([0, 0, 0, 0]);
        transport.queue([0x09, 0x92, 37, 1]);
        run(&mut device, &sampler, KeyBitset::EMPTY, 1);
        assert_eq!(1, device.notes().velocity(0), "Expected left but got right");
        assert_eq!(0, device.notes().velocity(1), "Expected left but got right");
        assert_eq!(1, device.board().transport.inbound.len(), "Expected left but got right");
    }
}
