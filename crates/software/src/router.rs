//! Turns key edges into MIDI: per-key notes and CC mirrors, bank switching, and combos.

use wmidi::{ControlFunction, MidiMessage, Note, U7};

use crate::{
    configuration::{AnimationKind, Settings, Tuning},
    keys::{Edges, KeyBitset},
    midi_state::{BANK_SELECT_CC, channel},
    time::Millis,
};

mod bank_select;
pub use bank_select::*;

mod combos;
pub use combos::*;

/// Something the rest of the device should do in response to key activity.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyEvent {
    /// Send this message to the host.
    Midi(MidiMessage<'static>),
    /// Start a geometric animation centered on `key`.
    Animate {
        /// Grid position.
        key: u8,
        /// Shape.
        kind: AnimationKind,
    },
}

/// Maps edges to outgoing events for the active bank, and owns the bank-select state.
///
/// Every press remembers the bank it happened in so that its release goes out on the same channel even if the bank
/// changed while the key was down.
pub struct KeyEventRouter<R = ChordCombos> {
    banks: BankSelect,
    pressed_in_bank_one: KeyBitset,
    combos: R,
}

impl Default for KeyEventRouter {
    fn default() -> Self {
        Self::new(ChordCombos::default())
    }
}

impl<R: ComboRecognizer> KeyEventRouter<R> {
    /// A router in bank 0 using `combos` to recognize gestures.
    pub fn new(combos: R) -> Self {
        Self {
            banks: BankSelect::new(),
            pressed_in_bank_one: KeyBitset::EMPTY,
            combos,
        }
    }

    /// The active bank.
    pub fn bank(&self) -> u8 {
        self.banks.selected()
    }

    /// Bank-select state.
    pub fn bank_select(&self) -> &BankSelect {
        &self.banks
    }

    /// Switch banks without any notification or animation, as requested by the host.
    pub fn select_bank(&mut self, bank: u8) {
        self.banks.select(bank);
    }

    /// Switch banks and play the confirmation animation on the bank's select key.
    pub fn change_bank(&mut self, bank: u8, settings: &Settings, mut emit: impl FnMut(KeyEvent)) {
        self.banks.select(bank);
        let bank = self.banks.selected();
        info!("Changed to bank {}", bank);
        emit(KeyEvent::Animate {
            key: BANK_SELECT_KEYS[usize::from(bank)],
            kind: settings.animation.unwrap_or(AnimationKind::Square),
        });
    }

    /// Emit the events for one poll's worth of edges.
    pub fn route(
        &mut self,
        edges: &Edges,
        now: Millis,
        settings: &Settings,
        tuning: &Tuning,
        mut emit: impl FnMut(KeyEvent),
    ) {
        let listening = settings.channel;
        let velocity = U7::from_u8_lossy(settings.velocity);

        for key in (edges.down | edges.up).iter() {
            let note = Note::from_u8_lossy((tuning.base_note as u8).saturating_add(key));
            let mirror = ControlFunction(U7::from_u8_lossy(note as u8));

            if edges.down.contains(key) {
                let bank = self.banks.selected();
                if settings.output_mode.sends_notes() {
                    let ch = channel(listening.wrapping_sub(bank));
                    emit(KeyEvent::Midi(MidiMessage::NoteOn(ch, note, velocity)));
                }
                if settings.output_mode.sends_ccs() {
                    emit(KeyEvent::Midi(MidiMessage::ControlChange(
                        channel(listening),
                        mirror,
                        U7::MAX,
                    )));
                }
                if bank == 0 {
                    self.pressed_in_bank_one.remove(key);
                } else {
                    self.pressed_in_bank_one.insert(key);
                }
                if let Some(kind) = settings.animation {
                    emit(KeyEvent::Animate { key, kind });
                }
                self.banks.press(key, now);
            } else {
                let ch = if self.pressed_in_bank_one.contains(key) {
                    channel(listening.wrapping_sub(1))
                } else {
                    channel(listening)
                };
                if settings.output_mode.sends_notes() {
                    emit(KeyEvent::Midi(MidiMessage::NoteOff(ch, note, velocity)));
                }
                if settings.output_mode.sends_ccs() {
                    emit(KeyEvent::Midi(MidiMessage::ControlChange(
                        channel(listening),
                        mirror,
                        U7::MIN,
                    )));
                }
                self.banks.release(key);
            }
        }

        if settings.combos {
            if let Some(action) = self.combos.recognize(edges) {
                debug!("Combo {} pressed: {}", action.combo, action.pressed);
                let ch = channel(listening.wrapping_sub(self.banks.selected()));
                let note = Note::from_u8_lossy(action.combo.note());
                emit(KeyEvent::Midi(if action.pressed {
                    MidiMessage::NoteOn(ch, note, velocity)
                } else {
                    MidiMessage::NoteOff(ch, note, velocity)
                }));
            }
        }
    }

    /// Run the bank-select timers; on a switch, announce the new bank and play the confirmation animation.
    pub fn sweep(&mut self, now: Millis, settings: &Settings, tuning: &Tuning, mut emit: impl FnMut(KeyEvent)) {
        if let Some(bank) = self.banks.sweep(now, settings.side_bank, tuning.bank_hold) {
            self.change_bank(bank, settings, &mut emit);
            emit(KeyEvent::Midi(MidiMessage::ControlChange(
                channel(settings.channel),
                ControlFunction(U7::from_u8_lossy(BANK_SELECT_CC)),
                U7::from_u8_lossy(bank),
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        configuration::{OutputMode, SideBank},
        keys::EdgeTracker,
    };
    use std::vec::Vec;
    use wmidi::Channel;

    struct Harness {
        router: KeyEventRouter,
        tracker: EdgeTracker,
        settings: Settings,
        tuning: Tuning,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                router: KeyEventRouter::default(),
                tracker: EdgeTracker::new(),
                settings: Settings::FACTORY,
                tuning: Tuning::DEFAULT,
            }
        }

        fn poll(&mut self, held: &[u8], now: u32) -> Vec<KeyEvent> {
            let edges = self.tracker.advance(held.iter().copied().collect());
            let mut events = Vec::new();
            self.router
                .route(&edges, Millis(now), &self.settings, &self.tuning, |event| events.push(event));
            events
        }

        fn sweep(&mut self, now: u32) -> Vec<KeyEvent> {
            let mut events = Vec::new();
            self.router
                .sweep(Millis(now), &self.settings, &self.tuning, |event| events.push(event));
            events
        }
    }

    fn note_on(ch: Channel, note: u8, velocity: u8) -> KeyEvent {
        KeyEvent::Midi(MidiMessage::NoteOn(ch, Note::from_u8_lossy(note), U7::from_u8_lossy(velocity)))
    }

    fn note_off(ch: Channel, note: u8, velocity: u8) -> KeyEvent {
        KeyEvent::Midi(MidiMessage::NoteOff(ch, Note::from_u8_lossy(note), U7::from_u8_lossy(velocity)))
    }

    fn cc(ch: Channel, function: u8, value: u8) -> KeyEvent {
        KeyEvent::Midi(MidiMessage::ControlChange(
            ch,
            ControlFunction(U7::from_u8_lossy(function)),
            U7::from_u8_lossy(value),
        ))
    }

    #[test]
    fn press_and_release_send_notes_on_listening_channel() {
        let mut harness = Harness::new();
        assert_eq!(
            vec![note_on(Channel::Ch3, 41, 127)],
            harness.poll(&[5], 0),
            "Expected left but got right"
        );
        assert_eq!(
            vec![note_off(Channel::Ch3, 41, 127)],
            harness.poll(&[], 1),
            "Expected left but got right"
        );
    }

    #[test]
    fn output_modes() {
        let mut harness = Harness::new();
        harness.settings.output_mode = OutputMode::NotesAndCcs;
        assert_eq!(
            vec![note_on(Channel::Ch3, 36, 127), cc(Channel::Ch3, 36, 127)],
            harness.poll(&[0], 0),
            "Expected left but got right"
        );
        harness.settings.output_mode = OutputMode::CcsOnly;
        assert_eq!(
            vec![cc(Channel::Ch3, 36, 0)],
            harness.poll(&[], 1),
            "Expected left but got right"
        );
    }

    #[test]
    fn release_uses_bank_of_press() {
        let mut harness = Harness::new();
        harness.router.select_bank(1);
        assert_eq!(
            vec![note_on(Channel::Ch2, 46, 127)],
            harness.poll(&[10], 0),
            "Bank 1 sends one channel below; expected left but got right"
        );
        harness.router.select_bank(0);
        assert_eq!(
            vec![note_off(Channel::Ch2, 46, 127)],
            harness.poll(&[], 1),
            "Release must follow the press's bank; expected left but got right"
        );
    }

    #[test]
    fn press_animation_when_configured() {
        let mut harness = Harness::new();
        harness.settings.animation = Some(AnimationKind::Circle);
        let events = harness.poll(&[9], 0);
        assert_eq!(
            Some(&KeyEvent::Animate {
                key: 9,
                kind: AnimationKind::Circle
            }),
            events.last(),
            "Expected left but got right"
        );
    }

    #[test]
    fn held_bank_key_switches_once_and_announces() {
        let mut harness = Harness::new();
        harness.settings.side_bank = SideBank::Hold;
        harness.poll(&[BANK_SELECT_KEYS[1]], 100);

        assert!(harness.sweep(1099).is_empty());
        let events = harness.sweep(1100);
        assert_eq!(
            vec![
                KeyEvent::Animate {
                    key: 63,
                    kind: AnimationKind::Square
                },
                cc(Channel::Ch3, BANK_SELECT_CC, 1),
            ],
            events,
            "Expected left but got right"
        );
        assert_eq!(1, harness.router.bank(), "Expected left but got right");
        assert!(harness.sweep(1125).is_empty(), "No duplicate bank change");
    }

    #[test]
    fn combos_follow_setting() {
        let mut harness = Harness::new();
        let events = harness.poll(&[27, 28, 35, 36], 0);
        assert_eq!(
            Some(&note_on(Channel::Ch3, 9, 127)),
            events.last(),
            "Combo B should send note 9; expected left but got right"
        );

        let mut harness = Harness::new();
        harness.settings.combos = false;
        let events = harness.poll(&[27, 28, 35, 36], 0);
        assert_eq!(4, events.len(), "Expected left but got right");
    }
}
