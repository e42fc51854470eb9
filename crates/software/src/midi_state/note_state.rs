use embassy_time::Duration;

use crate::{configuration::AnimationKind, time::Millis};

/// Entries per velocity table; one per MIDI note number.
pub const NOTE_TABLE_LEN: usize = 128;

/// Animation-table velocities at or above this value request a one-shot geometric animation.
pub const ONE_SHOT_BASE: u8 = 50;

/// Velocities last received from the host, per key and per animation note.
///
/// The control table is indexed by flattened key id: bank 0 keys are `0..64`, bank 1 keys `64..128`. The
/// animation table is indexed by raw note number.
///
/// A Note-Off on the control table can be deferred: the key keeps its velocity until the periodic
/// [`sweep`](Self::sweep) sees that the configured grace period has passed. A Note-On for the same key within that
/// period cancels the pending zero, so a renderer never sees the key go dark between an off and an immediate on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteStateTable {
    control: [u8; NOTE_TABLE_LEN],
    animation: [u8; NOTE_TABLE_LEN],
    pending_off: [Option<Millis>; NOTE_TABLE_LEN],
}

impl Default for NoteStateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStateTable {
    /// Every note off, nothing pending.
    pub const fn new() -> Self {
        Self {
            control: [0; NOTE_TABLE_LEN],
            animation: [0; NOTE_TABLE_LEN],
            pending_off: [None; NOTE_TABLE_LEN],
        }
    }

    /// Record a Note-On for key `id`, cancelling any deferred Note-Off.
    pub fn note_on(&mut self, id: usize, velocity: u8) {
        if let Some(slot) = self.control.get_mut(id) {
            *slot = velocity;
            self.pending_off[id] = None;
        }
    }

    /// Record a Note-Off for key `id`: zero it now when `delay` is `None`, otherwise once the delay has passed.
    pub fn note_off(&mut self, id: usize, now: Millis, delay: Option<Duration>) {
        if id >= NOTE_TABLE_LEN {
            return;
        }
        match delay {
            Some(_) => self.pending_off[id] = Some(now),
            None => {
                self.control[id] = 0;
                self.pending_off[id] = None;
            }
        }
    }

    /// Zero every key whose deferred Note-Off is at least `delay` old.
    pub fn sweep(&mut self, now: Millis, delay: Duration) {
        for (velocity, pending) in self.control.iter_mut().zip(self.pending_off.iter_mut()) {
            if let Some(since) = *pending {
                if now.has_elapsed(since, delay) {
                    *velocity = 0;
                    *pending = None;
                }
            }
        }
    }

    /// Set an animation-table entry; always immediate.
    pub fn set_animation(&mut self, note: usize, velocity: u8) {
        if let Some(slot) = self.animation.get_mut(note) {
            *slot = velocity;
        }
    }

    /// Fire and clear every one-shot animation request among `notes`.
    ///
    /// `trigger` receives the position within `notes` and the requested kind.
    pub fn dispatch_one_shots(
        &mut self,
        notes: core::ops::Range<usize>,
        mut trigger: impl FnMut(u8, AnimationKind),
    ) {
        let start = notes.start;
        let Some(slots) = self.animation.get_mut(notes) else {
            return;
        };
        for (offset, velocity) in slots.iter_mut().enumerate() {
            let kind = velocity
                .checked_sub(ONE_SHOT_BASE)
                .and_then(AnimationKind::from_setting);
            if let Some(kind) = kind {
                trace!("One-shot animation {} at note {}", kind, start + offset);
                trigger(offset as u8, kind);
                *velocity = 0;
            }
        }
    }

    /// Current velocity of key `id`; out-of-range ids read as 0.
    pub fn velocity(&self, id: usize) -> u8 {
        self.control.get(id).copied().unwrap_or(0)
    }

    /// Current animation velocity for `note`; out-of-range notes read as 0.
    pub fn animation(&self, note: usize) -> u8 {
        self.animation.get(note).copied().unwrap_or(0)
    }

    /// Whether key `id` is waiting for a deferred Note-Off.
    pub fn is_off_pending(&self, id: usize) -> bool {
        self.pending_off.get(id).is_some_and(Option::is_some)
    }

    /// The whole control table.
    pub fn control(&self) -> &[u8; NOTE_TABLE_LEN] {
        &self.control
    }
}
