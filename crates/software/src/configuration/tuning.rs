use embassy_time::Duration;
use wmidi::Note;

/// Timing and mapping constants fixed at build time rather than exposed to the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    /// Note sent for key 0; key `n` sends `base_note + n`. Incoming notes are mapped back the same way.
    pub base_note: Note,
    /// How long a received Note-Off waits before its key is zeroed. `None` zeroes immediately.
    pub note_off_delay: Option<Duration>,
    /// How long a bank-select key must be held when [`SideBank::Hold`](super::SideBank::Hold) is selected.
    pub bank_hold: Duration,
    /// Interval between periodic sweeps (delayed note-offs, bank select, display refresh).
    pub refresh_interval: Duration,
    /// A SysEx message left open this long is discarded.
    pub sysex_timeout: Duration,
    /// Step length of the animation counter when no MIDI clock is being received.
    pub free_run_step: Duration,
}

impl Tuning {
    /// The values the hardware ships with.
    pub const DEFAULT: Self = Self {
        base_note: Note::C2,
        note_off_delay: Some(Duration::from_millis(2)),
        bank_hold: Duration::from_millis(1000),
        refresh_interval: Duration::from_millis(25),
        sysex_timeout: Duration::from_millis(200),
        free_run_step: Duration::from_millis(38),
    };
}

impl Default for Tuning {
    fn default() -> Self {
        Self::DEFAULT
    }
}
