use embassy_time::Duration;

use crate::{NUM_BANKS, configuration::SideBank, time::Millis};

/// The key that selects each bank, indexed by bank.
pub const BANK_SELECT_KEYS: [u8; NUM_BANKS] = [28, 63];

/// The active bank and the hold timers of the bank-select keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BankSelect {
    selected: u8,
    held_since: [Option<Millis>; NUM_BANKS],
}

impl BankSelect {
    /// Bank 0 selected, no key held.
    pub const fn new() -> Self {
        Self {
            selected: 0,
            held_since: [None; NUM_BANKS],
        }
    }

    /// The active bank.
    pub fn selected(&self) -> u8 {
        self.selected
    }

    /// Make `bank` active and forget any key being held.
    pub fn select(&mut self, bank: u8) {
        self.selected = bank.min(NUM_BANKS as u8 - 1);
        self.reset_timers();
    }

    /// Clear every hold timer.
    pub fn reset_timers(&mut self) {
        self.held_since = [None; NUM_BANKS];
    }

    /// Note a key press; starts the hold timer if `key` selects a bank.
    pub fn press(&mut self, key: u8, now: Millis) {
        if let Some(bank) = Self::bank_for(key) {
            self.reset_timers();
            self.held_since[bank] = Some(now);
        }
    }

    /// Note a key release; stops the hold timer if `key` selects a bank.
    pub fn release(&mut self, key: u8) {
        if let Some(bank) = Self::bank_for(key) {
            self.held_since[bank] = None;
        }
    }

    /// Switch banks if a bank-select key has been held long enough for `mode`.
    ///
    /// Returns the newly selected bank. At most one bank is selected per call, and the timers are reset when one is,
    /// so a key that stays held does not trigger again.
    pub fn sweep(&mut self, now: Millis, mode: SideBank, hold: Duration) -> Option<u8> {
        let threshold = match mode {
            SideBank::Off => return None,
            SideBank::Hold => hold,
            SideBank::Instant => Duration::from_ticks(0),
        };
        let bank = self
            .held_since
            .iter()
            .position(|held| held.is_some_and(|since| now.has_elapsed(since, threshold)))?;
        self.select(bank as u8);
        Some(self.selected)
    }

    /// Whether `bank`'s select key is currently being timed.
    pub fn is_held(&self, bank: usize) -> bool {
        self.held_since.get(bank).is_some_and(Option::is_some)
    }

    fn bank_for(key: u8) -> Option<usize> {
        BANK_SELECT_KEYS.iter().position(|&bank_key| bank_key == key)
    }
}
