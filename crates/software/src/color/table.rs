use super::{BLUE, GREEN, OFF, Rgb, WHITE};
use crate::{NUM_BANKS, NUM_KEYS};

/// Bytes of RGB data per bank.
pub const BANK_BYTES: usize = NUM_KEYS * 3;
/// Bytes of RGB data in one whole table.
pub const TABLE_BYTES: usize = NUM_BANKS * BANK_BYTES;

/// One color per key per bank, stored as consecutive RGB triples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorTable([[u8; BANK_BYTES]; NUM_BANKS]);

impl ColorTable {
    /// Fill every key of each bank with that bank's color.
    pub const fn filled(colors: [Rgb; NUM_BANKS]) -> Self {
        let mut banks = [[0; BANK_BYTES]; NUM_BANKS];
        let mut bank = 0;
        while bank < NUM_BANKS {
            let mut i = 0;
            while i < BANK_BYTES {
                banks[bank][i] = colors[bank].r;
                banks[bank][i + 1] = colors[bank].g;
                banks[bank][i + 2] = colors[bank].b;
                i += 3;
            }
            bank += 1;
        }
        Self(banks)
    }

    /// Color of `key` in `bank`, or `None` if either is out of range.
    pub fn get(&self, bank: usize, key: usize) -> Option<Rgb> {
        let bank = self.0.get(bank)?;
        Rgb::from_slice(bank.get(key * 3..)?)
    }

    /// Overwrite the color of `key` in `bank`; out-of-range positions are ignored.
    pub fn set(&mut self, bank: usize, key: usize, rgb: Rgb) {
        if let Some(slot) = self
            .0
            .get_mut(bank)
            .and_then(|bank| bank.get_mut(key * 3..key * 3 + 3))
        {
            slot.copy_from_slice(&rgb.to_bytes());
        }
    }

    /// Raw bytes of one bank.
    pub fn bank(&self, bank: usize) -> Option<&[u8; BANK_BYTES]> {
        self.0.get(bank)
    }

    /// Mutable raw bytes of one bank.
    pub fn bank_mut(&mut self, bank: usize) -> Option<&mut [u8; BANK_BYTES]> {
        self.0.get_mut(bank)
    }

    /// Every byte of the table, bank 0 first.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().flatten().copied()
    }

    /// Overwrite the table from `bytes`, which must hold exactly [`TABLE_BYTES`] bytes.
    pub fn copy_from(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != TABLE_BYTES {
            return false;
        }
        for (bank, chunk) in self.0.iter_mut().zip(bytes.chunks_exact(BANK_BYTES)) {
            bank.copy_from_slice(chunk);
        }
        true
    }
}

/// Which color table a bulk transfer or display update refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorTarget {
    /// Colors shown while a key is not lit by a note or press.
    Idle,
    /// Colors shown while a key is active.
    Active,
}

/// The pair of color tables the display draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorTables {
    /// Colors for keys at rest.
    pub idle: ColorTable,
    /// Colors for active keys.
    pub active: ColorTable,
}

impl Default for ColorTables {
    fn default() -> Self {
        Self::FACTORY
    }
}

impl ColorTables {
    /// Bank 0 rests dark and lights blue; bank 1 rests white and lights green.
    pub const FACTORY: Self = Self {
        idle: ColorTable::filled([OFF, WHITE]),
        active: ColorTable::filled([BLUE, GREEN]),
    };

    /// The table addressed by `target`.
    pub fn table(&self, target: ColorTarget) -> &ColorTable {
        match target {
            ColorTarget::Idle => &self.idle,
            ColorTarget::Active => &self.active,
        }
    }

    /// Mutable access to the table addressed by `target`.
    pub fn table_mut(&mut self, target: ColorTarget) -> &mut ColorTable {
        match target {
            ColorTarget::Idle => &mut self.idle,
            ColorTarget::Active => &mut self.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_colors() {
        let tables = ColorTables::FACTORY;
        assert_eq!(Some(OFF), tables.idle.get(0, 0), "Expected left but got right");
        assert_eq!(Some(WHITE), tables.idle.get(1, 63), "Expected left but got right");
        assert_eq!(Some(BLUE), tables.active.get(0, 17), "Expected left but got right");
        assert_eq!(Some(GREEN), tables.active.get(1, 40), "Expected left but got right");
    }

    #[test]
    fn set_and_get_stay_in_bounds() {
        let mut table = ColorTable::filled([OFF, OFF]);
        table.set(1, 63, WHITE);
        assert_eq!(Some(WHITE), table.get(1, 63), "Expected left but got right");
        table.set(2, 0, WHITE);
        table.set(0, 64, WHITE);
        assert_eq!(None, table.get(0, 64), "Expected left but got right");
        assert_eq!(
            TABLE_BYTES - 3,
            table.bytes().filter(|&b| b == 0).count(),
            "Only the one in-range write should land; expected left but got right"
        );
    }

    #[test]
    fn copy_from_requires_whole_table() {
        let mut table = ColorTable::filled([OFF, OFF]);
        assert!(!table.copy_from(&[1; 10]));
        assert!(table.copy_from(&[7; TABLE_BYTES]));
        assert_eq!(Some(Rgb::new(7, 7, 7)), table.get(1, 5), "Expected left but got right");
    }
}
