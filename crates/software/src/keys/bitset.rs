use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Not};

use crate::NUM_KEYS;

/// A set of keys, one bit per physical button; bit `n` is key `n`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyBitset(u64);

impl KeyBitset {
    /// No keys.
    pub const EMPTY: Self = Self(0);
    /// Every key on the grid.
    pub const ALL: Self = Self(u64::MAX);

    /// Wrap a raw bitmask.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bitmask.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// A set holding only `key`, or an empty set if `key` is not on the grid.
    pub const fn single(key: u8) -> Self {
        if (key as usize) < NUM_KEYS {
            Self(1 << key)
        } else {
            Self::EMPTY
        }
    }

    /// Whether `key` is a member.
    pub const fn contains(self, key: u8) -> bool {
        (key as usize) < NUM_KEYS && self.0 & (1 << key) != 0
    }

    /// Whether every member of `other` is also a member of `self`.
    pub const fn is_superset(self, other: KeyBitset) -> bool {
        self.0 & other.0 == other.0
    }

    /// Add `key`; keys off the grid are ignored.
    pub fn insert(&mut self, key: u8) {
        *self |= Self::single(key);
    }

    /// Remove `key`.
    pub fn remove(&mut self, key: u8) {
        *self &= !Self::single(key);
    }

    /// Whether no key is a member.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of member keys.
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate over member keys, lowest first.
    pub fn iter(self) -> Keys {
        Keys(self.0)
    }
}

impl BitAnd for KeyBitset {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for KeyBitset {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for KeyBitset {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for KeyBitset {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitXor for KeyBitset {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Not for KeyBitset {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl IntoIterator for KeyBitset {
    type Item = u8;
    type IntoIter = Keys;

    fn into_iter(self) -> Keys {
        self.iter()
    }
}

impl FromIterator<u8> for KeyBitset {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |set, key| set | Self::single(key))
    }
}

/// Iterator over the keys of a [`KeyBitset`], in ascending order.
#[derive(Clone, Debug)]
pub struct Keys(u64);

impl Iterator for Keys {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.0 == 0 {
            return None;
        }
        let key = self.0.trailing_zeros() as u8;
        // clear the lowest set bit
        self.0 &= self.0 - 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Keys {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn iterates_members_in_ascending_order() {
        let set: KeyBitset = [63, 0, 5, 28].into_iter().collect();
        let keys: Vec<u8> = set.iter().collect();
        assert_eq!(
            vec![0, 5, 28, 63],
            keys,
            "Should yield keys lowest first; expected left but got right"
        );
        assert_eq!(4, set.len(), "Expected left but got right");
    }

    #[test]
    fn keys_off_the_grid_are_ignored() {
        let mut set = KeyBitset::EMPTY;
        set.insert(64);
        set.insert(200);
        assert!(set.is_empty(), "Keys past the last button should not be stored");
        assert!(!KeyBitset::ALL.contains(64));
    }

    #[test]
    fn insert_and_remove() {
        let mut set = KeyBitset::EMPTY;
        set.insert(10);
        set.insert(11);
        set.remove(10);
        assert!(!set.contains(10));
        assert!(set.contains(11));
        assert_eq!(KeyBitset::from_bits(1 << 11), set, "Expected left but got right");
    }

    #[test]
    fn superset() {
        let chord = KeyBitset::from_bits(0b1010);
        assert!(KeyBitset::from_bits(0b1110).is_superset(chord));
        assert!(!KeyBitset::from_bits(0b0110).is_superset(chord));
        assert!(chord.is_superset(KeyBitset::EMPTY));
    }
}
