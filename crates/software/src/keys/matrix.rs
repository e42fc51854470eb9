use embedded_hal::digital::{InputPin, OutputPin};

use super::KeyBitset;
use crate::NUM_KEYS;

/// Electrical level that means "pressed" on the matrix data line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// A pressed switch drives the data line high.
    ActiveHigh,
    /// A pressed switch pulls the data line low.
    ActiveLow,
}

/// A chain of parallel-in, serial-out shift registers carrying one bit per key.
///
/// A pulse on `latch` loads every switch into the chain. Each rising edge on `clock` then moves the next key's
/// level onto `data`, starting at key 0.
pub struct KeyMatrix<L, C, D> {
    latch: L,
    clock: C,
    data: D,
    polarity: Polarity,
}

impl<L, C, D, E> KeyMatrix<L, C, D>
where
    L: OutputPin<Error = E>,
    C: OutputPin<Error = E>,
    D: InputPin<Error = E>,
{
    /// Take ownership of the three control lines.
    pub fn new(latch: L, clock: C, data: D, polarity: Polarity) -> Self {
        Self {
            latch,
            clock,
            data,
            polarity,
        }
    }

    /// Latch the switches and shift out one raw sample.
    pub fn read(&mut self) -> Result<KeyBitset, E> {
        self.latch.set_low()?;
        self.latch.set_high()?;

        let mut bits = 0_u64;
        for key in 0..NUM_KEYS {
            let high = self.data.is_high()?;
            let pressed = match self.polarity {
                Polarity::ActiveHigh => high,
                Polarity::ActiveLow => !high,
            };
            if pressed {
                bits |= 1 << key;
            }
            self.clock.set_high()?;
            self.clock.set_low()?;
        }
        Ok(KeyBitset::from_bits(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::{cell::Cell, convert::Infallible};
    use embedded_hal::digital::ErrorType;
    use std::rc::Rc;

    /// Serial output of a fake shift register; advances one key per clock pulse.
    #[derive(Clone)]
    struct Chain {
        levels: u64,
        position: Rc<Cell<u32>>,
    }

    struct Latch(Rc<Cell<u32>>);
    struct Clock(Rc<Cell<u32>>);

    impl ErrorType for Latch {
        type Error = Infallible;
    }
    impl OutputPin for Latch {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set(0);
            Ok(())
        }
    }

    impl ErrorType for Clock {
        type Error = Infallible;
    }
    impl OutputPin for Clock {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    impl ErrorType for Chain {
        type Error = Infallible;
    }
    impl InputPin for Chain {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.levels >> self.position.get() & 1 == 1)
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    fn matrix(levels: u64, polarity: Polarity) -> KeyMatrix<Latch, Clock, Chain> {
        let position = Rc::new(Cell::new(0));
        KeyMatrix::new(
            Latch(position.clone()),
            Clock(position.clone()),
            Chain { levels, position },
            polarity,
        )
    }

    #[test]
    fn reads_keys_in_shift_order() {
        let levels = (1 << 0) | (1 << 9) | (1 << 63);
        let raw = matrix(levels, Polarity::ActiveHigh).read().unwrap();
        assert_eq!(
            KeyBitset::from_bits(levels),
            raw,
            "Expected left but got right"
        );
    }

    #[test]
    fn active_low_inverts() {
        let levels = !((1 << 3) | (1 << 4));
        let raw = matrix(levels, Polarity::ActiveLow).read().unwrap();
        assert_eq!(
            KeyBitset::from_bits((1 << 3) | (1 << 4)),
            raw,
            "Expected left but got right"
        );
    }

    #[test]
    fn each_read_relatches() {
        let mut matrix = matrix(1 << 1, Polarity::ActiveHigh);
        let first = matrix.read().unwrap();
        let second = matrix.read().unwrap();
        assert_eq!(first, second, "Expected left but got right");
    }
}
