use core::ops::Range;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use super::{Command, CommandHandler, SYSEX_END, SysexBuffer, vendor_message};
use crate::{
    color::{BANK_BYTES, ColorScale, ColorTable, ColorTarget, Rgb, TABLE_BYTES},
    device::Device,
    error::BulkError,
    io::Board,
};

/// Largest payload of one part.
pub const PART_SIZE: usize = 24;
/// Parts needed to carry one whole color table.
pub const PART_COUNT: u8 = (TABLE_BYTES / PART_SIZE) as u8;

const PARTS_PER_BANK: usize = BANK_BYTES / PART_SIZE;

/// Bulk transfer sub-commands, the first payload byte.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BulkCommand {
    /// Data flows to the receiver of the message.
    Push = 0,
    /// The receiver should push the tagged data back.
    Pull = 1,
}

/// The color table a bulk tag refers to.
pub fn target_for_tag(tag: u8) -> Result<ColorTarget, BulkError> {
    match tag {
        0 => Err(BulkError::ExtendedTag),
        1 => Ok(ColorTarget::Idle),
        2 => Ok(ColorTarget::Active),
        tag => Err(BulkError::UnknownTag(tag)),
    }
}

/// The bulk tag for a color table.
pub fn tag_for_target(target: ColorTarget) -> u8 {
    match target {
        ColorTarget::Idle => 1,
        ColorTarget::Active => 2,
    }
}

/// One validated part of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part<'a> {
    /// Destination table.
    pub target: ColorTarget,
    /// 1-based part number.
    pub number: u8,
    /// Total parts the sender intends to send.
    pub total: u8,
    /// Wire bytes, at most [`PART_SIZE`].
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    /// Validate a push body: `TAG PART TOTAL SIZE <SIZE bytes>`.
    pub fn parse(body: &'a [u8]) -> Result<Self, BulkError> {
        let [tag, number, total, size, data @ ..] = body else {
            return Err(BulkError::Truncated);
        };
        if data.is_empty() {
            return Err(BulkError::Truncated);
        }
        let target = target_for_tag(*tag)?;
        if *number == 0 {
            return Err(BulkError::PartZero);
        }
        let available = data.len().min(PART_SIZE);
        let data = data
            .get(..usize::from(*size))
            .filter(|data| data.len() <= PART_SIZE)
            .ok_or(BulkError::SizeMismatch { size: *size, available })?;
        if *number > PART_COUNT {
            return Err(BulkError::PartOutOfRange(*number));
        }
        Ok(Self {
            target,
            number: *number,
            total: *total,
            data,
        })
    }

    /// Bank the part lands in.
    pub fn bank(&self) -> usize {
        usize::from(self.number.saturating_sub(1)) / PARTS_PER_BANK
    }

    /// Byte offset within the bank.
    pub fn offset(&self) -> usize {
        usize::from(self.number.saturating_sub(1)) % PARTS_PER_BANK * PART_SIZE
    }

    /// Store the part in `table` at internal amplitude, then pass every color it touched through `remap`.
    ///
    /// Returns the keys of [`bank`](Self::bank) that were touched.
    pub fn write(&self, table: &mut ColorTable, remap: impl Fn(Rgb) -> Rgb) -> Range<usize> {
        let bank = self.bank();
        let offset = self.offset();
        let Some(bytes) = table.bank_mut(bank) else {
            return 0..0;
        };
        for (slot, &value) in bytes.iter_mut().skip(offset).zip(self.data) {
            *slot = value.saturating_mul(2);
        }

        let keys = offset / 3..(offset + self.data.len()).div_ceil(3);
        for key in keys.clone() {
            if let Some(rgb) = table.get(bank, key) {
                table.set(bank, key, remap(rgb));
            }
        }
        keys
    }
}

/// Part `number` (1-based) of the pull response for `table`: `F0 00 01 79 04 00 TAG PART TOTAL SIZE <bytes> F7`.
pub fn pull_part(table: &ColorTable, target: ColorTarget, number: u8) -> SysexBuffer {
    let mut message = vendor_message(Command::BulkTransfer);
    message.extend_from_slice(&[
        BulkCommand::Push as u8,
        tag_for_target(target),
        number,
        PART_COUNT,
        PART_SIZE as u8,
    ]);
    let start = usize::from(number.saturating_sub(1)) * PART_SIZE;
    message.extend(table.bytes().skip(start).take(PART_SIZE).map(ColorScale::encode));
    message.push(SYSEX_END);
    message
}

/// Command 4: push color data into a table, or stream a table back to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkTransfer;

impl BulkTransfer {
    fn dispatch<B: Board>(device: &mut Device<B>, payload: &[u8]) -> Result<(), BulkError> {
        let (&command, body) = payload.split_first().ok_or(BulkError::Truncated)?;
        match BulkCommand::from_u8(command) {
            Some(BulkCommand::Push) => {
                let part = Part::parse(body)?;
                trace!("Bulk push part {} of {}", part.number, part.total);
                device.write_colors(&part);
                Ok(())
            }
            Some(BulkCommand::Pull) => {
                let &tag = body.first().ok_or(BulkError::Truncated)?;
                let target = target_for_tag(tag)?;
                for number in 1..=PART_COUNT {
                    let message = pull_part(device.colors().table(target), target, number);
                    device.send_sysex(&message);
                    device.flush();
                }
                Ok(())
            }
            None => Err(BulkError::UnknownCommand(command)),
        }
    }
}

impl CommandHandler for BulkTransfer {
    fn handle<B: Board>(&self, device: &mut Device<B>, payload: &[u8]) {
        if let Err(e) = Self::dispatch(device, payload) {
            warn!("Bulk transfer rejected: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{OFF, palette_remap};

    fn push_body(tag: u8, number: u8, data: &[u8]) -> std::vec::Vec<u8> {
        let mut body = std::vec![tag, number, PART_COUNT, data.len() as u8];
        body.extend_from_slice(data);
        body
    }

    #[test]
    fn placement() {
        let body = push_body(1, 1, &[0; 24]);
        let part = Part::parse(&body).unwrap();
        assert_eq!((0, 0), (part.bank(), part.offset()), "Expected left but got right");

        let body = push_body(2, 8, &[0; 24]);
        let part = Part::parse(&body).unwrap();
        assert_eq!((0, 168), (part.bank(), part.offset()), "Expected left but got right");

        let body = push_body(2, 11, &[0; 24]);
        let part = Part::parse(&body).unwrap();
        assert_eq!(ColorTarget::Active, part.target, "Expected left but got right");
        assert_eq!((1, 48), (part.bank(), part.offset()), "Expected left but got right");
    }

    #[test]
    fn rejections() {
        assert_eq!(
            Err(BulkError::ExtendedTag),
            Part::parse(&push_body(0, 1, &[1])),
            "Expected left but got right"
        );
        assert_eq!(
            Err(BulkError::UnknownTag(3)),
            Part::parse(&push_body(3, 1, &[1])),
            "Expected left but got right"
        );
        assert_eq!(
            Err(BulkError::PartZero),
            Part::parse(&push_body(1, 0, &[1])),
            "Expected left but got right"
        );
        assert_eq!(
            Err(BulkError::PartOutOfRange(17)),
            Part::parse(&push_body(1, 17, &[1])),
            "Expected left but got right"
        );
        assert_eq!(
            Err(BulkError::Truncated),
            Part::parse(&[1, 1, 16, 0]),
            "Expected left but got right"
        );
        assert_eq!(
            Err(BulkError::SizeMismatch { size: 5, available: 2 }),
            Part::parse(&[1, 1, 16, 5, 1, 2]),
            "Expected left but got right"
        );
        assert_eq!(
            Err(BulkError::SizeMismatch {
                size: 25,
                available: 24
            }),
            Part::parse(&push_body(1, 1, &[1; 25])),
            "Expected left but got right"
        );
    }

    #[test]
    fn push_doubles_then_pull_scales_to_wire() {
        let mut table = ColorTable::filled([OFF, OFF]);
        let body = push_body(1, 1, &[24; 24]);
        let part = Part::parse(&body).unwrap();
        let keys = part.write(&mut table, |rgb| rgb);
        assert_eq!(0..8, keys, "Expected left but got right");
        assert!(
            table.bytes().take(24).all(|b| b == 48),
            "Stored values should be doubled"
        );

        let message = pull_part(&table, ColorTarget::Idle, 1);
        assert_eq!(
            &[0xF0, 0x00, 0x01, 0x79, 0x04, 0x00, 0x01, 1, 16, 24],
            &message[..10],
            "Expected left but got right"
        );
        assert!(message[10..34].iter().all(|&b| b == 127), "Full amplitude should pull as 127");
        assert_eq!(&[0xF7], &message[34..], "Expected left but got right");
    }

    #[test]
    fn partial_triples_are_remapped_whole() {
        let mut table = ColorTable::filled([OFF, OFF]);
        // two bytes of key 64's triple, landing in bank 1
        let body = push_body(1, 9, &[24, 0]);
        let part = Part::parse(&body).unwrap();
        let keys = part.write(&mut table, palette_remap);
        assert_eq!(0..1, keys, "Expected left but got right");
        assert_eq!(
            Some(crate::color::RED),
            table.get(1, 0),
            "Expected left but got right"
        );
    }
}
