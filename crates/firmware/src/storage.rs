//! Settings and color tables persisted in the last sector of internal flash.
//!
//! The sector holds one image: the settings image, both color tables, and a marker byte saying the color tables are
//! valid. Erased flash reads as `0xFF`, which no settings image version or marker uses.

use defmt::warn;
use embassy_stm32::flash::{Blocking, Flash};
use gridkey_lib::{
    color::{ColorTables, TABLE_BYTES},
    configuration::{SETTINGS_IMAGE_LEN, Settings},
    error::StorageError,
    io::Storage,
};

/// Offset of the last 256 KiB sector of the STM32F767ZI's 2 MiB single-bank flash.
const SECTOR_OFFSET: u32 = 0x1C_0000;
const SECTOR_SIZE: u32 = 0x4_0000;

const IDLE_OFFSET: usize = SETTINGS_IMAGE_LEN;
const ACTIVE_OFFSET: usize = IDLE_OFFSET + TABLE_BYTES;
const MARKER_OFFSET: usize = ACTIVE_OFFSET + TABLE_BYTES;
const COLORS_VALID: u8 = 0xA5;
/// Image length rounded up to the flash write granularity.
const IMAGE_LEN: usize = (MARKER_OFFSET + 1).div_ceil(32) * 32;

pub struct FlashStorage {
    flash: Flash<'static, Blocking>,
}

impl FlashStorage {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        Self { flash }
    }

    fn read_image(&mut self) -> Result<[u8; IMAGE_LEN], StorageError> {
        let mut image = [0xFF; IMAGE_LEN];
        self.flash
            .blocking_read(SECTOR_OFFSET, &mut image)
            .map_err(|_| StorageError::Read)?;
        Ok(image)
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        self.flash
            .blocking_erase(SECTOR_OFFSET, SECTOR_OFFSET + SECTOR_SIZE)
            .map_err(|_| StorageError::Write)
    }
}

impl Storage for FlashStorage {
    fn load_settings(&mut self) -> Option<Settings> {
        match self.read_image() {
            Ok(image) => Settings::from_image(&image[..SETTINGS_IMAGE_LEN]),
            Err(e) => {
                warn!("Failed to read settings: {}", e);
                None
            }
        }
    }

    fn load_colors(&mut self, colors: &mut ColorTables) -> bool {
        let image = match self.read_image() {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to read colors: {}", e);
                return false;
            }
        };
        if image[MARKER_OFFSET] != COLORS_VALID {
            return false;
        }
        let mut loaded = *colors;
        let idle = loaded.idle.copy_from(&image[IDLE_OFFSET..ACTIVE_OFFSET]);
        let active = loaded.active.copy_from(&image[ACTIVE_OFFSET..MARKER_OFFSET]);
        if idle && active {
            *colors = loaded;
        }
        idle && active
    }

    fn save(&mut self, settings: &Settings, colors: &ColorTables) -> Result<(), StorageError> {
        let mut image = [0xFF; IMAGE_LEN];
        image[..SETTINGS_IMAGE_LEN].copy_from_slice(&settings.to_image());
        for (slot, byte) in image[IDLE_OFFSET..ACTIVE_OFFSET].iter_mut().zip(colors.idle.bytes()) {
            *slot = byte;
        }
        for (slot, byte) in image[ACTIVE_OFFSET..MARKER_OFFSET].iter_mut().zip(colors.active.bytes()) {
            *slot = byte;
        }
        image[MARKER_OFFSET] = COLORS_VALID;

        self.erase()?;
        self.flash
            .blocking_write(SECTOR_OFFSET, &image)
            .map_err(|_| StorageError::Write)
    }

    fn factory_reset(&mut self) -> Result<(), StorageError> {
        self.erase()
    }
}
