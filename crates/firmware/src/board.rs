//! The collaborators bundled for [`Device`](gridkey_lib::device::Device).

use cortex_m::peripheral::SCB;
use defmt::info;
use gridkey_lib::io::Board;

use crate::{display::LedDisplay, storage::FlashStorage, transport::QueuedTransport};

pub struct GridBoard {
    pub transport: QueuedTransport,
    pub storage: FlashStorage,
    pub display: LedDisplay,
}

impl Board for GridBoard {
    type Transport = QueuedTransport;
    type Storage = FlashStorage;
    type Display = LedDisplay;

    fn transport(&mut self) -> &mut QueuedTransport {
        &mut self.transport
    }

    fn storage(&mut self) -> &mut FlashStorage {
        &mut self.storage
    }

    fn display(&mut self) -> &mut LedDisplay {
        &mut self.display
    }

    /// Resets the chip; holding BOOT0 high during the reset starts the ROM bootloader.
    fn enter_bootloader(&mut self) {
        info!("Resetting for firmware update");
        SCB::sys_reset();
    }
}
