use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use super::CommandHandler;
use crate::{device::Device, io::Board};

/// Actions selected by the first byte of a system command.
#[derive(Debug, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemAction {
    /// The host opened its menu; nothing to do.
    Menu = 0,
    /// Reboot into the firmware updater.
    Bootloader = 1,
    /// Restore factory settings and colors.
    FactoryReset = 2,
}

/// Command 3: device-level actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemCommand;

impl CommandHandler for SystemCommand {
    fn handle<B: Board>(&self, device: &mut Device<B>, payload: &[u8]) {
        match payload.first().copied().and_then(SystemAction::from_u8) {
            Some(SystemAction::Menu) => debug!("Host menu opened"),
            Some(SystemAction::Bootloader) => {
                info!("Entering bootloader");
                device.enter_bootloader();
            }
            Some(SystemAction::FactoryReset) => device.factory_reset(),
            None => warn!("Unknown system command {}", payload.first()),
        }
    }
}
