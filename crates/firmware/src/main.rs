//! Gridkey is [Embassy](https://embassy.dev)-based firmware for a USB-MIDI controller with an 8×8 grid of backlit
//! buttons. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series STM32
//! microcontroller.
//!
//! The buttons are read through a chain of shift registers once per millisecond from a high-priority interrupt
//! executor. Everything else (MIDI in and out, bank switching, SysEx configuration, and the LEDs) runs in one
//! cooperative main loop built around [`Device`].

#![no_std]
#![no_main]

mod board;
mod display;
mod sampler;
mod storage;
mod transport;

use crate::{
    board::GridBoard,
    display::LedDisplay,
    sampler::{SAMPLER, sampler_task},
    storage::FlashStorage,
    transport::{QueuedTransport, UsbDriver, midi_rx_task, midi_tx_task},
};
use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_futures::yield_now;
use embassy_stm32::{
    Config, bind_interrupts,
    flash::Flash,
    gpio::{Input, Level, Output, Pull, Speed},
    interrupt, peripherals,
    spi::{self, Spi},
    time::Hertz,
    usb,
};
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_usb::{Builder, UsbDevice, class::midi::MidiClass};
use gridkey_lib::{
    configuration::Tuning,
    device::Device,
    keys::{KeyMatrix, Polarity},
};
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
    }
);

/// Runs the sampler ahead of everything on the thread executor.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

/// UART4 is unused, so its interrupt serves as the software interrupt for [`EXECUTOR_HIGH`].
#[interrupt]
unsafe fn UART4() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing Gridkey");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410: the 48MHz clock used for USB OTG FS is derived from main PLL VCO (PLLQ clock)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    // key matrix: a shift-register chain whose data line is pulled low by a pressed switch
    let latch = Output::new(p.PE2, Level::High, Speed::VeryHigh);
    let clock = Output::new(p.PE4, Level::Low, Speed::VeryHigh);
    let data = Input::new(p.PE5, Pull::Up);
    let matrix = KeyMatrix::new(latch, clock, data, Polarity::ActiveLow);

    interrupt::UART4.set_priority(Priority::P6);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::UART4);
    unwrap!(high_spawner.spawn(sampler_task(matrix)));

    // LEDs: WS2812 bitstream on SPI1 MOSI
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(3_200_000);
    let spi = Spi::new_blocking_txonly(p.SPI1, p.PA5, p.PB5, spi_config);

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics
    let vendor_id = 0x1209;
    let product_id = 0x6464;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Gridkey");
    config.product = Some("Gridkey 64");
    config.self_powered = true;
    config.max_power = 0;

    // Create embassy-usb DeviceBuilder using the driver and config.
    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    let class = MidiClass::new(&mut builder, 1, 1, 64);
    let usb = builder.build();
    let (midi_tx, midi_rx) = class.split();

    unwrap!(spawner.spawn(usb_task(usb)));
    unwrap!(spawner.spawn(midi_rx_task(midi_rx)));
    unwrap!(spawner.spawn(midi_tx_task(midi_tx)));

    let board = GridBoard {
        transport: QueuedTransport::new(),
        storage: FlashStorage::new(Flash::new_blocking(p.FLASH)),
        display: LedDisplay::new(spi),
    };
    static DEVICE: StaticCell<Device<GridBoard>> = StaticCell::new();
    let device = DEVICE.init(Device::new(board, Tuning::DEFAULT));
    unwrap!(spawner.spawn(main_loop(device)));
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

/// Polls the device forever, yielding between passes so the USB tasks can move packets.
#[embassy_executor::task]
async fn main_loop(device: &'static mut Device<GridBoard>) -> ! {
    loop {
        device.poll(&SAMPLER);
        yield_now().await;
    }
}
