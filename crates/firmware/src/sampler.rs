//! The 1 kHz key sampler, run from the high-priority interrupt executor.

use embassy_stm32::gpio::{Input, Output};
use embassy_time::{Duration, Ticker};
use gridkey_lib::keys::{KeyMatrix, Sampler};

/// Shared with the main loop, which reads the debounced state and the clock from it.
pub static SAMPLER: Sampler = Sampler::new();

pub type GridMatrix = KeyMatrix<Output<'static>, Output<'static>, Input<'static>>;

/// Reads the matrix once per millisecond.
#[embassy_executor::task]
pub async fn sampler_task(mut matrix: GridMatrix) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(1));
    loop {
        match matrix.read() {
            Ok(raw) => SAMPLER.tick(raw),
            Err(never) => match never {},
        }
        ticker.next().await;
    }
}
