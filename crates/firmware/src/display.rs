//! Drives the grid's WS2812-style LEDs over SPI.
//!
//! Each LED data bit is sent as four SPI bits at 3.2 MHz: `1000` for a zero and `1110` for a one, which lands both
//! pulse widths inside the LEDs' timing window.

use embassy_stm32::{mode::Blocking, spi::Spi};
use gridkey_lib::{
    NUM_KEYS,
    color::{INTERNAL_MAX, Rgb},
    configuration::AnimationKind,
    io::{Display, Frame},
};

const GRID_SIZE: i8 = 8;
const SPI_BYTES_PER_LED: usize = 3 * 4;
/// Trailing low time that latches the frame; well over 50 µs at 3.2 MHz.
const RESET_BYTES: usize = 24;
const FRAME_BYTES: usize = NUM_KEYS * SPI_BYTES_PER_LED + RESET_BYTES;
/// Animations that can play at the same time; a new one replaces the oldest.
const MAX_ANIMATIONS: usize = 4;
/// Animations stop once their outline has grown past the grid.
const LAST_RADIUS: u8 = GRID_SIZE as u8;

#[derive(Clone, Copy)]
struct Animation {
    center: u8,
    kind: AnimationKind,
    radius: u8,
}

pub struct LedDisplay {
    spi: Spi<'static, Blocking>,
    animations: [Option<Animation>; MAX_ANIMATIONS],
    next_slot: usize,
    last: [Rgb; NUM_KEYS],
    dirty: bool,
    buffer: [u8; FRAME_BYTES],
}

impl LedDisplay {
    pub fn new(spi: Spi<'static, Blocking>) -> Self {
        Self {
            spi,
            animations: [None; MAX_ANIMATIONS],
            next_slot: 0,
            last: [Rgb::OFF; NUM_KEYS],
            dirty: true,
            buffer: [0; FRAME_BYTES],
        }
    }

    fn write(&mut self, colors: &[Rgb; NUM_KEYS], rotation: u8) {
        for (key, rgb) in colors.iter().enumerate() {
            let led = led_index(key as u8, rotation);
            let start = led * SPI_BYTES_PER_LED;
            // WS2812 expects green first
            let bytes = [rgb.g, rgb.r, rgb.b].map(to_pwm);
            for (i, byte) in bytes.into_iter().enumerate() {
                let encoded = encode(byte);
                self.buffer[start + i * 4..start + i * 4 + 4].copy_from_slice(&encoded);
            }
        }
        if let Err(e) = self.spi.blocking_write(&self.buffer) {
            defmt::warn!("LED write failed: {}", e);
        }
    }
}

impl Display for LedDisplay {
    fn set_idle_color(&mut self, _bank: u8, _key: u8, _rgb: Rgb) {
        self.dirty = true;
    }

    fn set_active_color(&mut self, _bank: u8, _key: u8, _rgb: Rgb) {
        self.dirty = true;
    }

    fn trigger_animation(&mut self, key: u8, kind: AnimationKind) {
        self.animations[self.next_slot] = Some(Animation {
            center: key,
            kind,
            radius: 0,
        });
        self.next_slot = (self.next_slot + 1) % MAX_ANIMATIONS;
    }

    fn render(&mut self, frame: &Frame<'_>) {
        let mut colors = [Rgb::OFF; NUM_KEYS];
        for (key, rgb) in colors.iter_mut().enumerate() {
            *rgb = frame.key_color(key as u8);
        }

        let animating = self.animations.iter().any(Option::is_some);
        for slot in &mut self.animations {
            let Some(animation) = slot else { continue };
            let highlight = frame
                .colors
                .active
                .get(usize::from(frame.bank), usize::from(animation.center))
                .unwrap_or(Rgb::OFF);
            for (key, rgb) in colors.iter_mut().enumerate() {
                if on_outline(animation, key as u8) {
                    *rgb = highlight;
                }
            }
            animation.radius += 1;
            if animation.radius > LAST_RADIUS {
                *slot = None;
            }
        }

        if animating || self.dirty || colors != self.last {
            self.write(&colors, frame.settings.rotation);
            self.last = colors;
            self.dirty = false;
        }
    }
}

fn coordinates(key: u8) -> (i8, i8) {
    ((key / 8) as i8, (key % 8) as i8)
}

/// Whether `key` lies on the animation's outline at its current radius.
fn on_outline(animation: &Animation, key: u8) -> bool {
    let (row, col) = coordinates(key);
    let (center_row, center_col) = coordinates(animation.center);
    let dy = row - center_row;
    let dx = col - center_col;
    let r = animation.radius as i8;
    match animation.kind {
        AnimationKind::Square => dx.abs().max(dy.abs()) == r,
        AnimationKind::Circle => {
            let d2 = i16::from(dx) * i16::from(dx) + i16::from(dy) * i16::from(dy);
            let r = i16::from(r);
            d2 >= r * r && d2 < (r + 1) * (r + 1)
        }
        AnimationKind::Star => (dx == 0 || dy == 0 || dx.abs() == dy.abs()) && dx.abs().max(dy.abs()) == r,
        AnimationKind::Triangle => (dy == -r && dx.abs() <= r) || (dy <= 0 && dx.abs() == dy + r),
    }
}

/// LED position of `key` after turning the grid `rotation` quarter turns clockwise.
fn led_index(key: u8, rotation: u8) -> usize {
    let (row, col) = coordinates(key);
    let last = GRID_SIZE - 1;
    let (row, col) = match rotation & 0x03 {
        0 => (row, col),
        1 => (col, last - row),
        2 => (last - row, last - col),
        _ => (last - col, row),
    };
    (row * GRID_SIZE + col) as usize
}

fn to_pwm(level: u8) -> u8 {
    (u16::from(level) * 255 / u16::from(INTERNAL_MAX)).min(255) as u8
}

fn encode(byte: u8) -> [u8; 4] {
    let mut out = [0; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        let high = byte >> (7 - 2 * i) & 1;
        let low = byte >> (6 - 2 * i) & 1;
        *slot = nibble(high) << 4 | nibble(low);
    }
    out
}

fn nibble(bit: u8) -> u8 {
    if bit == 0 { 0b1000 } else { 0b1110 }
}
