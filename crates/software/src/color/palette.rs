use super::Rgb;

/// Off.
pub const OFF: Rgb = Rgb::new(0, 0, 0);
/// Red.
pub const RED: Rgb = Rgb::new(48, 0, 0);
/// Dim red.
pub const RED_DIM: Rgb = Rgb::new(24, 0, 0);
/// Orange.
pub const ORANGE: Rgb = Rgb::new(40, 12, 0);
/// Dim orange.
pub const ORANGE_DIM: Rgb = Rgb::new(20, 6, 0);
/// Yellow.
pub const YELLOW: Rgb = Rgb::new(32, 25, 0);
/// Dim yellow.
pub const YELLOW_DIM: Rgb = Rgb::new(16, 12, 0);
/// Chartreuse.
pub const CHARTREUSE: Rgb = Rgb::new(25, 32, 0);
/// Dim chartreuse.
pub const CHARTREUSE_DIM: Rgb = Rgb::new(12, 16, 0);
/// Green.
pub const GREEN: Rgb = Rgb::new(0, 48, 0);
/// Dim green.
pub const GREEN_DIM: Rgb = Rgb::new(0, 24, 0);
/// Cyan.
pub const CYAN: Rgb = Rgb::new(0, 30, 30);
/// Dim cyan.
pub const CYAN_DIM: Rgb = Rgb::new(0, 15, 15);
/// Blue.
pub const BLUE: Rgb = Rgb::new(0, 0, 48);
/// Dim blue.
pub const BLUE_DIM: Rgb = Rgb::new(0, 0, 24);
/// Lavender.
pub const LAVENDER: Rgb = Rgb::new(25, 7, 32);
/// Dim lavender.
pub const LAVENDER_DIM: Rgb = Rgb::new(13, 3, 17);
/// Pink.
pub const PINK: Rgb = Rgb::new(36, 0, 18);
/// Dim pink.
pub const PINK_DIM: Rgb = Rgb::new(18, 0, 9);
/// White.
pub const WHITE: Rgb = Rgb::new(24, 24, 24);

/// Channel level above which a pushed color maps to the bright palette entry rather than the dim one.
const BRIGHT_LIMIT: u8 = 0x80;
/// A red-green-blue mix with more green than this is white rather than lavender.
const LAVENDER_GREEN_LIMIT: u8 = 0x24;

fn pick(level: u8, bright: Rgb, dim: Rgb) -> Rgb {
    if level > BRIGHT_LIMIT { bright } else { dim }
}

/// Snap an arbitrary color onto the 20-entry palette so that the whole grid stays within the USB power budget.
///
/// The hue family is chosen from which channels are non-zero (and, for red-green mixes, their ratio); brightness
/// from whether the dominant channel exceeds `0x80`. A color whose deciding channel already holds that family's
/// palette level is left alone, so palette colors and colors already remapped pass through unchanged.
pub fn palette_remap(rgb: Rgb) -> Rgb {
    let Rgb { r, g, b } = rgb;
    match (r != 0, g != 0, b != 0) {
        (false, false, false) => OFF,
        (false, false, true) if b == BLUE.b => rgb,
        (false, false, true) => pick(b, BLUE, BLUE_DIM),
        (false, true, false) if g == GREEN.g => rgb,
        (false, true, false) => pick(g, GREEN, GREEN_DIM),
        (false, true, true) if g == CYAN.g => rgb,
        (false, true, true) => pick(g, CYAN, CYAN_DIM),
        (true, false, false) if r == RED.r => rgb,
        (true, false, false) => pick(r, RED, RED_DIM),
        (true, false, true) if r == PINK.r => rgb,
        (true, false, true) => pick(r, PINK, PINK_DIM),
        (true, true, false) if r < g => {
            if g == CHARTREUSE.g {
                rgb
            } else {
                pick(g, CHARTREUSE, CHARTREUSE_DIM)
            }
        }
        (true, true, false) if r >> 1 >= g => {
            if r == ORANGE.r {
                rgb
            } else {
                pick(r, ORANGE, ORANGE_DIM)
            }
        }
        (true, true, false) if r == YELLOW.r => rgb,
        (true, true, false) => pick(r, YELLOW, YELLOW_DIM),
        (true, true, true) if g > LAVENDER_GREEN_LIMIT => WHITE,
        (true, true, true) if b == LAVENDER.b => rgb,
        (true, true, true) => pick(r, LAVENDER, LAVENDER_DIM),
    }
}
