use serde::{Deserialize, Serialize};

/// Bytes per pixel on the wire for every supported format
pub const CHANNELS: usize = 4;

/// One RGBW output unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Pixel {
    pub const OFF: Pixel = Pixel::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Pixel { r, g, b, w }
    }

    /// Convert an RGB sample, moving the shared minimum into the white channel.
    ///
    /// Each of `r + w`, `g + w` and `b + w` stays within `u8` because `w` is
    /// never larger than any input channel.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let w = r.min(g).min(b);
        Pixel {
            r: r - w,
            g: g - w,
            b: b - w,
            w,
        }
    }

    /// Recover the RGB sample this pixel was converted from
    pub fn to_rgb(self) -> (u8, u8, u8) {
        (
            self.r.saturating_add(self.w),
            self.g.saturating_add(self.w),
            self.b.saturating_add(self.w),
        )
    }
}

/// Scale a channel value by a global brightness (255 = unchanged, 0 = off)
pub fn scale8(value: u8, brightness: u8) -> u8 {
    ((value as u16 * (brightness as u16 + 1)) >> 8) as u8
}

/// Channel order used when a pixel is serialized for an LED controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    Rgbw,
    /// SK6812 native order
    #[default]
    Grbw,
}

impl PixelFormat {
    fn channels(self, pixel: Pixel, brightness: u8) -> [u8; CHANNELS] {
        let r = scale8(pixel.r, brightness);
        let g = scale8(pixel.g, brightness);
        let b = scale8(pixel.b, brightness);
        let w = scale8(pixel.w, brightness);
        match self {
            PixelFormat::Rgbw => [r, g, b, w],
            PixelFormat::Grbw => [g, r, b, w],
        }
    }

    /// Serialize pixels into `out` at the given brightness.
    ///
    /// Stops at whichever runs out first; returns the number of bytes written.
    pub fn write_into(self, pixels: &[Pixel], brightness: u8, out: &mut [u8]) -> usize {
        let mut written = 0;
        for (pixel, chunk) in pixels.iter().zip(out.chunks_exact_mut(CHANNELS)) {
            chunk.copy_from_slice(&self.channels(*pixel, brightness));
            written += CHANNELS;
        }
        written
    }

    /// Allocate and serialize a whole pixel slice
    pub fn encode(self, pixels: &[Pixel], brightness: u8) -> Vec<u8> {
        let mut data = vec![0u8; pixels.len() * CHANNELS];
        self.write_into(pixels, brightness, &mut data);
        data
    }
}

/// Number of 3-byte slots needed to carry `pixels` RGBW pixels
pub const fn rgb_slot_count(pixels: usize) -> usize {
    (pixels * CHANNELS).div_ceil(3)
}

/// Lay the RGBW byte stream of `pixels` into consecutive RGB slots.
///
/// This is the view an RGB-only driver needs to clock out an RGBW strip: the
/// bytes are copied in stream order and the tail of the last slot is zeroed.
/// Returns the number of slots written.
pub fn pack_rgb_slots(
    pixels: &[Pixel],
    format: PixelFormat,
    brightness: u8,
    out: &mut [[u8; 3]],
) -> usize {
    let slots = rgb_slot_count(pixels.len()).min(out.len());
    let stream_len = pixels.len() * CHANNELS;

    for (slot_idx, slot) in out.iter_mut().take(slots).enumerate() {
        for (offset, byte) in slot.iter_mut().enumerate() {
            let k = slot_idx * 3 + offset;
            *byte = if k < stream_len {
                format.channels(pixels[k / CHANNELS], brightness)[k % CHANNELS]
            } else {
                0
            };
        }
    }

    slots
}
