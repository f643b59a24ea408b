pub mod adalight;
pub mod awa;
mod decoder;

pub use adalight::{DecodeState, Event, MAGIC, READY_TOKEN};
pub use decoder::{DecoderStats, FrameDecoder};

/// Length of the fixed header shared by Adalight and AWA frames
pub const HEADER_LEN: usize = 6;

/// Header checksum: count high XOR count low XOR 0x55
pub fn checksum(high: u8, low: u8) -> u8 {
    high ^ low ^ 0x55
}

/// Largest pixel count a 16-bit count-minus-one field can declare
pub const MAX_PIXELS: usize = 1 << 16;

/// Build a header for `pixel_count` pixels; the wire carries count - 1.
///
/// A frame cannot declare zero pixels, so 0 (and anything above
/// `MAX_PIXELS`) has no header.
fn header(magic: &[u8; 3], pixel_count: usize) -> Option<[u8; HEADER_LEN]> {
    if pixel_count == 0 || pixel_count > MAX_PIXELS {
        return None;
    }
    let wire_count = pixel_count - 1;
    let high = (wire_count >> 8) as u8;
    let low = wire_count as u8;
    Some([magic[0], magic[1], magic[2], high, low, checksum(high, low)])
}
