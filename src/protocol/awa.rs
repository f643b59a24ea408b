use super::HEADER_LEN;

/// Frame start marker for HyperSerial-style controllers
pub const MAGIC: [u8; 3] = *b"Awa";

const TRAILER_LEN: usize = 3;

/// Build an AWA frame: Adalight-style header, pixel data, Fletcher trailer.
///
/// Returns `None` when the data holds no whole pixel.
pub fn encode_frame(pixel_data: &[u8], stride: usize) -> Option<Vec<u8>> {
    let led_count = pixel_data.len() / stride;

    let mut frame = Vec::with_capacity(HEADER_LEN + pixel_data.len() + TRAILER_LEN);
    frame.extend_from_slice(&super::header(&MAGIC, led_count)?);
    frame.extend_from_slice(pixel_data);
    frame.extend_from_slice(&fletcher_trailer(pixel_data));
    Some(frame)
}

/// Fletcher sums over the pixel data, plus the position-salted extension sum
fn fletcher_trailer(pixel_data: &[u8]) -> [u8; TRAILER_LEN] {
    let mut fletcher1: u16 = 0;
    let mut fletcher2: u16 = 0;
    let mut fletcher_ext: u16 = 0;

    for (position, &byte) in pixel_data.iter().enumerate() {
        fletcher1 = (fletcher1 + byte as u16) % 255;
        fletcher2 = (fletcher2 + fletcher1) % 255;
        fletcher_ext = (fletcher_ext + (byte as u16 ^ position as u16)) % 255;
    }

    // 'A' would look like a frame start to the receiver
    if fletcher_ext == 0x41 {
        fletcher_ext = 0xaa;
    }

    [fletcher1 as u8, fletcher2 as u8, fletcher_ext as u8]
}
