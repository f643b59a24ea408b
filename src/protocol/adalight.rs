use super::{checksum, HEADER_LEN};

/// Frame start marker
pub const MAGIC: [u8; 3] = *b"Ada";

/// Sent once at startup so the host knows frames will be accepted
pub const READY_TOKEN: &[u8] = b"Ada\n";

/// Bytes per pixel triple on the wire
pub const SAMPLE_LEN: usize = 3;

/// Build the Adalight header for `pixel_count` pixels
pub fn header(pixel_count: usize) -> Option<[u8; HEADER_LEN]> {
    super::header(&MAGIC, pixel_count)
}

/// Build a complete Adalight frame around already-serialized pixel data.
///
/// Returns `None` when the data holds no whole pixel.
pub fn encode_frame(pixel_data: &[u8], stride: usize) -> Option<Vec<u8>> {
    let led_count = pixel_data.len() / stride;

    let mut frame = Vec::with_capacity(HEADER_LEN + pixel_data.len());
    frame.extend_from_slice(&header(led_count)?);
    frame.extend_from_slice(pixel_data);
    Some(frame)
}

/// Decoder position within the byte stream.
///
/// `step` only produces states with `SeekMagic` below the marker length,
/// a nonzero `remaining` and `filled` below a full sample. Any other value
/// is treated as a lost position: the byte is discarded and matching
/// restarts at the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Index of the next expected magic byte
    SeekMagic(usize),
    ReadCountHigh,
    ReadCountLow { high: u8 },
    ReadChecksum { high: u8, low: u8 },
    ReadPixelData {
        remaining: usize,
        sample: [u8; SAMPLE_LEN],
        filled: usize,
    },
}

impl Default for DecodeState {
    fn default() -> Self {
        DecodeState::SeekMagic(0)
    }
}

/// What a single byte meant to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    None,
    /// Byte did not continue the magic marker and was dropped
    Discarded,
    /// Header failed validation; decoding restarts at magic seek
    ChecksumMismatch,
    /// Header accepted. `pixels` is the declared count clamped to capacity.
    Header { declared: usize, pixels: usize },
    /// One full RGB triple; `remaining == 0` completes the frame
    Pixel { rgb: [u8; SAMPLE_LEN], remaining: usize },
}

impl DecodeState {
    /// Advance by one byte for a buffer holding `capacity` pixels.
    ///
    /// A byte that breaks a partial magic match is consumed, so matching
    /// restarts with the byte after it even if the dropped byte was itself
    /// a valid first magic byte.
    pub fn step(self, byte: u8, capacity: usize) -> (DecodeState, Event) {
        match self {
            DecodeState::SeekMagic(index) => {
                if MAGIC.get(index) != Some(&byte) {
                    return (DecodeState::SeekMagic(0), Event::Discarded);
                }
                if index + 1 == MAGIC.len() {
                    (DecodeState::ReadCountHigh, Event::None)
                } else {
                    (DecodeState::SeekMagic(index + 1), Event::None)
                }
            }
            DecodeState::ReadCountHigh => (DecodeState::ReadCountLow { high: byte }, Event::None),
            DecodeState::ReadCountLow { high } => {
                (DecodeState::ReadChecksum { high, low: byte }, Event::None)
            }
            DecodeState::ReadChecksum { high, low } => {
                if byte != checksum(high, low) {
                    return (DecodeState::SeekMagic(0), Event::ChecksumMismatch);
                }

                let declared = (((high as usize) << 8) | low as usize) + 1;
                let pixels = declared.min(capacity);
                let next = if pixels == 0 {
                    DecodeState::SeekMagic(0)
                } else {
                    DecodeState::ReadPixelData {
                        remaining: pixels,
                        sample: [0; SAMPLE_LEN],
                        filled: 0,
                    }
                };
                (next, Event::Header { declared, pixels })
            }
            DecodeState::ReadPixelData {
                remaining,
                mut sample,
                filled,
            } => {
                if remaining == 0 || filled >= SAMPLE_LEN {
                    return (DecodeState::SeekMagic(0), Event::Discarded);
                }

                sample[filled] = byte;
                let filled = filled + 1;
                if filled < SAMPLE_LEN {
                    return (
                        DecodeState::ReadPixelData {
                            remaining,
                            sample,
                            filled,
                        },
                        Event::None,
                    );
                }

                let remaining = remaining - 1;
                let next = if remaining == 0 {
                    DecodeState::SeekMagic(0)
                } else {
                    DecodeState::ReadPixelData {
                        remaining,
                        sample: [0; SAMPLE_LEN],
                        filled: 0,
                    }
                };
                (next, Event::Pixel { rgb: sample, remaining })
            }
        }
    }
}
