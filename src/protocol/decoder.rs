use std::mem;

use super::adalight::{DecodeState, Event};
use crate::buffer::PixelBuffer;
use crate::pixel::Pixel;

/// Running counters for everything the decoder has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub checksum_errors: u64,
    pub discarded_bytes: u64,
    pub clamped_frames: u64,
}

/// Byte-at-a-time Adalight decoder that assembles frames off to the side.
///
/// Pixels land in a staging buffer that is cleared when a header validates,
/// so a frame only becomes visible once it is complete.
#[derive(Debug, Clone)]
pub struct FrameDecoder<const N: usize> {
    state: DecodeState,
    staging: PixelBuffer<N>,
    cursor: usize,
    stats: DecoderStats,
}

impl<const N: usize> FrameDecoder<N> {
    pub fn new() -> Self {
        FrameDecoder {
            state: DecodeState::default(),
            staging: PixelBuffer::new(),
            cursor: 0,
            stats: DecoderStats::default(),
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one byte. Returns the pixel count when this byte completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<usize> {
        let (next, event) = self.state.step(byte, N);
        self.state = next;

        match event {
            Event::None => None,
            Event::Discarded => {
                self.stats.discarded_bytes += 1;
                None
            }
            Event::ChecksumMismatch => {
                self.stats.checksum_errors += 1;
                None
            }
            Event::Header { declared, pixels } => {
                self.staging.clear();
                self.cursor = 0;
                if declared > pixels {
                    self.stats.clamped_frames += 1;
                }
                if pixels == 0 {
                    return Some(self.finish());
                }
                None
            }
            Event::Pixel { rgb, remaining } => {
                let [r, g, b] = rgb;
                self.staging.set(self.cursor, Pixel::from_rgb(r, g, b));
                self.cursor += 1;
                if remaining == 0 {
                    return Some(self.finish());
                }
                None
            }
        }
    }

    /// Exchange the last completed frame with `target`
    pub fn swap_frame(&mut self, target: &mut PixelBuffer<N>) {
        mem::swap(&mut self.staging, target);
    }

    fn finish(&mut self) -> usize {
        self.stats.frames += 1;
        self.cursor
    }
}

impl<const N: usize> Default for FrameDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::adalight::{encode_frame, header, MAGIC};
    use crate::protocol::checksum;
    use proptest::prelude::*;

    const CAP: usize = 8;

    fn feed<const N: usize>(decoder: &mut FrameDecoder<N>, bytes: &[u8]) -> Vec<usize> {
        bytes.iter().filter_map(|&b| decoder.push(b)).collect()
    }

    #[test]
    fn test_frame_lands_in_order_with_dark_tail() {
        let mut decoder = FrameDecoder::<5>::new();
        let frame = encode_frame(&[255, 0, 0, 10, 20, 30, 7, 7, 7], 3).unwrap();
        assert_eq!(feed(&mut decoder, &frame), vec![3]);

        let mut target = PixelBuffer::<5>::new();
        target.fill(Pixel::new(1, 1, 1, 1));
        decoder.swap_frame(&mut target);

        assert_eq!(target[0], Pixel::new(255, 0, 0, 0));
        assert_eq!(target[1], Pixel::new(0, 10, 20, 10));
        assert_eq!(target[2], Pixel::new(0, 0, 0, 7));
        assert_eq!(target[3], Pixel::OFF);
        assert_eq!(target[4], Pixel::OFF);
    }

    #[test]
    fn test_stale_staging_is_cleared() {
        let mut decoder = FrameDecoder::<3>::new();
        feed(&mut decoder, &encode_frame(&[9; 9], 3).unwrap());
        let mut target = PixelBuffer::<3>::new();
        decoder.swap_frame(&mut target);

        // Put the full frame back into staging; the next header must wipe it.
        decoder.swap_frame(&mut target);
        assert_eq!(feed(&mut decoder, &encode_frame(&[1, 2, 3], 3).unwrap()), vec![1]);
        decoder.swap_frame(&mut target);
        assert_eq!(target[0], Pixel::new(0, 1, 2, 1));
        assert_eq!(target[1], Pixel::OFF);
    }

    #[test]
    fn test_checksum_error_counts_and_recovers() {
        let mut decoder = FrameDecoder::<4>::new();
        let mut bytes = vec![b'A', b'd', b'a', 0, 0, 0x00];
        bytes.extend_from_slice(&encode_frame(&[1, 1, 1], 3).unwrap());

        assert_eq!(feed(&mut decoder, &bytes), vec![1]);
        assert_eq!(decoder.stats().checksum_errors, 1);
        assert_eq!(decoder.stats().frames, 1);
    }

    #[test]
    fn test_clamped_frame_leaves_surplus_for_resync() {
        let mut decoder = FrameDecoder::<2>::new();
        let mut bytes = encode_frame(&[10; 12], 3).unwrap();
        bytes.extend_from_slice(&encode_frame(&[20, 20, 20], 3).unwrap());

        assert_eq!(feed(&mut decoder, &bytes), vec![2, 1]);
        let stats = decoder.stats();
        assert_eq!(stats.clamped_frames, 1);
        assert_eq!(stats.discarded_bytes, 6);
    }

    #[test]
    fn test_noise_before_header() {
        let mut decoder = FrameDecoder::<2>::new();
        let mut bytes = vec![0xff, b'A', 0x00, b'x'];
        bytes.extend_from_slice(&header(1).unwrap());
        bytes.extend_from_slice(&[3, 4, 5]);

        assert_eq!(feed(&mut decoder, &bytes), vec![1]);
        assert_eq!(decoder.stats().discarded_bytes, 3);
    }

    fn noise_byte() -> impl Strategy<Value = u8> {
        any::<u8>().prop_filter("marker start", |b| *b != MAGIC[0])
    }

    proptest! {
        #[test]
        fn noisy_stream_lands_pixels_in_order(
            noise in prop::collection::vec(noise_byte(), 0..32),
            triples in prop::collection::vec(any::<[u8; 3]>(), 1..=CAP),
        ) {
            let mut decoder = FrameDecoder::<CAP>::new();
            let mut bytes = noise.clone();
            bytes.extend_from_slice(&encode_frame(&triples.concat(), 3).unwrap());

            prop_assert_eq!(feed(&mut decoder, &bytes), vec![triples.len()]);
            prop_assert_eq!(decoder.stats().discarded_bytes, noise.len() as u64);

            let mut target = PixelBuffer::<CAP>::new();
            target.fill(Pixel::new(1, 1, 1, 1));
            decoder.swap_frame(&mut target);
            for (i, [r, g, b]) in triples.iter().copied().enumerate() {
                prop_assert_eq!(target[i], Pixel::from_rgb(r, g, b));
            }
            prop_assert!(target.as_slice()[triples.len()..].iter().all(|p| *p == Pixel::OFF));
        }

        #[test]
        fn wrong_checksum_keeps_last_frame(high: u8, low: u8, bad: u8, next in any::<[u8; 3]>()) {
            prop_assume!(bad != checksum(high, low));

            let mut decoder = FrameDecoder::<CAP>::new();
            feed(&mut decoder, &encode_frame(&[7; 6], 3).unwrap());

            let rejected = [MAGIC[0], MAGIC[1], MAGIC[2], high, low, bad];
            prop_assert!(feed(&mut decoder, &rejected).is_empty());
            prop_assert_eq!(decoder.stats().checksum_errors, 1);
            prop_assert_eq!(decoder.state(), DecodeState::SeekMagic(0));

            // Staging still holds the last completed frame
            let mut target = PixelBuffer::<CAP>::new();
            decoder.swap_frame(&mut target);
            prop_assert_eq!(target[0], Pixel::from_rgb(7, 7, 7));
            prop_assert_eq!(target[1], Pixel::from_rgb(7, 7, 7));
            prop_assert_eq!(target[2], Pixel::OFF);

            prop_assert_eq!(feed(&mut decoder, &encode_frame(&next, 3).unwrap()), vec![1]);
            decoder.swap_frame(&mut target);
            prop_assert_eq!(target[0], Pixel::from_rgb(next[0], next[1], next[2]));
        }
    }
}
