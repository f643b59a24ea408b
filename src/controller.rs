use std::time::Duration;

use crate::buffer::PixelBuffer;
use crate::idle::{self, PresentationState, AMBIENT_COLOR, FADE_STEP_DELAY, MAX_BRIGHTNESS};
use crate::pixel::Pixel;
use crate::protocol::{DecodeState, DecoderStats, FrameDecoder};

/// Strip length: 19 left + 35 top + 19 right
pub const LED_COUNT: usize = 73;

/// What the control loop must do after handing the controller an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Render,
    /// Render, then hold off before the next poll
    RenderThenPause(Duration),
}

/// Decoder, presentation buffer and idle timing for one strip.
///
/// Times are monotonic offsets from an arbitrary origin chosen by the caller.
#[derive(Debug, Clone)]
pub struct Controller<const N: usize> {
    decoder: FrameDecoder<N>,
    buffer: PixelBuffer<N>,
    last_frame: Duration,
    brightness: u8,
    state: PresentationState,
}

impl<const N: usize> Controller<N> {
    pub fn new(now: Duration) -> Self {
        Controller {
            decoder: FrameDecoder::new(),
            buffer: PixelBuffer::new(),
            last_frame: now,
            brightness: MAX_BRIGHTNESS,
            state: PresentationState::Active,
        }
    }

    /// Handle one inbound byte
    pub fn on_byte(&mut self, byte: u8, now: Duration) -> Action {
        let Some(pixels) = self.decoder.push(byte) else {
            return Action::None;
        };

        self.decoder.swap_frame(&mut self.buffer);
        self.last_frame = now;
        self.brightness = MAX_BRIGHTNESS;
        log::trace!("Frame accepted: {} pixels", pixels);
        self.enter(PresentationState::Active);
        Action::Render
    }

    /// Apply the idle policy while no byte is available
    pub fn on_idle_poll(&mut self, now: Duration) -> Action {
        let state = self.state(now);
        self.enter(state);

        match state {
            PresentationState::Active => Action::None,
            PresentationState::Ambient => {
                self.buffer.fill(AMBIENT_COLOR);
                Action::Render
            }
            PresentationState::Fading if self.brightness > 0 => {
                self.brightness = idle::fade(self.brightness);
                Action::RenderThenPause(FADE_STEP_DELAY)
            }
            PresentationState::Fading => Action::None,
        }
    }

    pub fn state(&self, now: Duration) -> PresentationState {
        PresentationState::from_elapsed(now.saturating_sub(self.last_frame))
    }

    pub fn pixels(&self) -> &[Pixel] {
        self.buffer.as_slice()
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn decode_state(&self) -> DecodeState {
        self.decoder.state()
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    fn enter(&mut self, state: PresentationState) {
        if state != self.state {
            log::info!("Presentation {} -> {}", self.state, state);
            self.state = state;
        }
    }
}
