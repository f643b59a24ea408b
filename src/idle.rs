use std::fmt;
use std::time::Duration;

use crate::pixel::Pixel;

/// Gap after which the ambient color replaces the last frame
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Gap after which brightness starts fading toward off
pub const OFF_TIMEOUT: Duration = Duration::from_millis(600_000);

pub const MAX_BRIGHTNESS: u8 = 255;

/// Brightness removed per fading poll
pub const FADE_STEP: u8 = 1;

/// Pause after each fade step; bounds the fade to roughly 13 seconds
pub const FADE_STEP_DELAY: Duration = Duration::from_millis(50);

/// Saddle brown, shown as plain RGB with the white emitter off
pub const AMBIENT_COLOR: Pixel = Pixel::new(139, 69, 19, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationState {
    Active,
    Ambient,
    Fading,
}

impl PresentationState {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        if elapsed <= IDLE_TIMEOUT {
            PresentationState::Active
        } else if elapsed <= OFF_TIMEOUT {
            PresentationState::Ambient
        } else {
            PresentationState::Fading
        }
    }
}

impl fmt::Display for PresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PresentationState::Active => "active",
            PresentationState::Ambient => "ambient",
            PresentationState::Fading => "fading",
        };
        f.write_str(name)
    }
}

/// Next brightness while fading; stops at zero
pub fn fade(brightness: u8) -> u8 {
    brightness.saturating_sub(FADE_STEP)
}
