use std::ops::Index;

use crate::pixel::Pixel;

/// Fixed-capacity pixel storage; always exactly `N` pixels long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer<const N: usize> {
    pixels: [Pixel; N],
}

impl<const N: usize> PixelBuffer<N> {
    pub fn new() -> Self {
        PixelBuffer {
            pixels: [Pixel::OFF; N],
        }
    }

    pub fn clear(&mut self) {
        self.fill(Pixel::OFF);
    }

    pub fn fill(&mut self, pixel: Pixel) {
        self.pixels.fill(pixel);
    }

    /// Write one position; indices past the end are ignored
    pub fn set(&mut self, index: usize, pixel: Pixel) {
        if let Some(slot) = self.pixels.get_mut(index) {
            *slot = pixel;
        }
    }

    pub fn as_slice(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for PixelBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Index<usize> for PixelBuffer<N> {
    type Output = Pixel;

    fn index(&self, index: usize) -> &Pixel {
        &self.pixels[index]
    }
}
