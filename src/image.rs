// file: image.rs
// desc: 28x28 grayscale input grid fed to the classifier

use crate::error::{Error, Result};

/// Side length of the model input.
pub const IMAGE_SIZE: usize = 28;

/// Intensity written at the centre of a brush stroke.
const INK: u8 = 255;
/// Intensity the four neighbours of a stroke are raised to.
const SOFT_EDGE: u8 = 96;

/// Single-channel 28x28 intensity grid, row-major.
///
/// Stored already inverted: ink is high intensity on a zero background,
/// the way MNIST digits look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    pixels: [[u8; IMAGE_SIZE]; IMAGE_SIZE],
}

impl InputImage {
    pub fn blank() -> Self {
        Self {
            pixels: [[0; IMAGE_SIZE]; IMAGE_SIZE],
        }
    }

    /// Builds an image from a row-major buffer of exactly 784 values.
    pub fn from_pixels(data: Vec<u8>) -> Result<Self> {
        if data.len() != IMAGE_SIZE * IMAGE_SIZE {
            return Err(Error::ShapeMismatch {
                expected: format!("{} pixels", IMAGE_SIZE * IMAGE_SIZE),
                actual: format!("{} pixels", data.len()),
            });
        }

        let mut image = Self::blank();
        for (y, row) in data.chunks_exact(IMAGE_SIZE).enumerate() {
            image.pixels[y].copy_from_slice(row);
        }
        Ok(image)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        self.pixels.get(y).and_then(|row| row.get(x)).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8; IMAGE_SIZE]> {
        self.pixels.iter()
    }

    /// Applies one brush stroke centred on `(x, y)`.
    ///
    /// Out-of-grid coordinates are ignored and intensities never decrease.
    pub fn paint(&mut self, x: usize, y: usize) {
        if x >= IMAGE_SIZE || y >= IMAGE_SIZE {
            return;
        }

        self.raise(x, y, INK);

        let neighbours = [
            (x.checked_sub(1), Some(y)),
            (Some(x + 1), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), Some(y + 1)),
        ];
        for (nx, ny) in neighbours {
            if let (Some(nx), Some(ny)) = (nx, ny) {
                if nx < IMAGE_SIZE && ny < IMAGE_SIZE {
                    self.raise(nx, ny, SOFT_EDGE);
                }
            }
        }
    }

    fn raise(&mut self, x: usize, y: usize, value: u8) {
        let pixel = &mut self.pixels[y][x];
        *pixel = (*pixel).max(value);
    }

    /// Row-major intensities rescaled from [0, 255] to [0.0, 1.0].
    pub fn normalized(&self) -> Vec<f32> {
        self.pixels
            .iter()
            .flat_map(|row| row.iter())
            .map(|&p| p as f32 / 255.0)
            .collect()
    }

    pub fn ink_count(&self) -> usize {
        self.pixels
            .iter()
            .flat_map(|row| row.iter())
            .filter(|&&p| p > 0)
            .count()
    }
}

impl Default for InputImage {
    fn default() -> Self {
        Self::blank()
    }
}
