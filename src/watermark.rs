//! Watermark matrices and the generators that fill them.

use image::GrayImage;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::blocks::GridPosition;
use crate::error::{Result, ShapeError};
use crate::plane::to_u8;

/// Anything that can produce independent uniform samples in `[0, 1)`.
///
/// Every `rand` generator is a source; other back-ends (hardware generators,
/// precomputed tables) can implement this directly.
pub trait WatermarkSource {
    /// Fill `out` with uniform samples in `[0, 1)`.
    fn fill_uniform(&mut self, out: &mut [f32]);
}

impl<R: RngCore> WatermarkSource for R {
    fn fill_uniform(&mut self, out: &mut [f32]) {
        for v in out {
            *v = self.gen::<f32>();
        }
    }
}

/// Build the default generator: `ChaCha20` seeded from `seed`, or from OS entropy.
#[must_use]
pub fn seeded_rng(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    }
}

/// A square grid of watermark values, one per image block.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkMatrix {
    side: usize,
    values: Vec<f32>,
}

impl WatermarkMatrix {
    /// Draw a `side x side` matrix from `source`.
    #[must_use]
    pub fn generate(side: usize, source: &mut dyn WatermarkSource) -> Self {
        let mut values = vec![0.0; side * side];
        source.fill_uniform(&mut values);
        Self { side, values }
    }

    /// Wrap explicit row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::BufferLength`] if `values.len() != side * side`.
    pub fn from_vec(side: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != side * side {
            return Err(ShapeError::BufferLength {
                side,
                len: values.len(),
            }
            .into());
        }
        Ok(Self { side, values })
    }

    /// Side length.
    #[must_use]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Value assigned to the block at `position`.
    #[must_use]
    pub fn value_at(&self, position: GridPosition) -> f32 {
        self.values[position.row * self.side + position.col]
    }

    /// Row-major view of all values.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Render as 8-bit grayscale (`value * 255`).
    #[must_use]
    pub fn to_luma(&self) -> GrayImage {
        #[allow(clippy::cast_possible_truncation)]
        let side = self.side as u32;
        GrayImage::from_fn(side, side, |x, y| {
            image::Luma([to_u8(self.values[y as usize * self.side + x as usize])])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_values_are_unit_interval() {
        let mut rng = seeded_rng(Some(42));
        let matrix = WatermarkMatrix::generate(64, &mut rng);
        assert_eq!(matrix.as_slice().len(), 64 * 64);
        assert!(matrix.as_slice().iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn same_seed_gives_same_matrix() {
        let a = WatermarkMatrix::generate(8, &mut seeded_rng(Some(7)));
        let b = WatermarkMatrix::generate(8, &mut seeded_rng(Some(7)));
        let c = WatermarkMatrix::generate(8, &mut seeded_rng(Some(8)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn value_at_indexes_row_major() {
        let matrix = WatermarkMatrix::from_vec(2, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        let v = matrix.value_at(GridPosition { row: 1, col: 0 });
        assert!((v - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn to_luma_scales_by_255() {
        let matrix = WatermarkMatrix::from_vec(2, vec![0.0, 0.5, 1.0, 0.2]).unwrap();
        let img = matrix.to_luma();
        assert_eq!(img.get_pixel(1, 0)[0], 128);
        assert_eq!(img.get_pixel(0, 1)[0], 255);
        assert_eq!(img.get_pixel(1, 1)[0], 51);
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(WatermarkMatrix::from_vec(3, vec![0.0; 4]).is_err());
    }
}
