//! Square sample planes and their conversion to and from 8-bit luma images.
//!
//! A [`Plane`] holds `side * side` samples in row-major order. Samples loaded from
//! an image are normalized to `[0, 1]`; planes produced by the pipeline may carry
//! values outside that range, which are saturated when converted back to 8-bit.

use image::GrayImage;

use crate::error::{Error, Result, ShapeError};

/// A square grid of `f32` samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    side: usize,
    samples: Vec<f32>,
}

impl Plane {
    /// Create a zero-initialized plane.
    #[must_use]
    pub fn new(side: usize) -> Self {
        Self {
            side,
            samples: vec![0.0; side * side],
        }
    }

    /// Wrap a row-major sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::BufferLength`] if `samples.len() != side * side`.
    pub fn from_vec(side: usize, samples: Vec<f32>) -> Result<Self> {
        if samples.len() != side * side {
            return Err(ShapeError::BufferLength {
                side,
                len: samples.len(),
            }
            .into());
        }
        Ok(Self { side, samples })
    }

    /// Load a luma image, normalize it to `[0, 1]` and zero-pad the bottom and
    /// right edges up to the next multiple of `block_size`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyImage`] for a zero-area image,
    /// [`ShapeError::NotSquare`] if width and height differ and
    /// [`ShapeError::BlockTooSmall`] if `block_size < 2`.
    pub fn from_luma(image: &GrayImage, block_size: usize) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage);
        }
        if width != height {
            return Err(ShapeError::NotSquare { width, height }.into());
        }
        if block_size < 2 {
            return Err(ShapeError::BlockTooSmall(block_size).into());
        }

        let side = width as usize;
        let padded = side.div_ceil(block_size) * block_size;
        let mut plane = Self::new(padded);
        for (x, y, px) in image.enumerate_pixels() {
            plane.set(y as usize, x as usize, f32::from(px[0]) / 255.0);
        }
        Ok(plane)
    }

    /// Side length in samples.
    #[must_use]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Sample at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.samples[row * self.side + col]
    }

    /// Overwrite the sample at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.samples[row * self.side + col] = value;
    }

    /// Row-major view of all samples.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Denormalize to an 8-bit luma image (`value * 255`, rounded and saturated).
    #[must_use]
    pub fn to_luma(&self) -> GrayImage {
        self.render(|v| v)
    }

    /// Render `|value| * 255` as an 8-bit luma image, used to visualize
    /// transform coefficients.
    #[must_use]
    pub fn magnitude_to_luma(&self) -> GrayImage {
        self.render(f32::abs)
    }

    fn render(&self, map: impl Fn(f32) -> f32) -> GrayImage {
        #[allow(clippy::cast_possible_truncation)]
        let side = self.side as u32;
        let raw = self.samples.iter().map(|&v| to_u8(map(v))).collect();
        // Buffer length is side * side by construction.
        GrayImage::from_raw(side, side, raw).unwrap_or_else(|| GrayImage::new(side, side))
    }
}

/// Convert a normalized sample to 8-bit, rounding to nearest and saturating.
#[must_use]
pub fn to_u8(value: f32) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_luma_normalizes_samples() {
        let mut img = GrayImage::new(4, 4);
        img.put_pixel(1, 2, image::Luma([255]));
        img.put_pixel(3, 0, image::Luma([51]));

        let plane = Plane::from_luma(&img, 2).unwrap();
        assert_eq!(plane.side(), 4);
        assert!((plane.get(2, 1) - 1.0).abs() < f32::EPSILON);
        assert!((plane.get(0, 3) - 0.2).abs() < 1e-6);
        assert!(plane.get(0, 0).abs() < f32::EPSILON);
    }

    #[test]
    fn from_luma_pads_to_block_multiple() {
        let mut img = GrayImage::new(10, 10);
        for px in img.pixels_mut() {
            *px = image::Luma([255]);
        }

        let plane = Plane::from_luma(&img, 8).unwrap();
        assert_eq!(plane.side(), 16);
        assert!((plane.get(9, 9) - 1.0).abs() < f32::EPSILON);
        assert!(plane.get(10, 0).abs() < f32::EPSILON);
        assert!(plane.get(0, 10).abs() < f32::EPSILON);
        assert!(plane.get(15, 15).abs() < f32::EPSILON);
    }

    #[test]
    fn from_luma_rejects_non_square() {
        let img = GrayImage::new(16, 8);
        let err = Plane::from_luma(&img, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::Shape(ShapeError::NotSquare {
                width: 16,
                height: 8
            })
        ));
    }

    #[test]
    fn from_luma_rejects_empty() {
        let img = GrayImage::new(0, 0);
        assert!(matches!(
            Plane::from_luma(&img, 8),
            Err(Error::EmptyImage)
        ));
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Plane::from_vec(3, vec![0.0; 9]).is_ok());
        assert!(matches!(
            Plane::from_vec(3, vec![0.0; 8]),
            Err(Error::Shape(ShapeError::BufferLength { side: 3, len: 8 }))
        ));
    }

    #[test]
    fn to_luma_saturates_out_of_range_values() {
        let plane = Plane::from_vec(2, vec![-0.2, 0.5, 1.7, 1.0]).unwrap();
        let img = plane.to_luma();
        assert_eq!(img.as_raw(), &vec![0, 128, 255, 255]);

        let mag = plane.magnitude_to_luma();
        assert_eq!(mag.get_pixel(0, 0)[0], 51);
    }

    #[test]
    fn luma_round_trip_is_lossless() {
        let mut img = GrayImage::new(8, 8);
        for (i, px) in img.pixels_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            {
                *px = image::Luma([(i * 4) as u8]);
            }
        }
        let plane = Plane::from_luma(&img, 4).unwrap();
        assert_eq!(plane.to_luma(), img);
    }
}
