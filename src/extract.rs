//! Watermark recovery and verification.
//!
//! Given the original image and a watermarked copy, the embedding target of each
//! block is re-selected on the ORIGINAL coefficients and the watermark value is
//! read back as `(marked - original) / strength`. The recovered matrix is scored
//! against an expected one with normalized cross-correlation.

use image::GrayImage;

use crate::blocks::grid_position;
use crate::error::{Error, Result, ShapeError};
use crate::pipeline::WatermarkPipeline;
use crate::plane::Plane;
use crate::selection::select;
use crate::transform::BlockTransform;
use crate::watermark::WatermarkMatrix;

/// Correlation at or above which a watermark counts as present.
pub const DETECTION_THRESHOLD: f32 = 0.5;

/// Result of checking a watermarked image against an expected matrix.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Matrix read back from the image pair.
    pub recovered: WatermarkMatrix,
    /// Normalized cross-correlation with the expected matrix, in `[-1, 1]`.
    pub correlation: f32,
    /// Whether `correlation >= DETECTION_THRESHOLD`.
    pub detected: bool,
}

/// Pearson correlation of two equal-length sample sequences; 0 when either is flat.
fn ncc(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let mean = |v: &[f32]| v.iter().sum::<f32>() / v.len() as f32;
    let (mean_a, mean_b) = (mean(a), mean(b));

    let (cross, var_a, var_b) =
        a.iter()
            .zip(b)
            .fold((0.0_f32, 0.0_f32, 0.0_f32), |(cross, var_a, var_b), (&x, &y)| {
                let (dx, dy) = (x - mean_a, y - mean_b);
                (cross + dx * dy, var_a + dx * dx, var_b + dy * dy)
            });

    let norm = (var_a * var_b).sqrt();
    if norm < 1e-10 {
        0.0
    } else {
        cross / norm
    }
}

/// Correlation between two watermark matrices; 0 if their sizes differ.
#[must_use]
pub fn correlation(a: &WatermarkMatrix, b: &WatermarkMatrix) -> f32 {
    if a.side() != b.side() {
        return 0.0;
    }
    ncc(a.as_slice(), b.as_slice())
}

impl<T: BlockTransform> WatermarkPipeline<T> {
    /// Recover the embedded matrix from decoded images.
    ///
    /// # Errors
    ///
    /// Returns normalization errors for either image, [`ShapeError::TargetMismatch`]
    /// if the padded sizes differ, and [`Error::ZeroStrength`] if the
    /// configured strength is zero.
    pub fn extract(&self, original: &GrayImage, watermarked: &GrayImage) -> Result<WatermarkMatrix> {
        let original = self.normalize(original)?;
        let watermarked = self.normalize(watermarked)?;
        self.extract_planes(&original, &watermarked)
    }

    /// Recover the embedded matrix from normalized planes.
    ///
    /// # Errors
    ///
    /// As [`extract`](Self::extract).
    pub fn extract_planes(&self, original: &Plane, watermarked: &Plane) -> Result<WatermarkMatrix> {
        let strength = self.config().strength;
        if strength.abs() < f32::EPSILON {
            return Err(Error::ZeroStrength);
        }
        if original.side() != watermarked.side() {
            return Err(ShapeError::TargetMismatch {
                expected: original.side(),
                actual: watermarked.side(),
            }
            .into());
        }

        let reference = self.forward_blocks(original)?;
        let marked = self.forward_blocks(watermarked)?;
        let grid_width = original.side() / self.config().block_size;

        let mut values = vec![0.0; grid_width * grid_width];
        for (i, (before, after)) in reference.iter().zip(&marked).enumerate() {
            let location = select(before);
            let position = grid_position(i, grid_width);
            values[position.row * grid_width + position.col] =
                (after.get(location) - before.get(location)) / strength;
        }

        WatermarkMatrix::from_vec(grid_width, values)
    }

    /// Recover the matrix and score it against `expected`.
    ///
    /// # Errors
    ///
    /// As [`extract`](Self::extract).
    pub fn verify(
        &self,
        original: &GrayImage,
        watermarked: &GrayImage,
        expected: &WatermarkMatrix,
    ) -> Result<Verification> {
        let recovered = self.extract(original, watermarked)?;
        let correlation = correlation(&recovered, expected);
        tracing::debug!(correlation, "watermark verification");
        Ok(Verification {
            detected: correlation >= DETECTION_THRESHOLD,
            recovered,
            correlation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use crate::pipeline::PipelineConfig;
    use crate::watermark::seeded_rng;

    fn textured(side: u32) -> GrayImage {
        GrayImage::from_fn(side, side, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = 70 + ((x * 5 + y * 3 + (x ^ y) % 17) % 110) as u8;
            image::Luma([v])
        })
    }

    #[test]
    fn correlation_ignores_gain_and_offset() {
        let expected = WatermarkMatrix::generate(4, &mut seeded_rng(Some(3)));
        let values = expected.as_slice().iter().map(|v| 2.5 * v + 0.3).collect();
        let rescaled = WatermarkMatrix::from_vec(4, values).unwrap();
        let score = correlation(&rescaled, &expected);
        assert!((score - 1.0).abs() < 1e-5, "rescaled copy scored {score}");
    }

    #[test]
    fn negated_watermark_anticorrelates() {
        let expected = WatermarkMatrix::generate(4, &mut seeded_rng(Some(8)));
        let values = expected.as_slice().iter().map(|v| -v).collect();
        let negated = WatermarkMatrix::from_vec(4, values).unwrap();
        let score = correlation(&negated, &expected);
        assert!((score + 1.0).abs() < 1e-5, "negated copy scored {score}");
    }

    #[test]
    fn flat_or_empty_inputs_score_zero() {
        let flat = WatermarkMatrix::from_vec(2, vec![0.4; 4]).unwrap();
        let other = WatermarkMatrix::from_vec(2, vec![0.1, 0.9, 0.2, 0.7]).unwrap();
        assert!(correlation(&flat, &other).abs() < f32::EPSILON);
        assert!(ncc(&[], &[]).abs() < f32::EPSILON);
    }

    #[test]
    fn correlation_of_mismatched_sizes_is_zero() {
        let a = WatermarkMatrix::from_vec(1, vec![0.5]).unwrap();
        let b = WatermarkMatrix::from_vec(2, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        assert!(correlation(&a, &b).abs() < f32::EPSILON);
    }

    #[test]
    fn extract_planes_recovers_float_output_exactly() {
        let pipeline = WatermarkPipeline::new(PipelineConfig::default()).unwrap();
        let original = pipeline.normalize(&textured(64)).unwrap();
        let matrix = WatermarkMatrix::generate(8, &mut seeded_rng(Some(5)));
        let out = pipeline
            .embed_plane(&original, matrix.clone(), &mut NoopObserver)
            .unwrap();

        let recovered = pipeline.extract_planes(&original, &out.watermarked).unwrap();
        for (a, b) in recovered.as_slice().iter().zip(matrix.as_slice()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn verify_detects_mark_in_quantized_output() {
        let pipeline = WatermarkPipeline::new(PipelineConfig::default()).unwrap();
        let original = textured(64);
        let out = pipeline
            .run(&original, &mut seeded_rng(Some(11)), &mut NoopObserver)
            .unwrap();

        let verification = pipeline
            .verify(&original, &out.watermarked_image(), &out.watermark)
            .unwrap();
        assert!(verification.detected);
        assert!(
            verification.correlation > 0.95,
            "correlation {}",
            verification.correlation
        );

        let other = WatermarkMatrix::generate(8, &mut seeded_rng(Some(12)));
        let unrelated = pipeline
            .verify(&original, &out.watermarked_image(), &other)
            .unwrap();
        assert!(unrelated.correlation < verification.correlation);
    }

    #[test]
    fn zero_strength_cannot_be_inverted() {
        let pipeline = WatermarkPipeline::new(PipelineConfig {
            strength: 0.0,
            ..PipelineConfig::default()
        })
        .unwrap();
        let img = textured(16);
        assert!(matches!(
            pipeline.extract(&img, &img),
            Err(Error::ZeroStrength)
        ));
    }
}
