//! Block-DCT watermarking pipeline.
//!
//! One invocation walks the states of [`Stage`] in order:
//! load, normalize (scale to `[0, 1]` and zero-pad), partition, forward transform,
//! select and embed, inverse transform, reassemble, write. Every precondition
//! failure aborts the invocation before any artifact is written.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{GrayImage, ImageFormat};
use tempfile::NamedTempFile;

use crate::blocks::{grid_position, partition, reassemble, Block};
use crate::cancel::CancellationToken;
use crate::embedding::{
    embed, validate_strength, EmbedBackend, DEFAULT_COMPARISON_STRENGTH, DEFAULT_STRENGTH,
};
use crate::error::{Error, Result, ShapeError};
use crate::observer::{Stage, StageObserver};
use crate::plane::Plane;
use crate::selection::select_with_outcome;
use crate::transform::{BlockTransform, CoefficientLocation, Dct2d, TransformedBlock};
use crate::watermark::{WatermarkMatrix, WatermarkSource};

/// Default block side.
pub const DEFAULT_BLOCK_SIZE: usize = 8;

/// Options controlling a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Block side in samples (at least 2).
    pub block_size: usize,
    /// Strength of the primary, per-block embedding path.
    pub strength: f32,
    /// Strength of the batched comparison path.
    pub comparison_strength: f32,
    /// Required side of the padded image. `None` accepts any size.
    pub target_size: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            strength: DEFAULT_STRENGTH,
            comparison_strength: DEFAULT_COMPARISON_STRENGTH,
            target_size: None,
        }
    }
}

impl PipelineConfig {
    /// Check the configuration before any image is touched.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::BlockTooSmall`] for blocks under 2x2,
    /// [`Error::InvalidStrength`] for non-finite strengths and
    /// [`ShapeError::NotDivisible`] if `target_size` is not a block multiple.
    pub fn validate(&self) -> Result<()> {
        if self.block_size < 2 {
            return Err(ShapeError::BlockTooSmall(self.block_size).into());
        }
        validate_strength(self.strength)?;
        validate_strength(self.comparison_strength)?;
        if let Some(target) = self.target_size {
            if target == 0 || target % self.block_size != 0 {
                return Err(ShapeError::NotDivisible {
                    side: target,
                    block_size: self.block_size,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Everything one invocation produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The watermark matrix that was embedded.
    pub watermark: WatermarkMatrix,
    /// Forward-transform coefficients of every block, laid out as an image.
    pub spectrum: Plane,
    /// Reconstructed image from the primary embedding path.
    pub watermarked: Plane,
    /// Reconstructed image from the batched comparison path.
    pub comparison: Plane,
    /// Embedding target of each block, in block order.
    pub locations: Vec<CoefficientLocation>,
    /// Number of degenerate blocks that used the fallback location.
    pub fallback_blocks: usize,
}

impl PipelineOutput {
    /// The primary watermarked image as 8-bit luma.
    #[must_use]
    pub fn watermarked_image(&self) -> GrayImage {
        self.watermarked.to_luma()
    }

    /// The comparison-path image as 8-bit luma.
    #[must_use]
    pub fn comparison_image(&self) -> GrayImage {
        self.comparison.to_luma()
    }

    /// Coefficient magnitudes as 8-bit luma.
    #[must_use]
    pub fn spectrum_image(&self) -> GrayImage {
        self.spectrum.magnitude_to_luma()
    }
}

/// Where [`WatermarkPipeline::process_file`] writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Watermarked image.
    pub image: PathBuf,
    /// Watermark matrix rendered as grayscale.
    pub watermark: Option<PathBuf>,
    /// Block-assembled transform magnitudes.
    pub spectrum: Option<PathBuf>,
    /// Comparison-path image.
    pub comparison: Option<PathBuf>,
}

impl OutputPaths {
    /// Only the watermarked image.
    #[must_use]
    pub fn image_only(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            watermark: None,
            spectrum: None,
            comparison: None,
        }
    }

    /// The watermarked image plus `{stem}_watermark.png` and `{stem}_dct.png`
    /// next to it.
    #[must_use]
    pub fn beside(image: &Path) -> Self {
        Self {
            image: image.to_path_buf(),
            watermark: Some(sibling(image, "watermark", "png")),
            spectrum: Some(sibling(image, "dct", "png")),
            comparison: None,
        }
    }

    fn artifacts(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.image.as_path())
            .chain(self.watermark.as_deref())
            .chain(self.spectrum.as_deref())
            .chain(self.comparison.as_deref())
    }
}

/// The watermarking engine: a validated configuration plus a planned transform.
///
/// Create once and reuse; runs share no state beyond the cancellation token.
pub struct WatermarkPipeline<T = Dct2d> {
    config: PipelineConfig,
    transform: T,
    cancel: CancellationToken,
}

impl WatermarkPipeline<Dct2d> {
    /// Create a pipeline using the orthonormal DCT.
    ///
    /// # Errors
    ///
    /// Returns any error from [`PipelineConfig::validate`].
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let transform = Dct2d::new(config.block_size);
        Ok(Self {
            config,
            transform,
            cancel: CancellationToken::new(),
        })
    }
}

impl<T: BlockTransform> WatermarkPipeline<T> {
    /// Create a pipeline around a custom transform. The block size is taken from
    /// the transform.
    ///
    /// # Errors
    ///
    /// Returns any error from [`PipelineConfig::validate`].
    pub fn with_transform(mut config: PipelineConfig, transform: T) -> Result<Self> {
        config.block_size = transform.block_size();
        config.validate()?;
        Ok(Self {
            config,
            transform,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `token` to cancel runs of this pipeline from another thread.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token checked before each block.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Normalize and pad a decoded image, enforcing `target_size`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Plane::from_luma`] and [`ShapeError::TargetMismatch`].
    pub fn normalize(&self, image: &GrayImage) -> Result<Plane> {
        let plane = Plane::from_luma(image, self.config.block_size)?;
        if let Some(expected) = self.config.target_size {
            if plane.side() != expected {
                return Err(ShapeError::TargetMismatch {
                    expected,
                    actual: plane.side(),
                }
                .into());
            }
        }
        Ok(plane)
    }

    /// Watermark `image` with a fresh matrix drawn from `source`, one value per block.
    ///
    /// # Errors
    ///
    /// Returns shape errors for invalid input and [`Error::Cancelled`] if the
    /// cancellation token fires.
    pub fn run(
        &self,
        image: &GrayImage,
        source: &mut dyn WatermarkSource,
        observer: &mut dyn StageObserver,
    ) -> Result<PipelineOutput> {
        let plane = timed(observer, Stage::Normalized, || self.normalize(image))?;
        let matrix = WatermarkMatrix::generate(plane.side() / self.config.block_size, source);
        self.embed_plane(&plane, matrix, observer)
    }

    /// Watermark `image` with an explicit matrix.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus [`ShapeError::MatrixSize`] if the matrix side is
    /// not the block grid width.
    pub fn run_with_matrix(
        &self,
        image: &GrayImage,
        matrix: WatermarkMatrix,
        observer: &mut dyn StageObserver,
    ) -> Result<PipelineOutput> {
        let plane = timed(observer, Stage::Normalized, || self.normalize(image))?;
        self.embed_plane(&plane, matrix, observer)
    }

    /// Run every stage after normalization on an already normalized plane.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError`]s if the plane or matrix do not fit the block grid
    /// and [`Error::Cancelled`] if the cancellation token fires.
    pub fn embed_plane(
        &self,
        plane: &Plane,
        matrix: WatermarkMatrix,
        observer: &mut dyn StageObserver,
    ) -> Result<PipelineOutput> {
        let block_size = self.config.block_size;
        let blocks = timed(observer, Stage::Partitioned, || partition(plane, block_size))?;
        let grid_width = plane.side() / block_size;
        if matrix.side() != grid_width {
            return Err(ShapeError::MatrixSize {
                expected: grid_width,
                actual: matrix.side(),
            }
            .into());
        }
        tracing::debug!(
            side = plane.side(),
            block_size,
            grid_width,
            blocks = blocks.len(),
            "partitioned plane"
        );

        let transformed = timed(observer, Stage::Transformed, || {
            self.map_blocks(&blocks, |_, block| self.transform.forward(block))
        })?;

        let (primary, comparison, locations, fallback_blocks) =
            timed(observer, Stage::Embedded, || {
                let selections =
                    self.map_blocks(&transformed, |_, block| select_with_outcome(block))?;
                let fallback_blocks = selections.iter().filter(|s| s.fallback).count();
                let locations: Vec<_> = selections.iter().map(|s| s.location).collect();
                let values: Vec<f32> = (0..transformed.len())
                    .map(|i| matrix.value_at(grid_position(i, grid_width)))
                    .collect();

                let strength = self.config.strength;
                let primary = self.map_blocks(&transformed, |i, block| {
                    embed(block, locations[i], values[i], strength)
                })?;

                self.cancel.check()?;
                let comparison = EmbedBackend::Batched.apply(
                    &transformed,
                    &locations,
                    &values,
                    self.config.comparison_strength,
                );
                Ok((primary, comparison, locations, fallback_blocks))
            })?;
        if fallback_blocks > 0 {
            tracing::debug!(fallback_blocks, "degenerate blocks used the fallback location");
        }

        let (primary, comparison) = timed(observer, Stage::Inverted, || {
            let primary = self.map_blocks(&primary, |_, c| self.transform.inverse(c))?;
            let comparison = self.map_blocks(&comparison, |_, c| self.transform.inverse(c))?;
            Ok((primary, comparison))
        })?;

        let (spectrum, watermarked, comparison) = timed(observer, Stage::Reassembled, || {
            let spectrum: Vec<Block> = transformed.iter().map(TransformedBlock::to_block).collect();
            Ok((
                reassemble(&spectrum, grid_width)?,
                reassemble(&primary, grid_width)?,
                reassemble(&comparison, grid_width)?,
            ))
        })?;

        Ok(PipelineOutput {
            watermark: matrix,
            spectrum,
            watermarked,
            comparison,
            locations,
            fallback_blocks,
        })
    }

    /// Load `input`, watermark it with a matrix drawn from `source`, and write the
    /// requested artifacts. Nothing is written unless every stage succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if the file cannot be decoded,
    /// [`Error::UnsupportedFormat`] if an output extension cannot be encoded, and
    /// any pipeline or I/O error.
    pub fn process_file(
        &self,
        input: &Path,
        outputs: &OutputPaths,
        source: &mut dyn WatermarkSource,
        observer: &mut dyn StageObserver,
    ) -> Result<PipelineOutput> {
        for path in outputs.artifacts() {
            output_format(path)?;
        }

        let image = timed(observer, Stage::Loaded, || load_luma(input))?;
        let output = self.run(&image, source, observer)?;

        // Encode everything first; only rename into place once all encodes succeeded.
        timed(observer, Stage::Written, || {
            let mut staged = vec![StagedImage::encode(&output.watermarked_image(), &outputs.image)?];
            if let Some(path) = &outputs.watermark {
                staged.push(StagedImage::encode(&output.watermark.to_luma(), path)?);
            }
            if let Some(path) = &outputs.spectrum {
                staged.push(StagedImage::encode(&output.spectrum_image(), path)?);
            }
            if let Some(path) = &outputs.comparison {
                staged.push(StagedImage::encode(&output.comparison_image(), path)?);
            }
            staged.into_iter().try_for_each(StagedImage::commit)
        })?;

        tracing::info!(
            input = %input.display(),
            output = %outputs.image.display(),
            side = output.watermarked.side(),
            blocks = output.locations.len(),
            "watermark embedded"
        );
        Ok(output)
    }

    /// Partition and forward-transform a normalized plane.
    pub(crate) fn forward_blocks(&self, plane: &Plane) -> Result<Vec<TransformedBlock>> {
        let blocks = partition(plane, self.config.block_size)?;
        self.map_blocks(&blocks, |_, block| self.transform.forward(block))
    }

    /// Apply `f` to every item, in parallel with the `parallel` feature, keeping
    /// item order and checking for cancellation before each item.
    fn map_blocks<I, O, F>(&self, items: &[I], f: F) -> Result<Vec<O>>
    where
        I: Sync,
        O: Send,
        F: Fn(usize, &I) -> O + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            items
                .par_iter()
                .enumerate()
                .map(|(i, item)| {
                    self.cancel.check()?;
                    Ok(f(i, item))
                })
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.cancel.check()?;
                    Ok(f(i, item))
                })
                .collect()
        }
    }
}

fn timed<R>(
    observer: &mut dyn StageObserver,
    stage: Stage,
    f: impl FnOnce() -> Result<R>,
) -> Result<R> {
    let start = Instant::now();
    let out = f()?;
    observer.stage_finished(stage, start.elapsed());
    Ok(out)
}

/// Decode an image file as 8-bit luma.
///
/// # Errors
///
/// Returns [`Error::Input`] if the file is missing or cannot be decoded.
pub fn load_luma(path: &Path) -> Result<GrayImage> {
    image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|source| Error::Input {
            path: path.to_path_buf(),
            source,
        })
}

/// Check if a file has a supported input image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff"
        ),
        None => false,
    }
}

fn output_format(path: &Path) -> Result<ImageFormat> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
    match format {
        ImageFormat::Jpeg
        | ImageFormat::Png
        | ImageFormat::Bmp
        | ImageFormat::Tiff
        | ImageFormat::WebP => Ok(format),
        _ => Err(Error::UnsupportedFormat(format!("{format:?}"))),
    }
}

/// Save a luma image, creating parent directories as needed.
///
/// PNG, BMP, TIFF and WebP are lossless. JPEG is written at quality 100 but still
/// quantizes the embedded perturbation.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &GrayImage, path: &Path) -> Result<()> {
    StagedImage::encode(img, path)?.commit()
}

/// An encoded image held in a temporary file next to its destination.
///
/// Dropping it without [`commit`](Self::commit) removes the temporary file.
struct StagedImage {
    file: NamedTempFile,
    path: PathBuf,
}

impl StagedImage {
    fn encode(img: &GrayImage, path: &Path) -> Result<Self> {
        let format = output_format(path)?;

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = NamedTempFile::new_in(parent)?;
        if format == ImageFormat::Jpeg {
            tracing::warn!(path = %path.display(), "JPEG output is lossy; the watermark will be attenuated");
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, 100);
            encoder.encode_image(img)?;
        } else {
            img.write_to(&mut file, format)?;
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    fn commit(self) -> Result<()> {
        self.file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.png"` becomes `"photo_watermarked.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    sibling(input, "watermarked", &ext)
}

fn sibling(path: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_{suffix}.{ext}"))
}
