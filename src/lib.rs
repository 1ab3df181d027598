//! Embed pseudo-random watermarks into grayscale images in the block-DCT domain.
//!
//! The image is split into square blocks (8x8 by default) and each block is moved
//! to the frequency domain with an orthonormal 2D DCT. In every block the
//! largest-magnitude coefficient other than the DC term is nudged by
//! `strength * w`, where `w` is the block's entry in a matrix of uniform random
//! values. The inverse DCT and block reassembly then give the watermarked image.
//!
//! # Quick Start
//!
//! ```no_run
//! use dct_watermark::{seeded_rng, NoopObserver, PipelineConfig, WatermarkPipeline};
//!
//! let pipeline = WatermarkPipeline::new(PipelineConfig::default()).expect("valid config");
//! let img = image::open("lena.png").unwrap().to_luma8();
//! let out = pipeline
//!     .run(&img, &mut seeded_rng(Some(42)), &mut NoopObserver)
//!     .unwrap();
//! out.watermarked_image().save("lena_watermarked.png").unwrap();
//! ```
//!
//! # Verification
//!
//! With the original image and the embedded matrix, the per-block values can be
//! read back and correlated against the expected watermark.
//!
//! ```no_run
//! use dct_watermark::{seeded_rng, NoopObserver, PipelineConfig, WatermarkPipeline};
//!
//! let pipeline = WatermarkPipeline::new(PipelineConfig::default()).expect("valid config");
//! let img = image::open("lena.png").unwrap().to_luma8();
//! let out = pipeline.run(&img, &mut seeded_rng(None), &mut NoopObserver).unwrap();
//! let check = pipeline.verify(&img, &out.watermarked_image(), &out.watermark).unwrap();
//! println!("Detected: {}, correlation: {:.3}", check.detected, check.correlation);
//! ```

#![deny(missing_docs)]

pub mod blocks;
mod cancel;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod observer;
mod pipeline;
pub mod plane;
pub mod selection;
pub mod transform;
pub mod watermark;

pub use blocks::{grid_position, partition, reassemble, Block, GridPosition};
pub use cancel::CancellationToken;
pub use embedding::{embed, EmbedBackend, DEFAULT_COMPARISON_STRENGTH, DEFAULT_STRENGTH};
pub use error::{Error, Result, ShapeError};
pub use extract::{correlation, Verification, DETECTION_THRESHOLD};
pub use observer::{NoopObserver, Stage, StageObserver, StageTimings};
pub use pipeline::{
    default_output_path, is_supported_image, load_luma, save_image, OutputPaths,
    PipelineConfig, PipelineOutput, WatermarkPipeline, DEFAULT_BLOCK_SIZE,
};
pub use plane::Plane;
pub use selection::{select, FALLBACK_LOCATION};
pub use transform::{BlockTransform, CoefficientLocation, Dct2d, TransformedBlock};
pub use watermark::{seeded_rng, WatermarkMatrix, WatermarkSource};
