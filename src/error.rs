//! Error types for the dct-watermark crate.

use std::path::PathBuf;

/// Geometry preconditions that an image, block set or watermark matrix failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// The input image is not square.
    #[error("image is not square ({width}x{height})")]
    NotSquare {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// The image side is not a multiple of the block size.
    #[error("image side {side} is not a multiple of block size {block_size}")]
    NotDivisible {
        /// Image side in samples.
        side: usize,
        /// Configured block side.
        block_size: usize,
    },

    /// Blocks must be at least 2x2 so a non-DC coefficient exists.
    #[error("block size {0} is too small (minimum 2)")]
    BlockTooSmall(usize),

    /// The padded image does not match the configured reassembly target.
    #[error("padded image side {actual} does not match target side {expected}")]
    TargetMismatch {
        /// Configured target side.
        expected: usize,
        /// Side of the padded input.
        actual: usize,
    },

    /// Reassembly received the wrong number of blocks for the grid.
    #[error("expected {expected} blocks for the grid, got {actual}")]
    BlockCount {
        /// `grid_width * grid_width`.
        expected: usize,
        /// Number of blocks supplied.
        actual: usize,
    },

    /// A block in a sequence has a different side than the first one.
    #[error("block {index} has side {actual}, expected {expected}")]
    BlockSide {
        /// Position of the offending block in the sequence.
        index: usize,
        /// Side of the first block.
        expected: usize,
        /// Side of the offending block.
        actual: usize,
    },

    /// The watermark matrix does not provide one value per block.
    #[error("watermark matrix is {actual}x{actual}, block grid is {expected}x{expected}")]
    MatrixSize {
        /// Block grid width.
        expected: usize,
        /// Watermark matrix side.
        actual: usize,
    },

    /// A raw sample buffer does not hold `side * side` values.
    #[error("buffer of {len} samples cannot form a {side}x{side} grid")]
    BufferLength {
        /// Requested side.
        side: usize,
        /// Buffer length.
        len: usize,
    },
}

/// Errors that can occur while watermarking an image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input image could not be opened or decoded.
    #[error("failed to read input image {}: {source}", .path.display())]
    Input {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: image::ImageError,
    },

    /// The decoded image has no pixels.
    #[error("input image is empty")]
    EmptyImage,

    /// An image, block or matrix violated a geometry precondition.
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// An embedding strength was NaN or infinite.
    #[error("embedding strength must be finite, got {0}")]
    InvalidStrength(f32),

    /// Extraction was asked to divide by a zero embedding strength.
    #[error("embedding strength is zero; the watermark cannot be recovered")]
    ZeroStrength,

    /// The invocation was cancelled through its cancellation token.
    #[error("watermarking cancelled")]
    Cancelled,

    /// An I/O error occurred while writing output artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred while encoding an output image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("gif".to_string());
        assert!(unsupported.to_string().contains("gif"));

        let not_square = Error::from(ShapeError::NotSquare {
            width: 10,
            height: 20,
        });
        assert!(not_square.to_string().contains("10x20"));

        let mismatch = Error::from(ShapeError::TargetMismatch {
            expected: 512,
            actual: 256,
        });
        let msg = mismatch.to_string();
        assert!(msg.contains("512"));
        assert!(msg.contains("256"));

        let zero = Error::ZeroStrength.to_string();
        assert!(zero.contains("zero"));
        assert!(!zero.contains("finite"));
    }

    #[test]
    fn input_error_names_the_path() {
        let err = Error::Input {
            path: PathBuf::from("/tmp/missing.png"),
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            )),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing.png"));
        assert!(msg.contains("no such file"));
    }
}
