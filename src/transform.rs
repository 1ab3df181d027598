//! Forward and inverse 2D frequency transforms over single blocks.
//!
//! [`BlockTransform`] is the seam the pipeline consumes; [`Dct2d`] is the
//! orthonormal DCT-II/DCT-III pair computed separably (rows, then columns) with
//! `rustdct`. With orthonormal scaling the DC coefficient of a block is
//! `n * mean(block)` and `inverse(forward(b)) == b` up to rounding.

use std::sync::Arc;

use rustdct::{DctPlanner, TransformType2And3};

use crate::blocks::Block;

/// A `(row, col)` index into a [`TransformedBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoefficientLocation {
    /// Vertical frequency index.
    pub row: usize,
    /// Horizontal frequency index.
    pub col: usize,
}

impl CoefficientLocation {
    /// The zero-frequency (DC) term.
    pub const DC: Self = Self { row: 0, col: 0 };

    /// Create a location.
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Location of the `index`-th coefficient in row-major order.
    #[must_use]
    pub fn from_index(index: usize, side: usize) -> Self {
        Self {
            row: index / side,
            col: index % side,
        }
    }

    /// Row-major flat index for a block of the given side.
    #[must_use]
    pub fn index(self, side: usize) -> usize {
        self.row * side + self.col
    }
}

/// Frequency-domain representation of a [`Block`], same dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedBlock {
    side: usize,
    coefficients: Vec<f32>,
}

impl TransformedBlock {
    /// Side length in coefficients.
    #[must_use]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Coefficient at `location`.
    #[must_use]
    pub fn get(&self, location: CoefficientLocation) -> f32 {
        self.coefficients[location.index(self.side)]
    }

    /// Copy of this block with the coefficient at `location` replaced.
    #[must_use]
    pub fn with_value(&self, location: CoefficientLocation, value: f32) -> Self {
        let mut out = self.clone();
        out.coefficients[location.index(self.side)] = value;
        out
    }

    /// Row-major view of all coefficients.
    #[must_use]
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Reinterpret the coefficients as a spatial block, used to lay transformed
    /// blocks out as an image for visualization.
    #[must_use]
    pub fn to_block(&self) -> Block {
        Block::from_vec(self.side, self.coefficients.clone())
            .unwrap_or_else(|_| unreachable!("coefficient buffer is side * side"))
    }
}

/// A linear, invertible, dimension-preserving transform over square blocks.
pub trait BlockTransform: Send + Sync {
    /// Side of the blocks this transform accepts.
    fn block_size(&self) -> usize;

    /// Spatial block to frequency coefficients.
    fn forward(&self, block: &Block) -> TransformedBlock;

    /// Frequency coefficients back to a spatial block.
    fn inverse(&self, coefficients: &TransformedBlock) -> Block;
}

/// Orthonormal 2D DCT backed by a planned `rustdct` kernel.
pub struct Dct2d {
    size: usize,
    kernel: Arc<dyn TransformType2And3<f32>>,
    /// Per-frequency output scale of the forward pass.
    forward_scale: Vec<f32>,
    /// Per-frequency input scale of the inverse pass.
    inverse_scale: Vec<f32>,
}

impl Dct2d {
    /// Plan a transform for `size x size` blocks.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "DCT block size must be positive");
        let kernel = DctPlanner::new().plan_dct2(size);

        #[allow(clippy::cast_precision_loss)]
        let n = size as f32;
        let dc = (1.0 / n).sqrt();
        let ac = (2.0 / n).sqrt();

        let forward_scale = (0..size).map(|k| if k == 0 { dc } else { ac }).collect();
        // DCT-III halves its first input, so the DC weight is doubled.
        let inverse_scale = (0..size)
            .map(|k| if k == 0 { 2.0 * dc } else { ac })
            .collect();

        Self {
            size,
            kernel,
            forward_scale,
            inverse_scale,
        }
    }

    fn forward_rows(&self, data: &mut [f32]) {
        for row in data.chunks_exact_mut(self.size) {
            self.kernel.process_dct2(row);
            for (v, s) in row.iter_mut().zip(&self.forward_scale) {
                *v *= s;
            }
        }
    }

    fn inverse_rows(&self, data: &mut [f32]) {
        for row in data.chunks_exact_mut(self.size) {
            for (v, s) in row.iter_mut().zip(&self.inverse_scale) {
                *v *= s;
            }
            self.kernel.process_dct3(row);
        }
    }
}

impl std::fmt::Debug for Dct2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dct2d").field("size", &self.size).finish()
    }
}

impl BlockTransform for Dct2d {
    fn block_size(&self) -> usize {
        self.size
    }

    fn forward(&self, block: &Block) -> TransformedBlock {
        assert_eq!(block.side(), self.size, "block side does not match DCT size");
        let mut data = block.as_slice().to_vec();
        self.forward_rows(&mut data);
        transpose(&mut data, self.size);
        self.forward_rows(&mut data);
        transpose(&mut data, self.size);
        TransformedBlock {
            side: self.size,
            coefficients: data,
        }
    }

    fn inverse(&self, coefficients: &TransformedBlock) -> Block {
        assert_eq!(
            coefficients.side(),
            self.size,
            "block side does not match DCT size"
        );
        let mut data = coefficients.coefficients().to_vec();
        self.inverse_rows(&mut data);
        transpose(&mut data, self.size);
        self.inverse_rows(&mut data);
        transpose(&mut data, self.size);
        Block::from_vec(self.size, data)
            .unwrap_or_else(|_| unreachable!("transform preserves block length"))
    }
}

/// In-place transpose of a square row-major matrix.
fn transpose(data: &mut [f32], side: usize) {
    for row in 0..side {
        for col in row + 1..side {
            data.swap(row * side + col, col * side + row);
        }
    }
}
