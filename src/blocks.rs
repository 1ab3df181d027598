//! Block partitioning and reassembly.
//!
//! A plane of side `S` is cut into a `G x G` grid of non-overlapping square blocks of
//! side `n`, where `G = S / n`. Blocks are produced in row-major order: the outer loop
//! walks block rows, the inner loop walks block columns. Every stage that needs the
//! grid position of the `i`-th block (partition, embedding, reassembly) goes through
//! [`grid_position`], so the three stages cannot disagree on the layout.

use crate::error::{Result, ShapeError};
use crate::plane::Plane;

/// Position of a block inside the block grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPosition {
    /// Block row (`0..grid_width`).
    pub row: usize,
    /// Block column (`0..grid_width`).
    pub col: usize,
}

impl GridPosition {
    /// Top-left sample offset `(row, col)` of this block for the given block size.
    #[must_use]
    pub fn origin(self, block_size: usize) -> (usize, usize) {
        (self.row * block_size, self.col * block_size)
    }
}

/// Map a flat block index to its grid position: `(i / G, i % G)`.
///
/// # Panics
///
/// Panics if `grid_width` is zero.
#[must_use]
pub fn grid_position(index: usize, grid_width: usize) -> GridPosition {
    assert!(grid_width > 0, "grid width must be positive");
    GridPosition {
        row: index / grid_width,
        col: index % grid_width,
    }
}

/// A square block of spatial-domain samples, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    side: usize,
    samples: Vec<f32>,
}

impl Block {
    /// Wrap a row-major buffer of `side * side` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::BufferLength`] if the buffer has the wrong length.
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

    /// Row-major view of all samples.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the block, returning its sample buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.samples
    }
}

/// Split a plane into blocks of side `block_size`, in row-major grid order.
///
/// # Errors
///
/// Returns [`ShapeError::BlockTooSmall`] if `block_size < 2` and
/// [`ShapeError::NotDivisible`] if the plane side is not a multiple of
/// `block_size`. Remainder regions are never dropped silently.
pub fn partition(plane: &Plane, block_size: usize) -> Result<Vec<Block>> {
    if block_size < 2 {
        return Err(ShapeError::BlockTooSmall(block_size).into());
    }
    let side = plane.side();
    if side == 0 || side % block_size != 0 {
        return Err(ShapeError::NotDivisible { side, block_size }.into());
    }

    let grid_width = side / block_size;
    let blocks = (0..grid_width * grid_width)
        .map(|i| {
            let (top, left) = grid_position(i, grid_width).origin(block_size);
            let mut samples = Vec::with_capacity(block_size * block_size);
            for row in top..top + block_size {
                let start = row * side + left;
                samples.extend_from_slice(&plane.as_slice()[start..start + block_size]);
            }
            Block {
                side: block_size,
                samples,
            }
        })
        .collect();

    Ok(blocks)
}

/// Copy blocks back into a zero-initialized plane of side `grid_width * block_side`.
///
/// Block `i` lands at [`grid_position`]`(i, grid_width)`.
///
/// # Errors
///
/// Returns [`ShapeError::BlockCount`] unless exactly `grid_width^2` blocks are given,
/// and [`ShapeError::BlockSide`] if the blocks differ in size.
pub fn reassemble(blocks: &[Block], grid_width: usize) -> Result<Plane> {
    let expected = grid_width * grid_width;
    if grid_width == 0 || blocks.len() != expected {
        return Err(ShapeError::BlockCount {
            expected,
            actual: blocks.len(),
        }
        .into());
    }

    let block_side = blocks[0].side();
    let mut plane = Plane::new(grid_width * block_side);
    for (i, block) in blocks.iter().enumerate() {
        if block.side() != block_side {
            return Err(ShapeError::BlockSide {
                index: i,
                expected: block_side,
                actual: block.side(),
            }
            .into());
        }
        let (top, left) = grid_position(i, grid_width).origin(block_side);
        for row in 0..block_side {
            for col in 0..block_side {
                plane.set(top + row, left + col, block.get(row, col));
            }
        }
    }

    Ok(plane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[allow(clippy::cast_precision_loss)]
    fn ramp(side: usize) -> Plane {
        let samples = (0..side * side).map(|i| i as f32).collect();
        Plane::from_vec(side, samples).unwrap()
    }

    #[test]
    fn grid_position_is_row_major() {
        assert_eq!(grid_position(0, 4), GridPosition { row: 0, col: 0 });
        assert_eq!(grid_position(3, 4), GridPosition { row: 0, col: 3 });
        assert_eq!(grid_position(4, 4), GridPosition { row: 1, col: 0 });
        assert_eq!(grid_position(15, 4), GridPosition { row: 3, col: 3 });
        assert_eq!(grid_position(5, 4).origin(8), (8, 8));
    }

    #[test]
    fn partition_orders_blocks_row_major() {
        let plane = ramp(4);
        let blocks = partition(&plane, 2).unwrap();
        assert_eq!(blocks.len(), 4);
        // Second block is the top-right one.
        assert_eq!(blocks[1].as_slice(), &[2.0, 3.0, 6.0, 7.0]);
        // Third block is the bottom-left one.
        assert_eq!(blocks[2].as_slice(), &[8.0, 9.0, 12.0, 13.0]);
    }

    #[test]
    fn partition_then_reassemble_is_identity() {
        for (side, block_size) in [(16, 4), (16, 8), (32, 16), (24, 8)] {
            let plane = ramp(side);
            let blocks = partition(&plane, block_size).unwrap();
            let rebuilt = reassemble(&blocks, side / block_size).unwrap();
            assert_eq!(rebuilt, plane, "side {side}, block {block_size}");
        }
    }

    #[test]
    fn partition_rejects_remainder() {
        let plane = ramp(10);
        let err = partition(&plane, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::Shape(ShapeError::NotDivisible {
                side: 10,
                block_size: 4
            })
        ));
    }

    #[test]
    fn partition_rejects_tiny_blocks() {
        let plane = ramp(4);
        assert!(matches!(
            partition(&plane, 1),
            Err(Error::Shape(ShapeError::BlockTooSmall(1)))
        ));
    }

    #[test]
    fn reassemble_checks_block_count_and_size() {
        let blocks = partition(&ramp(8), 4).unwrap();
        assert!(matches!(
            reassemble(&blocks[..3], 2),
            Err(Error::Shape(ShapeError::BlockCount {
                expected: 4,
                actual: 3
            }))
        ));

        let mut mixed = blocks;
        mixed[2] = Block::from_vec(2, vec![0.0; 4]).unwrap();
        assert!(matches!(
            reassemble(&mixed, 2),
            Err(Error::Shape(ShapeError::BlockSide { index: 2, .. }))
        ));
    }
}
