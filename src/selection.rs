//! Embedding-target selection.
//!
//! The DC term of a block is the largest coefficient for any block with positive
//! mean intensity, so it is excluded; the target is the largest-magnitude
//! coefficient among the rest. Ties go to the first coefficient in row-major scan
//! order. A block whose non-DC coefficients are all zero has no meaningful maximum
//! and falls back to [`FALLBACK_LOCATION`].

use crate::transform::{CoefficientLocation, TransformedBlock};

/// Target used when every non-DC coefficient of a block is zero: the lowest
/// horizontal frequency.
pub const FALLBACK_LOCATION: CoefficientLocation = CoefficientLocation::new(0, 1);

/// Outcome of selecting the embedding target of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Chosen coefficient, never the DC term.
    pub location: CoefficientLocation,
    /// `true` when the block was degenerate and [`FALLBACK_LOCATION`] was used.
    pub fallback: bool,
}

/// Pick the embedding target of `block`. See the module docs for the rule.
#[must_use]
pub fn select(block: &TransformedBlock) -> CoefficientLocation {
    select_with_outcome(block).location
}

/// Like [`select`], also reporting whether the degenerate-block fallback applied.
#[must_use]
pub fn select_with_outcome(block: &TransformedBlock) -> Selection {
    let side = block.side();
    let mut best: Option<(usize, f32)> = None;

    // Index 0 is the DC term. Strict `>` keeps the first of equal maxima and
    // never lets a zero (or NaN) coefficient win.
    for (index, coefficient) in block.coefficients().iter().enumerate().skip(1) {
        let magnitude = coefficient.abs();
        if magnitude > best.map_or(0.0, |(_, m)| m) {
            best = Some((index, magnitude));
        }
    }

    match best {
        Some((index, _)) => Selection {
            location: CoefficientLocation::from_index(index, side),
            fallback: false,
        },
        None => Selection {
            location: FALLBACK_LOCATION,
            fallback: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::Block;
    use crate::transform::{BlockTransform, Dct2d};

    /// Transform of a zero block with the given coefficients set.
    fn coefficients(side: usize, values: &[(usize, usize, f32)]) -> TransformedBlock {
        let dct = Dct2d::new(side);
        let mut block = dct.forward(&Block::from_vec(side, vec![0.0; side * side]).unwrap());
        for &(row, col, value) in values {
            block = block.with_value(CoefficientLocation::new(row, col), value);
        }
        block
    }

    #[test]
    fn picks_largest_non_dc_magnitude() {
        let block = coefficients(4, &[(0, 0, 10.0), (1, 2, 0.4), (3, 1, -0.9), (2, 2, 0.8)]);
        let selection = select_with_outcome(&block);
        assert_eq!(selection.location, CoefficientLocation::new(3, 1));
        assert!(!selection.fallback);
    }

    #[test]
    fn never_selects_dc_even_when_an_ac_term_dominates() {
        let block = coefficients(4, &[(0, 0, 1.0), (2, 3, -5.0), (1, 1, 2.0)]);
        let location = select(&block);
        assert_ne!(location, CoefficientLocation::DC);
        assert_eq!(location, CoefficientLocation::new(2, 3));
    }

    #[test]
    fn ties_resolve_to_first_in_row_major_order() {
        let block = coefficients(4, &[(0, 0, 3.0), (2, 0, 0.5), (1, 3, -0.5), (3, 3, 0.5)]);
        assert_eq!(select(&block), CoefficientLocation::new(1, 3));
    }

    #[test]
    fn degenerate_block_uses_fallback() {
        let block = coefficients(8, &[(0, 0, 4.0)]);
        let selection = select_with_outcome(&block);
        assert_eq!(selection.location, FALLBACK_LOCATION);
        assert!(selection.fallback);

        let zero = coefficients(8, &[]);
        assert_eq!(select(&zero), CoefficientLocation::new(0, 1));
    }

    #[test]
    fn natural_blocks_never_select_dc() {
        let dct = Dct2d::new(8);
        for seed in 0..32u32 {
            #[allow(clippy::cast_precision_loss)]
            let samples = (0..64u32)
                .map(|i| ((i * 37 + seed * 11) % 23) as f32 / 23.0)
                .collect();
            let block = dct.forward(&Block::from_vec(8, samples).unwrap());
            assert_ne!(select(&block), CoefficientLocation::DC, "seed {seed}");
        }
    }
}
