//! Additive coefficient perturbation.
//!
//! The embedding rule is `c' = c + strength * w`, applied to the one selected
//! coefficient of each block. No clamping is performed; reconstructed samples may
//! leave `[0, 1]` and are saturated only when the final image is written.
//!
//! Two back-ends apply the rule:
//! - [`EmbedBackend::PerBlock`] perturbs each block independently.
//! - [`EmbedBackend::Batched`] gathers the selected coefficient of every block into
//!   one vector, runs a single `y += alpha * x` over the whole batch and scatters
//!   the results back.
//!
//! Both use the same locations, so their outputs differ only through `strength`.

use crate::error::{Error, Result};
use crate::transform::{CoefficientLocation, TransformedBlock};

/// Default strength of the primary embedding path.
pub const DEFAULT_STRENGTH: f32 = 0.5;

/// Default strength of the batched comparison path.
pub const DEFAULT_COMPARISON_STRENGTH: f32 = 1.2;

/// Which numeric back-end applies the perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedBackend {
    /// One scalar update per block.
    #[default]
    PerBlock,
    /// One vectorized update over all selected coefficients.
    Batched,
}

impl EmbedBackend {
    /// Perturb the coefficient at `locations[i]` of `blocks[i]` by
    /// `strength * values[i]`, returning new blocks in the same order.
    ///
    /// # Panics
    ///
    /// Panics if the three slices differ in length.
    #[must_use]
    pub fn apply(
        self,
        blocks: &[TransformedBlock],
        locations: &[CoefficientLocation],
        values: &[f32],
        strength: f32,
    ) -> Vec<TransformedBlock> {
        assert_eq!(blocks.len(), locations.len(), "one location per block");
        assert_eq!(blocks.len(), values.len(), "one watermark value per block");
        match self {
            Self::PerBlock => blocks
                .iter()
                .zip(locations)
                .zip(values)
                .map(|((block, &location), &value)| embed(block, location, value, strength))
                .collect(),
            Self::Batched => embed_batched(blocks, locations, values, strength),
        }
    }
}

/// Return a copy of `block` with `strength * value` added at `location`.
#[must_use]
pub fn embed(
    block: &TransformedBlock,
    location: CoefficientLocation,
    value: f32,
    strength: f32,
) -> TransformedBlock {
    block.with_value(location, block.get(location) + strength * value)
}

fn embed_batched(
    blocks: &[TransformedBlock],
    locations: &[CoefficientLocation],
    values: &[f32],
    strength: f32,
) -> Vec<TransformedBlock> {
    let mut gathered: Vec<f32> = blocks
        .iter()
        .zip(locations)
        .map(|(block, &location)| block.get(location))
        .collect();

    axpy(strength, values, &mut gathered);

    blocks
        .iter()
        .zip(locations)
        .zip(gathered)
        .map(|((block, &location), coefficient)| block.with_value(location, coefficient))
        .collect()
}

/// `y[i] += alpha * x[i]` over the common prefix of `x` and `y`.
pub fn axpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// Reject NaN and infinite strengths.
///
/// # Errors
///
/// Returns [`Error::InvalidStrength`] for non-finite values.
pub fn validate_strength(strength: f32) -> Result<f32> {
    if strength.is_finite() {
        Ok(strength)
    } else {
        Err(Error::InvalidStrength(strength))
    }
}
