//! Change-vector baseline model
//!
//! Scores each pixel by the root-mean-square difference across bands
//! between the two dates. No training involved; useful as a default model
//! for the CLI and as a deterministic reference in tests.

use super::{ChangeModel, ModelOutput};
use crate::maybe_rayon::*;
use geochange_core::{Error, Result};
use ndarray::{Array2, ArrayView3};
use serde::{Deserialize, Serialize};

/// Parameters for [`SpectralDifferenceModel`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferenceModelParams {
    /// RMS band difference at which the change probability is 0.5
    pub threshold: f32,
    /// Logit slope around the threshold
    pub gain: f32,
}

impl Default for DifferenceModelParams {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            gain: 40.0,
        }
    }
}

/// Emits logits `gain * (rms_difference - threshold)`.
#[derive(Debug, Clone, Default)]
pub struct SpectralDifferenceModel {
    params: DifferenceModelParams,
}

impl SpectralDifferenceModel {
    pub fn new(params: DifferenceModelParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DifferenceModelParams {
        &self.params
    }
}

impl ChangeModel for SpectralDifferenceModel {
    fn name(&self) -> &str {
        "spectral-difference"
    }

    fn output(&self) -> ModelOutput {
        ModelOutput::Logits
    }

    fn infer(
        &self,
        before: ArrayView3<'_, f32>,
        after: ArrayView3<'_, f32>,
    ) -> Result<Array2<f32>> {
        let (rows, cols, bands) = before.dim();
        if after.dim() != (rows, cols, bands) {
            return Err(Error::DimensionMismatch {
                er: rows,
                ec: cols,
                ar: after.dim().0,
                ac: after.dim().1,
            });
        }
        if bands == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let DifferenceModelParams { threshold, gain } = self.params;
        let logits: Vec<f32> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut out = Vec::with_capacity(cols);
                for col in 0..cols {
                    let mut sq = 0.0f32;
                    for band in 0..bands {
                        let d = after[[row, col, band]] - before[[row, col, band]];
                        sq += d * d;
                    }
                    let rms = (sq / bands as f32).sqrt();
                    out.push(gain * (rms - threshold));
                }
                out
            })
            .collect();

        Array2::from_shape_vec((rows, cols), logits).map_err(|e| Error::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    #[test]
    fn logits_follow_rms_difference() {
        let before = Array3::<f32>::zeros((2, 2, 3));
        let mut after = Array3::<f32>::zeros((2, 2, 3));
        for band in 0..3 {
            after[[1, 0, band]] = 0.5;
        }

        let model = SpectralDifferenceModel::new(DifferenceModelParams {
            threshold: 0.1,
            gain: 10.0,
        });
        let out = model.infer(before.view(), after.view()).unwrap();

        assert_eq!(model.output(), ModelOutput::Logits);
        assert_relative_eq!(out[[0, 0]], -1.0, epsilon = 1e-6);
        assert_relative_eq!(out[[1, 0]], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_band_mismatch() {
        let before = Array3::<f32>::zeros((2, 2, 3));
        let after = Array3::<f32>::zeros((2, 2, 4));
        let model = SpectralDifferenceModel::default();
        assert!(model.infer(before.view(), after.view()).is_err());
    }
}
