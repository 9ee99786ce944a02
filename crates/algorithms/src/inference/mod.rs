//! Per-tile inference with flip test-time augmentation
//!
//! The change model is an injected dependency: anything implementing
//! [`ChangeModel`] can be driven by the pipeline. [`run_tile`] optionally
//! runs it four times (identity, vertical flip, horizontal flip, both),
//! flips each output back and averages the probabilities.

mod difference;

pub use difference::{DifferenceModelParams, SpectralDifferenceModel};

use geochange_core::{Error, Result};
use ndarray::{Array2, ArrayView3, Axis};

/// What a model's raw output represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelOutput {
    /// Values already in `[0, 1]`
    #[default]
    Probability,
    /// Unbounded scores, squashed with a sigmoid
    Logits,
}

/// Opaque two-date change model.
///
/// `infer` receives two `(rows, cols, bands)` views of identical shape and
/// returns one `(rows, cols)` map. Views may have non-standard strides
/// (flipped axes), so implementations should index rather than assume
/// contiguous memory.
pub trait ChangeModel: Send + Sync {
    /// Human-readable model name for logs
    fn name(&self) -> &str;

    /// Interpretation of the values returned by [`ChangeModel::infer`]
    fn output(&self) -> ModelOutput {
        ModelOutput::Probability
    }

    fn infer(&self, before: ArrayView3<'_, f32>, after: ArrayView3<'_, f32>)
        -> Result<Array2<f32>>;
}

/// Logistic function
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// (vertical flip, horizontal flip) for each augmentation pass
const TTA_PASSES: [(bool, bool); 4] = [(false, false), (true, false), (false, true), (true, true)];

fn flipped(mut view: ArrayView3<'_, f32>, vertical: bool, horizontal: bool) -> ArrayView3<'_, f32> {
    if vertical {
        view.invert_axis(Axis(0));
    }
    if horizontal {
        view.invert_axis(Axis(1));
    }
    view
}

/// Run `model` on one tile pair and return a probability map in `[0, 1]`.
///
/// With `use_tta` the model is called four times and the flipped-back
/// probabilities are averaged; otherwise once. Model errors propagate
/// unchanged.
pub fn run_tile<M: ChangeModel + ?Sized>(
    model: &M,
    before: ArrayView3<'_, f32>,
    after: ArrayView3<'_, f32>,
    use_tta: bool,
) -> Result<Array2<f32>> {
    let (rows, cols, _) = before.dim();
    if after.dim() != before.dim() {
        return Err(Error::DimensionMismatch {
            er: rows,
            ec: cols,
            ar: after.dim().0,
            ac: after.dim().1,
        });
    }

    let passes: &[(bool, bool)] = if use_tta { &TTA_PASSES } else { &TTA_PASSES[..1] };
    let mut sum = Array2::<f32>::zeros((rows, cols));

    for &(vertical, horizontal) in passes {
        let raw = model.infer(
            flipped(before.view(), vertical, horizontal),
            flipped(after.view(), vertical, horizontal),
        )?;
        if raw.dim() != (rows, cols) {
            return Err(Error::DimensionMismatch {
                er: rows,
                ec: cols,
                ar: raw.nrows(),
                ac: raw.ncols(),
            });
        }

        let mut prob = match model.output() {
            ModelOutput::Logits => raw.mapv(sigmoid),
            ModelOutput::Probability => raw.mapv(|v| v.clamp(0.0, 1.0)),
        };
        if vertical {
            prob.invert_axis(Axis(0));
        }
        if horizontal {
            prob.invert_axis(Axis(1));
        }
        sum += &prob;
    }

    sum /= passes.len() as f32;
    Ok(sum)
}
