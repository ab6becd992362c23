// ============================================================
// Layer 5 — Masked Negative Log-Likelihood
// ============================================================
// Loss for one decoder step over a padded batch:
//
//   p_b     = probs[b, target[b]]
//   n_total = |{ b : mask[b] }|
//   loss    = Σ_{b : mask[b]} -ln p_b  /  n_total
//
// Padded rows contribute nothing. Their probability is replaced
// by 1 before the log so ln(1) = 0 and no NaN can leak into the
// gradient through an underflowed p.

use burn::prelude::*;

use crate::domain::error::ChatError;

/// Mean loss of one step and the number of rows it averaged over.
#[derive(Debug, Clone)]
pub struct MaskedNll<B: Backend> {
    /// scalar [1]
    pub loss:    Tensor<B, 1>,
    pub n_total: usize,
}

/// probs: [batch, vocab], target: [batch], mask: [batch].
/// `step` only labels the error for a fully padded step.
pub fn masked_nll<B: Backend>(
    probs:  Tensor<B, 2>,
    target: Tensor<B, 1, Int>,
    mask:   Tensor<B, 1, Bool>,
    step:   usize,
) -> Result<MaskedNll<B>, ChatError> {
    let n_total = mask.clone().int().sum().into_scalar().elem::<i64>() as usize;
    masked_nll_counted(probs, target, mask, n_total, step)
}

/// Same as [`masked_nll`] with the unmasked count already known on the
/// host, so no device read is needed. `n_total` must match `mask`.
pub fn masked_nll_counted<B: Backend>(
    probs:   Tensor<B, 2>,
    target:  Tensor<B, 1, Int>,
    mask:    Tensor<B, 1, Bool>,
    n_total: usize,
    step:    usize,
) -> Result<MaskedNll<B>, ChatError> {
    if n_total == 0 {
        return Err(ChatError::EmptyMaskStep { step });
    }
    let [batch] = target.dims();

    let picked = probs.gather(1, target.reshape([batch, 1])).reshape([batch]);
    let picked = picked.mask_fill(mask.bool_not(), 1.0);

    Ok(MaskedNll { loss: picked.log().neg().sum().div_scalar(n_total as f64), n_total })
}
