// ============================================================
// Layer 5 — Global Gradient-Norm Clipping
// ============================================================
// Treats every gradient of one module as a single vector:
//
//   ‖g‖ = sqrt( Σ_params Σ_i g_i² )
//   if ‖g‖ > max_norm:  g ← g · max_norm / (‖g‖ + 1e-6)
//
// Burn's optimiser-level clipping works per parameter tensor,
// so the global norm is computed here by walking the module's
// parameters and looking up their gradients by ParamId.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

const EPSILON: f64 = 1e-6;

struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.total += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Rescale<'a> {
    grads: &'a mut GradientsParams,
    scale: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.scale));
        }
    }
}

/// L2 norm of all of `module`'s gradients taken together.
pub fn global_grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, total: 0.0 };
    module.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Rescales `grads` in place so their global norm is at most
/// `max_norm`. Returns the norm measured before clipping.
pub fn clip_grad_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(module, grads);
    if norm > max_norm {
        let mut visitor = Rescale { grads, scale: max_norm / (norm + EPSILON) };
        module.visit(&mut visitor);
    }
    norm
}
