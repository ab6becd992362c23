// ============================================================
// Layer 5 — Gated Recurrent Units
// ============================================================
// A GRU cell advances one time step:
//
//   r  = σ(W_ir x + b_ir + W_hr h + b_hr)        reset gate
//   z  = σ(W_iz x + b_iz + W_hz h + b_hz)        update gate
//   n  = tanh(W_in x + b_in + r ⊙ (W_hn h + b_hn))
//   h' = (1 − z) ⊙ n + z ⊙ h
//
// The three input projections share one Linear (d_input → 3h),
// the three hidden projections another (h → 3h).
//
// Padding is handled by masking instead of packing: at a padded
// position the cell returns the previous state unchanged, so
//   - forward direction: the state after the last real token
//     survives to the end of the sequence
//   - backward direction: the state stays at zero through the
//     trailing padding and starts at the last real token
// which is what length-aware packing would compute.
//
// BiGru  — multi-layer bidirectional stack used by the encoder
// Gru    — multi-layer unidirectional stack stepped by the decoder
//
// Reference: Cho et al. (2014) GRU
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

// ─── GruCell ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct GruCellConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
}

impl GruCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GruCell<B> {
        GruCell {
            input_gates:  LinearConfig::new(self.d_input, 3 * self.d_hidden).init(device),
            hidden_gates: LinearConfig::new(self.d_hidden, 3 * self.d_hidden).init(device),
            d_hidden:     self.d_hidden,
        }
    }
}

#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    pub input_gates:  Linear<B>,
    pub hidden_gates: Linear<B>,
    pub d_hidden:     usize,
}

impl<B: Backend> GruCell<B> {
    /// input: [batch, d_input], hidden: [batch, d_hidden] → [batch, d_hidden]
    pub fn forward(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let gi = self.input_gates.forward(input);
        let gh = self.hidden_gates.forward(hidden.clone());

        let reset  = sigmoid(self.gate(&gi, 0) + self.gate(&gh, 0));
        let update = sigmoid(self.gate(&gi, 1) + self.gate(&gh, 1));
        let candidate = (self.gate(&gi, 2) + reset * self.gate(&gh, 2)).tanh();

        let keep = update.clone().neg().add_scalar(1.0);
        keep * candidate + update * hidden
    }

    /// One step where `step_mask` ([batch, 1], 1.0 = real token,
    /// 0.0 = padding) decides per row whether the state advances.
    pub fn forward_masked(
        &self,
        input:     Tensor<B, 2>,
        hidden:    Tensor<B, 2>,
        step_mask: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [batch, d_hidden] = hidden.dims();
        let mask = step_mask.expand([batch, d_hidden]);
        let advanced = self.forward(input, hidden.clone());

        advanced * mask.clone() + hidden * mask.neg().add_scalar(1.0)
    }

    /// k-th block of width d_hidden from a [batch, 3·d_hidden] projection.
    fn gate(&self, projected: &Tensor<B, 2>, k: usize) -> Tensor<B, 2> {
        let [batch, _] = projected.dims();
        let h = self.d_hidden;
        projected.clone().slice([0..batch, k * h..(k + 1) * h])
    }
}

// ─── BiGru ────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct BiGruConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
    #[config(default = 1)]
    pub n_layers: usize,
    /// Applied between layers only, so ignored for a single layer.
    #[config(default = 0.0)]
    pub dropout:  f64,
}

impl BiGruConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BiGru<B> {
        let layer_input = |layer: usize| if layer == 0 { self.d_input } else { 2 * self.d_hidden };
        let cells = |device: &B::Device| -> Vec<GruCell<B>> {
            (0..self.n_layers)
                .map(|l| GruCellConfig::new(layer_input(l), self.d_hidden).init(device))
                .collect()
        };
        let dropout = if self.n_layers == 1 { 0.0 } else { self.dropout };

        BiGru {
            forward_cells:  cells(device),
            backward_cells: cells(device),
            dropout:        DropoutConfig::new(dropout).init(),
            d_hidden:       self.d_hidden,
        }
    }
}

#[derive(Module, Debug)]
pub struct BiGru<B: Backend> {
    pub forward_cells:  Vec<GruCell<B>>,
    pub backward_cells: Vec<GruCell<B>>,
    pub dropout:        Dropout,
    pub d_hidden:       usize,
}

/// Per-direction outputs of the last layer plus every final state.
pub struct BiGruOutput<B: Backend> {
    /// [seq, batch, d_hidden], zero at padded positions
    pub forward:  Tensor<B, 3>,
    /// [seq, batch, d_hidden], zero at padded positions
    pub backward: Tensor<B, 3>,
    /// [2 · n_layers, batch, d_hidden] ordered
    /// (layer 0 fwd, layer 0 bwd, layer 1 fwd, ...)
    pub hidden:   Tensor<B, 3>,
}

impl<B: Backend> BiGru<B> {
    /// input: [seq, batch, d_input], mask: [seq, batch] (1.0 = real token)
    pub fn forward(&self, input: Tensor<B, 3>, mask: Tensor<B, 2>) -> BiGruOutput<B> {
        let n_layers = self.forward_cells.len();
        let mut finals = Vec::with_capacity(2 * n_layers);
        let mut layer_input = input;
        let mut last = None;

        for (layer, (fwd_cell, bwd_cell)) in self
            .forward_cells
            .iter()
            .zip(&self.backward_cells)
            .enumerate()
        {
            let (fwd_out, fwd_final) = self.run_direction(fwd_cell, &layer_input, &mask, false);
            let (bwd_out, bwd_final) = self.run_direction(bwd_cell, &layer_input, &mask, true);
            finals.push(fwd_final);
            finals.push(bwd_final);

            if layer + 1 < n_layers {
                layer_input = self
                    .dropout
                    .forward(Tensor::cat(vec![fwd_out, bwd_out], 2));
            } else {
                last = Some((fwd_out, bwd_out));
            }
        }

        let (forward, backward) = match last {
            Some(outputs) => outputs,
            None => {
                // zero-layer stack: nothing to run
                let [seq, batch, _] = layer_input.dims();
                let zeros = Tensor::zeros([seq, batch, self.d_hidden], &layer_input.device());
                (zeros.clone(), zeros)
            }
        };

        BiGruOutput { forward, backward, hidden: Tensor::stack(finals, 0) }
    }

    fn run_direction(
        &self,
        cell:    &GruCell<B>,
        input:   &Tensor<B, 3>,
        mask:    &Tensor<B, 2>,
        reverse: bool,
    ) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let [seq, batch, d_input] = input.dims();
        let device = input.device();
        let mut hidden = Tensor::<B, 2>::zeros([batch, self.d_hidden], &device);
        let mut outputs = Vec::with_capacity(seq);

        let steps: Box<dyn Iterator<Item = usize>> = if reverse {
            Box::new((0..seq).rev())
        } else {
            Box::new(0..seq)
        };

        for t in steps {
            let x_t = input.clone().slice([t..t + 1, 0..batch, 0..d_input]).reshape([batch, d_input]);
            let m_t = mask.clone().slice([t..t + 1, 0..batch]).reshape([batch, 1]);

            hidden = cell.forward_masked(x_t, hidden, m_t.clone());
            outputs.push(hidden.clone() * m_t.expand([batch, self.d_hidden]));
        }
        if reverse {
            outputs.reverse();
        }

        (Tensor::stack(outputs, 0), hidden)
    }
}

// ─── Gru ──────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct GruConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
    #[config(default = 1)]
    pub n_layers: usize,
    #[config(default = 0.0)]
    pub dropout:  f64,
}

impl GruConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Gru<B> {
        let cells = (0..self.n_layers)
            .map(|l| {
                let d_in = if l == 0 { self.d_input } else { self.d_hidden };
                GruCellConfig::new(d_in, self.d_hidden).init(device)
            })
            .collect();
        let dropout = if self.n_layers == 1 { 0.0 } else { self.dropout };

        Gru { cells, dropout: DropoutConfig::new(dropout).init() }
    }
}

#[derive(Module, Debug)]
pub struct Gru<B: Backend> {
    pub cells:   Vec<GruCell<B>>,
    pub dropout: Dropout,
}

impl<B: Backend> Gru<B> {
    pub fn n_layers(&self) -> usize {
        self.cells.len()
    }

    /// Advance every layer by one step.
    /// input: [batch, d_input], hidden: [n_layers, batch, d_hidden]
    /// → (top-layer output [batch, d_hidden], new hidden [n_layers, batch, d_hidden])
    pub fn step(&self, input: Tensor<B, 2>, hidden: Tensor<B, 3>) -> (Tensor<B, 2>, Tensor<B, 3>) {
        let [n_layers, batch, d_hidden] = hidden.dims();
        let mut x = input;
        let mut states = Vec::with_capacity(n_layers);

        for (layer, cell) in self.cells.iter().enumerate() {
            let h = hidden.clone().slice([layer..layer + 1, 0..batch, 0..d_hidden]).reshape([batch, d_hidden]);
            let h = cell.forward(x, h);
            states.push(h.clone());
            x = if layer + 1 < n_layers { self.dropout.forward(h) } else { h };
        }

        (x, Tensor::stack(states, 0))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type B = NdArray;

    fn close(a: Tensor<B, 2>, b: Tensor<B, 2>) -> bool {
        let diff: f32 = (a - b).abs().max().into_scalar().elem();
        diff < 1e-5
    }

    #[test]
    fn test_cell_shapes() {
        let device = Default::default();
        let cell = GruCellConfig::new(4, 3).init::<B>(&device);
        let x = Tensor::<B, 2>::random([2, 4], Distribution::Default, &device);
        let h = Tensor::<B, 2>::zeros([2, 3], &device);
        assert_eq!(cell.forward(x, h).dims(), [2, 3]);
    }

    #[test]
    fn test_masked_step_keeps_previous_state() {
        let device = Default::default();
        let cell = GruCellConfig::new(4, 3).init::<B>(&device);
        let x = Tensor::<B, 2>::random([2, 4], Distribution::Default, &device);
        let h = Tensor::<B, 2>::random([2, 3], Distribution::Default, &device);
        let mask = Tensor::<B, 2>::from_data(TensorData::new(vec![1.0f32, 0.0], [2, 1]), &device);

        let out = cell.forward_masked(x.clone(), h.clone(), mask);
        let full = cell.forward(x, h.clone());

        assert!(close(out.clone().slice([0..1, 0..3]), full.slice([0..1, 0..3])));
        assert!(close(out.slice([1..2, 0..3]), h.slice([1..2, 0..3])));
    }

    #[test]
    fn test_padding_does_not_change_states() {
        // The same sequence, alone and padded next to a longer one,
        // must end in the same hidden states.
        let device = Default::default();
        let gru = BiGruConfig::new(2, 3).with_n_layers(2).init::<B>(&device);

        let seq = Tensor::<B, 3>::random([2, 1, 2], Distribution::Default, &device);
        let alone = gru.forward(
            seq.clone(),
            Tensor::<B, 2>::ones([2, 1], &device),
        );

        let other = Tensor::<B, 3>::random([4, 1, 2], Distribution::Default, &device);
        let padded_seq = Tensor::cat(vec![seq, Tensor::<B, 3>::full([2, 1, 2], 7.0, &device)], 0);
        let batch = Tensor::cat(vec![other, padded_seq], 1);
        let mask = Tensor::<B, 2>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0], [4, 2]),
            &device,
        );
        let together = gru.forward(batch, mask);

        let h_alone    = alone.hidden.reshape([4, 3]);
        let h_together = together.hidden.slice([0..4, 1..2, 0..3]).reshape([4, 3]);
        assert!(close(h_alone, h_together));

        // padded outputs are zero
        let pad_out = together.forward.slice([2..4, 1..2, 0..3]).abs().sum();
        assert_eq!(pad_out.into_scalar().elem::<f32>(), 0.0);
    }

    #[test]
    fn test_stacked_step_shapes() {
        let device = Default::default();
        let gru = GruConfig::new(5, 3).with_n_layers(2).init::<B>(&device);
        let x = Tensor::<B, 2>::random([4, 5], Distribution::Default, &device);
        let h = Tensor::<B, 3>::zeros([2, 4, 3], &device);
        let (out, hidden) = gru.step(x, h);
        assert_eq!(out.dims(), [4, 3]);
        assert_eq!(hidden.dims(), [2, 4, 3]);
        assert!(close(out, hidden.slice([1..2, 0..4, 0..3]).reshape([4, 3])));
    }
}
