// ============================================================
// Layer 5 — Luong Attention Scorer
// ============================================================
// Scores one decoder state h against every encoder position e_s,
// then softmax-normalises over positions:
//
//   dot:      score(h, e_s) = h · e_s
//   general:  score(h, e_s) = h · (W e_s)
//   concat:   score(h, e_s) = v · tanh(W [h ; e_s])
//
//   weights[b, s] = softmax_s(score)      (each row sums to 1)
//
// The method is fixed when the module is built; an unknown name
// fails before any parameter is allocated.
//
// Reference: Luong et al. (2015) Effective Approaches to
//            Attention-based Neural Machine Translation

use std::{fmt, str::FromStr};

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionMethod {
    Dot,
    General,
    Concat,
}

impl FromStr for AttentionMethod {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dot"     => Ok(Self::Dot),
            "general" => Ok(Self::General),
            "concat"  => Ok(Self::Concat),
            other     => Err(ChatError::InvalidAttentionMethod(other.to_string())),
        }
    }
}

impl fmt::Display for AttentionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dot     => "dot",
            Self::General => "general",
            Self::Concat  => "concat",
        };
        f.write_str(name)
    }
}

#[derive(Config, Debug)]
pub struct AttentionConfig {
    /// "dot", "general" or "concat"
    pub method:   String,
    pub d_hidden: usize,
}

impl AttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Attention<B>, ChatError> {
        let method: AttentionMethod = self.method.parse()?;
        let h = self.d_hidden;

        let (general, concat, v) = match method {
            AttentionMethod::Dot => (None, None, None),
            AttentionMethod::General => (Some(LinearConfig::new(h, h).init(device)), None, None),
            AttentionMethod::Concat => (
                None,
                Some(LinearConfig::new(2 * h, h).init(device)),
                Some(LinearConfig::new(h, 1).with_bias(false).init(device)),
            ),
        };
        Ok(Attention { general, concat, v })
    }
}

/// Only the layers of the configured method are present:
/// dot → none, general → `general`, concat → `concat` + `v`.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    pub general: Option<Linear<B>>,
    pub concat:  Option<Linear<B>>,
    pub v:       Option<Linear<B>>,
}

impl<B: Backend> Attention<B> {
    pub fn method(&self) -> AttentionMethod {
        match (&self.general, &self.concat) {
            (Some(_), _) => AttentionMethod::General,
            (None, Some(_)) => AttentionMethod::Concat,
            (None, None) => AttentionMethod::Dot,
        }
    }

    /// Unnormalised scores.
    /// hidden: [batch, h], encoder_outputs: [seq, batch, h] → [seq, batch]
    pub fn score(&self, hidden: Tensor<B, 2>, encoder_outputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let [seq, batch, h] = encoder_outputs.dims();
        let hidden = hidden.unsqueeze_dim::<3>(0).expand([seq, batch, h]);

        let energies = match (&self.general, &self.concat, &self.v) {
            (Some(general), _, _) => (hidden * general.forward(encoder_outputs)).sum_dim(2),
            (None, Some(concat), Some(v)) => {
                let joined = Tensor::cat(vec![hidden, encoder_outputs], 2);
                v.forward(concat.forward(joined).tanh())
            }
            _ => (hidden * encoder_outputs).sum_dim(2),
        };
        energies.reshape([seq, batch])
    }

    /// Attention weights, softmax over encoder positions.
    /// hidden: [batch, h], encoder_outputs: [seq, batch, h] → [batch, seq]
    pub fn forward(&self, hidden: Tensor<B, 2>, encoder_outputs: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.score(hidden, encoder_outputs).swap_dims(0, 1), 1)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type B = NdArray;

    fn build(method: &str) -> Attention<B> {
        AttentionConfig::new(method.to_string(), 4).init(&Default::default()).unwrap()
    }

    #[test]
    fn test_unknown_method_fails_construction() {
        let result = AttentionConfig::new("additive".into(), 4).init::<B>(&Default::default());
        assert!(matches!(result, Err(ChatError::InvalidAttentionMethod(m)) if m == "additive"));
    }

    #[test]
    fn test_method_round_trip() {
        for name in ["dot", "general", "concat"] {
            assert_eq!(build(name).method().to_string(), name);
        }
    }

    #[test]
    fn test_weights_sum_to_one_per_batch_element() {
        let device = Default::default();
        for name in ["dot", "general", "concat"] {
            let attn = build(name);
            let hidden = Tensor::<B, 2>::random([3, 4], Distribution::Default, &device);
            let enc = Tensor::<B, 3>::random([5, 3, 4], Distribution::Default, &device);

            let weights = attn.forward(hidden, enc);
            assert_eq!(weights.dims(), [3, 5]);
            let sums: Vec<f32> = weights.sum_dim(1).into_data().to_vec().unwrap();
            for s in sums {
                assert!((s - 1.0).abs() < 1e-5, "{name}: row sums to {s}");
            }
        }
    }

    #[test]
    fn test_dot_score_is_inner_product() {
        let device = Default::default();
        let attn = build("dot");
        let hidden = Tensor::<B, 2>::from_data(TensorData::new(vec![1.0f32, 2.0, 0.0, 0.0], [1, 4]), &device);
        let enc = Tensor::<B, 3>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 9.0, 9.0, 0.0, 3.0, 0.0, 0.0], [2, 1, 4]),
            &device,
        );
        let scores: Vec<f32> = attn.score(hidden, enc).into_data().to_vec().unwrap();
        assert_eq!(scores, vec![3.0, 6.0]);
    }
}
