// ============================================================
// Layer 5: Feed-Forward Feature Encoders
// ============================================================
// The projection used for every dense modality:
//
//   x → Linear(d_input, d_hidden) → ReLU → Linear(d_hidden, d_output) → Dropout
//
//   numeric column   FeedForward(1        → dim/2 → dim)
//   topic vector     FeedForward(topics   → dim/2 → dim)
//   pooled title     FeedForward(hidden   → 2·dim → dim)
//
// Categorical columns use plain Embedding tables instead.
//
// Reference: Burn Book §3 (Building Blocks)

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
    pub d_output: usize,
    #[config(default = 0.1)]
    pub dropout:  f64,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        let d_hidden = self.d_hidden.max(1);
        FeedForward {
            linear1: LinearConfig::new(self.d_input, d_hidden).init(device),
            linear2: LinearConfig::new(d_hidden, self.d_output).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub linear1: Linear<B>,
    pub linear2: Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    /// Applies to the last dimension: [..., d_input] → [..., d_output]
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let x = relu(self.linear1.forward(x));
        self.dropout.forward(self.linear2.forward(x))
    }

    pub fn d_input(&self) -> usize {
        self.linear1.weight.dims()[0]
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_projects_last_dimension() {
        let device = Default::default();
        let ff = FeedForwardConfig::new(4, 8, 16).init::<TestBackend>(&device);
        assert_eq!(ff.d_input(), 4);

        let x2 = Tensor::<TestBackend, 2>::random([3, 4], Distribution::Default, &device);
        assert_eq!(ff.forward(x2).dims(), [3, 16]);

        let x3 = Tensor::<TestBackend, 3>::random([3, 1, 4], Distribution::Default, &device);
        assert_eq!(ff.forward(x3).dims(), [3, 1, 16]);
    }

    #[test]
    fn test_zero_hidden_width_is_widened() {
        // dim = 1 gives dim / 2 = 0 hidden units for numeric columns
        let device = Default::default();
        let ff = FeedForwardConfig::new(1, 0, 1).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 2>::ones([2, 1], &device);
        assert_eq!(ff.forward(x).dims(), [2, 1]);
    }
}
