// ============================================================
// Layer 5: Attention Pooling Unit
// ============================================================
// Collapses a sequence of N modality vectors into one vector,
// steered by a single query vector:
//
//   Q = Wq·query     [b, 1, dim]
//   K = Wk·context   [b, N, dim]
//   V = Wv·context   [b, N, dim]
//
//   weights = softmax(Q·Kᵀ / √dim)   over N    [b, 1, N]
//   pooled  = weights · V                      [b, 1, dim]
//
// Batched matmuls only: batch elements never interact.
// The weights are returned as [b, N] for the explanation report.
//
// Reference: Vaswani et al. (2017) scaled dot-product attention

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

#[derive(Config, Debug)]
pub struct AttentionPoolingConfig {
    pub dim: usize,
}

impl AttentionPoolingConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionPooling<B> {
        AttentionPooling {
            query: LinearConfig::new(self.dim, self.dim).init(device),
            key:   LinearConfig::new(self.dim, self.dim).init(device),
            value: LinearConfig::new(self.dim, self.dim).init(device),
            dim:   self.dim,
        }
    }
}

#[derive(Module, Debug)]
pub struct AttentionPooling<B: Backend> {
    pub query: Linear<B>,
    pub key:   Linear<B>,
    pub value: Linear<B>,
    pub dim:   usize,
}

pub struct PooledSequence<B: Backend> {
    /// [batch, 1, dim]
    pub pooled:  Tensor<B, 3>,
    /// [batch, N], each row sums to 1
    pub weights: Tensor<B, 2>,
}

impl<B: Backend> AttentionPooling<B> {
    pub fn forward(&self, context: Tensor<B, 3>, query: Tensor<B, 3>) -> PooledSequence<B> {
        let [batch, n, _] = context.dims();

        let q = self.query.forward(query);
        let k = self.key.forward(context.clone());
        let v = self.value.forward(context);

        let scores  = q.matmul(k.swap_dims(1, 2)) / (self.dim as f64).sqrt(); // [b, 1, N]
        let weights = softmax(scores, 2);
        let pooled  = weights.clone().matmul(v);

        PooledSequence { pooled, weights: weights.reshape([batch, n]) }
    }
}
