// ============================================================
// Layer 5: Title Encoder (BERT-shaped)
// ============================================================
// Encodes a padded title into one pooled vector plus the last
// layer's self-attention, which drives the title explanation.
//
//   ids  [b, len] ─► token + position + segment embeddings
//                    LayerNorm, Dropout
//                    N × EncoderBlock (post-LN, pad-masked MHA, GELU FFN)
//                    pooler: tanh(Linear(hidden[CLS]))
//
//   pooled     [b, hidden]
//   attention  [b, heads, len, len]   (last layer only)
//
// Title relevance = attention summed over heads, then over the
// query axis: how much attention each token received.
//
// The parameter layout mirrors bert-base (768 hidden, 12 heads,
// 12 layers), so pretrained weights converted to a Burn record
// load straight into it.
//
// Reference: Devlin et al. (2019) BERT
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, tanh},
};

#[derive(Config, Debug)]
pub struct TitleEncoderConfig {
    /// Embedding rows: max token id + 1
    pub vocab_size:      usize,
    pub max_position:    usize,
    #[config(default = 768)]
    pub hidden:          usize,
    #[config(default = 12)]
    pub num_heads:       usize,
    #[config(default = 12)]
    pub num_layers:      usize,
    #[config(default = 3072)]
    pub intermediate:    usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 0.1)]
    pub dropout:         f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps:  f64,
}

impl TitleEncoderConfig {
    /// At least one block is always built: the last block's
    /// attention is part of the output.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TitleEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.hidden).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_position, self.hidden).init(device);
        let segment_embedding  = EmbeddingConfig::new(self.type_vocab_size, self.hidden).init(device);
        let embedding_norm     = self.layer_norm(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers.max(1))
            .map(|_| self.build_encoder_block(device))
            .collect();
        let pooler  = LinearConfig::new(self.hidden, self.hidden).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        TitleEncoder {
            token_embedding, position_embedding, segment_embedding,
            embedding_norm, layers, pooler, dropout,
        }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden).with_epsilon(self.layer_norm_eps).init(device)
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.hidden, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.hidden, self.intermediate).init(device);
        let ffn_linear2 = LinearConfig::new(self.intermediate, self.hidden).init(device);
        let norm1   = self.layer_norm(device);
        let norm2   = self.layer_norm(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask` is true where the position is padding.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let attn = self.self_attn.forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask));
        let x = self.norm1.forward(x + self.dropout.forward(attn.context));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        (self.norm2.forward(x + self.dropout.forward(ffn_out)), attn.weights)
    }
}

#[derive(Module, Debug)]
pub struct TitleEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub segment_embedding:  Embedding<B>,
    pub embedding_norm:     LayerNorm<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub pooler:             Linear<B>,
    pub dropout:            Dropout,
}

pub struct TitleEncoding<B: Backend> {
    /// [batch, hidden]
    pub pooled:    Tensor<B, 2>,
    /// [batch, heads, len, len] from the last block
    pub attention: Tensor<B, 4>,
}

impl<B: Backend> TitleEncoding<B> {
    /// [batch, len]: attention received per token, detached from the graph
    pub fn title_relevance(&self) -> Tensor<B, 2> {
        let [batch, _, _, len] = self.attention.dims();
        self.attention
            .clone()
            .detach()
            .sum_dim(1)
            .sum_dim(2)
            .reshape([batch, len])
    }
}

impl<B: Backend> TitleEncoder<B> {
    /// ids, mask: [batch, len], mask is 1 for real tokens and 0 for padding
    pub fn forward(&self, ids: Tensor<B, 2, Int>, mask: Tensor<B, 2, Int>) -> TitleEncoding<B> {
        let [batch, len] = ids.dims();
        let device = ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch, len]);
        let segments = Tensor::<B, 2, Int>::zeros([batch, len], &device);

        let x = self.token_embedding.forward(ids)
            + self.position_embedding.forward(positions)
            + self.segment_embedding.forward(segments);
        let mut x = self.dropout.forward(self.embedding_norm.forward(x));

        let pad_mask = mask.equal_elem(0);
        let mut attention = None;
        for layer in &self.layers {
            let (out, weights) = layer.forward(x, pad_mask.clone());
            x = out;
            attention = Some(weights);
        }
        let hidden = x.dims()[2];
        let attention = attention.unwrap_or_else(|| Tensor::zeros([batch, 1, len, len], &device));

        let cls = x.slice([0..batch, 0..1, 0..hidden]).reshape([batch, hidden]);
        let pooled = tanh(self.pooler.forward(cls));

        TitleEncoding { pooled, attention }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod fixtures {
    use super::TitleEncoderConfig;

    /// 2 heads, 1 block, hidden 16: small enough for CPU tests
    pub fn tiny_config(vocab_size: usize, max_position: usize) -> TitleEncoderConfig {
        TitleEncoderConfig::new(vocab_size, max_position)
            .with_hidden(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_intermediate(32)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::tiny_config;
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn input(device: &<TestBackend as Backend>::Device) -> (Tensor<TestBackend, 2, Int>, Tensor<TestBackend, 2, Int>) {
        let ids  = Tensor::<TestBackend, 1, Int>::from_ints([101, 12, 13, 14, 15, 102, 0, 0], device)
            .reshape([1, 8]);
        let mask = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1, 1, 1, 1, 0, 0], device)
            .reshape([1, 8]);
        (ids, mask)
    }

    #[test]
    fn test_output_shapes() {
        let device  = Default::default();
        let encoder = tiny_config(110, 8).init::<TestBackend>(&device);
        let (ids, mask) = input(&device);

        let out = encoder.forward(ids, mask);
        assert_eq!(out.pooled.dims(), [1, 16]);
        assert_eq!(out.attention.dims(), [1, 2, 8, 8]);
        assert_eq!(out.title_relevance().dims(), [1, 8]);
    }

    #[test]
    fn test_padding_receives_no_attention() {
        let device  = Default::default();
        let encoder = tiny_config(110, 8).init::<TestBackend>(&device);
        let (ids, mask) = input(&device);

        let relevance: Vec<f32> = encoder
            .forward(ids, mask)
            .title_relevance()
            .into_data()
            .to_vec()
            .unwrap();
        assert!(relevance[6].abs() < 1e-5);
        assert!(relevance[7].abs() < 1e-5);
        // 2 heads × 8 query rows, each row a distribution
        let total: f32 = relevance.iter().sum();
        assert!((total - 16.0).abs() < 1e-3);
    }

    #[test]
    fn test_pooled_is_tanh_bounded() {
        let device  = Default::default();
        let encoder = tiny_config(110, 8).init::<TestBackend>(&device);
        let (ids, mask) = input(&device);
        let max: f32 = encoder.forward(ids, mask).pooled.abs().max().into_scalar();
        assert!(max <= 1.0);
    }
}
