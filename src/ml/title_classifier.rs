// ============================================================
// Layer 5: Title Classifier Baseline
// ============================================================
// Text-only comparison model: the title encoder on its own,
// fine-tuned with cross-entropy to predict the virality class.
//
//   ids, mask ─► TitleEncoder ─► pooled [b, hidden]
//                               ─► Dropout ─► Linear(hidden → 2)
//
// Prediction is the arg-max class. The last layer's attention
// (as title relevance per token) is kept for the attention report.

use burn::{
    nn::{loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::data::batcher::TitleBatch;
use crate::ml::text_encoder::{TitleEncoder, TitleEncoderConfig};

#[derive(Config, Debug)]
pub struct TitleClassifierConfig {
    pub text:        TitleEncoderConfig,
    #[config(default = 2)]
    pub num_classes: usize,
}

impl TitleClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TitleClassifier<B> {
        TitleClassifier {
            encoder: self.text.init(device),
            dropout: DropoutConfig::new(self.text.dropout).init(),
            head:    LinearConfig::new(self.text.hidden, self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct TitleClassifier<B: Backend> {
    pub encoder: TitleEncoder<B>,
    pub dropout: Dropout,
    pub head:    Linear<B>,
}

pub struct TitleClassification<B: Backend> {
    /// [batch, classes]
    pub logits:          Tensor<B, 2>,
    /// [batch, title_len], detached
    pub title_attention: Tensor<B, 2>,
}

impl<B: Backend> TitleClassification<B> {
    /// Arg-max class per row: [batch]
    pub fn predictions(&self) -> Tensor<B, 1, Int> {
        let [batch, _] = self.logits.dims();
        self.logits.clone().argmax(1).reshape([batch])
    }
}

impl<B: Backend> TitleClassifier<B> {
    pub fn forward(&self, ids: Tensor<B, 2, Int>, mask: Tensor<B, 2, Int>) -> TitleClassification<B> {
        let encoding = self.encoder.forward(ids, mask);
        let title_attention = encoding.title_relevance();
        let logits = self.head.forward(self.dropout.forward(encoding.pooled));
        TitleClassification { logits, title_attention }
    }

    /// Mean cross-entropy over the batch: [1]
    pub fn forward_loss(&self, batch: &TitleBatch<B>) -> (Tensor<B, 1>, TitleClassification<B>) {
        let output = self.forward(batch.ids.clone(), batch.mask.clone());
        let loss = CrossEntropyLossConfig::new()
            .init(&output.logits.device())
            .forward(output.logits.clone(), batch.labels.clone());
        (loss, output)
    }
}

/// One validation article in the attention report.
#[derive(Debug, Clone)]
pub struct TitleAttentionRow {
    pub text:       String,
    pub label:      u8,
    pub prediction: u8,
    /// Attention received per title position, padding included
    pub attention:  Vec<f32>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::TitleBatcher;
    use crate::domain::example::fixtures::example;
    use crate::ml::text_encoder::fixtures::tiny_config;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray<f32>;

    fn classifier() -> TitleClassifier<TestBackend> {
        TitleClassifierConfig::new(tiny_config(110, 8)).init(&Default::default())
    }

    #[test]
    fn test_two_logits_and_one_attention_row_per_title() {
        let device = Default::default();
        let batch: TitleBatch<TestBackend> =
            TitleBatcher.batch(vec![example(1, 1), example(0, 2), example(0, 3)], &device);

        let (loss, out) = classifier().forward_loss(&batch);
        assert_eq!(out.logits.dims(), [3, 2]);
        assert_eq!(out.title_attention.dims(), [3, 8]);

        let loss: f32 = loss.into_scalar();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_prediction_is_the_larger_logit() {
        let out = TitleClassification::<TestBackend> {
            logits: Tensor::from_floats([[0.2, 1.5], [3.0, -1.0]], &Default::default()),
            title_attention: Tensor::zeros([2, 4], &Default::default()),
        };
        let preds: Vec<i64> = out.predictions().into_data().iter::<i64>().collect();
        assert_eq!(preds, vec![1, 0]);
    }
}
