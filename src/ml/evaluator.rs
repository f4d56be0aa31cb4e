// ============================================================
// Layer 5: Evaluation / Explainability Harness
// ============================================================
// Scores every article of a split and turns the scores into
// metrics and, optionally, an explanation report.
//
//   collect   chunk the examples into ArticleBatches
//   score     model.score (caller passes model.valid(): no autodiff)
//   aggregate predictions = score > threshold → metric strategies
//   report    one row per positive article:
//               decoded title, prediction, title relevance,
//               feature labels, feature attention
//
// The threshold is on the raw score; 0.0 is σ(score) > 0.5.
// A split with no positives yields no report (logged, not an error).
//
// The feature labels come from the same ModalityLayout that sized
// the model, so labels and attention slots always line up.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::data::{batcher::{ArticleBatch, ArticleBatcher}, dataset::ExampleDataset};
use crate::domain::{
    example::ArticleExample,
    metric::{default_classification_metrics, evaluate_classification, ClassificationMetric, MetricResult},
    schema::ModalityLayout,
};
use crate::ml::model::BertAttBpr;

pub const DEFAULT_THRESHOLD: f32 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationRow {
    pub text:              String,
    pub pred:              u8,
    pub title_attention:   Vec<f32>,
    pub features:          Vec<String>,
    pub feature_attention: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExplanationReport {
    pub rows: Vec<ExplanationRow>,
}

impl ExplanationReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug)]
pub struct EvaluationOutcome {
    pub metrics:     Vec<MetricResult>,
    pub scores:      Vec<f32>,
    pub predictions: Vec<u8>,
    pub labels:      Vec<u8>,
    pub report:      Option<ExplanationReport>,
}

pub struct Evaluator {
    tokenizer:  Arc<Tokenizer>,
    metrics:    Vec<Box<dyn ClassificationMetric>>,
    layout:     ModalityLayout,
    batch_size: usize,
    threshold:  f32,
    explain:    bool,
}

impl Evaluator {
    pub fn new(tokenizer: Arc<Tokenizer>, layout: ModalityLayout) -> Self {
        Self {
            tokenizer,
            metrics: default_classification_metrics(),
            layout,
            batch_size: 32,
            threshold: DEFAULT_THRESHOLD,
            explain: false,
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<Box<dyn ClassificationMetric>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn evaluate<B: Backend>(
        &self,
        model:   &BertAttBpr<B>,
        dataset: &ExampleDataset,
        device:  &B::Device,
    ) -> Result<EvaluationOutcome> {
        let features = self.layout.feature_labels();

        let mut scores      = Vec::with_capacity(dataset.examples().len());
        let mut predictions = Vec::with_capacity(dataset.examples().len());
        let mut labels      = Vec::with_capacity(dataset.examples().len());
        let mut rows        = Vec::new();

        for chunk in dataset.examples().chunks(self.batch_size) {
            let batch: ArticleBatch<B> = ArticleBatcher.batch(chunk.to_vec(), device);
            let output = model.score(&batch)?;

            let chunk_scores = to_vec(output.scores)?;
            let chunk_preds: Vec<u8> = chunk_scores
                .iter()
                .map(|&s| u8::from(s > self.threshold))
                .collect();

            if self.explain && chunk.iter().any(ArticleExample::is_positive) {
                let title_width   = output.title_attention.dims()[1];
                let feature_width = output.feature_attention.dims()[1];
                let title_att     = to_vec(output.title_attention)?;
                let feature_att   = to_vec(output.feature_attention)?;

                for (i, example) in chunk.iter().enumerate().filter(|(_, e)| e.is_positive()) {
                    rows.push(ExplanationRow {
                        text:              decode_title(&self.tokenizer, example)?,
                        pred:              chunk_preds[i],
                        title_attention:   title_att[i * title_width..(i + 1) * title_width].to_vec(),
                        features:          features.clone(),
                        feature_attention: feature_att[i * feature_width..(i + 1) * feature_width].to_vec(),
                    });
                }
            }

            labels.extend(chunk.iter().map(|e| e.label));
            predictions.extend(chunk_preds);
            scores.extend(chunk_scores);
        }

        let metrics = evaluate_classification(&self.metrics, &labels, &predictions);

        let report = if !self.explain {
            None
        } else if rows.is_empty() {
            tracing::info!("No positive articles: no explanation report generated");
            None
        } else {
            Some(ExplanationReport { rows })
        };

        Ok(EvaluationOutcome { metrics, scores, predictions, labels, report })
    }
}

/// Title text back from its unpadded token ids, special tokens dropped.
pub fn decode_title(tokenizer: &Tokenizer, example: &ArticleExample) -> Result<String> {
    let ids: Vec<u32> = example.title_ids
        .iter()
        .zip(&example.title_mask)
        .filter(|(_, m)| **m != 0)
        .map(|(&id, _)| id)
        .collect();
    tokenizer
        .decode(&ids, true)
        .map_err(|e| anyhow::anyhow!("Cannot decode title: {e}"))
}

fn to_vec<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        example::fixtures::example,
        metric::{find_scalar, Accuracy},
        schema::fixtures::schema,
    };
    use crate::infra::tokenizer_store::fixtures::tokenizer;
    use crate::ml::model::fixtures::scenario_config;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn evaluator() -> Evaluator {
        Evaluator::new(Arc::new(tokenizer()), schema().layout()).with_batch_size(2)
    }

    fn model() -> BertAttBpr<TestBackend> {
        scenario_config().init(&Default::default())
    }

    #[test]
    fn test_no_positives_gives_no_report() {
        let ds = ExampleDataset::new(vec![example(0, 1), example(0, 2), example(0, 3)]);
        let outcome = evaluator()
            .with_explain(true)
            .evaluate(&model(), &ds, &Default::default())
            .unwrap();
        assert!(outcome.report.is_none());
        assert_eq!(outcome.labels, vec![0, 0, 0]);
        assert!(find_scalar(&outcome.metrics, "accuracy").is_some());
    }

    #[test]
    fn test_one_report_row_per_positive() {
        let ds = ExampleDataset::new(vec![example(1, 1), example(0, 2), example(1, 3)]);
        let outcome = evaluator()
            .with_explain(true)
            .evaluate(&model(), &ds, &Default::default())
            .unwrap();

        let report = outcome.report.unwrap();
        assert_eq!(report.len(), 2);
        let row = &report.rows[0];
        assert_eq!(row.title_attention.len(), 8);
        assert_eq!(row.features, schema().layout().feature_labels());
        assert_eq!(row.feature_attention.len(), row.features.len());
        assert_eq!(row.pred, outcome.predictions[0]);
    }

    #[test]
    fn test_threshold_drives_predictions() {
        let ds = ExampleDataset::new(vec![example(1, 1), example(0, 2)]);
        let all_pos = evaluator()
            .with_threshold(f32::NEG_INFINITY)
            .evaluate(&model(), &ds, &Default::default())
            .unwrap();
        assert_eq!(all_pos.predictions, vec![1, 1]);

        let all_neg = evaluator()
            .with_threshold(f32::INFINITY)
            .evaluate(&model(), &ds, &Default::default())
            .unwrap();
        assert_eq!(all_neg.predictions, vec![0, 0]);
        assert_eq!(all_neg.scores.len(), 2);
    }

    #[test]
    fn test_metric_strategies_are_pluggable() {
        let ds = ExampleDataset::new(vec![example(1, 1), example(0, 2)]);
        let outcome = evaluator()
            .with_metrics(vec![Box::new(Accuracy)])
            .evaluate(&model(), &ds, &Default::default())
            .unwrap();
        assert_eq!(outcome.metrics.len(), 1);
        assert_eq!(outcome.metrics[0].name, "accuracy");
        assert!(outcome.report.is_none());
    }
}
