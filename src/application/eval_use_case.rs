// ============================================================
// Layer 2: EvalUseCase
// ============================================================
// Re-scores a dataset with a trained checkpoint:
//
//   Step 1: Reopen the run (train_config.json, schema.json,
//           tokenizer.json, model_config.json)
//   Step 2: Load weights (latest epoch unless one is given)
//   Step 3: Encode rows with the saved vocabularies
//   Step 4: Keep the validation split (same fraction + seed as
//           training) unless every row was asked for
//   Step 5: Evaluate, write scores_eval.csv,
//           confusion_matrix_eval.csv and explanation_eval.csv
//
// Inference runs on plain Wgpu: no autodiff graph.

use anyhow::{anyhow, ensure, Result};
use burn::prelude::*;
use std::sync::Arc;

use crate::data::{
    dataset::ExampleDataset, encoder::ExampleEncoder, loader::JsonlLoader, splitter::split_train_val,
};
use crate::domain::{
    metric::{classification_metric, find_confusion, find_report, ClassificationMetric},
    traits::RecordSource,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::ReportWriter, tokenizer_store::TokenizerStore};
use crate::ml::{
    evaluator::{EvaluationOutcome, Evaluator},
    model::BertAttBpr,
    trainer::InferBackend,
};

pub const EVAL_TAG: &str = "eval";

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub checkpoint_dir: String,
    /// Defaults to the file the model was trained on
    pub data_path:      Option<String>,
    /// Defaults to the latest saved epoch
    pub epoch:          Option<usize>,
    /// Score every row instead of the validation split only
    pub all_rows:       bool,
    /// Defaults to the training threshold
    pub threshold:      Option<f32>,
    pub batch_size:     usize,
    pub explain:        bool,
    /// Metric names in report order; empty means the full default set
    pub metrics:        Vec<String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: "checkpoints".to_string(),
            data_path:      None,
            epoch:          None,
            all_rows:       false,
            threshold:      None,
            batch_size:     32,
            explain:        true,
            metrics:        Vec::new(),
        }
    }
}

pub struct EvalUseCase {
    config: EvalConfig,
}

impl EvalUseCase {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvaluationOutcome> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        self.execute_on::<InferBackend>(&device)
    }

    /// None keeps the evaluator's default strategies.
    fn metrics(&self) -> Result<Option<Vec<Box<dyn ClassificationMetric>>>> {
        if self.config.metrics.is_empty() {
            return Ok(None);
        }
        self.config.metrics
            .iter()
            .map(|name| classification_metric(name).ok_or_else(|| anyhow!("Unknown metric '{name}'")))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn execute_on<B: Backend>(&self, device: &B::Device) -> Result<EvaluationOutcome> {
        let cfg = &self.config;
        let metrics = self.metrics()?;

        // ── Step 1: Reopen the run ────────────────────────────────────────────
        let (checkpoints, train_cfg) = CheckpointManager::open(&cfg.checkpoint_dir)?;
        let snapshot  = checkpoints.load_snapshot()?;
        let tokenizer = Arc::new(TokenizerStore::new(&cfg.checkpoint_dir).load()?);
        let model_cfg = checkpoints.load_model_config()?;

        // ── Step 2: Weights ───────────────────────────────────────────────────
        let model: BertAttBpr<B> = model_cfg.init(device);
        let model = checkpoints.load_model(model, cfg.epoch, device)?;

        // ── Step 3: Encode ────────────────────────────────────────────────────
        let data_path = cfg.data_path.clone().unwrap_or_else(|| train_cfg.data_path.clone());
        tracing::info!("Evaluating articles from '{}'", data_path);
        let records = JsonlLoader::new(&data_path).with_limit(train_cfg.limit).load_all()?;

        let layout   = snapshot.schema.layout();
        let encoder  = ExampleEncoder::new(snapshot, Arc::clone(&tokenizer))?;
        let examples = encoder.encode_all(&records);

        // ── Step 4: Split ─────────────────────────────────────────────────────
        let examples = if cfg.all_rows {
            examples
        } else {
            split_train_val(examples, train_cfg.train_fraction, train_cfg.seed).1
        };
        ensure!(!examples.is_empty(), "Nothing to evaluate in '{}'", data_path);
        let dataset = ExampleDataset::new(examples);
        dataset.log_class_counts(EVAL_TAG);

        // ── Step 5: Evaluate + report ─────────────────────────────────────────
        let mut evaluator = Evaluator::new(tokenizer, layout)
            .with_batch_size(cfg.batch_size)
            .with_threshold(cfg.threshold.unwrap_or(train_cfg.threshold))
            .with_explain(cfg.explain);
        if let Some(metrics) = metrics {
            evaluator = evaluator.with_metrics(metrics);
        }
        let outcome = evaluator.evaluate(&model, &dataset, device)?;

        let reports = ReportWriter::new(checkpoints.dir())?;
        reports.write_scores(EVAL_TAG, &outcome.scores, &outcome.predictions, &outcome.labels)?;
        if let Some(cm) = find_confusion(&outcome.metrics) {
            reports.write_confusion(EVAL_TAG, cm)?;
        }
        if let Some(report) = &outcome.report {
            let path = reports.write_explanation(EVAL_TAG, report)?;
            tracing::info!("Explanation report: '{}'", path.display());
        }
        if let Some(report) = find_report(&outcome.metrics) {
            tracing::info!("Evaluation report:\n{}", report);
        }

        Ok(outcome)
    }
}
