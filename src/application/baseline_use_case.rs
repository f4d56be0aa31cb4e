// ============================================================
// Layer 2: BaselineUseCase
// ============================================================
// Trains one baseline (LR, LogR, LLR, SLR or the text-only title
// classifier) on the same rows, vocabularies and split the fusion
// network sees:
//
//   Step 1: Load article rows           (Layer 4 - data)
//   Step 2: Tokenizer                   (Layer 6 - infra)
//   Step 3: Fit vocabularies, encode    (Layer 4 - data)
//   Step 4: Seeded split                (Layer 4 - data)
//   Step 5: Train + report              (Layer 5 - ml)
//
// The flat-feature baselines never read the title, so they get an
// empty word-level tokenizer and nothing is written for it. The
// text classifier builds (or reuses) tokenizer.json in report_dir.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::Path, sync::Arc};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    dataset::ExampleDataset,
    encoder::ExampleEncoder,
    loader::JsonlLoader,
    preprocessor::TitleCleaner,
    splitter::split_train_val,
    vocab::{CategoryVocabs, EncodingSnapshot},
};
use crate::domain::{metric::MetricResult, schema::FeatureSchema, traits::RecordSource};
use crate::infra::{
    metrics::ReportWriter,
    tokenizer_store::{tokenizer_from_words, TokenizerStore},
};
use crate::ml::{baselines::BaselineKind, text_encoder::TitleEncoderConfig, trainer::run_baseline};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    pub kind:           BaselineKind,
    pub data_path:      String,
    /// Where baseline_{kind}.csv and confusion matrices go
    pub report_dir:     String,
    pub schema:         FeatureSchema,
    pub limit:          Option<usize>,
    pub train_fraction: f64,
    pub seed:           u64,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    /// Target column for the single-task regressor
    pub y_index:        usize,
    pub lambda1:        f64,
    pub lambda2:        f64,

    // Title classifier (`text`) only
    pub hidden:               usize,
    pub num_heads:            usize,
    pub num_layers:           usize,
    pub intermediate:         usize,
    pub dropout:              f64,
    pub vocab_size:           usize,
    pub pretrained_tokenizer: Option<String>,
    pub pretrained_encoder:   Option<String>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        let train = TrainConfig::default();
        Self {
            kind:           BaselineKind::Lr,
            schema:         train.schema(),
            data_path:      train.data_path.clone(),
            report_dir:     "reports".to_string(),
            limit:          train.limit,
            train_fraction: train.train_fraction,
            seed:           train.seed,
            batch_size:     64,
            epochs:         20,
            lr:             1e-2,
            y_index:        0,
            lambda1:        0.1,
            lambda2:        0.1,
            hidden:               train.hidden,
            num_heads:            train.num_heads,
            num_layers:           train.num_layers,
            intermediate:         train.intermediate,
            dropout:              0.8,
            vocab_size:           train.vocab_size,
            pretrained_tokenizer: None,
            pretrained_encoder:   None,
        }
    }
}

impl BaselineConfig {
    /// Title encoder for the text classifier; positions cover max_title_len.
    pub fn text_encoder(&self, vocab_size: usize) -> TitleEncoderConfig {
        TitleEncoderConfig::new(vocab_size, self.schema.max_title_len)
            .with_hidden(self.hidden)
            .with_num_heads(self.num_heads)
            .with_num_layers(self.num_layers)
            .with_intermediate(self.intermediate)
            .with_dropout(self.dropout)
    }
}

pub struct BaselineUseCase {
    config: BaselineConfig,
}

impl BaselineUseCase {
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Returns the validation metrics of the final epoch.
    pub fn execute(&self) -> Result<Vec<MetricResult>> {
        let cfg = &self.config;

        // ── Step 1: Load rows ─────────────────────────────────────────────────
        tracing::info!("Loading articles from '{}'", cfg.data_path);
        let records = JsonlLoader::new(&cfg.data_path).with_limit(cfg.limit).load_all()?;
        ensure!(!records.is_empty(), "No articles found in '{}'", cfg.data_path);

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = if cfg.kind.uses_design_matrix() {
            ensure!(
                cfg.schema.design_width() > 0,
                "Baselines need at least one numeric, categorical or topic column"
            );
            tokenizer_from_words(&[])?
        } else {
            let cleaner = TitleCleaner::new();
            let titles: Vec<String> = records
                .iter()
                .filter_map(|r| r.get(&cfg.schema.title_col).and_then(Value::as_str))
                .map(|t| cleaner.clean(t))
                .collect();
            TokenizerStore::new(&cfg.report_dir).load_or_build(
                &titles,
                cfg.vocab_size,
                cfg.pretrained_tokenizer.as_deref().map(Path::new),
            )?
        };
        let tokenizer = Arc::new(tokenizer);

        // ── Step 3: Encode ────────────────────────────────────────────────────
        let snapshot = EncodingSnapshot {
            schema: cfg.schema.clone(),
            vocabs: CategoryVocabs::fit(&cfg.schema, &records),
        };
        let encoder  = ExampleEncoder::new(snapshot, Arc::clone(&tokenizer))?;
        let examples = encoder.encode_all(&records);
        ensure!(!examples.is_empty(), "No article could be encoded with the given columns");

        // ── Step 4: Split ─────────────────────────────────────────────────────
        let (train, val) = split_train_val(examples, cfg.train_fraction, cfg.seed);
        let train = ExampleDataset::new(train);
        let val   = ExampleDataset::new(val);
        train.log_class_counts("train");
        val.log_class_counts("validation");

        // ── Step 5: Train ─────────────────────────────────────────────────────
        let reports = ReportWriter::new(&cfg.report_dir)?;
        run_baseline(cfg, train, val, tokenizer, &reports)
    }
}
