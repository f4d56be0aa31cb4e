// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates a BertAttBpr training run in order:
//
//   Step 1: Load article rows            (Layer 4 - data)
//   Step 2: Fit category vocabularies    (Layer 4 - data)
//   Step 3: Build / load tokenizer       (Layer 6 - infra)
//   Step 4: Encode rows into examples    (Layer 4 - data)
//   Step 5: Split train/validation       (Layer 4 - data)
//   Step 6: Sample BPR training pairs    (Layer 4 - data)
//   Step 7: Size the model, save configs (Layer 5 / 6)
//   Step 8: Run the training loop        (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::Path, sync::Arc};

use crate::data::{
    dataset::{ExampleDataset, PairDataset},
    encoder::ExampleEncoder,
    loader::JsonlLoader,
    pairs::sample_training_pairs,
    preprocessor::TitleCleaner,
    splitter::{split_train_val, DEFAULT_SPLIT_SEED},
    vocab::{CategoryVocabs, EncodingSnapshot},
};
use crate::domain::{schema::FeatureSchema, traits::RecordSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, ReportWriter},
    tokenizer_store::{id_space, TokenizerStore},
};
use crate::ml::{
    evaluator::{Evaluator, DEFAULT_THRESHOLD},
    model::BertAttBprConfig,
    text_encoder::TitleEncoderConfig,
    trainer::{run_training, TrainingData},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Saved as train_config.json so `eval` can rebuild the same
// schema, split and evaluator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:        String,
    pub checkpoint_dir:   String,
    /// Prefix of the weight files: {experiment}_epoch_{n}
    pub experiment:       String,

    pub title_col:        String,
    pub numeric_cols:     Vec<String>,
    pub categorical_cols: Vec<String>,
    pub topic_cols:       Vec<String>,
    pub user_cols:        Vec<String>,
    pub label_col:        String,
    pub target_cols:      Vec<String>,
    pub max_title_len:    usize,
    /// Read at most this many rows
    pub limit:            Option<usize>,

    pub train_fraction:   f64,
    pub seed:             u64,
    pub batch_size:       usize,
    pub epochs:           usize,
    pub lr:               f64,
    pub threshold:        f32,

    pub dim:              usize,
    pub hidden:           usize,
    pub num_heads:        usize,
    pub num_layers:       usize,
    pub intermediate:     usize,
    pub max_position:     usize,
    pub dropout:          f64,
    pub vocab_size:       usize,

    /// tokenizer.json to use instead of building a vocabulary
    pub pretrained_tokenizer: Option<String>,
    /// CompactRecorder file holding converted title-encoder weights
    pub pretrained_encoder:   Option<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:        "data/articles.jsonl".to_string(),
            checkpoint_dir:   "checkpoints".to_string(),
            experiment:       "bert_att_bpr".to_string(),

            title_col:        "item_title".to_string(),
            numeric_cols:     Vec::new(),
            categorical_cols: Vec::new(),
            topic_cols:       Vec::new(),
            user_cols:        vec!["article_source".to_string()],
            label_col:        "viral".to_string(),
            target_cols:      Vec::new(),
            max_title_len:    32,
            limit:            Some(64_000),

            train_fraction:   0.9,
            seed:             DEFAULT_SPLIT_SEED,
            batch_size:       16,
            epochs:           5,
            lr:               1e-4,
            threshold:        DEFAULT_THRESHOLD,

            dim:              64,
            hidden:           768,
            num_heads:        12,
            num_layers:       12,
            intermediate:     3072,
            max_position:     512,
            dropout:          0.1,
            vocab_size:       30_000,

            pretrained_tokenizer: None,
            pretrained_encoder:   None,
        }
    }
}

impl TrainConfig {
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema {
            title_col:        self.title_col.clone(),
            numeric_cols:     self.numeric_cols.clone(),
            categorical_cols: self.categorical_cols.clone(),
            topic_cols:       self.topic_cols.clone(),
            user_cols:        self.user_cols.clone(),
            label_col:        self.label_col.clone(),
            target_cols:      self.target_cols.clone(),
            max_title_len:    self.max_title_len,
        }
    }

    pub fn text_encoder(&self, vocab_size: usize) -> TitleEncoderConfig {
        TitleEncoderConfig::new(vocab_size, self.max_position.max(self.max_title_len))
            .with_hidden(self.hidden)
            .with_num_heads(self.num_heads)
            .with_num_layers(self.num_layers)
            .with_intermediate(self.intermediate)
            .with_dropout(self.dropout)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the whole pipeline; returns one metrics row per epoch.
    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let cfg    = &self.config;
        let schema = cfg.schema();
        ensure!(!schema.user_cols.is_empty(), "At least one user column is required");

        // ── Step 1: Load rows ─────────────────────────────────────────────────
        tracing::info!("Loading articles from '{}'", cfg.data_path);
        let records = JsonlLoader::new(&cfg.data_path).with_limit(cfg.limit).load_all()?;
        ensure!(!records.is_empty(), "No articles found in '{}'", cfg.data_path);

        // ── Step 2: Category vocabularies ─────────────────────────────────────
        let vocabs = CategoryVocabs::fit(&schema, &records);

        // ── Step 3: Tokenizer ─────────────────────────────────────────────────
        let cleaner = TitleCleaner::new();
        let titles: Vec<String> = records
            .iter()
            .filter_map(|r| r.get(&schema.title_col).and_then(Value::as_str))
            .map(|t| cleaner.clean(t))
            .collect();
        let tokenizer = TokenizerStore::new(&cfg.checkpoint_dir).load_or_build(
            &titles,
            cfg.vocab_size,
            cfg.pretrained_tokenizer.as_deref().map(Path::new),
        )?;
        let tokenizer = Arc::new(tokenizer);

        // ── Step 4: Encode ────────────────────────────────────────────────────
        let snapshot = EncodingSnapshot { schema: schema.clone(), vocabs };
        let encoder  = ExampleEncoder::new(snapshot.clone(), Arc::clone(&tokenizer))?;
        let examples = encoder.encode_all(&records);
        ensure!(!examples.is_empty(), "No article could be encoded with the given columns");

        // ── Step 5: Split ─────────────────────────────────────────────────────
        let (train, val) = split_train_val(examples, cfg.train_fraction, cfg.seed);
        tracing::info!("Split: {} train, {} validation", train.len(), val.len());

        // ── Step 6: Pairs ─────────────────────────────────────────────────────
        let train_pairs = sample_training_pairs(&train, cfg.seed);
        ensure!(
            !train_pairs.is_empty(),
            "Training split needs at least one viral and one non-viral article"
        );
        let val_pairs = sample_training_pairs(&val, cfg.seed);

        let train_examples = ExampleDataset::new(train);
        let val_examples   = ExampleDataset::new(val);
        train_examples.log_class_counts("train");
        val_examples.log_class_counts("validation");

        // ── Step 7: Model config + persisted state ────────────────────────────
        let model_cfg = BertAttBprConfig::for_schema(
            cfg.dim,
            cfg.text_encoder(id_space(&tokenizer)),
            &schema,
            &snapshot.vocabs,
        )?
        .with_dropout(cfg.dropout);

        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir, &cfg.experiment)?;
        checkpoints.save_config(cfg)?;
        checkpoints.save_model_config(&model_cfg)?;
        checkpoints.save_snapshot(&snapshot)?;
        let reports = ReportWriter::new(&cfg.checkpoint_dir)?;

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let evaluator = Evaluator::new(tokenizer, schema.layout())
            .with_batch_size(cfg.batch_size)
            .with_threshold(cfg.threshold)
            .with_explain(true);

        let data = TrainingData {
            train_pairs: PairDataset::new(train_pairs),
            val_pairs:   PairDataset::new(val_pairs),
            val_examples,
        };
        run_training(cfg, &model_cfg, data, &evaluator, &checkpoints, &reports)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mirrors_config_columns() {
        let cfg = TrainConfig {
            numeric_cols: vec!["item_views".into()],
            topic_cols:   vec!["t1".into(), "t2".into()],
            ..TrainConfig::default()
        };
        let schema = cfg.schema();
        assert_eq!(schema.numeric_cols, cfg.numeric_cols);
        assert_eq!(schema.topic_cols.len(), 2);
        assert_eq!(schema.max_title_len, 32);
        assert_eq!(schema.layout().post_sequence_len(), 1 + 1 + 1);
    }

    #[test]
    fn test_config_json_round_trip() {
        let cfg  = TrainConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.experiment, cfg.experiment);
        assert_eq!(back.limit, Some(64_000));
    }

    #[test]
    fn test_max_position_covers_title_length() {
        let cfg = TrainConfig { max_title_len: 600, ..TrainConfig::default() };
        assert_eq!(cfg.text_encoder(200).max_position, 600);
    }

    #[test]
    fn test_missing_user_columns_is_rejected() {
        let cfg = TrainConfig { user_cols: Vec::new(), ..TrainConfig::default() };
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("user column"));
    }
}
