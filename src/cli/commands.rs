// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Three subcommands: `train`, `eval` and `baseline`.
// Column lists are comma separated:
//
//   --numeric-cols sentiment_score,item_views
//
// Each *Args struct converts into its application-layer config,
// so the use cases never see clap types.

use clap::{Args, Subcommand};

use crate::application::{
    baseline_use_case::BaselineConfig,
    eval_use_case::EvalConfig,
    train_use_case::TrainConfig,
};
use crate::domain::schema::FeatureSchema;
use crate::ml::baselines::BaselineKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the BertAttBpr ranker on a JSON Lines article file
    Train(TrainArgs),

    /// Evaluate a trained checkpoint and write an explanation report
    Eval(EvalArgs),

    /// Train a baseline: LR, LogR, LLR, SLR or the title-only classifier
    Baseline(BaselineArgs),
}

/// Which input columns feed which modality
#[derive(Args, Debug, Clone)]
pub struct ColumnArgs {
    #[arg(long, default_value = "item_title")]
    pub title_col: String,

    #[arg(long, value_delimiter = ',')]
    pub numeric_cols: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub categorical_cols: Vec<String>,

    /// Topic distribution columns (encoded together as one slot)
    #[arg(long, value_delimiter = ',')]
    pub topic_cols: Vec<String>,

    /// Categorical columns describing the user side; at least one
    #[arg(long, value_delimiter = ',', default_value = "article_source")]
    pub user_cols: Vec<String>,

    /// 0/1 virality label
    #[arg(long, default_value = "viral")]
    pub label_col: String,

    /// Regression targets for the baselines (default: the label)
    #[arg(long, value_delimiter = ',')]
    pub target_cols: Vec<String>,

    /// Title length in tokens, including [CLS] and [SEP]
    #[arg(long, default_value_t = 32)]
    pub max_title_len: usize,
}

impl From<ColumnArgs> for FeatureSchema {
    fn from(c: ColumnArgs) -> Self {
        FeatureSchema {
            title_col:        c.title_col,
            numeric_cols:     c.numeric_cols,
            categorical_cols: c.categorical_cols,
            topic_cols:       c.topic_cols,
            user_cols:        c.user_cols,
            label_col:        c.label_col,
            target_cols:      c.target_cols,
            max_title_len:    c.max_title_len,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON Lines file, one article per line
    #[arg(long, default_value = "data/articles.jsonl")]
    pub data_path: String,

    /// Directory for checkpoints, tokenizer, schema and reports
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Weight files are named {experiment}_epoch_{n}
    #[arg(long, default_value = "bert_att_bpr")]
    pub experiment: String,

    #[command(flatten)]
    pub columns: ColumnArgs,

    /// Read at most this many rows
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    /// Seeds the split, pair sampling and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Pairs per optimiser step
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Raw-score cut-off for a "viral" prediction (0 = σ > 0.5)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub threshold: f32,

    /// Width of every feature representation
    #[arg(long, default_value_t = 64)]
    pub dim: usize,

    /// Title encoder hidden size
    #[arg(long, default_value_t = 768)]
    pub hidden: usize,

    /// hidden must be divisible by num_heads
    #[arg(long, default_value_t = 12)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 12)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 3072)]
    pub intermediate: usize,

    #[arg(long, default_value_t = 512)]
    pub max_position: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Word vocabulary cap when building a tokenizer
    #[arg(long, default_value_t = 30_000)]
    pub vocab_size: usize,

    /// tokenizer.json to use instead of building one
    #[arg(long)]
    pub pretrained_tokenizer: Option<String>,

    /// Converted title-encoder weights (.mpk record)
    #[arg(long)]
    pub pretrained_encoder: Option<String>,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:            a.data_path,
            checkpoint_dir:       a.checkpoint_dir,
            experiment:           a.experiment,
            title_col:            a.columns.title_col,
            numeric_cols:         a.columns.numeric_cols,
            categorical_cols:     a.columns.categorical_cols,
            topic_cols:           a.columns.topic_cols,
            user_cols:            a.columns.user_cols,
            label_col:            a.columns.label_col,
            target_cols:          a.columns.target_cols,
            max_title_len:        a.columns.max_title_len,
            limit:                a.limit,
            train_fraction:       a.train_fraction,
            seed:                 a.seed,
            batch_size:           a.batch_size,
            epochs:               a.epochs,
            lr:                   a.lr,
            threshold:            a.threshold,
            dim:                  a.dim,
            hidden:               a.hidden,
            num_heads:            a.num_heads,
            num_layers:           a.num_layers,
            intermediate:         a.intermediate,
            max_position:         a.max_position,
            dropout:              a.dropout,
            vocab_size:           a.vocab_size,
            pretrained_tokenizer: a.pretrained_tokenizer,
            pretrained_encoder:   a.pretrained_encoder,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Directory `train` wrote to
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Data to score (default: the training file)
    #[arg(long)]
    pub data_path: Option<String>,

    /// Epoch to load (default: latest)
    #[arg(long)]
    pub epoch: Option<usize>,

    /// Score every row, not just the validation split
    #[arg(long)]
    pub all_rows: bool,

    /// Override the training threshold
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<f32>,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Skip the explanation report
    #[arg(long)]
    pub no_explain: bool,

    /// Report only these metrics, e.g. accuracy,f1
    #[arg(long, value_delimiter = ',')]
    pub metrics: Vec<String>,
}

impl From<EvalArgs> for EvalConfig {
    fn from(a: EvalArgs) -> Self {
        EvalConfig {
            checkpoint_dir: a.checkpoint_dir,
            data_path:      a.data_path,
            epoch:          a.epoch,
            all_rows:       a.all_rows,
            threshold:      a.threshold,
            batch_size:     a.batch_size,
            explain:        !a.no_explain,
            metrics:        a.metrics,
        }
    }
}

#[derive(Args, Debug)]
pub struct BaselineArgs {
    #[arg(long, value_enum, default_value_t = BaselineKind::Lr)]
    pub model: BaselineKind,

    #[arg(long, default_value = "data/articles.jsonl")]
    pub data_path: String,

    #[arg(long, default_value = "reports")]
    pub report_dir: String,

    #[command(flatten)]
    pub columns: ColumnArgs,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-2)]
    pub lr: f64,

    /// Target column index for `slr`
    #[arg(long, default_value_t = 0)]
    pub y_index: usize,

    /// Penalty on the shared weights θ (`llr`)
    #[arg(long, default_value_t = 0.1)]
    pub lambda1: f64,

    /// Penalty on the task weights Γ (`llr`)
    #[arg(long, default_value_t = 0.1)]
    pub lambda2: f64,

    /// Title encoder hidden size (`text`)
    #[arg(long, default_value_t = 768)]
    pub hidden: usize,

    #[arg(long, default_value_t = 12)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 12)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 3072)]
    pub intermediate: usize,

    /// Encoder and head dropout (`text`)
    #[arg(long, default_value_t = 0.8)]
    pub dropout: f64,

    #[arg(long, default_value_t = 30_000)]
    pub vocab_size: usize,

    #[arg(long)]
    pub pretrained_tokenizer: Option<String>,

    /// Converted title-encoder weights (.mpk record)
    #[arg(long)]
    pub pretrained_encoder: Option<String>,
}

impl From<BaselineArgs> for BaselineConfig {
    fn from(a: BaselineArgs) -> Self {
        BaselineConfig {
            kind:           a.model,
            data_path:      a.data_path,
            report_dir:     a.report_dir,
            schema:         a.columns.into(),
            limit:          a.limit,
            train_fraction: a.train_fraction,
            seed:           a.seed,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            y_index:        a.y_index,
            lambda1:        a.lambda1,
            lambda2:        a.lambda2,
            hidden:               a.hidden,
            num_heads:            a.num_heads,
            num_layers:           a.num_layers,
            intermediate:         a.intermediate,
            dropout:              a.dropout,
            vocab_size:           a.vocab_size,
            pretrained_tokenizer: a.pretrained_tokenizer,
            pretrained_encoder:   a.pretrained_encoder,
        }
    }
}
