// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything from a JSON Lines article dump to tensor batches.
//
//   articles.jsonl
//       │
//       ▼
//   JsonlLoader       → raw rows (serde_json maps)
//       │
//       ▼
//   CategoryVocabs    → per-column category codes (0 = unseen)
//       │
//       ▼
//   ExampleEncoder    → clean + tokenize title, type every column
//       │
//       ▼
//   split_train_val   → seeded 90/10 split
//       │
//       ├──────────────► sample_training_pairs → PairDataset → PairBatcher
//       │
//       ▼
//   ExampleDataset    → ArticleBatcher / DesignMatrixBatcher
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Row-level schema errors
pub mod error;

/// Reads JSON Lines article files
pub mod loader;

/// Normalises title text before tokenisation
pub mod preprocessor;

/// Category vocabularies and the encoding snapshot saved with checkpoints
pub mod vocab;

/// Raw rows → ArticleExample
pub mod encoder;

/// Same-user (positive, negative) sampling for BPR
pub mod pairs;

/// Burn Dataset implementations
pub mod dataset;

/// Burn Batcher implementations
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
