// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Everything that touches the checkpoint directory:
//
//   checkpoint.rs       model weights (CompactRecorder), the
//                       latest-epoch pointer, train/model configs
//                       and the encoding snapshot (schema.json)
//
//   tokenizer_store.rs  title tokenizer: copies a pretrained
//                       tokenizer.json in, reuses the saved one,
//                       or builds a word-level vocabulary from
//                       the training titles
//
//   metrics.rs          CSV reports: per-epoch metrics, confusion
//                       matrices, explanation reports, baselines
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Per-epoch CSV reports
pub mod metrics;
