// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// One use case per CLI command. Each one wires the data, ml and
// infra layers together for a single workflow and returns its
// results; printing is left to Layer 1.
//
//   train     JSONL → encoded examples → BPR pairs → BertAttBpr
//   eval      checkpoint → scores, metrics, explanation report
//   baseline  JSONL → design matrix → LR / LogR / LLR / SLR,
//             or titles → title classifier

/// Fusion-network training workflow
pub mod train_use_case;

/// Checkpoint evaluation workflow
pub mod eval_use_case;

/// Baseline workflow
pub mod baseline_use_case;
