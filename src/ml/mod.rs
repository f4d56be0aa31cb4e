// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here.
//
//   attention.rs     task-query attention pooling unit
//   encoders.rs      per-column feed-forward encoder
//   text_encoder.rs  BERT-shaped title encoder + title relevance
//   model.rs         BertAttBpr fusion network (score, pair, loss)
//   loss.rs          overflow-free BPR loss
//   evaluator.rs     metrics + explanation harness
//   baselines.rs     LR / LogR / LLR / SLR on the design matrix
//   title_classifier.rs  text-only title classifier baseline
//   trainer.rs       epoch loops for the ranker and the baselines
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Rendle et al. (2009) BPR
//            Devlin et al. (2019) BERT

/// Task-query attention pooling
pub mod attention;

/// Two-layer feed-forward feature encoder
pub mod encoders;

/// Title encoder
pub mod text_encoder;

/// BertAttBpr fusion network
pub mod model;

/// Pairwise ranking loss
pub mod loss;

/// Evaluation and explanation report
pub mod evaluator;

/// Flat-feature baseline models
pub mod baselines;

/// Title-only classifier baseline
pub mod title_classifier;

/// Training loops with validation and checkpointing
pub mod trainer;
