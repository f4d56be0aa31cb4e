// ============================================================
// Layer 4: Training Pair Sampler
// ============================================================
// BPR needs (positive, negative) pairs that share a user context.
// For every positive article one negative is drawn:
//
//   1. from the negatives with the same user codes, if any
//   2. otherwise from all negatives
//
// The drawn negative's user codes are then overwritten with the
// positive's, so the pair differs only on the post side.
//
// Sampling is seeded and visits positives in input order, so the
// same input and seed always produce the same pairs.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashMap;

use crate::domain::example::ArticleExample;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPair {
    pub positive: ArticleExample,
    pub negative: ArticleExample,
}

pub fn sample_training_pairs(examples: &[ArticleExample], seed: u64) -> Vec<TrainingPair> {
    let negatives: Vec<&ArticleExample> = examples.iter().filter(|e| !e.is_positive()).collect();
    if negatives.is_empty() {
        tracing::warn!("No negative articles: cannot form training pairs");
        return Vec::new();
    }

    let mut by_user: HashMap<&[u32], Vec<&ArticleExample>> = HashMap::new();
    for neg in &negatives {
        by_user.entry(neg.user.as_slice()).or_default().push(*neg);
    }

    let mut rng         = StdRng::seed_from_u64(seed);
    let mut same_user   = 0usize;
    let mut pairs       = Vec::new();

    for positive in examples.iter().filter(|e| e.is_positive()) {
        let pool = match by_user.get(positive.user.as_slice()) {
            Some(pool) => {
                same_user += 1;
                pool.as_slice()
            }
            None => negatives.as_slice(),
        };
        let Some(&drawn) = pool.choose(&mut rng) else { continue };

        let mut negative = drawn.clone();
        negative.user = positive.user.clone();
        pairs.push(TrainingPair { positive: positive.clone(), negative });
    }

    tracing::info!(
        "Sampled {} training pairs ({} with a same-user negative)",
        pairs.len(),
        same_user
    );
    pairs
}
