// ============================================================
// Layer 4: Train/Validation Splitter
// ============================================================
// Shuffles encoded articles and splits them into two sets:
//   - Training set:   sampled into (positive, negative) pairs
//   - Validation set: scored article by article for metrics
//
// The shuffle is seeded (default 42) so a `train` run and a
// later `eval` run over the same file see the same validation
// articles. Default ratio: 90% training, 10% validation.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Shuffle `samples` with a seeded RNG and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1]; the same seed always
/// produces the same split.
pub fn split_train_val<T>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    seed:           u64,
) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        samples.len(),
        val.len(),
        seed,
    );

    (samples, val)
}
