// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles the training samples and holds out a fraction for
// per-epoch validation. The test split is never touched here;
// it is only used after training has picked its best epoch.
//
// The shuffle is seeded so that two runs with the same seed
// hold out the same images, which keeps best-epoch selection
// comparable between a StandardConv run and the FALCON run
// warm started from it.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1]; the split index is rounded.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let split_at = split_at.min(total);

    // split_off(n) leaves [0..n) in `samples` and returns [n..total)
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}
