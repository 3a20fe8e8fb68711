//! Class balancing by random undersampling of the majority class.

use aw_types::{AwResult, DataError, Dataset};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Keep every positive row plus an equal number of randomly chosen
/// negatives, then shuffle the result.
///
/// If negatives are already the minority, all rows are kept.
pub fn undersample(dataset: &Dataset, seed: u64) -> AwResult<Dataset> {
    let (mut negatives, positives) = dataset.class_indices();
    if positives.is_empty() {
        return Err(DataError::SingleClass { class: 0 }.into());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    negatives.shuffle(&mut rng);
    negatives.truncate(positives.len());

    let mut rows: Vec<usize> = positives.iter().chain(&negatives).copied().collect();
    rows.shuffle(&mut rng);

    tracing::info!(
        rows_before = dataset.n_samples(),
        rows_after = rows.len(),
        positives = positives.len(),
        "undersampled majority class"
    );
    Ok(dataset.select_rows(&rows))
}
