//! Stratified train/held-out splitting.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::dataset::Sample;

/// Split samples into `(rest, held_out)` preserving per-category proportions.
///
/// Each category bucket holds out `round(n * fraction)` samples, at least one
/// when the bucket has two or more samples and never the whole bucket.
/// Unlabeled samples form their own bucket.
pub fn stratified_split<R: Rng + ?Sized>(
    samples: Vec<Sample>,
    fraction: f64,
    rng: &mut R,
) -> (Vec<Sample>, Vec<Sample>) {
    let fraction = fraction.clamp(0.0, 1.0);

    let mut buckets: BTreeMap<Option<usize>, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        buckets.entry(sample.category).or_default().push(sample);
    }

    let mut rest = Vec::new();
    let mut held_out = Vec::new();

    for (_, mut bucket) in buckets {
        bucket.shuffle(rng);
        let n = bucket.len();
        let take = held_out_count(n, fraction);
        let remaining = bucket.split_off(take);
        held_out.extend(bucket);
        rest.extend(remaining);
    }

    rest.shuffle(rng);
    held_out.shuffle(rng);
    (rest, held_out)
}

fn held_out_count(n: usize, fraction: f64) -> usize {
    if n < 2 || fraction <= 0.0 {
        return 0;
    }
    let wanted = (n as f64 * fraction).round() as usize;
    wanted.clamp(1, n - 1)
}
