//! Per-class target sample counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How many samples each class should contribute to the training set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Keep the current per-class counts.
    KeepOriginal,
    /// Scale every class proportionally to reach exactly `total` samples.
    Proportional {
        /// Requested training set size.
        total: usize,
    },
    /// Give every class the same share of `total` (defaults to current size).
    ClassBalance {
        /// Requested training set size.
        total: Option<usize>,
    },
    /// Scale proportionally, then lift every class to at least `min`.
    MinSamples {
        /// Requested training set size (defaults to current size).
        total: Option<usize>,
        /// Lower bound per class.
        min: usize,
    },
}

impl BalancePolicy {
    /// Choose a policy from sampler options.
    ///
    /// Class balance takes precedence over a minimum, which takes precedence
    /// over a plain target size.
    #[must_use]
    pub fn from_options(
        training_samples: Option<usize>,
        class_balance: bool,
        min_samples: Option<usize>,
    ) -> Self {
        if class_balance {
            Self::ClassBalance {
                total: training_samples,
            }
        } else if let Some(min) = min_samples.filter(|m| *m > 0) {
            Self::MinSamples {
                total: training_samples,
                min,
            }
        } else if let Some(total) = training_samples {
            Self::Proportional { total }
        } else {
            Self::KeepOriginal
        }
    }
}

/// Compute the target count for every class present in `counts`.
///
/// For [`BalancePolicy::Proportional`] the flooring remainder goes to the
/// class with the highest index, so the targets always sum to `total`.
pub fn allocate(
    counts: &BTreeMap<usize, usize>,
    policy: BalancePolicy,
) -> Result<BTreeMap<usize, usize>> {
    if counts.is_empty() {
        return Err(Error::Allocation("no labelled training samples".to_string()));
    }

    let current: usize = counts.values().sum();
    let classes = counts.len();

    let targets = match policy {
        BalancePolicy::KeepOriginal => counts.clone(),
        BalancePolicy::ClassBalance { total } => {
            let share = total.unwrap_or(current) / classes;
            counts.keys().map(|&cat| (cat, share)).collect()
        }
        BalancePolicy::MinSamples { total, min } => {
            proportional(counts, current, total.unwrap_or(current))
                .into_iter()
                .map(|(cat, n)| (cat, n.max(min)))
                .collect()
        }
        BalancePolicy::Proportional { total } => {
            let mut targets = proportional(counts, current, total);
            let assigned: usize = targets.values().sum();
            if let Some((_, last)) = targets.iter_mut().next_back() {
                *last += total.saturating_sub(assigned);
            }
            targets
        }
    };

    Ok(targets)
}

fn proportional(
    counts: &BTreeMap<usize, usize>,
    current: usize,
    total: usize,
) -> BTreeMap<usize, usize> {
    counts
        .iter()
        .map(|(&cat, &n)| {
            let ratio = n as f64 / current as f64;
            (cat, (ratio * total as f64).floor() as usize)
        })
        .collect()
}
