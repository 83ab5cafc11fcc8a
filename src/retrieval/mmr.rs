//! Maximal Marginal Relevance selection.
//!
//! Greedy: the most similar candidate is taken first, then each round picks the candidate
//! maximizing
//!
//! ```text
//! score = λ · similarity + (1 − λ) · min_{s ∈ selected} distance(candidate, s)
//! ```
//!
//! Ties go to the candidate that appears first in the input. Each round costs
//! `O(|remaining| · |selected|)` distance lookups, which is fine for batches of a few
//! hundred; an incremental per-candidate minimum would be the place to optimize for
//! larger pools.

use tracing::{debug, trace};

use crate::constants::{LAMBDA_BALANCED, LAMBDA_DIVERSE};

use super::entry::CandidateEntry;
use super::error::SelectionError;

/// Selection size and relevance/diversity trade-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionParams {
    k: usize,
    lambda: f32,
}

impl SelectionParams {
    /// Validates `k >= 1` and `lambda ∈ [0, 1]`. Out-of-range lambdas are rejected, not clamped.
    pub fn new(k: usize, lambda: f32) -> Result<Self, SelectionError> {
        if k == 0 {
            return Err(SelectionError::InvalidParameter {
                name: "k",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&lambda) {
            return Err(SelectionError::InvalidParameter {
                name: "lambda",
                reason: format!("{} is outside [0, 1]", lambda),
            });
        }
        Ok(Self { k, lambda })
    }

    /// `lambda = 0.5`, for general questions.
    pub fn balanced(k: usize) -> Result<Self, SelectionError> {
        Self::new(k, LAMBDA_BALANCED)
    }

    /// `lambda = 0.3`, for exhaustive surveys where breadth matters more.
    pub fn diverse(k: usize) -> Result<Self, SelectionError> {
        Self::new(k, LAMBDA_DIVERSE)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn lambda(&self) -> f32 {
        self.lambda
    }
}

/// Ordered selector output.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    entries: Vec<CandidateEntry>,
    exhausted: bool,
}

impl Selection {
    pub fn entries(&self) -> &[CandidateEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CandidateEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when fewer than `k` entries were returned because the pool ran out.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }
}

/// Validates `k` and `lambda`, then runs [`select`].
pub fn select_with(
    entries: Vec<CandidateEntry>,
    k: usize,
    lambda: f32,
) -> Result<Selection, SelectionError> {
    let params = SelectionParams::new(k, lambda)?;
    Ok(select(entries, &params))
}

/// Runs MMR over `entries`.
///
/// An empty batch yields an empty selection. Otherwise the output holds
/// `min(k, entries.len())` entries unless some candidates cannot be scored
/// (unresolvable pairwise distances), in which case selection stops early.
pub fn select(entries: Vec<CandidateEntry>, params: &SelectionParams) -> Selection {
    let k = params.k;
    let lambda = params.lambda;

    if entries.is_empty() {
        return Selection {
            entries: Vec::new(),
            exhausted: true,
        };
    }

    let pool_size = entries.len();
    let mut unselected = entries;
    let mut selected: Vec<CandidateEntry> = Vec::with_capacity(k.min(pool_size));

    let seed = seed_index(&unselected);
    selected.push(unselected.remove(seed));

    while selected.len() < k && !unselected.is_empty() {
        let mut best: Option<(usize, f32)> = None;

        for (i, candidate) in unselected.iter().enumerate() {
            let Some(score) = mmr_score(candidate, &selected, lambda) else {
                trace!(id = %candidate.id, "Candidate has no resolvable distance, skipping");
                continue;
            };

            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        match best {
            Some((i, score)) => {
                trace!(id = %unselected[i].id, score, "MMR pick");
                selected.push(unselected.remove(i));
            }
            None => {
                debug!(
                    remaining = unselected.len(),
                    "No candidate could be scored, stopping selection"
                );
                break;
            }
        }
    }

    let exhausted = selected.len() < k;

    debug!(
        pool_size,
        selected = selected.len(),
        k,
        lambda,
        exhausted,
        "MMR selection complete"
    );

    Selection {
        entries: selected,
        exhausted,
    }
}

/// Index of the most similar entry; the first one wins on ties.
fn seed_index(entries: &[CandidateEntry]) -> usize {
    let mut best = 0;
    for (i, entry) in entries.iter().enumerate().skip(1) {
        if entry.similarity > entries[best].similarity {
            best = i;
        }
    }
    best
}

/// Marginal score of `candidate` against the current selection, `None` if unscorable.
pub fn mmr_score(
    candidate: &CandidateEntry,
    selected: &[CandidateEntry],
    lambda: f32,
) -> Option<f32> {
    let mut min_distance = f32::INFINITY;
    for chosen in selected {
        let d = candidate.pairwise_distance(chosen)?;
        if !d.is_finite() {
            return None;
        }
        min_distance = min_distance.min(d);
    }

    if !min_distance.is_finite() {
        return None;
    }

    let score = lambda * candidate.similarity + (1.0 - lambda) * min_distance;
    score.is_finite().then_some(score)
}
