use crate::models::BusinessId;
use crate::services::scoring::ScoredCandidate;
use std::collections::HashSet;

/// Greedy diversity selection over a ranked pool, carried across fallback
/// tiers so the whole result set honors the same constraints.
///
/// Selection is two-pass per pool: pass one accepts at most one candidate per
/// bucket, pass two refills remaining slots in the same pool order with the
/// bucket constraint dropped. Duplicate IDs are never accepted, in either
/// pass, across any number of pools.
#[derive(Debug)]
pub struct SelectionState {
    limit: usize,
    chosen: Vec<ScoredCandidate>,
    used_ids: HashSet<BusinessId>,
    used_buckets: HashSet<String>,
}

impl SelectionState {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            chosen: Vec::with_capacity(limit),
            used_ids: HashSet::new(),
            used_buckets: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.chosen.len() >= self.limit
    }

    /// Slots still to fill.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.chosen.len())
    }

    /// IDs accepted so far, in acceptance order. Fallback reads pass these as
    /// exclusions so deeper tiers cannot re-fetch already-selected businesses.
    pub fn chosen_ids(&self) -> Vec<BusinessId> {
        self.chosen.iter().map(|s| s.candidate.id.clone()).collect()
    }

    /// Runs both selection passes over one ranked pool. The pool must already
    /// be in rank order; acceptance preserves it (pass-two refills append
    /// after the pass-one winners). Returns how many candidates were accepted.
    pub fn select_from(&mut self, pool: &[ScoredCandidate]) -> usize {
        let before = self.chosen.len();

        for entry in pool {
            if self.is_full() {
                break;
            }
            if self.used_ids.contains(&entry.candidate.id)
                || self.used_buckets.contains(&entry.candidate.bucket)
            {
                continue;
            }
            self.accept(entry);
        }

        for entry in pool {
            if self.is_full() {
                break;
            }
            if self.used_ids.contains(&entry.candidate.id) {
                continue;
            }
            self.accept(entry);
        }

        self.chosen.len() - before
    }

    fn accept(&mut self, entry: &ScoredCandidate) {
        self.used_ids.insert(entry.candidate.id.clone());
        self.used_buckets.insert(entry.candidate.bucket.clone());
        self.chosen.push(entry.clone());
    }

    pub fn into_chosen(self) -> Vec<ScoredCandidate> {
        self.chosen
    }
}
