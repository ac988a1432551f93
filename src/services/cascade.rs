use crate::error::AppResult;
use crate::models::{BusinessId, Candidate};
use crate::services::catalog::{BusinessCatalog, CandidateFilters};
use crate::services::scoring::{
    self, ScoredCandidate, RECENT_WINDOW_LONG_DAYS, RECENT_WINDOW_SHORT_DAYS,
};
use crate::services::selection::SelectionState;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Per-read timeout; a slow catalog read counts as a tier failure.
pub const READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);
/// Recent-count reads chunk their ID lists at this size.
pub const COUNT_BATCH_SIZE: usize = 250;

/// Cascade states, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Quality,
    Newest,
    Done,
}

impl Tier {
    /// Pure transition rule: advance to the next tier only while the
    /// accumulated result is still short of `limit`.
    pub fn next(self, have: usize, limit: usize) -> Tier {
        if have >= limit {
            return Tier::Done;
        }
        match self {
            Tier::Primary => Tier::Quality,
            Tier::Quality => Tier::Newest,
            Tier::Newest | Tier::Done => Tier::Done,
        }
    }
}

/// Which tier produced a selected candidate. Ordered by depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceTier {
    Primary,
    Quality,
    Newest,
}

impl SourceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTier::Primary => "primary",
            SourceTier::Quality => "quality",
            SourceTier::Newest => "newest",
        }
    }
}

/// One selected candidate together with the tier that produced it.
#[derive(Debug, Clone)]
pub struct Selected {
    pub entry: ScoredCandidate,
    pub tier: SourceTier,
}

/// Result of a full cascade run. `selected` is final and ordered; `deepest`
/// is the deepest tier that contributed anything, reported in response
/// metadata.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub selected: Vec<Selected>,
    pub deepest: Option<SourceTier>,
}

impl CascadeOutcome {
    pub fn source_label(&self) -> &'static str {
        self.deepest.map(SourceTier::as_str).unwrap_or("none")
    }
}

/// Three-tier candidate sourcing: primary ranking, quality fallback, newest
/// fallback. Tiers only ever append, a failing tier contributes nothing, and
/// an empty outcome is a valid terminal state rather than an error.
pub struct FallbackCascade {
    catalog: Arc<dyn BusinessCatalog>,
    pool_size: usize,
}

impl FallbackCascade {
    pub fn new(catalog: Arc<dyn BusinessCatalog>, pool_size: usize) -> Self {
        Self { catalog, pool_size }
    }

    /// Runs the cascade for one request. `region` must already be normalized;
    /// `seed` is the period seed the tie-breaks and store-side ordering key
    /// off of.
    pub async fn run(
        &self,
        seed: &str,
        region: &str,
        category: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> CascadeOutcome {
        let mut state = SelectionState::new(limit);
        let mut contributions: Vec<(SourceTier, usize)> = Vec::new();
        let mut tier = Tier::Primary;

        while tier != Tier::Done {
            let (source, added) = match tier {
                Tier::Primary => (
                    SourceTier::Primary,
                    self.run_primary(&mut state, seed, region, category, now).await,
                ),
                Tier::Quality => (
                    SourceTier::Quality,
                    self.run_quality(&mut state, seed, region).await,
                ),
                Tier::Newest => (
                    SourceTier::Newest,
                    self.run_newest(&mut state, seed, region, category).await,
                ),
                Tier::Done => break,
            };
            contributions.push((source, added));
            tier = tier.next(state.len(), limit);
        }

        let deepest = contributions
            .iter()
            .filter(|(_, added)| *added > 0)
            .map(|(source, _)| *source)
            .max();

        let mut chosen = state.into_chosen().into_iter();
        let mut selected = Vec::new();
        for (source, added) in contributions {
            for entry in chosen.by_ref().take(added) {
                selected.push(Selected { entry, tier: source });
            }
        }

        tracing::debug!(
            selected = selected.len(),
            limit = limit,
            source = deepest.map(SourceTier::as_str).unwrap_or("none"),
            "Candidate cascade complete"
        );

        CascadeOutcome { selected, deepest }
    }

    /// Tier A: the precomputed ranked source when one is available, otherwise
    /// the scoring path over the raw pool. A category-narrowed request goes
    /// straight to the scoring path; the ranked source is keyed by region
    /// only.
    async fn run_primary(
        &self,
        state: &mut SelectionState,
        seed: &str,
        region: &str,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> usize {
        if category.is_none() {
            let ranked = self
                .guarded(
                    "primary_ranked",
                    self.catalog.fetch_primary_ranked(region, state.remaining(), seed),
                )
                .await;
            if let Some(rows) = ranked {
                if !rows.is_empty() {
                    // The ranked source's order is authoritative; recent
                    // counts still attach for the momentum term and the
                    // reason tags.
                    let rows = self.attach_recent_counts(rows, now).await;
                    let scored = scoring::score_candidates(rows, seed, region);
                    return state.select_from(&scored);
                }
            }
        }

        let filters = CandidateFilters {
            category: category.map(str::to_string),
        };
        let pool = self
            .guarded(
                "candidate_pool",
                self.catalog.fetch_raw_candidate_pool(&filters, self.pool_size),
            )
            .await;
        let Some(pool) = pool else { return 0 };
        if pool.is_empty() {
            return 0;
        }

        let pool = self.attach_recent_counts(pool, now).await;
        let pool: Vec<Candidate> = pool
            .into_iter()
            .filter(|c| scoring::passes_quality_floor(c, now))
            .collect();

        let mut scored = scoring::score_candidates(pool, seed, region);
        scoring::sort_ranked(&mut scored);
        state.select_from(&scored)
    }

    /// Tier B: well-established businesses for the shortfall. No quality
    /// floor here; this tier exists precisely for pools where the floor
    /// filtered everyone out.
    async fn run_quality(&self, state: &mut SelectionState, seed: &str, region: &str) -> usize {
        let exclude = state.chosen_ids();
        let rows = self
            .guarded(
                "quality_fallback",
                self.catalog.fetch_quality_fallback(state.remaining(), &exclude),
            )
            .await;
        let Some(rows) = rows else { return 0 };

        let mut scored = scoring::score_candidates(rows, seed, region);
        scoring::sort_ranked(&mut scored);
        state.select_from(&scored)
    }

    /// Tier C: newest-onboarded businesses for whatever is still missing.
    async fn run_newest(
        &self,
        state: &mut SelectionState,
        seed: &str,
        region: &str,
        category: Option<&str>,
    ) -> usize {
        let exclude = state.chosen_ids();
        let rows = self
            .guarded(
                "newest",
                self.catalog.fetch_newest(state.remaining(), category, &exclude),
            )
            .await;
        let Some(rows) = rows else { return 0 };

        let mut scored = scoring::score_candidates(rows, seed, region);
        scoring::sort_ranked(&mut scored);
        state.select_from(&scored)
    }

    /// Fills in the 7- and 30-day recent review counts, one batched read per
    /// window. A failed count batch leaves those candidates at zero rather
    /// than failing the tier.
    async fn attach_recent_counts(
        &self,
        pool: Vec<Candidate>,
        now: DateTime<Utc>,
    ) -> Vec<Candidate> {
        let ids: Vec<BusinessId> = pool.iter().map(|c| c.id.clone()).collect();

        let counts_30 = self
            .batched_counts(&ids, now - Duration::days(RECENT_WINDOW_LONG_DAYS))
            .await;
        let counts_7 = self
            .batched_counts(&ids, now - Duration::days(RECENT_WINDOW_SHORT_DAYS))
            .await;

        pool.into_iter()
            .map(|mut candidate| {
                candidate.recent_reviews_30d = counts_30.get(&candidate.id).copied().unwrap_or(0);
                candidate.recent_reviews_7d = counts_7.get(&candidate.id).copied().unwrap_or(0);
                candidate
            })
            .collect()
    }

    async fn batched_counts(
        &self,
        ids: &[BusinessId],
        since: DateTime<Utc>,
    ) -> HashMap<BusinessId, u32> {
        let mut merged = HashMap::new();
        for chunk in ids.chunks(COUNT_BATCH_SIZE) {
            if let Some(counts) = self
                .guarded(
                    "recent_counts",
                    self.catalog.fetch_recent_review_counts(chunk, since),
                )
                .await
            {
                merged.extend(counts);
            }
        }
        merged
    }

    /// Wraps a catalog read with the per-read timeout and absorbs failures.
    /// Errors and timeouts both come back as `None`; the tier simply
    /// contributes nothing.
    async fn guarded<T, F>(&self, read: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(READ_TIMEOUT, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(read = read, error = %e, "Catalog read failed; tier skipped");
                None
            }
            Err(_) => {
                tracing::warn!(
                    read = read,
                    timeout_secs = READ_TIMEOUT.as_secs(),
                    "Catalog read timed out; tier skipped"
                );
                None
            }
        }
    }
}
