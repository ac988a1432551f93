/// Catalog data-source abstraction
///
/// The ranking pipeline only ever reads from the catalog, and it reads
/// through this trait so the cascade can be exercised against mocks and the
/// HTTP layer against stubs. The concrete store lives in [`postgres`].
use crate::{
    error::AppResult,
    models::{BusinessId, BusinessImage, Candidate},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub mod postgres;

/// Filters narrowing the raw candidate pool before scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilters {
    /// Category slug; `None` pulls the pool across all categories.
    pub category: Option<String>,
}

/// Read-only catalog operations the ranking cascade depends on.
///
/// Every method is a pure read. Callers tolerate any of them failing or
/// returning an empty set; a failing read degrades the surface, it never
/// breaks the request.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BusinessCatalog: Send + Sync {
    /// Precomputed engagement-weighted ranking for a region, in stored order.
    /// The `seed` keys the store-side tie-break so the order is stable per
    /// period.
    async fn fetch_primary_ranked(
        &self,
        region: &str,
        limit: usize,
        seed: &str,
    ) -> AppResult<Vec<Candidate>>;

    /// Raw candidate pool for the scoring path, capped at `pool_size`.
    async fn fetch_raw_candidate_pool(
        &self,
        filters: &CandidateFilters,
        pool_size: usize,
    ) -> AppResult<Vec<Candidate>>;

    /// Review counts per business since the given instant. Callers batch the
    /// ID list; absent IDs simply have no entry.
    async fn fetch_recent_review_counts(
        &self,
        ids: &[BusinessId],
        since: DateTime<Utc>,
    ) -> AppResult<HashMap<BusinessId, u32>>;

    /// Well-established businesses for the quality fallback tier, already
    /// excluding the given IDs.
    async fn fetch_quality_fallback(
        &self,
        limit: usize,
        exclude: &[BusinessId],
    ) -> AppResult<Vec<Candidate>>;

    /// Newest-onboarded businesses for the freshness fallback tier.
    async fn fetch_newest<'a>(
        &self,
        limit: usize,
        category: Option<&'a str>,
        exclude: &[BusinessId],
    ) -> AppResult<Vec<Candidate>>;

    /// Display images for exactly the given IDs.
    async fn fetch_images(
        &self,
        ids: &[BusinessId],
    ) -> AppResult<HashMap<BusinessId, Vec<BusinessImage>>>;
}
