use std::collections::HashMap;
use std::sync::Arc;

use axum_test::TestServer;
use chrono::{DateTime, Duration, Utc};

use localspot_api::{
    config::Config,
    db::{create_redis_client, Cache},
    error::AppResult,
    models::{BusinessId, BusinessImage, Candidate},
    routes::{create_router, AppState},
    services::{
        catalog::{BusinessCatalog, CandidateFilters},
        surface::SurfaceService,
    },
};

/// Guard returned alongside the server; dropping it early would stop the
/// cache writer task mid-test.
pub type CacheWriterGuard = localspot_api::db::redis::CacheWriterHandle;

/// In-memory catalog backing the API tests.
///
/// Each field is one catalog read, returned as-is after applying the same
/// limit, category, and exclusion parameters the SQL queries would.
#[derive(Default)]
pub struct StubCatalog {
    pub ranked: Vec<Candidate>,
    pub pool: Vec<Candidate>,
    pub quality: Vec<Candidate>,
    pub newest: Vec<Candidate>,
    pub recent_30d: HashMap<BusinessId, u32>,
    pub recent_7d: HashMap<BusinessId, u32>,
    pub images: HashMap<BusinessId, Vec<BusinessImage>>,
}

#[async_trait::async_trait]
impl BusinessCatalog for StubCatalog {
    async fn fetch_primary_ranked(
        &self,
        _region: &str,
        limit: usize,
        _seed: &str,
    ) -> AppResult<Vec<Candidate>> {
        Ok(self.ranked.iter().take(limit).cloned().collect())
    }

    async fn fetch_raw_candidate_pool(
        &self,
        filters: &CandidateFilters,
        pool_size: usize,
    ) -> AppResult<Vec<Candidate>> {
        Ok(self
            .pool
            .iter()
            .filter(|c| match filters.category.as_deref() {
                Some(category) => c.bucket == category,
                None => true,
            })
            .take(pool_size)
            .cloned()
            .collect())
    }

    async fn fetch_recent_review_counts(
        &self,
        ids: &[BusinessId],
        since: DateTime<Utc>,
    ) -> AppResult<HashMap<BusinessId, u32>> {
        // The window length tells the two reads apart.
        let window_days = (Utc::now() - since).num_days();
        let counts = if window_days > 20 {
            &self.recent_30d
        } else {
            &self.recent_7d
        };
        Ok(ids
            .iter()
            .filter_map(|id| counts.get(id).map(|n| (id.clone(), *n)))
            .collect())
    }

    async fn fetch_quality_fallback(
        &self,
        limit: usize,
        exclude: &[BusinessId],
    ) -> AppResult<Vec<Candidate>> {
        Ok(self
            .quality
            .iter()
            .filter(|c| !exclude.contains(&c.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_newest<'a>(
        &self,
        limit: usize,
        category: Option<&'a str>,
        exclude: &[BusinessId],
    ) -> AppResult<Vec<Candidate>> {
        Ok(self
            .newest
            .iter()
            .filter(|c| !exclude.contains(&c.id))
            .filter(|c| match category {
                Some(category) => c.bucket == category,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_images(
        &self,
        ids: &[BusinessId],
    ) -> AppResult<HashMap<BusinessId, Vec<BusinessImage>>> {
        Ok(self
            .images
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(id, list)| (id.clone(), list.clone()))
            .collect())
    }
}

/// An active business with recent reviews, eligible everywhere.
pub fn candidate(id: &str, bucket: &str, rating: f64, total: u32) -> Candidate {
    Candidate {
        id: BusinessId::new(id),
        name: format!("Business {}", id),
        bucket: bucket.to_string(),
        category_label: bucket.to_string(),
        rating,
        total_reviews: total,
        recent_reviews_7d: 0,
        recent_reviews_30d: 0,
        last_activity: Some(Utc::now() - Duration::days(3)),
        verified: false,
        locality: "Portland, OR".to_string(),
    }
}

/// Spins up the full router over the stub catalog. Redis points at a closed
/// port, so every request runs the whole pipeline.
pub async fn server_with(catalog: StubCatalog) -> (TestServer, CacheWriterGuard) {
    let client = create_redis_client("redis://127.0.0.1:1").unwrap();
    let (cache, writer) = Cache::new(client).await;

    let config = Config::default();
    let surface_service = SurfaceService::new(
        Arc::new(catalog),
        cache,
        config.candidate_pool_size,
        config.trending_bucket_minutes,
    );

    let server = TestServer::new(create_router(AppState {
        surface_service,
        config,
    }))
    .unwrap();

    (server, writer)
}
