use crate::cached;
use crate::db::redis::{Cache, CacheKey};
use crate::error::AppResult;
use crate::models::{SurfaceMeta, SurfaceResponse};
use crate::services::assembler::ResponseAssembler;
use crate::services::cascade::FallbackCascade;
use crate::services::catalog::BusinessCatalog;
use crate::services::http_cache::{self, CachePolicy};
use crate::services::period::{self, PeriodMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// The two recommendation surfaces. They share the whole pipeline and differ
/// only in period mode and cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Featured,
    Trending,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Featured => "featured",
            Surface::Trending => "trending",
        }
    }

    pub fn cache_policy(self) -> CachePolicy {
        match self {
            Surface::Featured => CachePolicy::FEATURED,
            Surface::Trending => CachePolicy::TRENDING,
        }
    }

    /// Name of the debug header carrying the period.
    pub fn period_header(self) -> &'static str {
        match self {
            Surface::Featured => "X-Featured-Period",
            Surface::Trending => "X-Trending-Period",
        }
    }

    fn period_mode(self, bucket_minutes: u32) -> PeriodMode {
        match self {
            Surface::Featured => PeriodMode::Month,
            Surface::Trending => PeriodMode::Bucket {
                minutes: bucket_minutes,
            },
        }
    }
}

/// Assembled response plus the validator computed for it. This is what the
/// server-side cache stores, so a cache hit can still answer conditional
/// requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfacePayload {
    pub response: SurfaceResponse,
    pub etag: String,
}

/// Per-request pipeline for both surfaces: derive the period seed, consult
/// the response cache, run the cascade, enrich, and compute the validator.
pub struct SurfaceService {
    cascade: FallbackCascade,
    assembler: ResponseAssembler,
    cache: Cache,
    bucket_minutes: u32,
}

impl SurfaceService {
    pub fn new(
        catalog: Arc<dyn BusinessCatalog>,
        cache: Cache,
        pool_size: usize,
        bucket_minutes: u32,
    ) -> Self {
        Self {
            cascade: FallbackCascade::new(catalog.clone(), pool_size),
            assembler: ResponseAssembler::new(catalog),
            cache,
            bucket_minutes,
        }
    }

    /// Builds the payload for one request, serving from the response cache
    /// when possible. `limit` must already be clamped by the caller.
    pub async fn build(
        &self,
        surface: Surface,
        limit: usize,
        region: Option<&str>,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<SurfacePayload> {
        let mode = surface.period_mode(self.bucket_minutes);
        let seed = period::build_seed(now, region, mode);
        let region = period::normalize_region(region);
        let category = normalize_category(category);

        let key = CacheKey::Surface {
            surface: surface.as_str(),
            seed: seed.clone(),
            category: category.clone(),
            limit,
        };
        let ttl = u64::from(surface.cache_policy().max_age_secs);

        cached!(
            self.cache,
            key,
            ttl,
            self.compute(surface, limit, &seed, &region, category.as_deref(), now)
        )
    }

    async fn compute(
        &self,
        surface: Surface,
        limit: usize,
        seed: &str,
        region: &str,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<SurfacePayload> {
        let started = Instant::now();
        let period = period::period_string(now, surface.period_mode(self.bucket_minutes));

        let outcome = self.cascade.run(seed, region, category, limit, now).await;
        let data = self.assembler.assemble(&outcome.selected).await;
        let etag = http_cache::compute_etag(seed, &outcome.selected);

        let count = data.len();
        let response = SurfaceResponse {
            data,
            meta: SurfaceMeta {
                period,
                generated_at: now,
                seed: seed.to_string(),
                source: outcome.source_label().to_string(),
                count,
            },
        };

        tracing::info!(
            surface = surface.as_str(),
            count = count,
            source = outcome.source_label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Surface payload assembled"
        );

        Ok(SurfacePayload { response, etag })
    }
}

fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase)
}
