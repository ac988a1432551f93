use crate::{
    error::AppResult,
    models::{BusinessId, BusinessImage, BusinessRow, Candidate, ImageRow, ReviewCountRow},
    services::catalog::{BusinessCatalog, CandidateFilters},
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

/// Review volume at which a business counts as established for the quality
/// fallback pool. Deliberately coarser than the primary quality floor.
const ESTABLISHED_MIN_REVIEWS: i64 = 10;

// Tied sort keys must not decide which rows fall inside a LIMIT (or which
// image comes first), so every ordered query ends with a unique column: the
// seeded hash on the ranked read, an id everywhere else.

const RANKED_QUERY: &str = r#"
SELECT b.id, b.name, b.subcategory_slug, b.category_slug, b.category_label,
       b.locality, b.verified, s.avg_rating, s.review_count, s.last_review_at
FROM business_ranking r
JOIN businesses b ON b.id = r.business_id
LEFT JOIN business_stats s ON s.business_id = b.id
WHERE r.region = $1 AND b.active = true
ORDER BY r.position ASC, md5($2 || b.id) ASC
LIMIT $3
"#;

const POOL_QUERY: &str = r#"
SELECT b.id, b.name, b.subcategory_slug, b.category_slug, b.category_label,
       b.locality, b.verified, s.avg_rating, s.review_count, s.last_review_at
FROM businesses b
LEFT JOIN business_stats s ON s.business_id = b.id
WHERE b.active = true
  AND ($1::text IS NULL OR b.subcategory_slug = $1 OR b.category_slug = $1)
ORDER BY s.review_count DESC NULLS LAST, b.id ASC
LIMIT $2
"#;

const RECENT_COUNTS_QUERY: &str = r#"
SELECT business_id, COUNT(*) AS recent
FROM reviews
WHERE business_id = ANY($1) AND created_at >= $2
GROUP BY business_id
"#;

const QUALITY_QUERY: &str = r#"
SELECT b.id, b.name, b.subcategory_slug, b.category_slug, b.category_label,
       b.locality, b.verified, s.avg_rating, s.review_count, s.last_review_at
FROM businesses b
LEFT JOIN business_stats s ON s.business_id = b.id
WHERE b.active = true
  AND s.review_count >= $1
  AND NOT (b.id = ANY($2))
ORDER BY s.review_count DESC, s.avg_rating DESC NULLS LAST, b.id ASC
LIMIT $3
"#;

const NEWEST_QUERY: &str = r#"
SELECT b.id, b.name, b.subcategory_slug, b.category_slug, b.category_label,
       b.locality, b.verified, s.avg_rating, s.review_count, s.last_review_at
FROM businesses b
LEFT JOIN business_stats s ON s.business_id = b.id
WHERE b.active = true
  AND ($1::text IS NULL OR b.subcategory_slug = $1 OR b.category_slug = $1)
  AND NOT (b.id = ANY($2))
ORDER BY b.created_at DESC, b.id ASC
LIMIT $3
"#;

const IMAGES_QUERY: &str = r#"
SELECT business_id, url, is_primary
FROM business_images
WHERE business_id = ANY($1)
ORDER BY business_id ASC, is_primary DESC, sort_order ASC, id ASC
"#;

/// sqlx-backed catalog over the platform's business tables.
///
/// Stats live in `business_stats` and may be missing for new businesses,
/// hence the LEFT JOINs; normalization happens in the row-to-candidate
/// conversion, never in SQL.
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_candidates(rows: Vec<BusinessRow>) -> Vec<Candidate> {
    rows.into_iter().map(Candidate::from).collect()
}

fn id_strings(ids: &[BusinessId]) -> Vec<String> {
    ids.iter().map(|id| id.0.clone()).collect()
}

#[async_trait::async_trait]
impl BusinessCatalog for PostgresCatalog {
    /// Reads the precomputed regional ranking. Ties on position break on a
    /// seed-keyed hash so the stored order is deterministic per period. A
    /// missing ranking table reads as an error, which the cascade treats as
    /// "no primary source configured" and falls back to the scoring path.
    async fn fetch_primary_ranked(
        &self,
        region: &str,
        limit: usize,
        seed: &str,
    ) -> AppResult<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, BusinessRow>(RANKED_QUERY)
            .bind(region)
            .bind(seed)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(into_candidates(rows))
    }

    async fn fetch_raw_candidate_pool(
        &self,
        filters: &CandidateFilters,
        pool_size: usize,
    ) -> AppResult<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, BusinessRow>(POOL_QUERY)
            .bind(filters.category.as_deref())
            .bind(pool_size as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(into_candidates(rows))
    }

    async fn fetch_recent_review_counts(
        &self,
        ids: &[BusinessId],
        since: DateTime<Utc>,
    ) -> AppResult<HashMap<BusinessId, u32>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ReviewCountRow>(RECENT_COUNTS_QUERY)
            .bind(id_strings(ids))
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (BusinessId::new(row.business_id), row.recent.max(0) as u32))
            .collect())
    }

    async fn fetch_quality_fallback(
        &self,
        limit: usize,
        exclude: &[BusinessId],
    ) -> AppResult<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, BusinessRow>(QUALITY_QUERY)
            .bind(ESTABLISHED_MIN_REVIEWS)
            .bind(id_strings(exclude))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(into_candidates(rows))
    }

    async fn fetch_newest<'a>(
        &self,
        limit: usize,
        category: Option<&'a str>,
        exclude: &[BusinessId],
    ) -> AppResult<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, BusinessRow>(NEWEST_QUERY)
            .bind(category)
            .bind(id_strings(exclude))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(into_candidates(rows))
    }

    async fn fetch_images(
        &self,
        ids: &[BusinessId],
    ) -> AppResult<HashMap<BusinessId, Vec<BusinessImage>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ImageRow>(IMAGES_QUERY)
            .bind(id_strings(ids))
            .fetch_all(&self.pool)
            .await?;

        let mut images: HashMap<BusinessId, Vec<BusinessImage>> = HashMap::new();
        for row in rows {
            let image = BusinessImage::from(row);
            images
                .entry(image.business_id.clone())
                .or_default()
                .push(image);
        }

        Ok(images)
    }
}
