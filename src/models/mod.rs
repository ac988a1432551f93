use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Bucket key used when a business has neither a subcategory nor a category slug.
pub const FALLBACK_BUCKET: &str = "miscellaneous";

/// Opaque business identifier (slug-style, assigned by the catalog)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessId(pub String);

impl BusinessId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BusinessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Raw catalog rows
// ============================================================================

/// Raw business row as stored in the catalog.
///
/// Stats columns are nullable because new businesses may not have a stats row
/// yet. This is the only shape in which missing catalog data is visible; the
/// ranking pipeline works exclusively on the normalized [`Candidate`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BusinessRow {
    pub id: String,
    pub name: String,
    pub subcategory_slug: Option<String>,
    pub category_slug: Option<String>,
    pub category_label: Option<String>,
    pub locality: Option<String>,
    pub verified: Option<bool>,
    pub avg_rating: Option<f64>,
    pub review_count: Option<i64>,
    pub last_review_at: Option<DateTime<Utc>>,
}

/// Raw image row from the catalog
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImageRow {
    pub business_id: String,
    pub url: String,
    pub is_primary: bool,
}

/// Raw per-business review count row (recent-window aggregation)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewCountRow {
    pub business_id: String,
    pub recent: i64,
}

// ============================================================================
// Normalized engine types
// ============================================================================

/// A business eligible for ranking, with all fields normalized.
///
/// Invariants established by [`Candidate::from`]: `bucket` is non-empty,
/// lower-cased and trimmed; `rating` is clamped to 0.0..=5.0; counts are
/// non-negative. Recent-window counts start at zero and are filled in from a
/// separate aggregation read.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: BusinessId,
    pub name: String,
    pub bucket: String,
    pub category_label: String,
    pub rating: f64,
    pub total_reviews: u32,
    pub recent_reviews_7d: u32,
    pub recent_reviews_30d: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub verified: bool,
    pub locality: String,
}

/// Collapses the subcategory → category → "miscellaneous" fallback chain into
/// a single non-empty, lower-cased bucket key.
fn normalize_bucket(subcategory: Option<&str>, category: Option<&str>) -> String {
    subcategory
        .into_iter()
        .chain(category)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| FALLBACK_BUCKET.to_string())
}

/// Title-cases a slug ("coffee-shops" → "Coffee Shops") for display when the
/// catalog has no explicit label.
fn label_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl From<BusinessRow> for Candidate {
    fn from(row: BusinessRow) -> Self {
        let bucket = normalize_bucket(row.subcategory_slug.as_deref(), row.category_slug.as_deref());

        let category_label = row
            .category_label
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| label_from_slug(&bucket));

        Candidate {
            id: BusinessId::new(row.id),
            name: row.name,
            bucket,
            category_label,
            rating: row.avg_rating.unwrap_or(0.0).clamp(0.0, 5.0),
            total_reviews: row.review_count.unwrap_or(0).max(0) as u32,
            recent_reviews_7d: 0,
            recent_reviews_30d: 0,
            last_activity: row.last_review_at,
            verified: row.verified.unwrap_or(false),
            locality: row.locality.unwrap_or_default().trim().to_string(),
        }
    }
}

/// Display image for a business card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessImage {
    pub business_id: BusinessId,
    pub url: String,
    pub is_primary: bool,
}

impl From<ImageRow> for BusinessImage {
    fn from(row: ImageRow) -> Self {
        BusinessImage {
            business_id: BusinessId::new(row.business_id),
            url: row.url,
            is_primary: row.is_primary,
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Human-readable explanation of why a business was surfaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub label: String,
    pub metric: String,
    pub value: f64,
}

/// One enriched business card as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCard {
    pub id: BusinessId,
    pub name: String,
    pub image_url: Option<String>,
    pub category: String,
    pub rating: f64,
    pub review_count: u32,
    pub badge: Option<String>,
    pub reason: Reason,
}

/// Response metadata for one surface request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceMeta {
    pub period: String,
    pub generated_at: DateTime<Utc>,
    pub seed: String,
    pub source: String,
    pub count: usize,
}

/// Full payload of the featured/trending endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceResponse {
    pub data: Vec<BusinessCard>,
    pub meta: SurfaceMeta,
}
