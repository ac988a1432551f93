use crate::services::cascade::Selected;
use sha2::{Digest, Sha256};

/// HTTP cache directives for one surface. Short positive freshness with a
/// longer stale-while-revalidate window, so ranking recomputation amortizes
/// across a period without ever blocking a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age_secs: u32,
    pub stale_while_revalidate_secs: u32,
}

impl CachePolicy {
    pub const FEATURED: CachePolicy = CachePolicy {
        max_age_secs: 300,
        stale_while_revalidate_secs: 3600,
    };

    pub const TRENDING: CachePolicy = CachePolicy {
        max_age_secs: 60,
        stale_while_revalidate_secs: 600,
    };

    pub fn cache_control(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

/// Strong ETag over the seed and the selected set, in order.
///
/// Hashes `id:score:total_reviews:last_activity` per candidate with the score
/// at fixed 4-decimal precision, so the tag is bytewise stable for as long as
/// the seed and the underlying data hold still.
pub fn compute_etag(seed: &str, selected: &[Selected]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    for s in selected {
        let candidate = &s.entry.candidate;
        let last_activity = candidate
            .last_activity
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        hasher.update(
            format!(
                "|{}:{:.4}:{}:{}",
                candidate.id, s.entry.score, candidate.total_reviews, last_activity
            )
            .as_bytes(),
        );
    }
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Whether a conditional request matches the current ETag. Accepts a single
/// tag, a comma-separated list, the `*` wildcard, and weak `W/` prefixes.
pub fn if_none_match_satisfied(header: Option<&str>, etag: &str) -> bool {
    let Some(header) = header else { return false };
    header
        .split(',')
        .map(str::trim)
        .map(|tag| tag.strip_prefix("W/").unwrap_or(tag))
        .any(|tag| tag == "*" || tag == etag)
}
