use crate::models::Candidate;
use crate::services::period::{tie_break_hash, DEFAULT_REGION};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// Prior the Bayesian smoothing pulls low-volume ratings toward.
pub const PRIOR_MEAN: f64 = 4.0;
/// Weight of the prior, expressed as phantom review count.
pub const PRIOR_WEIGHT: f64 = 5.0;

/// Relevance weights: smoothed rating, total review volume, recent momentum.
pub const WEIGHT_RATING: f64 = 0.6;
pub const WEIGHT_VOLUME: f64 = 0.2;
pub const WEIGHT_MOMENTUM: f64 = 0.2;

/// Quality floor for the primary scored path.
pub const FLOOR_MIN_RATING: f64 = 4.0;
pub const FLOOR_MIN_REVIEWS: u32 = 5;
pub const MAX_INACTIVE_DAYS: i64 = 180;

/// Recent-review aggregation windows, in days.
pub const RECENT_WINDOW_SHORT_DAYS: i64 = 7;
pub const RECENT_WINDOW_LONG_DAYS: i64 = 30;

/// A candidate with its computed ranking inputs attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
    pub is_local: bool,
    /// Seeded hash, the final comparator key. Rotates with the period seed.
    pub tie_break: String,
}

/// Checks the quality floor: rating ≥ 4.0, at least 5 reviews, and review
/// activity within the last 180 days. Candidates with no recorded activity
/// fail the floor.
pub fn passes_quality_floor(candidate: &Candidate, now: DateTime<Utc>) -> bool {
    if candidate.rating < FLOOR_MIN_RATING || candidate.total_reviews < FLOOR_MIN_REVIEWS {
        return false;
    }
    match candidate.last_activity {
        Some(last) => now.signed_duration_since(last) <= Duration::days(MAX_INACTIVE_DAYS),
        None => false,
    }
}

/// Bayesian-smoothed rating: pulls low-volume ratings toward the prior mean
/// so a single 5-star review cannot outrank an established 4.6 business.
pub fn bayesian_rating(rating: f64, total_reviews: u32) -> f64 {
    let n = f64::from(total_reviews);
    (rating * n + PRIOR_MEAN * PRIOR_WEIGHT) / (n + PRIOR_WEIGHT)
}

/// Composite relevance score: 0.6·smoothed rating + 0.2·ln(1+total reviews)
/// + 0.2·ln(1+reviews in the last 30 days).
pub fn relevance_score(candidate: &Candidate) -> f64 {
    let smoothed = bayesian_rating(candidate.rating, candidate.total_reviews);
    let volume = (1.0 + f64::from(candidate.total_reviews)).ln();
    let momentum = (1.0 + f64::from(candidate.recent_reviews_30d)).ln();
    WEIGHT_RATING * smoothed + WEIGHT_VOLUME * volume + WEIGHT_MOMENTUM * momentum
}

/// Whether a candidate counts as local to the (already normalized) region.
/// The default region matches nothing: without a requested region every
/// candidate ranks on score alone.
fn is_local_to(locality: &str, region: &str) -> bool {
    if region == DEFAULT_REGION {
        return false;
    }
    locality.to_lowercase().contains(region)
}

/// Attaches score, locality flag and seeded tie-break to every candidate.
/// Performs no filtering; the quality floor is the caller's concern.
pub fn score_candidates(pool: Vec<Candidate>, seed: &str, region: &str) -> Vec<ScoredCandidate> {
    pool.into_iter()
        .map(|candidate| {
            let tie_break = tie_break_hash(seed, candidate.id.as_str());
            let is_local = is_local_to(&candidate.locality, region);
            let score = relevance_score(&candidate);
            ScoredCandidate {
                score,
                is_local,
                tie_break,
                candidate,
            }
        })
        .collect()
}

/// The one total order every ranked pool uses: local first, then score,
/// then review volume, then most recent activity (missing activity last),
/// then the seeded tie-break. Total over f64 via `total_cmp`.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.is_local
        .cmp(&a.is_local)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| b.candidate.total_reviews.cmp(&a.candidate.total_reviews))
        .then_with(|| b.candidate.last_activity.cmp(&a.candidate.last_activity))
        .then_with(|| a.tie_break.cmp(&b.tie_break))
}

/// Sorts a scored pool into the standard rank order.
pub fn sort_ranked(pool: &mut [ScoredCandidate]) {
    pool.sort_by(rank_order);
}
