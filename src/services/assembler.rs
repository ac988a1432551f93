use crate::models::{BusinessCard, BusinessId, BusinessImage, Candidate, Reason};
use crate::services::cascade::{Selected, READ_TIMEOUT};
use crate::services::catalog::BusinessCatalog;
use std::collections::HashMap;
use std::sync::Arc;

/// Reason-tag thresholds, checked in priority order.
pub const REASON_RISING_MIN_RECENT: u32 = 5;
pub const REASON_FAVORITE_MIN_TOTAL: u32 = 50;
pub const REASON_TOP_RATED_MIN_RATING: f64 = 4.7;

/// Turns the cascade's selection into display-ready cards: batch image
/// lookup, badge, and a human-readable reason per business. Position-stable;
/// enrichment never reorders the selection.
pub struct ResponseAssembler {
    catalog: Arc<dyn BusinessCatalog>,
}

impl ResponseAssembler {
    pub fn new(catalog: Arc<dyn BusinessCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn assemble(&self, selected: &[Selected]) -> Vec<BusinessCard> {
        if selected.is_empty() {
            return Vec::new();
        }

        let ids: Vec<BusinessId> = selected
            .iter()
            .map(|s| s.entry.candidate.id.clone())
            .collect();

        // A failed or slow image read degrades to imageless cards; the
        // presentation layer resolves category placeholders.
        let images = match tokio::time::timeout(READ_TIMEOUT, self.catalog.fetch_images(&ids)).await
        {
            Ok(Ok(images)) => images,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Image fetch failed; serving cards without images");
                HashMap::new()
            }
            Err(_) => {
                tracing::warn!("Image fetch timed out; serving cards without images");
                HashMap::new()
            }
        };

        selected
            .iter()
            .map(|s| {
                let candidate = &s.entry.candidate;
                BusinessCard {
                    id: candidate.id.clone(),
                    name: candidate.name.clone(),
                    image_url: images
                        .get(&candidate.id)
                        .and_then(|list| pick_image(list)),
                    category: candidate.category_label.clone(),
                    rating: candidate.rating,
                    review_count: candidate.total_reviews,
                    badge: candidate.verified.then(|| "verified".to_string()),
                    reason: derive_reason(candidate),
                }
            })
            .collect()
    }
}

/// Primary image preferred, else the first available.
fn pick_image(images: &[BusinessImage]) -> Option<String> {
    images
        .iter()
        .find(|img| img.is_primary)
        .or_else(|| images.first())
        .map(|img| img.url.clone())
}

/// Fixed-priority reason tag: recent momentum first, then community volume,
/// then rating, with "Featured pick" as the catch-all.
pub fn derive_reason(candidate: &Candidate) -> Reason {
    if candidate.recent_reviews_30d >= REASON_RISING_MIN_RECENT {
        Reason {
            label: "Rising this month".to_string(),
            metric: "recent_reviews_30d".to_string(),
            value: f64::from(candidate.recent_reviews_30d),
        }
    } else if candidate.total_reviews >= REASON_FAVORITE_MIN_TOTAL {
        Reason {
            label: "Community favorite".to_string(),
            metric: "total_reviews".to_string(),
            value: f64::from(candidate.total_reviews),
        }
    } else if candidate.rating >= REASON_TOP_RATED_MIN_RATING {
        Reason {
            label: "Top rated".to_string(),
            metric: "rating".to_string(),
            value: candidate.rating,
        }
    } else {
        Reason {
            label: "Featured pick".to_string(),
            metric: "rating".to_string(),
            value: candidate.rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::cascade::SourceTier;
    use crate::services::catalog::MockBusinessCatalog;
    use crate::services::scoring::ScoredCandidate;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: BusinessId::new(id),
            name: format!("Business {}", id),
            bucket: "bakeries".to_string(),
            category_label: "Bakeries".to_string(),
            rating: 4.2,
            total_reviews: 12,
            recent_reviews_7d: 0,
            recent_reviews_30d: 0,
            last_activity: None,
            verified: false,
            locality: String::new(),
        }
    }

    fn selected(candidate: Candidate) -> Selected {
        Selected {
            entry: ScoredCandidate {
                score: 4.0,
                is_local: false,
                tie_break: candidate.id.0.clone(),
                candidate,
            },
            tier: SourceTier::Primary,
        }
    }

    fn image(id: &str, url: &str, is_primary: bool) -> BusinessImage {
        BusinessImage {
            business_id: BusinessId::new(id),
            url: url.to_string(),
            is_primary,
        }
    }

    #[test]
    fn test_reason_priority_rising_first() {
        let mut c = candidate("a");
        c.recent_reviews_30d = 5;
        c.total_reviews = 200;
        c.rating = 4.9;

        let reason = derive_reason(&c);
        assert_eq!(reason.label, "Rising this month");
        assert_eq!(reason.metric, "recent_reviews_30d");
        assert_eq!(reason.value, 5.0);
    }

    #[test]
    fn test_reason_community_favorite() {
        let mut c = candidate("a");
        c.recent_reviews_30d = 4;
        c.total_reviews = 50;
        c.rating = 4.9;

        let reason = derive_reason(&c);
        assert_eq!(reason.label, "Community favorite");
        assert_eq!(reason.value, 50.0);
    }

    #[test]
    fn test_reason_top_rated() {
        let mut c = candidate("a");
        c.total_reviews = 20;
        c.rating = 4.7;

        let reason = derive_reason(&c);
        assert_eq!(reason.label, "Top rated");
        assert_eq!(reason.metric, "rating");
    }

    #[test]
    fn test_reason_default_featured_pick() {
        let reason = derive_reason(&candidate("a"));
        assert_eq!(reason.label, "Featured pick");
        assert_eq!(reason.metric, "rating");
    }

    #[test]
    fn test_pick_image_prefers_primary() {
        let images = vec![
            image("a", "https://img.example/1.jpg", false),
            image("a", "https://img.example/2.jpg", true),
        ];
        assert_eq!(pick_image(&images).as_deref(), Some("https://img.example/2.jpg"));
    }

    #[test]
    fn test_pick_image_falls_back_to_first() {
        let images = vec![
            image("a", "https://img.example/1.jpg", false),
            image("a", "https://img.example/2.jpg", false),
        ];
        assert_eq!(pick_image(&images).as_deref(), Some("https://img.example/1.jpg"));
    }

    #[test]
    fn test_pick_image_none_when_empty() {
        assert_eq!(pick_image(&[]), None);
    }

    #[tokio::test]
    async fn test_assemble_preserves_order_and_attaches_images() {
        let mut mock = MockBusinessCatalog::new();
        mock.expect_fetch_images()
            .times(1)
            .withf(|ids| ids.len() == 2)
            .returning(|_| {
                let mut images = HashMap::new();
                images.insert(
                    BusinessId::new("b"),
                    vec![image("b", "https://img.example/b.jpg", true)],
                );
                Ok(images)
            });

        let assembler = ResponseAssembler::new(Arc::new(mock));
        let cards = assembler
            .assemble(&[selected(candidate("a")), selected(candidate("b"))])
            .await;

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id, BusinessId::new("a"));
        assert_eq!(cards[0].image_url, None);
        assert_eq!(cards[1].id, BusinessId::new("b"));
        assert_eq!(cards[1].image_url.as_deref(), Some("https://img.example/b.jpg"));
    }

    #[tokio::test]
    async fn test_assemble_survives_image_fetch_failure() {
        let mut mock = MockBusinessCatalog::new();
        mock.expect_fetch_images()
            .times(1)
            .returning(|_| Err(AppError::Database(sqlx::Error::PoolClosed)));

        let assembler = ResponseAssembler::new(Arc::new(mock));
        let cards = assembler.assemble(&[selected(candidate("a"))]).await;

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].image_url, None);
    }

    #[tokio::test]
    async fn test_assemble_empty_selection_skips_fetch() {
        let mut mock = MockBusinessCatalog::new();
        mock.expect_fetch_images().times(0);

        let assembler = ResponseAssembler::new(Arc::new(mock));
        let cards = assembler.assemble(&[]).await;
        assert!(cards.is_empty());
    }

    #[tokio::test]
    async fn test_verified_candidate_gets_badge() {
        let mut mock = MockBusinessCatalog::new();
        mock.expect_fetch_images().returning(|_| Ok(HashMap::new()));

        let mut c = candidate("a");
        c.verified = true;

        let assembler = ResponseAssembler::new(Arc::new(mock));
        let cards = assembler.assemble(&[selected(c)]).await;

        assert_eq!(cards[0].badge.as_deref(), Some("verified"));
    }
}
