use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

/// Region key used when the request carries no usable region.
pub const DEFAULT_REGION: &str = "global";

/// How the rotation period is derived from the current time.
///
/// `Month` keys the featured surface: its seed changes on month boundaries.
/// `Bucket` keys the trending surface: its seed changes every N minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodMode {
    Month,
    Bucket { minutes: u32 },
}

/// Formats the period component of the seed for the given instant.
///
/// Month periods render as `YYYY-MM`; bucketed periods render as the UTC
/// bucket-start time (`YYYY-MM-DDTHH:MM`), identical for every instant that
/// falls inside the same bucket.
pub fn period_string(now: DateTime<Utc>, mode: PeriodMode) -> String {
    match mode {
        PeriodMode::Month => now.format("%Y-%m").to_string(),
        PeriodMode::Bucket { minutes } => {
            let step = i64::from(minutes.max(1)) * 60;
            let start = now.timestamp().div_euclid(step) * step;
            let start = Utc.timestamp_opt(start, 0).single().unwrap_or(now);
            start.format("%Y-%m-%dT%H:%M").to_string()
        }
    }
}

/// Normalizes a caller-supplied region to its canonical seed form
/// (trimmed, lower-cased; absent or blank becomes [`DEFAULT_REGION`]).
pub fn normalize_region(region: Option<&str>) -> String {
    region
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Builds the deterministic `{period}:{region}` seed for one request.
///
/// Every request in the same period and region gets the same seed, which keeps
/// ranking order, tie-breaks and ETags stable until the period rolls over.
pub fn build_seed(now: DateTime<Utc>, region: Option<&str>, mode: PeriodMode) -> String {
    format!("{}:{}", period_string(now, mode), normalize_region(region))
}

/// Per-candidate tie-break: lowercase hex SHA-256 of `{seed}:{id}`.
///
/// Must come out identical across processes and restarts, so this hashes with
/// SHA-256 rather than the randomly keyed std hasher.
pub fn tie_break_hash(seed: &str, id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(b":");
    hasher.update(id.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_month_period_format() {
        assert_eq!(
            period_string(at(2026, 8, 26, 9, 30, 0), PeriodMode::Month),
            "2026-08"
        );
        assert_eq!(
            period_string(at(2026, 1, 1, 0, 0, 0), PeriodMode::Month),
            "2026-01"
        );
    }

    #[test]
    fn test_month_period_stable_within_month() {
        let early = period_string(at(2026, 8, 1, 0, 0, 0), PeriodMode::Month);
        let late = period_string(at(2026, 8, 31, 23, 59, 59), PeriodMode::Month);
        assert_eq!(early, late);
    }

    #[test]
    fn test_month_period_changes_across_months() {
        let august = period_string(at(2026, 8, 31, 23, 59, 59), PeriodMode::Month);
        let september = period_string(at(2026, 9, 1, 0, 0, 0), PeriodMode::Month);
        assert_ne!(august, september);
    }

    #[test]
    fn test_bucket_period_truncates_to_bucket_start() {
        let mode = PeriodMode::Bucket { minutes: 60 };
        assert_eq!(
            period_string(at(2026, 8, 26, 9, 47, 12), mode),
            "2026-08-26T09:00"
        );
    }

    #[test]
    fn test_bucket_period_stable_within_bucket() {
        let mode = PeriodMode::Bucket { minutes: 60 };
        let early = period_string(at(2026, 8, 26, 9, 0, 0), mode);
        let late = period_string(at(2026, 8, 26, 9, 59, 59), mode);
        assert_eq!(early, late);
    }

    #[test]
    fn test_bucket_period_changes_across_buckets() {
        let mode = PeriodMode::Bucket { minutes: 60 };
        let nine = period_string(at(2026, 8, 26, 9, 59, 59), mode);
        let ten = period_string(at(2026, 8, 26, 10, 0, 0), mode);
        assert_ne!(nine, ten);
    }

    #[test]
    fn test_bucket_period_respects_minutes() {
        let mode = PeriodMode::Bucket { minutes: 15 };
        assert_eq!(
            period_string(at(2026, 8, 26, 9, 47, 12), mode),
            "2026-08-26T09:45"
        );
    }

    #[test]
    fn test_zero_bucket_minutes_treated_as_one() {
        let mode = PeriodMode::Bucket { minutes: 0 };
        assert_eq!(
            period_string(at(2026, 8, 26, 9, 47, 12), mode),
            "2026-08-26T09:47"
        );
    }

    #[test]
    fn test_normalize_region_defaults_to_global() {
        assert_eq!(normalize_region(None), "global");
        assert_eq!(normalize_region(Some("")), "global");
        assert_eq!(normalize_region(Some("   ")), "global");
    }

    #[test]
    fn test_normalize_region_trims_and_lowercases() {
        assert_eq!(normalize_region(Some("  Portland-OR ")), "portland-or");
        assert_eq!(normalize_region(Some("SEATTLE")), "seattle");
    }

    #[test]
    fn test_build_seed_composition() {
        let seed = build_seed(at(2026, 8, 26, 9, 30, 0), Some("Portland"), PeriodMode::Month);
        assert_eq!(seed, "2026-08:portland");

        let seed = build_seed(at(2026, 8, 26, 9, 30, 0), None, PeriodMode::Month);
        assert_eq!(seed, "2026-08:global");
    }

    #[test]
    fn test_same_seed_for_same_period_and_region() {
        let first = build_seed(at(2026, 8, 3, 8, 0, 0), Some("portland"), PeriodMode::Month);
        let second = build_seed(at(2026, 8, 28, 22, 0, 0), Some("Portland"), PeriodMode::Month);
        assert_eq!(first, second);
    }

    #[test]
    fn test_tie_break_hash_is_deterministic() {
        let a = tie_break_hash("2026-08:global", "biz-001");
        let b = tie_break_hash("2026-08:global", "biz-001");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tie_break_hash_varies_by_id_and_seed() {
        let base = tie_break_hash("2026-08:global", "biz-001");
        assert_ne!(base, tie_break_hash("2026-08:global", "biz-002"));
        assert_ne!(base, tie_break_hash("2026-09:global", "biz-001"));
    }
}
