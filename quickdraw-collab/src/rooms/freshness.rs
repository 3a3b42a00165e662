use chrono::{DateTime, Utc};

/// The outcome of a polled read.
///
/// `NotModified` is not a failure, the caller already has the latest state.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness<T> {
    Modified(T),
    NotModified,
}

impl<T> Freshness<T> {
    /// Returns `Modified` only if `updated_at` is strictly after the watermark
    pub fn check(value: T, updated_at: DateTime<Utc>, watermark: DateTime<Utc>) -> Self {
        if updated_at > watermark {
            Self::Modified(value)
        } else {
            Self::NotModified
        }
    }

    pub fn modified(self) -> Option<T> {
        match self {
            Self::Modified(value) => Some(value),
            Self::NotModified => None,
        }
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, Self::Modified(_))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_freshness_boundaries() {
        let updated_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let before = Freshness::check((), updated_at, updated_at - Duration::seconds(1));
        let equal = Freshness::check((), updated_at, updated_at);
        let after = Freshness::check((), updated_at, updated_at + Duration::seconds(1));

        assert!(before.is_modified());
        assert_eq!(equal, Freshness::NotModified);
        assert_eq!(after, Freshness::NotModified);
    }
}
