use crate::metadata_store::FieldValue;
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_FRESHNESS_DAYS: i64 = 30;

/// Decides whether stored metadata is recent enough to skip provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    window: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_days(DEFAULT_FRESHNESS_DAYS)
    }
}

impl FreshnessPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_days(days: i64) -> Self {
        Self::new(Duration::days(days))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// A missing or blank value is never fresh.
    pub fn is_fresh(&self, field: Option<&FieldValue>, now: DateTime<Utc>) -> bool {
        match field {
            Some(field) if !field.value.trim().is_empty() => field.updated_at >= now - self.window,
            _ => false,
        }
    }

    /// True when the whole entity can be skipped: not forced and every target
    /// field is fresh.
    pub fn should_skip(
        &self,
        force_refresh: bool,
        fields: &[Option<&FieldValue>],
        now: DateTime<Utc>,
    ) -> bool {
        !force_refresh && fields.iter().all(|f| self.is_fresh(*f, now))
    }

    /// Cut-off for pending-list queries; values written before it are stale.
    pub fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }
}
