// Usage Ledger
// Day buckets per (user, feature); weekly totals sum the Monday..Sunday buckets

use chrono::{Datelike, Duration, NaiveDate};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Ceiling, FeatureKind, UsageKey, UsageWindow};
use crate::services::clock::Clock;
use crate::store::{DateSpan, Store, StoreError};

/// Monday..Sunday week containing `day`
pub fn week_bounds(day: NaiveDate) -> DateSpan {
    let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
    DateSpan::new(monday, monday + Duration::days(6))
}

/// Counting window of `feature` that contains `day`
pub fn window_for(feature: FeatureKind, day: NaiveDate) -> DateSpan {
    match feature.window() {
        UsageWindow::Daily => DateSpan::single(day),
        UsageWindow::Weekly => week_bounds(day),
    }
}

pub struct UsageLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Count in a single day bucket, 0 when the bucket does not exist
    pub async fn daily_usage(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        day: NaiveDate,
    ) -> Result<u32, StoreError> {
        self.store
            .usage_between(user_id, feature, DateSpan::single(day))
            .await
    }

    /// Sum over the Monday-anchored week containing `week_anchor`
    pub async fn weekly_usage(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        week_anchor: NaiveDate,
    ) -> Result<u32, StoreError> {
        self.store
            .usage_between(user_id, feature, week_bounds(week_anchor))
            .await
    }

    /// Usage in the feature's own window around `day`
    pub async fn usage_in_window(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        day: NaiveDate,
    ) -> Result<u32, StoreError> {
        match feature.window() {
            UsageWindow::Daily => self.daily_usage(user_id, feature, day).await,
            UsageWindow::Weekly => self.weekly_usage(user_id, feature, day).await,
        }
    }

    /// +1 on the day bucket. Every call is one consumed unit.
    pub async fn record(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        day: NaiveDate,
    ) -> Result<u32, StoreError> {
        self.store
            .increment_usage(UsageKey::new(user_id, feature, day), self.clock.now())
            .await
    }

    /// +1 on the day bucket only if the window total stays within `ceiling`.
    /// Returns the new window total, `None` when denied.
    pub async fn record_within(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        day: NaiveDate,
        ceiling: Ceiling,
    ) -> Result<Option<u32>, StoreError> {
        self.store
            .increment_usage_within(
                UsageKey::new(user_id, feature, day),
                window_for(feature, day),
                ceiling,
                self.clock.now(),
            )
            .await
    }
}
