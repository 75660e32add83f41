// Usage Ledger windows: calendar-day buckets and Monday-anchored weeks

mod common;

use std::sync::Arc;

use aspirant_backend_core::{
    models::FeatureKind,
    services::{usage_ledger::week_bounds, Clock, UsageLedger},
    store::Store,
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use common::{at_time, setup_test_app_at};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_week_bounds_are_monday_to_sunday() {
    // 2024-01-07 is a Sunday
    let span = week_bounds(date(2024, 1, 7));
    assert_eq!(span.from, date(2024, 1, 1));
    assert_eq!(span.to, date(2024, 1, 7));
    assert_eq!(span.from.weekday(), Weekday::Mon);

    let span = week_bounds(date(2024, 1, 8));
    assert_eq!(span.from, date(2024, 1, 8));
    assert_eq!(span.to, date(2024, 1, 14));
}

#[tokio::test]
async fn test_sunday_usage_drops_out_on_monday() {
    // Sunday 2024-01-07, late evening
    let app = setup_test_app_at(at_time(2024, 1, 7, 22, 30));
    let user = app.create_user("sunday").await;
    let ledger = UsageLedger::new(app.store.clone() as Arc<dyn Store>, app.clock.clone());

    ledger
        .record(user.id, FeatureKind::MockTest, app.clock.today())
        .await
        .unwrap();

    assert_eq!(
        ledger
            .weekly_usage(user.id, FeatureKind::MockTest, app.clock.today())
            .await
            .unwrap(),
        1
    );

    // Monday 2024-01-08: new week, counter starts over
    app.clock.advance(Duration::hours(2));
    assert_eq!(app.clock.today(), date(2024, 1, 8));
    assert_eq!(
        ledger
            .weekly_usage(user.id, FeatureKind::MockTest, app.clock.today())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_weekly_total_sums_every_day_of_the_week() {
    let app = setup_test_app_at(at_time(2024, 1, 1, 8, 0));
    let user = app.create_user("weekly").await;
    let ledger = UsageLedger::new(app.store.clone() as Arc<dyn Store>, app.clock.clone());

    // Monday, Wednesday, Sunday
    for day in [date(2024, 1, 1), date(2024, 1, 3), date(2024, 1, 7)] {
        ledger.record(user.id, FeatureKind::MockTest, day).await.unwrap();
    }
    // Previous Sunday belongs to the prior week
    ledger
        .record(user.id, FeatureKind::MockTest, date(2023, 12, 31))
        .await
        .unwrap();

    assert_eq!(
        ledger
            .weekly_usage(user.id, FeatureKind::MockTest, date(2024, 1, 4))
            .await
            .unwrap(),
        3
    );
    assert_eq!(
        ledger
            .weekly_usage(user.id, FeatureKind::MockTest, date(2023, 12, 31))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_daily_buckets_are_per_feature_and_per_day() {
    let app = setup_test_app_at(at_time(2024, 3, 10, 12, 0));
    let user = app.create_user("daily").await;
    let ledger = UsageLedger::new(app.store.clone() as Arc<dyn Store>, app.clock.clone());
    let today = app.clock.today();

    for _ in 0..3 {
        ledger.record(user.id, FeatureKind::Pyq, today).await.unwrap();
    }
    ledger.record(user.id, FeatureKind::AiChat, today).await.unwrap();

    assert_eq!(ledger.daily_usage(user.id, FeatureKind::Pyq, today).await.unwrap(), 3);
    assert_eq!(ledger.daily_usage(user.id, FeatureKind::AiChat, today).await.unwrap(), 1);
    assert_eq!(
        ledger.daily_usage(user.id, FeatureKind::ReelScroll, today).await.unwrap(),
        0
    );
    assert_eq!(
        ledger
            .daily_usage(user.id, FeatureKind::Pyq, today + Duration::days(1))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_record_returns_bucket_count() {
    let app = setup_test_app_at(at_time(2024, 3, 10, 12, 0));
    let user = app.create_user("counter").await;
    let ledger = UsageLedger::new(app.store.clone() as Arc<dyn Store>, app.clock.clone());
    let today = app.clock.today();

    assert_eq!(ledger.record(user.id, FeatureKind::ReelScroll, today).await.unwrap(), 1);
    assert_eq!(ledger.record(user.id, FeatureKind::ReelScroll, today).await.unwrap(), 2);
}
