// Limit Evaluator: read-only checks, limits status, fail-closed behaviour

mod common;

use aspirant_backend_core::{
    models::{Ceiling, FeatureKind, Tier, TierCeilings},
    services::DenialReason,
};
use chrono::Duration;
use common::setup_test_app;

#[tokio::test]
async fn test_free_user_check_does_not_consume() {
    let app = setup_test_app();
    let user = app.create_user("reader").await;

    for _ in 0..3 {
        let decision = app
            .state
            .usage_limits
            .check_usage(user.id, FeatureKind::Pyq)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Ceiling::Limited(10));
    }

    let status = app.state.usage_limits.get_limits_status(user.id).await.unwrap();
    assert_eq!(status.pyq.used, 0);
}

#[tokio::test]
async fn test_free_user_denied_at_ceiling() {
    let app = setup_test_app();
    let user = app.create_user("mock").await;

    assert!(
        app.state
            .usage_limits
            .record_usage(user.id, FeatureKind::MockTest)
            .await
    );

    let decision = app
        .state
        .usage_limits
        .check_usage(user.id, FeatureKind::MockTest)
        .await;
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, Ceiling::Limited(0));
    assert_eq!(decision.denial, Some(DenialReason::LimitReached));
    assert!(decision.reason.contains("1/week"));
}

#[tokio::test]
async fn test_pro_user_always_allowed() {
    let app = setup_test_app();
    let user = app.create_user("pro").await;
    let plan = app.create_plan("Quarterly", 9900, 90).await;
    app.buy_plan(&user, &plan).await;

    for _ in 0..20 {
        app.state
            .usage_limits
            .record_usage(user.id, FeatureKind::AiChat)
            .await;
    }

    let decision = app
        .state
        .usage_limits
        .check_usage(user.id, FeatureKind::AiChat)
        .await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, Ceiling::Unlimited);
}

#[tokio::test]
async fn test_custom_free_ceilings_apply() {
    let app = setup_test_app();
    let user = app.create_user("custom").await;
    let ceilings = TierCeilings {
        daily_pyq: Ceiling::Limited(2),
        weekly_mock_test: Ceiling::Limited(1),
        daily_reel_scroll: Ceiling::Limited(10),
        daily_ai_chat: Ceiling::Limited(5),
    };
    app.state
        .tier_store
        .set_tier(user.id, Tier::Free, Some(ceilings))
        .await
        .unwrap();

    app.state.usage_limits.record_usage(user.id, FeatureKind::Pyq).await;
    let decision = app.state.usage_limits.check_usage(user.id, FeatureKind::Pyq).await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, Ceiling::Limited(1));

    app.state.usage_limits.record_usage(user.id, FeatureKind::Pyq).await;
    let decision = app.state.usage_limits.check_usage(user.id, FeatureKind::Pyq).await;
    assert!(!decision.allowed);
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let app = setup_test_app();
    let user = app.create_user("outage").await;
    app.store.set_available(false);

    let decision = app
        .state
        .usage_limits
        .check_usage(user.id, FeatureKind::ReelScroll)
        .await;
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, Ceiling::Limited(0));
    assert_eq!(decision.denial, Some(DenialReason::StoreUnavailable));

    let decision = app
        .state
        .usage_limits
        .check_and_record(user.id, FeatureKind::ReelScroll)
        .await;
    assert!(!decision.allowed);

    assert!(
        !app.state
            .usage_limits
            .record_usage(user.id, FeatureKind::ReelScroll)
            .await
    );

    let status = app.state.usage_limits.get_limits_status(user.id).await;
    assert!(matches!(status, Err(ref e) if e.is_unavailable()));
}

#[tokio::test]
async fn test_limits_status_reports_all_features() {
    let app = setup_test_app();
    let user = app.create_user("status").await;

    app.state.usage_limits.record_usage(user.id, FeatureKind::Pyq).await;
    app.state.usage_limits.record_usage(user.id, FeatureKind::Pyq).await;
    app.state.usage_limits.record_usage(user.id, FeatureKind::ReelScroll).await;

    let first = app.state.usage_limits.get_limits_status(user.id).await.unwrap();
    assert_eq!(first.tier, Tier::Free);
    assert_eq!(first.pyq.used, 2);
    assert_eq!(first.pyq.limit, Ceiling::Limited(10));
    assert_eq!(first.pyq.remaining, Ceiling::Limited(8));
    assert_eq!(first.reels.used, 1);
    assert_eq!(first.mock_tests.remaining, Ceiling::Limited(1));
    assert_eq!(first.ai_chat.remaining, Ceiling::Limited(5));
    assert_eq!(first.feature(FeatureKind::Pyq), &first.pyq);

    // Reading status twice changes nothing
    let second = app.state.usage_limits.get_limits_status(user.id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_limits_status_serializes_unlimited_as_minus_one() {
    let app = setup_test_app();
    let user = app.create_user("pro-status").await;
    let plan = app.create_plan("Monthly", 29900, 30).await;
    app.buy_plan(&user, &plan).await;
    app.state.usage_limits.record_usage(user.id, FeatureKind::AiChat).await;

    let status = app.state.usage_limits.get_limits_status(user.id).await.unwrap();
    assert_eq!(status.tier, Tier::Pro);
    assert_eq!(status.ai_chat.used, 1);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["tier"], "PRO");
    assert_eq!(json["ai_chat"]["limit"], -1);
    assert_eq!(json["ai_chat"]["remaining"], -1);
}

#[tokio::test]
async fn test_daily_quota_resets_next_day() {
    let app = setup_test_app();
    let user = app.create_user("reels").await;

    for _ in 0..10 {
        app.state.usage_limits.record_usage(user.id, FeatureKind::ReelScroll).await;
    }
    assert!(
        !app.state
            .usage_limits
            .check_usage(user.id, FeatureKind::ReelScroll)
            .await
            .allowed
    );

    app.clock.advance(Duration::days(1));
    let decision = app
        .state
        .usage_limits
        .check_usage(user.id, FeatureKind::ReelScroll)
        .await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, Ceiling::Limited(10));
}

#[tokio::test]
async fn test_expired_subscription_falls_back_to_free() {
    let app = setup_test_app();
    let user = app.create_user("lapsed").await;
    let plan = app.create_plan("Weekly", 4900, 7).await;
    app.buy_plan(&user, &plan).await;

    assert_eq!(
        app.state.subscription_manager.effective_tier(user.id).await.unwrap(),
        Tier::Pro
    );

    app.clock.advance(Duration::days(8));
    assert_eq!(
        app.state.subscription_manager.effective_tier(user.id).await.unwrap(),
        Tier::Free
    );
    let decision = app
        .state
        .usage_limits
        .check_usage(user.id, FeatureKind::AiChat)
        .await;
    assert_eq!(decision.remaining, Ceiling::Limited(5));
}

#[tokio::test]
async fn test_admin_pro_without_subscription_meters_with_defaults() {
    let app = setup_test_app();
    let user = app.create_user("granted").await;
    app.state.tier_store.set_tier(user.id, Tier::Pro, None).await.unwrap();

    let status = app.state.usage_limits.get_limits_status(user.id).await.unwrap();
    assert_eq!(status.tier, Tier::Free);
    assert_eq!(status.pyq.limit, Ceiling::Limited(10));

    let decision = app
        .state
        .usage_limits
        .check_usage(user.id, FeatureKind::MockTest)
        .await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, Ceiling::Limited(1));
}

#[tokio::test]
async fn test_check_for_unknown_user_is_not_found() {
    let app = setup_test_app();

    let decision = app
        .state
        .usage_limits
        .check_usage(uuid::Uuid::new_v4(), FeatureKind::AiChat)
        .await;
    assert!(!decision.allowed);
    assert_eq!(decision.denial, Some(DenialReason::UserNotFound));
}
