// Tier Store behaviour: lazy creation, administrative overrides, backfill, statistics

mod common;

use aspirant_backend_core::{
    models::{Ceiling, Tier, TierCeilings},
    services::TierError,
};
use common::setup_test_app;
use uuid::Uuid;

#[tokio::test]
async fn test_first_access_creates_free_record_with_defaults() {
    let app = setup_test_app();
    let user = app.create_user("asha").await;

    let record = app.state.tier_store.get_or_create_tier(user.id).await.unwrap();

    assert_eq!(record.tier, Tier::Free);
    assert_eq!(record.ceilings.daily_pyq, Ceiling::Limited(10));
    assert_eq!(record.ceilings.weekly_mock_test, Ceiling::Limited(1));
    assert_eq!(record.ceilings.daily_reel_scroll, Ceiling::Limited(10));
    assert_eq!(record.ceilings.daily_ai_chat, Ceiling::Limited(5));

    // Second access returns the same record
    let again = app.state.tier_store.get_or_create_tier(user.id).await.unwrap();
    assert_eq!(again.id, record.id);
}

#[tokio::test]
async fn test_concurrent_first_access_yields_one_record() {
    let app = setup_test_app();
    let user = app.create_user("ravi").await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let tiers = app.state.tier_store.clone();
        let user_id = user.id;
        handles.push(tokio::spawn(async move {
            tiers.get_or_create_tier(user_id).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller must see the same record");

    let stats = app.state.tier_store.statistics().await.unwrap();
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = setup_test_app();
    let missing = Uuid::new_v4();

    assert!(matches!(
        app.state.tier_store.get_or_create_tier(missing).await,
        Err(TierError::UserNotFound(id)) if id == missing
    ));
    assert!(matches!(
        app.state.tier_store.set_tier(missing, Tier::Pro, None).await,
        Err(TierError::UserNotFound(_))
    ));
}

#[tokio::test]
async fn test_first_access_for_subscriber_creates_pro_record() {
    let app = setup_test_app();
    let user = app.create_user("subscriber").await;
    let plan = app.create_plan("Monthly", 19900, 30).await;
    app.buy_plan(&user, &plan).await;

    let record = app.state.tier_store.get_or_create_tier(user.id).await.unwrap();

    assert_eq!(record.tier, Tier::Pro);
    assert_eq!(record.ceilings, TierCeilings::unlimited());
    assert_eq!(record.ceilings.daily_ai_chat, Ceiling::Unlimited);

    let stats = app.state.tier_store.statistics().await.unwrap();
    assert_eq!(stats.pro, 1);
    assert_eq!(stats.free, 0);
}

#[tokio::test]
async fn test_set_pro_forces_unlimited_ceilings() {
    let app = setup_test_app();
    let user = app.create_user("meera").await;

    let supplied = TierCeilings {
        daily_pyq: Ceiling::Limited(2),
        weekly_mock_test: Ceiling::Limited(2),
        daily_reel_scroll: Ceiling::Limited(2),
        daily_ai_chat: Ceiling::Limited(2),
    };
    let record = app
        .state
        .tier_store
        .set_tier(user.id, Tier::Pro, Some(supplied))
        .await
        .unwrap();

    assert_eq!(record.tier, Tier::Pro);
    assert_eq!(record.ceilings, TierCeilings::unlimited());
}

#[tokio::test]
async fn test_set_free_with_custom_ceilings() {
    let app = setup_test_app();
    let user = app.create_user("kiran").await;
    app.state
        .tier_store
        .set_tier(user.id, Tier::Pro, None)
        .await
        .unwrap();

    let custom = TierCeilings {
        daily_pyq: Ceiling::Limited(20),
        weekly_mock_test: Ceiling::Limited(2),
        daily_reel_scroll: Ceiling::Limited(15),
        daily_ai_chat: Ceiling::Limited(8),
    };
    let record = app
        .state
        .tier_store
        .set_tier(user.id, Tier::Free, Some(custom))
        .await
        .unwrap();

    assert_eq!(record.tier, Tier::Free);
    assert_eq!(record.ceilings, custom);

    let stats = app.state.tier_store.statistics().await.unwrap();
    assert_eq!((stats.free, stats.pro, stats.total), (1, 0, 1));
}

#[tokio::test]
async fn test_free_ceilings_must_be_finite_and_positive() {
    let app = setup_test_app();
    let user = app.create_user("dev").await;

    let mut ceilings = TierCeilings {
        daily_pyq: Ceiling::Limited(10),
        weekly_mock_test: Ceiling::Limited(0),
        daily_reel_scroll: Ceiling::Limited(10),
        daily_ai_chat: Ceiling::Limited(5),
    };
    assert!(matches!(
        app.state
            .tier_store
            .set_tier(user.id, Tier::Free, Some(ceilings))
            .await,
        Err(TierError::InvalidCeilings(_))
    ));

    ceilings.weekly_mock_test = Ceiling::Unlimited;
    assert!(matches!(
        app.state
            .tier_store
            .set_tier(user.id, Tier::Free, Some(ceilings))
            .await,
        Err(TierError::InvalidCeilings(_))
    ));
}

#[tokio::test]
async fn test_backfill_creates_missing_records_only() {
    let app = setup_test_app();
    let first = app.create_user("first").await;
    app.create_user("second").await;
    app.create_user("third").await;

    app.state.tier_store.get_or_create_tier(first.id).await.unwrap();

    assert_eq!(app.state.tier_store.backfill_missing().await.unwrap(), 2);
    assert_eq!(app.state.tier_store.backfill_missing().await.unwrap(), 0);

    let stats = app.state.tier_store.statistics().await.unwrap();
    assert_eq!(stats.free, 3);
    assert_eq!(stats.total, 3);
}

#[tokio::test]
async fn test_store_outage_surfaces_to_admin_callers() {
    let app = setup_test_app();
    let user = app.create_user("outage").await;
    app.store.set_available(false);

    let result = app.state.tier_store.set_tier(user.id, Tier::Pro, None).await;
    assert!(matches!(result, Err(ref e) if e.is_unavailable()));
}
