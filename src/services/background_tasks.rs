// Background task scheduler
// Periodic maintenance: the subscription expiry sweep

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::app::AppState;
use crate::services::subscription::SubscriptionManager;

pub struct BackgroundTaskManager {
    subscriptions: Arc<SubscriptionManager>,
    sweep_interval: Option<Duration>,
}

impl BackgroundTaskManager {
    /// A zero interval disables the sweep
    pub fn new(subscriptions: Arc<SubscriptionManager>, sweep_interval_secs: u64) -> Self {
        Self {
            subscriptions,
            sweep_interval: (sweep_interval_secs > 0)
                .then(|| Duration::from_secs(sweep_interval_secs)),
        }
    }

    /// Start all background tasks
    pub fn start_all_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        match self.sweep_interval {
            Some(period) => {
                info!("Starting subscription expiry sweep every {:?}", period);
                handles.push(spawn_expiry_sweep(self.subscriptions.clone(), period));
            },
            None => info!("Subscription expiry sweep disabled"),
        }

        handles
    }
}

fn spawn_expiry_sweep(subscriptions: Arc<SubscriptionManager>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = subscriptions.expire_lapsed().await {
                error!("Subscription expiry sweep failed: {}", e);
            }
        }
    })
}

/// Initialize background tasks (call this in main.rs)
pub fn initialize_background_tasks(state: &AppState) -> Vec<JoinHandle<()>> {
    let task_manager = BackgroundTaskManager::new(
        state.subscription_manager.clone(),
        state.settings.subscription_sweep_interval_secs,
    );
    task_manager.start_all_tasks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPayment, NewPaymentPlan, NewSubscription, NewUser, PaymentSettlement};
    use crate::services::clock::{Clock, ManualClock};
    use crate::store::{InMemoryStore, Store};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_zero_interval_spawns_nothing() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = BackgroundTaskManager::new(
            Arc::new(SubscriptionManager::new(store, clock)),
            0,
        );
        assert!(manager.start_all_tasks().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_deactivates_lapsed_subscriptions() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let memory = Arc::new(InMemoryStore::new());
        let store: Arc<dyn Store> = memory.clone();
        let clock = Arc::new(ManualClock::new(start));

        let user = store
            .insert_user(NewUser::new("sweep@example.com", "sweeper", start))
            .await
            .unwrap();
        let plan = store
            .insert_plan(
                NewPaymentPlan {
                    name: "Weekly".to_string(),
                    description: None,
                    price: 1900,
                    duration_days: 7,
                    features: vec![],
                    is_active: true,
                },
                start,
            )
            .await
            .unwrap();
        let payment = store
            .insert_payment(NewPayment {
                user_id: user.id,
                plan_id: plan.id,
                gateway_order_id: "order_sweep".to_string(),
                amount: plan.price,
                currency: "INR".to_string(),
                receipt_number: "receipt_sweep".to_string(),
                created_at: start,
            })
            .await
            .unwrap();
        store
            .settle_payment(
                PaymentSettlement {
                    gateway_order_id: "order_sweep".to_string(),
                    gateway_payment_id: "pay_sweep".to_string(),
                    gateway_signature: "sig".to_string(),
                    payment_method: None,
                    settled_at: start,
                },
                NewSubscription {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    plan_id: plan.id,
                    payment_id: payment.id,
                    start_date: start,
                    end_date: start + ChronoDuration::days(7),
                    is_active: true,
                    created_at: start,
                    updated_at: start,
                },
            )
            .await
            .unwrap();

        clock.advance(ChronoDuration::days(8));
        assert!(clock.now() > start + ChronoDuration::days(7));

        let manager = BackgroundTaskManager::new(
            Arc::new(SubscriptionManager::new(store, clock)),
            3600,
        );
        let handles = manager.start_all_tasks();
        assert_eq!(handles.len(), 1);

        // The first tick fires immediately
        for _ in 0..50 {
            if memory.all_subscriptions().await.iter().all(|s| !s.is_active) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(memory.all_subscriptions().await.iter().all(|s| !s.is_active));

        for handle in handles {
            handle.abort();
        }
    }
}
