// Tier Store
// One tier record per user, materialized lazily from the derived tier

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FreeTierDefaults;
use crate::models::{NewTierRecord, Tier, TierCeilings, TierRecord};
use crate::services::clock::Clock;
use crate::services::subscription::SubscriptionManager;
use crate::store::{Store, StoreError};
use crate::utils::audit_logger::AuditLogger;

#[derive(Debug, Error)]
pub enum TierError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Invalid ceilings: {0}")]
    InvalidCeilings(String),

    #[error("Tier record for user {0} vanished after a creation conflict")]
    ConcurrencyConflict(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TierError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TierError::Store(e) if e.is_unavailable())
    }
}

/// Users per stored tier label
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TierStatistics {
    pub free: i64,
    pub pro: i64,
    pub total: i64,
}

pub struct TierStore {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    subscriptions: Arc<SubscriptionManager>,
    defaults: FreeTierDefaults,
}

impl TierStore {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        subscriptions: Arc<SubscriptionManager>,
        defaults: FreeTierDefaults,
    ) -> Self {
        Self {
            store,
            clock,
            subscriptions,
            defaults,
        }
    }

    pub fn defaults(&self) -> &FreeTierDefaults {
        &self.defaults
    }

    /// Existing record, or a new one defaulted from the currently derived tier
    pub async fn get_or_create_tier(&self, user_id: Uuid) -> Result<TierRecord, TierError> {
        if let Some(record) = self.store.find_tier_record(user_id).await? {
            return Ok(record);
        }

        let derived = self.subscriptions.effective_tier(user_id).await?;
        self.materialize(user_id, derived).await
    }

    /// Ceilings that meter a user whose derived tier is FREE.
    ///
    /// A record stored while the user was PRO carries unlimited ceilings; once the
    /// subscription lapses those no longer apply and the configured defaults do.
    pub async fn free_ceilings(&self, user_id: Uuid) -> Result<TierCeilings, TierError> {
        let record = match self.store.find_tier_record(user_id).await? {
            Some(record) => record,
            None => self.materialize(user_id, Tier::Free).await?,
        };

        Ok(match record.tier {
            Tier::Free => record.ceilings,
            Tier::Pro => {
                debug!(user_id = %user_id, "Stored PRO record without entitlement, using defaults");
                self.defaults.ceilings()
            },
        })
    }

    async fn materialize(&self, user_id: Uuid, tier: Tier) -> Result<TierRecord, TierError> {
        let record = NewTierRecord::new(user_id, tier, self.defaults.ceilings(), self.clock.now());

        match self.store.insert_tier_record(record).await {
            Ok(created) => {
                info!(user_id = %user_id, tier = %created.tier, "Created tier record");
                Ok(created)
            },
            // Lost the creation race: the winner's record is the one to use
            Err(StoreError::Conflict(_)) => {
                debug!(user_id = %user_id, "Tier record creation conflict, re-reading");
                self.store
                    .find_tier_record(user_id)
                    .await?
                    .ok_or(TierError::ConcurrencyConflict(user_id))
            },
            Err(StoreError::NotFound) => Err(TierError::UserNotFound(user_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Administrative tier override.
    ///
    /// PRO always stores unlimited ceilings. FREE uses the supplied ceilings or the
    /// configured defaults, and rejects zero or unlimited values.
    pub async fn set_tier(
        &self,
        user_id: Uuid,
        tier: Tier,
        ceilings: Option<TierCeilings>,
    ) -> Result<TierRecord, TierError> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(TierError::UserNotFound(user_id));
        }

        let ceilings = match tier {
            Tier::Pro => TierCeilings::unlimited(),
            Tier::Free => {
                let ceilings = ceilings.unwrap_or_else(|| self.defaults.ceilings());
                ceilings
                    .validate_free()
                    .map_err(TierError::InvalidCeilings)?;
                ceilings
            },
        };

        let record = self
            .store
            .upsert_tier_record(NewTierRecord::new(user_id, tier, ceilings, self.clock.now()))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => TierError::UserNotFound(user_id),
                other => TierError::Store(other),
            })?;

        info!(user_id = %user_id, tier = %tier, "Tier updated");
        AuditLogger::log_tier_change(
            user_id,
            tier.as_str(),
            Some(format!("ceilings: {:?}", record.ceilings)),
        );

        Ok(record)
    }

    /// Materializes default records for every user lacking one.
    /// Returns how many users were processed.
    pub async fn backfill_missing(&self) -> Result<usize, TierError> {
        let missing = self.store.users_without_tier().await?;
        let mut created = 0;

        for user_id in missing {
            match self.get_or_create_tier(user_id).await {
                Ok(_) => created += 1,
                // User deleted between listing and creation
                Err(TierError::UserNotFound(_)) => {
                    warn!(user_id = %user_id, "Skipping tier backfill for missing user");
                },
                Err(e) => return Err(e),
            }
        }

        info!("Backfilled {} tier records", created);
        Ok(created)
    }

    pub async fn statistics(&self) -> Result<TierStatistics, TierError> {
        let mut stats = TierStatistics::default();
        for (tier, count) in self.store.count_tiers().await? {
            match tier {
                Tier::Free => stats.free += count,
                Tier::Pro => stats.pro += count,
            }
            stats.total += count;
        }
        Ok(stats)
    }
}
