// PostgreSQL store on diesel-async + bb8
// Conditional increments lock the user row; settlement runs in one transaction

use async_trait::async_trait;
use bb8::PooledConnection;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use super::{DateSpan, Store, StoreError};
use crate::db::diesel_pool::DieselPool;
use crate::models::payment::PaymentRow;
use crate::models::plan::PaymentPlanRow;
use crate::models::tier::TierRecordRow;
use crate::models::usage::NewUsageRecordRow;
use crate::models::{
    Ceiling, FeatureKind, NewPayment, NewPaymentPlan, NewSubscription, NewTierRecord, NewUser,
    Payment, PaymentPlan, PaymentSettlement, PaymentStatus, Subscription, Tier, TierRecord,
    UsageKey, User,
};
use crate::schema::{payment_plans, payments, usage_records, user_subscriptions, user_tiers, users};

type PgPooled<'a> = PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Clone)]
pub struct DieselStore {
    pool: DieselPool,
}

impl DieselStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PgPooled<'_>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn clamp_count(total: Option<i64>) -> u32 {
    u32::try_from(total.unwrap_or(0).max(0)).unwrap_or(u32::MAX)
}

/// Sum of bucket counts inside the window
async fn window_total(
    conn: &mut AsyncPgConnection,
    key: UsageKey,
    span: DateSpan,
) -> QueryResult<Option<i64>> {
    usage_records::table
        .filter(usage_records::user_id.eq(key.user_id))
        .filter(usage_records::feature.eq(key.feature.as_str()))
        .filter(usage_records::usage_date.between(span.from, span.to))
        .select(diesel::dsl::sum(usage_records::count))
        .get_result(conn)
        .await
}

/// +1 on the bucket, inserting it with count 1 when absent
async fn bump_bucket(
    conn: &mut AsyncPgConnection,
    key: UsageKey,
    now: DateTime<Utc>,
) -> QueryResult<i32> {
    diesel::insert_into(usage_records::table)
        .values(NewUsageRecordRow::first_unit(key, now))
        .on_conflict((
            usage_records::user_id,
            usage_records::feature,
            usage_records::usage_date,
        ))
        .do_update()
        .set((
            usage_records::count.eq(usage_records::count + 1),
            usage_records::updated_at.eq(now),
        ))
        .returning(usage_records::count)
        .get_result(conn)
        .await
}

#[async_trait]
impl Store for DieselStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut conn = self.conn().await?;

        let user = diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await?;

        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn().await?;

        let user = users::table
            .find(user_id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(user)
    }

    async fn users_without_tier(&self) -> Result<Vec<Uuid>, StoreError> {
        let mut conn = self.conn().await?;

        let ids = users::table
            .left_join(user_tiers::table)
            .filter(user_tiers::id.is_null())
            .select(users::id)
            .order(users::created_at.asc())
            .load::<Uuid>(&mut conn)
            .await?;

        Ok(ids)
    }

    async fn find_tier_record(&self, user_id: Uuid) -> Result<Option<TierRecord>, StoreError> {
        let mut conn = self.conn().await?;

        let row = user_tiers::table
            .filter(user_tiers::user_id.eq(user_id))
            .select(TierRecordRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        row.map(TierRecord::try_from)
            .transpose()
            .map_err(StoreError::Database)
    }

    async fn insert_tier_record(&self, record: NewTierRecord) -> Result<TierRecord, StoreError> {
        let mut conn = self.conn().await?;

        let row = diesel::insert_into(user_tiers::table)
            .values(record.into_row())
            .returning(TierRecordRow::as_returning())
            .get_result(&mut conn)
            .await?;

        TierRecord::try_from(row).map_err(StoreError::Database)
    }

    async fn upsert_tier_record(&self, record: NewTierRecord) -> Result<TierRecord, StoreError> {
        let mut conn = self.conn().await?;
        let new_row = record.into_row();

        let row = diesel::insert_into(user_tiers::table)
            .values(&new_row)
            .on_conflict(user_tiers::user_id)
            .do_update()
            .set((
                user_tiers::tier.eq(&new_row.tier),
                user_tiers::daily_pyq_limit.eq(new_row.daily_pyq_limit),
                user_tiers::weekly_mock_limit.eq(new_row.weekly_mock_limit),
                user_tiers::daily_reel_limit.eq(new_row.daily_reel_limit),
                user_tiers::ai_chat_limit.eq(new_row.ai_chat_limit),
                user_tiers::updated_at.eq(new_row.updated_at),
            ))
            .returning(TierRecordRow::as_returning())
            .get_result(&mut conn)
            .await?;

        TierRecord::try_from(row).map_err(StoreError::Database)
    }

    async fn count_tiers(&self) -> Result<Vec<(Tier, i64)>, StoreError> {
        let mut conn = self.conn().await?;

        let rows = user_tiers::table
            .group_by(user_tiers::tier)
            .select((user_tiers::tier, count_star()))
            .load::<(String, i64)>(&mut conn)
            .await?;

        rows.into_iter()
            .map(|(tier, count)| {
                tier.parse::<Tier>()
                    .map(|tier| (tier, count))
                    .map_err(StoreError::Database)
            })
            .collect()
    }

    async fn usage_between(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        span: DateSpan,
    ) -> Result<u32, StoreError> {
        let mut conn = self.conn().await?;
        let key = UsageKey::new(user_id, feature, span.from);

        let total = window_total(&mut conn, key, span).await?;
        Ok(clamp_count(total))
    }

    async fn increment_usage(&self, key: UsageKey, now: DateTime<Utc>) -> Result<u32, StoreError> {
        let mut conn = self.conn().await?;

        let count = bump_bucket(&mut conn, key, now).await?;
        Ok(clamp_count(Some(i64::from(count))))
    }

    async fn increment_usage_within(
        &self,
        key: UsageKey,
        window: DateSpan,
        ceiling: Ceiling,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, StoreError> {
        let mut conn = self.conn().await?;

        let admitted = conn
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    // Concurrent increments for the same user queue on this row lock
                    users::table
                        .find(key.user_id)
                        .select(users::id)
                        .for_update()
                        .first::<Uuid>(conn)
                        .await?;

                    let used = clamp_count(window_total(conn, key, window).await?);
                    if !ceiling.admits(used) {
                        return Ok(None);
                    }

                    bump_bucket(conn, key, now).await?;
                    Ok(Some(used.saturating_add(1)))
                })
            })
            .await?;

        debug!(
            user_id = %key.user_id,
            feature = %key.feature,
            admitted = admitted.is_some(),
            "Conditional usage increment"
        );

        Ok(admitted)
    }

    async fn insert_plan(
        &self,
        plan: NewPaymentPlan,
        now: DateTime<Utc>,
    ) -> Result<PaymentPlan, StoreError> {
        let mut conn = self.conn().await?;

        let row = diesel::insert_into(payment_plans::table)
            .values(plan.into_row(now))
            .returning(PaymentPlanRow::as_returning())
            .get_result(&mut conn)
            .await?;

        Ok(row.into())
    }

    async fn find_plan(&self, plan_id: Uuid) -> Result<Option<PaymentPlan>, StoreError> {
        let mut conn = self.conn().await?;

        let row = payment_plans::table
            .find(plan_id)
            .select(PaymentPlanRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(PaymentPlan::from))
    }

    async fn list_active_plans(&self) -> Result<Vec<PaymentPlan>, StoreError> {
        let mut conn = self.conn().await?;

        let rows = payment_plans::table
            .filter(payment_plans::is_active.eq(true))
            .order((payment_plans::price.asc(), payment_plans::name.asc()))
            .select(PaymentPlanRow::as_select())
            .load(&mut conn)
            .await?;

        Ok(rows.into_iter().map(PaymentPlan::from).collect())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut conn = self.conn().await?;

        let row = diesel::insert_into(payments::table)
            .values(payment.into_row())
            .returning(PaymentRow::as_returning())
            .get_result(&mut conn)
            .await?;

        Payment::try_from(row).map_err(StoreError::Database)
    }

    async fn find_payment_by_order(&self, order_id: &str) -> Result<Option<Payment>, StoreError> {
        let mut conn = self.conn().await?;

        let row = payments::table
            .filter(payments::gateway_order_id.eq(order_id))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        row.map(Payment::try_from)
            .transpose()
            .map_err(StoreError::Database)
    }

    async fn settle_payment(
        &self,
        settlement: PaymentSettlement,
        subscription: NewSubscription,
    ) -> Result<(Payment, Subscription), StoreError> {
        let mut conn = self.conn().await?;

        let (row, subscription) = conn
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    // Guarded on PENDING; a settled or unknown order yields NotFound
                    let row = diesel::update(
                        payments::table
                            .filter(payments::gateway_order_id.eq(&settlement.gateway_order_id))
                            .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
                    )
                    .set((
                        payments::gateway_payment_id.eq(&settlement.gateway_payment_id),
                        payments::gateway_signature.eq(&settlement.gateway_signature),
                        payments::payment_method.eq(&settlement.payment_method),
                        payments::status.eq(PaymentStatus::Completed.as_str()),
                        payments::updated_at.eq(settlement.settled_at),
                        payments::completed_at.eq(settlement.settled_at),
                    ))
                    .returning(PaymentRow::as_returning())
                    .get_result(conn)
                    .await?;

                    let subscription = diesel::insert_into(user_subscriptions::table)
                        .values(&subscription)
                        .returning(Subscription::as_returning())
                        .get_result(conn)
                        .await?;

                    Ok((row, subscription))
                })
            })
            .await?;

        let payment = Payment::try_from(row).map_err(StoreError::Database)?;
        Ok((payment, subscription))
    }

    async fn entitled_subscriptions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, StoreError> {
        let mut conn = self.conn().await?;

        let subscriptions = user_subscriptions::table
            .filter(user_subscriptions::user_id.eq(user_id))
            .filter(user_subscriptions::is_active.eq(true))
            .filter(user_subscriptions::end_date.gt(now))
            .order((
                user_subscriptions::end_date.desc(),
                user_subscriptions::created_at.desc(),
                user_subscriptions::id.desc(),
            ))
            .select(Subscription::as_select())
            .load(&mut conn)
            .await?;

        Ok(subscriptions)
    }

    async fn deactivate_lapsed_subscriptions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;

        let updated = diesel::update(
            user_subscriptions::table
                .filter(user_subscriptions::is_active.eq(true))
                .filter(user_subscriptions::end_date.le(now)),
        )
        .set((
            user_subscriptions::is_active.eq(false),
            user_subscriptions::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await?;

        Ok(updated as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::sql_query("SELECT 1").execute(&mut conn).await?;
        Ok(())
    }
}
