//! Repository for the `subscriptions` table.
//!
//! At most one row per user has status `active` (partial unique index).

use kindred_core::subscription::{
    Plan, PAYMENT_STATUS_SUCCEEDED, PERIOD_DAYS, STATUS_ACTIVE, STATUS_CANCELED, STATUS_EXPIRED,
};
use kindred_core::types::DbId;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use crate::models::payment::{CreatePayment, Payment};
use crate::models::subscription::Subscription;

const COLUMNS: &str = "id, user_id, plan, status, current_period_start, current_period_end, \
                       cancel_at_period_end, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, user_id, subscription_id, amount_cents, currency, status, \
                               provider, provider_reference, created_at, updated_at";

pub struct SubscriptionRepo;

impl SubscriptionRepo {
    pub async fn find_active(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM subscriptions WHERE user_id = $1 AND status = $2");
        sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .bind(STATUS_ACTIVE)
            .fetch_optional(pool)
            .await
    }

    /// Open a free subscription. Free plans have no period end.
    pub async fn create_free<'e>(
        executor: impl PgExecutor<'e>,
        user_id: DbId,
    ) -> Result<Subscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO subscriptions (user_id, plan, status)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .bind(Plan::Free.as_str())
            .bind(STATUS_ACTIVE)
            .fetch_one(executor)
            .await
    }

    /// Close the current subscription, open one on `plan`, and record the
    /// payment, all in one transaction.
    pub async fn change_plan(
        pool: &PgPool,
        user_id: DbId,
        plan: Plan,
        payment: Option<&CreatePayment>,
    ) -> Result<(Subscription, Option<Payment>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE subscriptions SET status = $3, cancel_at_period_end = FALSE
             WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(STATUS_ACTIVE)
        .bind(STATUS_CANCELED)
        .execute(&mut *tx)
        .await?;

        let subscription = insert_subscription(&mut tx, user_id, plan).await?;

        let payment = match payment {
            Some(p) => {
                let query = format!(
                    "INSERT INTO payments (user_id, subscription_id, amount_cents, currency,
                                           status, provider, provider_reference)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     RETURNING {PAYMENT_COLUMNS}"
                );
                let row = sqlx::query_as::<_, Payment>(&query)
                    .bind(user_id)
                    .bind(subscription.id)
                    .bind(p.amount_cents)
                    .bind(&p.currency)
                    .bind(PAYMENT_STATUS_SUCCEEDED)
                    .bind(&p.provider)
                    .bind(&p.provider_reference)
                    .fetch_one(&mut *tx)
                    .await?;
                Some(row)
            }
            None => None,
        };

        tx.commit().await?;
        Ok((subscription, payment))
    }

    /// Flag the active paid subscription to lapse at the end of its period.
    pub async fn cancel_at_period_end(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET cancel_at_period_end = TRUE
             WHERE user_id = $1 AND status = $2 AND current_period_end IS NOT NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .bind(STATUS_ACTIVE)
            .fetch_optional(pool)
            .await
    }

    /// Expire the user's active subscription if its period has ended and
    /// replace it with a free one. Returns the new free subscription.
    pub async fn expire_if_lapsed(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let expired: Option<DbId> = sqlx::query_scalar(
            "UPDATE subscriptions SET status = $3
             WHERE user_id = $1 AND status = $2
               AND current_period_end IS NOT NULL AND current_period_end <= NOW()
             RETURNING id",
        )
        .bind(user_id)
        .bind(STATUS_ACTIVE)
        .bind(STATUS_EXPIRED)
        .fetch_optional(&mut *tx)
        .await?;

        if expired.is_none() {
            return Ok(None);
        }

        let free = insert_subscription(&mut tx, user_id, Plan::Free).await?;
        tx.commit().await?;
        Ok(Some(free))
    }
}

async fn insert_subscription(
    tx: &mut Transaction<'_, Postgres>,
    user_id: DbId,
    plan: Plan,
) -> Result<Subscription, sqlx::Error> {
    let query = format!(
        "INSERT INTO subscriptions (user_id, plan, status, current_period_end)
         VALUES ($1, $2, $3, CASE WHEN $4 THEN NOW() + make_interval(days => $5) END)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Subscription>(&query)
        .bind(user_id)
        .bind(plan.as_str())
        .bind(STATUS_ACTIVE)
        .bind(plan != Plan::Free)
        .bind(PERIOD_DAYS as i32)
        .fetch_one(&mut **tx)
        .await
}
