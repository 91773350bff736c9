//! Repository for the `payments` table.

use kindred_core::types::DbId;
use sqlx::PgPool;

use crate::models::payment::Payment;

const COLUMNS: &str = "id, user_id, subscription_id, amount_cents, currency, status, \
                       provider, provider_reference, created_at, updated_at";

pub struct PaymentRepo;

impl PaymentRepo {
    /// A user's payments, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payments WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}
