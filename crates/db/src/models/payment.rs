//! Payment model and DTOs.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A row from the `payments` table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Payment {
    pub id: DbId,
    pub user_id: DbId,
    pub subscription_id: Option<DbId>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub provider_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment details captured alongside a plan change.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub amount_cents: i64,
    pub currency: String,
    pub provider: String,
    pub provider_reference: String,
}
