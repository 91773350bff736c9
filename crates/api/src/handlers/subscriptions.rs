//! Handlers for subscription plans and payment history.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use kindred_core::audit::action_types;
use kindred_core::subscription::{validate_currency, validate_payment_amount, Plan};
use kindred_core::types::DbId;
use kindred_db::models::audit::CreateAuditLog;
use kindred_db::models::payment::{CreatePayment, Payment};
use kindred_db::models::subscription::Subscription;
use kindred_db::repositories::{PaymentRepo, SubscriptionRepo};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::handlers::record_audit;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::query::PaginationParams;
use crate::response::{DataResponse, PageResponse};
use crate::state::AppState;

/// Provider recorded for payments confirmed through this API.
const PAYMENT_PROVIDER: &str = "external";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePlanRequest {
    /// `free` or `premium`.
    pub plan: String,
    /// Provider reference of the settled payment. Required for paid plans.
    pub payment_reference: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlanChange {
    pub subscription: Subscription,
    pub payment: Option<Payment>,
}

/// Validate a plan change and build the payment to record with it.
pub fn payment_for(input: &ChangePlanRequest) -> Result<(Plan, Option<CreatePayment>), AppError> {
    let plan = Plan::parse(input.plan.trim())?;
    if plan.price_cents() == 0 {
        return Ok((plan, None));
    }

    let reference = input
        .payment_reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::validation("payment_reference is required for paid plans"))?;
    let amount_cents = input
        .amount_cents
        .ok_or_else(|| AppError::validation("amount_cents is required for paid plans"))?;
    let currency = input
        .currency
        .as_deref()
        .ok_or_else(|| AppError::validation("currency is required for paid plans"))?;
    validate_payment_amount(plan, amount_cents)?;
    validate_currency(currency)?;

    Ok((
        plan,
        Some(CreatePayment {
            amount_cents,
            currency: currency.to_string(),
            provider: PAYMENT_PROVIDER.to_string(),
            provider_reference: reference.to_string(),
        }),
    ))
}

/// The user's current subscription. Lapsed paid plans are expired here and
/// replaced with a free one; users without any active row get a free one.
pub(crate) async fn current_subscription(
    pool: &PgPool,
    user_id: DbId,
) -> Result<Subscription, sqlx::Error> {
    if let Some(free) = SubscriptionRepo::expire_if_lapsed(pool, user_id).await? {
        tracing::info!(user_id, subscription_id = free.id, "Lapsed subscription expired");
        return Ok(free);
    }
    if let Some(active) = SubscriptionRepo::find_active(pool, user_id).await? {
        return Ok(active);
    }
    match SubscriptionRepo::create_free(pool, user_id).await {
        Ok(created) => Ok(created),
        // Another request opened one first.
        Err(err) if is_unique_violation(&err, "uq_subscriptions_one_active_per_user") => {
            SubscriptionRepo::find_active(pool, user_id)
                .await?
                .ok_or(err)
        }
        Err(err) => Err(err),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/me",
    tag = "subscriptions",
    responses((status = 200, description = "Active subscription", body = DataResponse<Subscription>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn get_my_subscription(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Subscription>>> {
    let subscription = current_subscription(&state.pool, auth_user.user_id).await?;
    Ok(Json(DataResponse { data: subscription }))
}

#[utoipa::path(
    post,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    request_body = ChangePlanRequest,
    responses(
        (status = 201, description = "New subscription opened", body = DataResponse<PlanChange>),
        (status = 400, description = "Unknown plan or payment does not match the price"),
        (status = 409, description = "Payment reference already used"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn change_plan(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Json(input): Json<ChangePlanRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<PlanChange>>)> {
    let (plan, payment) = payment_for(&input)?;
    let (subscription, payment) =
        SubscriptionRepo::change_plan(&state.pool, auth_user.user_id, plan, payment.as_ref())
            .await?;

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::SUBSCRIPTION_CHANGE)
            .by_user(auth_user.user_id)
            .on_entity("subscription", subscription.id)
            .with_details(json!({
                "plan": subscription.plan,
                "payment_id": payment.as_ref().map(|p| p.id),
                "amount_cents": payment.as_ref().map(|p| p.amount_cents),
            })),
    )
    .await?;
    tracing::info!(
        user_id = auth_user.user_id,
        subscription_id = subscription.id,
        plan = %subscription.plan,
        "Subscription changed",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: PlanChange {
                subscription,
                payment,
            },
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/subscriptions/me/cancel",
    tag = "subscriptions",
    responses(
        (status = 200, description = "Subscription will lapse at period end", body = DataResponse<Subscription>),
        (status = 409, description = "No paid subscription to cancel"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn cancel_my_subscription(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
) -> AppResult<Json<DataResponse<Subscription>>> {
    let subscription = SubscriptionRepo::cancel_at_period_end(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::conflict("No paid subscription to cancel"))?;

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::SUBSCRIPTION_CHANGE)
            .by_user(auth_user.user_id)
            .on_entity("subscription", subscription.id)
            .with_details(json!({ "cancel_at_period_end": true })),
    )
    .await?;
    tracing::info!(
        user_id = auth_user.user_id,
        subscription_id = subscription.id,
        "Subscription set to cancel at period end",
    );

    Ok(Json(DataResponse { data: subscription }))
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/me",
    tag = "subscriptions",
    params(PaginationParams),
    responses((status = 200, description = "Caller's payments, newest first", body = PageResponse<Payment>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_my_payments(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<PageResponse<Payment>>> {
    let (limit, offset) = params.resolve();
    let data = PaymentRepo::list_for_user(&state.pool, auth_user.user_id, limit, offset).await?;
    let total = PaymentRepo::count_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(PageResponse { data, total }))
}
