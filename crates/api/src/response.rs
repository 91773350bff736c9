//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Paginated listings add
//! the total row count.

use serde::Serialize;
use utoipa::ToSchema;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "data": [T], "total": n }` envelope for paginated listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct PageResponse<T: Serialize> {
    pub data: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: i64,
}

/// `{ "count": n }` for bulk state changes.
#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub count: i64,
}
