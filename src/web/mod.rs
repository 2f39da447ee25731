//! # Control Surface
//!
//! Thin HTTP mapping over storage and the retry/cancel entry points. The
//! router mirrors the operator-facing API:
//!
//! - `GET  /orchestrations` — paged list, filterable by state
//! - `GET  /orchestrations/{id}` — one record plus operation statistics
//! - `PUT  /orchestrations/{id}/cancel`
//! - `POST /orchestrations/{id}/retry` — form-encoded `operation-id` fields
//! - `GET  /orchestrations/{id}/operations`
//! - `GET  /orchestrations/{id}/operations/{operation_id}`

pub mod errors;
pub mod handlers;
pub mod pagination;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

/// Build the control-surface router over the given application state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orchestrations", get(handlers::list_orchestrations))
        .route(
            "/orchestrations/:orchestration_id",
            get(handlers::get_orchestration),
        )
        .route(
            "/orchestrations/:orchestration_id/cancel",
            put(handlers::cancel_orchestration),
        )
        .route(
            "/orchestrations/:orchestration_id/retry",
            post(handlers::retry_orchestration),
        )
        .route(
            "/orchestrations/:orchestration_id/operations",
            get(handlers::list_operations),
        )
        .route(
            "/orchestrations/:orchestration_id/operations/:operation_id",
            get(handlers::get_operation),
        )
        .with_state(state)
}
