//! # Orchestration Handlers
//!
//! HTTP handlers exposing orchestrations and their operations, plus the
//! retry and cancel control endpoints. This layer is a thin mapping over
//! storage and the control paths; all scheduling behavior lives in the
//! strategy engine.

use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc, Weekday};
use serde::Serialize;
use tracing::{error, info};

use super::errors::{ApiError, ApiResult};
use super::pagination::parse_list_params;
use super::state::AppState;
use crate::control::RetryResponse;
use crate::model::{
    Orchestration, OrchestrationKind, OrchestrationState, OperationState, RuntimeOperation,
    StrategySpec,
};
use crate::storage::{OperationFilter, OperationStats, OrchestrationFilter};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Serialize)]
pub struct OrchestrationResponse {
    pub orchestration_id: String,
    pub kind: OrchestrationKind,
    pub state: OrchestrationState,
    pub description: String,
    pub strategy: StrategySpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_stats: Option<OperationStats>,
}

impl OrchestrationResponse {
    fn from_record(o: Orchestration, stats: Option<OperationStats>) -> Self {
        Self {
            orchestration_id: o.orchestration_id,
            kind: o.kind,
            state: o.state,
            description: o.description,
            strategy: o.strategy,
            created_at: o.created_at,
            updated_at: o.updated_at,
            operation_stats: stats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrchestrationListResponse {
    pub data: Vec<OrchestrationResponse>,
    pub count: usize,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub operation_id: String,
    pub orchestration_id: String,
    pub runtime_id: String,
    pub state: OperationState,
    pub maintenance_window_begin: Option<DateTime<Utc>>,
    pub maintenance_window_end: Option<DateTime<Utc>>,
    pub maintenance_days: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RuntimeOperation> for OperationResponse {
    fn from(op: RuntimeOperation) -> Self {
        Self {
            operation_id: op.operation_id,
            orchestration_id: op.orchestration_id,
            runtime_id: op.runtime_id,
            state: op.state,
            maintenance_window_begin: op.maintenance_window_begin,
            maintenance_window_end: op.maintenance_window_end,
            maintenance_days: op.maintenance_days.iter().map(weekday_name).collect(),
            created_at: op.created_at,
            updated_at: op.updated_at,
        }
    }
}

fn weekday_name(day: &Weekday) -> String {
    day.to_string()
}

#[derive(Debug, Serialize)]
pub struct OperationListResponse {
    pub data: Vec<OperationResponse>,
    pub count: usize,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub orchestration_id: String,
}

/// List orchestrations: `GET /orchestrations`.
pub async fn list_orchestrations(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<OrchestrationListResponse>> {
    let params = parse_list_params(query.as_deref(), state.default_max_page)?;
    let states = params
        .states
        .iter()
        .map(|s| {
            s.parse::<OrchestrationState>()
                .map_err(ApiError::bad_request)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let filter = OrchestrationFilter {
        page: Some(params.page),
        states,
    };
    let page = state.orchestrations.list(&filter).await.map_err(|err| {
        error!(error = %err, "while listing orchestrations");
        ApiError::from(err)
    })?;

    Ok(Json(OrchestrationListResponse {
        count: page.count,
        total_count: page.total_count,
        data: page
            .items
            .into_iter()
            .map(|o| OrchestrationResponse::from_record(o, None))
            .collect(),
    }))
}

/// Get one orchestration with its operation statistics:
/// `GET /orchestrations/{orchestration_id}`.
pub async fn get_orchestration(
    State(state): State<AppState>,
    Path(orchestration_id): Path<String>,
) -> ApiResult<Json<OrchestrationResponse>> {
    let orchestration = state
        .orchestrations
        .get_by_id(&orchestration_id)
        .await
        .map_err(|err| {
            error!(orchestration_id = %orchestration_id, error = %err, "while getting orchestration");
            ApiError::from(err)
        })?;

    let stats = state
        .operations
        .stats_for_orchestration(orchestration.kind, &orchestration_id)
        .await
        .map_err(|err| {
            error!(
                orchestration_id = %orchestration_id,
                error = %err,
                "while getting orchestration operation statistics"
            );
            ApiError::from(err)
        })?;

    Ok(Json(OrchestrationResponse::from_record(
        orchestration,
        Some(stats),
    )))
}

/// Cancel an orchestration: `PUT /orchestrations/{orchestration_id}/cancel`.
pub async fn cancel_orchestration(
    State(state): State<AppState>,
    Path(orchestration_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    state
        .canceler
        .cancel_for_id(&orchestration_id)
        .await
        .map_err(|err| {
            error!(orchestration_id = %orchestration_id, error = %err, "while canceling orchestration");
            ApiError::from(err)
        })?;

    Ok(Json(CancelResponse { orchestration_id }))
}

/// Retry operations of an orchestration:
/// `POST /orchestrations/{orchestration_id}/retry`.
///
/// The body must be form-encoded with zero or more `operation-id` fields; an
/// empty body retries every retriable operation.
pub async fn retry_orchestration(
    State(state): State<AppState>,
    Path(orchestration_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, Json<RetryResponse>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or("").trim().to_string())
        .unwrap_or_default();
    if content_type != FORM_CONTENT_TYPE {
        return Err(ApiError::UnsupportedMediaType(format!(
            "invalid content type {content_type}"
        )));
    }

    let operation_ids: Vec<String> = form_urlencoded::parse(body.as_bytes())
        .filter(|(key, _)| key == "operation-id")
        .map(|(_, value)| value.into_owned())
        .collect();

    let response = state
        .retryer
        .retry(&orchestration_id, &operation_ids)
        .await
        .map_err(|err| {
            error!(orchestration_id = %orchestration_id, error = %err, "while retrying orchestration");
            ApiError::from(err)
        })?;

    if response.accepted.is_empty() {
        info!(orchestration_id = %orchestration_id, "no valid operations to retry");
    }
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// List operations of an orchestration:
/// `GET /orchestrations/{orchestration_id}/operations`.
pub async fn list_operations(
    State(state): State<AppState>,
    Path(orchestration_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<OperationListResponse>> {
    let params = parse_list_params(query.as_deref(), state.default_max_page)?;
    let states = params
        .states
        .iter()
        .map(|s| s.parse::<OperationState>().map_err(ApiError::bad_request))
        .collect::<Result<Vec<_>, _>>()?;

    let orchestration = state
        .orchestrations
        .get_by_id(&orchestration_id)
        .await
        .map_err(|err| {
            error!(orchestration_id = %orchestration_id, error = %err, "while getting orchestration");
            ApiError::from(err)
        })?;

    let filter = OperationFilter {
        page: Some(params.page),
        states,
    };
    let page = state
        .operations
        .list_by_orchestration(orchestration.kind, &orchestration_id, &filter)
        .await
        .map_err(|err| {
            error!(orchestration_id = %orchestration_id, error = %err, "while getting operations");
            ApiError::from(err)
        })?;

    Ok(Json(OperationListResponse {
        count: page.count,
        total_count: page.total_count,
        data: page.items.into_iter().map(OperationResponse::from).collect(),
    }))
}

/// Get one operation:
/// `GET /orchestrations/{orchestration_id}/operations/{operation_id}`.
pub async fn get_operation(
    State(state): State<AppState>,
    Path((orchestration_id, operation_id)): Path<(String, String)>,
) -> ApiResult<Json<OperationResponse>> {
    let orchestration = state
        .orchestrations
        .get_by_id(&orchestration_id)
        .await
        .map_err(|err| {
            error!(orchestration_id = %orchestration_id, error = %err, "while getting orchestration");
            ApiError::from(err)
        })?;

    let operation = state
        .operations
        .get_by_id(orchestration.kind, &operation_id)
        .await
        .map_err(|err| {
            error!(operation_id = %operation_id, error = %err, "while getting operation");
            ApiError::from(err)
        })?;

    if operation.orchestration_id != orchestration_id {
        return Err(ApiError::not_found(format!(
            "operation {operation_id} not found in orchestration {orchestration_id}"
        )));
    }

    Ok(Json(OperationResponse::from(operation)))
}
