//! HTTP handlers for the FinOps API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::allocation::AllocationLine;
use crate::budget::{BudgetPatch, NewBudget};
use crate::ledger::{CostFilter, NewCostEvent};
use crate::optimize::NewResourceUtilization;
use crate::server::ServerState;
use crate::types::FinOpsError;

/// Map a service error onto an HTTP response
fn error_response(err: FinOpsError) -> Response {
    let status = match &err {
        FinOpsError::Validation(_) => StatusCode::BAD_REQUEST,
        FinOpsError::NotFound { .. } => StatusCode::NOT_FOUND,
        FinOpsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// Optional organization scope from the query string
#[derive(Debug, Deserialize)]
pub struct OrgQuery {
    pub organization_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub organization_id: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub allocations: Vec<AllocationLine>,
    #[serde(default = "default_actor")]
    pub created_by: String,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    #[serde(default = "default_actor")]
    pub acknowledged_by: String,
}

fn default_actor() -> String {
    "system".to_string()
}

pub async fn record_cost_handler(
    State(state): State<ServerState>,
    Json(req): Json<NewCostEvent>,
) -> impl IntoResponse {
    match state.service.record_cost(req).await {
        Ok(event) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_costs_handler(
    State(state): State<ServerState>,
    Query(filter): Query<CostFilter>,
) -> impl IntoResponse {
    let costs = state.service.list_costs(&filter).await;
    (StatusCode::OK, Json(costs)).into_response()
}

pub async fn get_cost_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.get_cost(id).await {
        Some(event) => (StatusCode::OK, Json(event)).into_response(),
        None => error_response(FinOpsError::not_found("cost", id.to_string())),
    }
}

pub async fn allocate_cost_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AllocateRequest>,
) -> impl IntoResponse {
    match state
        .service
        .allocate_cost(id, req.allocations, &req.created_by)
        .await
    {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_allocations_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let allocations = state.service.allocations(Some(id)).await;
    (StatusCode::OK, Json(allocations)).into_response()
}

pub async fn create_budget_handler(
    State(state): State<ServerState>,
    Json(req): Json<NewBudget>,
) -> impl IntoResponse {
    match state.service.create_budget(req).await {
        Ok(budget) => (StatusCode::CREATED, Json(budget)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_budgets_handler(
    State(state): State<ServerState>,
    Query(query): Query<OrgQuery>,
) -> impl IntoResponse {
    let Some(org) = query.organization_id else {
        return error_response(FinOpsError::validation("organization_id is required"));
    };
    let budgets = state.service.budgets_for_organization(&org).await;
    (StatusCode::OK, Json(budgets)).into_response()
}

pub async fn get_budget_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.get_budget(id).await {
        Some(budget) => (StatusCode::OK, Json(budget)).into_response(),
        None => error_response(FinOpsError::not_found("budget", id.to_string())),
    }
}

pub async fn update_budget_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<BudgetPatch>,
) -> impl IntoResponse {
    match state.service.update_budget(id, patch).await {
        Ok(budget) => (StatusCode::OK, Json(budget)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_budget_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if state.service.delete_budget(id).await {
        (StatusCode::OK, Json(json!({ "deleted": true }))).into_response()
    } else {
        error_response(FinOpsError::not_found("budget", id.to_string()))
    }
}

pub async fn evaluate_budgets_handler(
    State(state): State<ServerState>,
    Path(org): Path<String>,
) -> impl IntoResponse {
    let created = state.service.evaluate_budgets(&org).await;
    (StatusCode::OK, Json(created)).into_response()
}

pub async fn list_alerts_handler(
    State(state): State<ServerState>,
    Query(query): Query<OrgQuery>,
) -> impl IntoResponse {
    let alerts = state
        .service
        .active_alerts(query.organization_id.as_deref())
        .await;
    (StatusCode::OK, Json(alerts)).into_response()
}

pub async fn acknowledge_alert_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AcknowledgeRequest>,
) -> impl IntoResponse {
    match state.service.acknowledge_alert(id, &req.acknowledged_by).await {
        Ok(acknowledged) => {
            (StatusCode::OK, Json(json!({ "acknowledged": acknowledged }))).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn list_anomalies_handler(
    State(state): State<ServerState>,
    Query(query): Query<OrgQuery>,
) -> impl IntoResponse {
    let anomalies = state
        .service
        .anomalies(query.organization_id.as_deref())
        .await;
    (StatusCode::OK, Json(anomalies)).into_response()
}

pub async fn record_utilization_handler(
    State(state): State<ServerState>,
    Json(req): Json<NewResourceUtilization>,
) -> impl IntoResponse {
    match state.service.record_utilization(req).await {
        Ok(sample) => (StatusCode::CREATED, Json(sample)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn generate_recommendations_handler(
    State(state): State<ServerState>,
    Path(org): Path<String>,
) -> impl IntoResponse {
    match state.service.generate_recommendations(&org).await {
        Ok(recs) => (StatusCode::OK, Json(recs)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_recommendations_handler(
    State(state): State<ServerState>,
    Query(query): Query<OrgQuery>,
) -> impl IntoResponse {
    let recs = state
        .service
        .recommendations(query.organization_id.as_deref())
        .await;
    (StatusCode::OK, Json(recs)).into_response()
}

pub async fn metrics_handler(
    State(state): State<ServerState>,
    Query(query): Query<MetricsQuery>,
) -> impl IntoResponse {
    let metrics = state
        .service
        .metrics(query.organization_id.as_deref(), query.period.as_deref())
        .await;
    (StatusCode::OK, Json(metrics)).into_response()
}

pub async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = state.service.stats().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "stats": stats,
        })),
    )
        .into_response()
}
