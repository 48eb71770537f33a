//! HTTP server exposing the FinOps operation set
//!
//! Thin JSON layer over the service facade; no authentication (the
//! service is consumed in-process or behind a trusted gateway).

pub mod http;

use anyhow::{Context, Result};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::service::FinOpsService;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<FinOpsService>,
}

/// Build the API router
pub fn router(service: Arc<FinOpsService>) -> Router {
    let state = ServerState { service };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/costs", post(http::record_cost_handler))
        .route("/api/costs", get(http::list_costs_handler))
        .route("/api/costs/{id}", get(http::get_cost_handler))
        .route("/api/costs/{id}/allocate", post(http::allocate_cost_handler))
        .route("/api/costs/{id}/allocations", get(http::list_allocations_handler))
        .route("/api/budgets", post(http::create_budget_handler))
        .route("/api/budgets", get(http::list_budgets_handler))
        .route("/api/budgets/{id}", get(http::get_budget_handler))
        .route("/api/budgets/{id}", put(http::update_budget_handler))
        .route("/api/budgets/{id}", delete(http::delete_budget_handler))
        .route(
            "/api/organizations/{org}/evaluate",
            post(http::evaluate_budgets_handler),
        )
        .route(
            "/api/organizations/{org}/recommendations",
            post(http::generate_recommendations_handler),
        )
        .route("/api/alerts", get(http::list_alerts_handler))
        .route("/api/alerts/{id}/acknowledge", post(http::acknowledge_alert_handler))
        .route("/api/anomalies", get(http::list_anomalies_handler))
        .route("/api/utilization", post(http::record_utilization_handler))
        .route("/api/recommendations", get(http::list_recommendations_handler))
        .route("/api/metrics", get(http::metrics_handler))
        .route("/api/status", get(http::status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(service: Arc<FinOpsService>, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid listen address")?;

    let app = router(service);

    info!(%addr, "FinOps server listening");
    println!("FinOps server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listen address")?;
    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
