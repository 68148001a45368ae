//! # Convoy Vehicle
//!
//! HTTP face of one vehicle agent: accepts pushed routes, describes itself to
//! peers and exposes health and counters.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use convoy_agent::VehicleAgent;
use convoy_core::{endpoints, ConvoyError, Route, VehicleState, VERSION};
use convoy_transport::Ack;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

pub fn router(agent: Arc<VehicleAgent>) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(health_check))
        .route(endpoints::METRICS, get(metrics))
        .route(endpoints::API_V1_ROUTE, post(push_route))
        .route(endpoints::API_V1_STATE, get(describe_self))
        .with_state(agent)
}

#[instrument]
async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "convoy-vehicle",
        "version": VERSION
    })))
}

#[instrument(skip(agent), fields(vehicle = %agent.id()))]
async fn metrics(State(agent): State<Arc<VehicleAgent>>) -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "service": "convoy-vehicle",
        "vehicle": agent.id(),
        "mode": agent.mode(),
        "known_peers": agent.peers().len(),
        "counters": agent.metrics().snapshot()
    })))
}

#[instrument(skip(agent, route), fields(vehicle = %agent.id(), waypoints = route.len()))]
async fn push_route(
    State(agent): State<Arc<VehicleAgent>>,
    Json(route): Json<Route>,
) -> Result<Json<Ack>, StatusCode> {
    match agent.accept_route(route) {
        Ok(()) => Ok(Json(Ack::new("route accepted"))),
        Err(err @ (ConvoyError::InvalidRoute { .. }
        | ConvoyError::OutOfBounds { .. }
        | ConvoyError::PathNotFound { .. })) => {
            warn!(%err, "Rejected pushed route");
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        }
        Err(err) => {
            warn!(%err, "Failed to take pushed route");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[instrument(level = "debug", skip(agent), fields(vehicle = %agent.id()))]
async fn describe_self(State(agent): State<Arc<VehicleAgent>>) -> Json<VehicleState> {
    Json(agent.state())
}
