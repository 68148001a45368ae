use crate::grid::GridView;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use convoy_core::{endpoints, Coordinate, Route, VehicleState, VERSION};
use convoy_dispatch::{Dispatcher, FleetRegistry};
use convoy_metrics::DispatchMetrics;
use convoy_transport::Ack;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Shared state behind every coordinator handler.
#[derive(Debug, Clone)]
pub struct CoordinatorState {
    pub registry: Arc<FleetRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub grid: Arc<GridView>,
    pub metrics: Arc<DispatchMetrics>,
}

/// Body of an on-demand dispatch. Missing endpoints are drawn at random.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub start: Option<Coordinate>,
    #[serde(default)]
    pub end: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchAccepted {
    pub route: Route,
    pub status: String,
}

pub fn router(state: CoordinatorState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(health_check))
        .route(endpoints::METRICS, get(metrics))
        .route(endpoints::API_V1_VEHICLE_STATE, post(report_state))
        .route(endpoints::API_V1_VEHICLES, get(list_vehicles))
        .route(endpoints::API_V1_ROUTES, post(dispatch_route))
        .route(endpoints::API_V1_GRID, get(render_grid))
        .with_state(Arc::new(state))
}

#[instrument]
async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "convoy-coordinator",
        "version": VERSION
    })))
}

#[instrument(skip(state))]
async fn metrics(State(state): State<Arc<CoordinatorState>>) -> Result<Json<Value>, StatusCode> {
    let idle = state.registry.list_idle().len();
    Ok(Json(json!({
        "service": "convoy-coordinator",
        "vehicles": state.registry.len(),
        "idle_vehicles": idle,
        "dispatch": state.metrics.snapshot()
    })))
}

#[instrument(skip(state, vehicle), fields(vehicle = %vehicle.id, position = %vehicle.position))]
async fn report_state(
    State(state): State<Arc<CoordinatorState>>,
    Json(vehicle): Json<VehicleState>,
) -> Result<Json<Ack>, StatusCode> {
    let size = state.grid.size();
    if !vehicle.position.in_bounds(size) || vehicle.route.iter().any(|c| !c.in_bounds(size)) {
        warn!("Rejected state report outside the grid");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    state.metrics.reports_received.incr();
    state.registry.upsert(vehicle);
    Ok(Json(Ack::new("state received")))
}

#[instrument(skip(state))]
async fn list_vehicles(State(state): State<Arc<CoordinatorState>>) -> Result<Json<Value>, StatusCode> {
    let vehicles = state.registry.list();
    Ok(Json(json!({
        "total": vehicles.len(),
        "vehicles": vehicles
    })))
}

/// Plans a job now and hands it to the dispatcher. Assignment may wait for a
/// free vehicle, so it runs in the background and the route is returned as
/// soon as it is planned.
#[instrument(skip(state))]
async fn dispatch_route(
    State(state): State<Arc<CoordinatorState>>,
    Json(request): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<DispatchAccepted>), StatusCode> {
    let planned = match (request.start, request.end) {
        (Some(start), Some(end)) => state.dispatcher.plan_job(start, end),
        (None, None) => state.dispatcher.generate_route(&mut rand::rng()),
        _ => {
            warn!("Dispatch request needs both endpoints or neither");
            return Err(StatusCode::BAD_REQUEST);
        }
    };
    let route = planned.map_err(|err| {
        warn!(%err, "Dispatch request could not be planned");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    info!(%route, "Dispatching on request");
    let dispatcher = state.dispatcher.clone();
    let job = route.clone();
    tokio::spawn(async move {
        if let Err(err) = dispatcher.assign_route(job).await {
            error!(%err, "On-demand dispatch failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchAccepted {
            route,
            status: "queued".to_string(),
        }),
    ))
}

#[instrument(skip(state))]
async fn render_grid(State(state): State<Arc<CoordinatorState>>) -> String {
    state.grid.render()
}
