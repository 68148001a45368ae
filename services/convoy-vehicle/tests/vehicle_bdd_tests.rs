use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use convoy_agent::{DriveMode, VehicleAgent};
use convoy_core::{endpoints, Coordinate, GridConfig, Route, VehicleConfig, VehicleState};
use convoy_metrics::VehicleMetrics;
use convoy_transport::MemoryNetwork;
use convoy_vehicle::router;
use cucumber::{given, then, when, World};
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Debug, World)]
#[world(init = Self::new)]
struct VehicleWorld {
    agent: Option<Arc<VehicleAgent>>,
    last_status: Option<StatusCode>,
    last_body: Option<String>,
}

impl VehicleWorld {
    fn new() -> Self {
        Self {
            agent: None,
            last_status: None,
            last_body: None,
        }
    }

    fn agent(&self) -> &Arc<VehicleAgent> {
        self.agent.as_ref().expect("vehicle not started")
    }

    async fn send(&mut self, request: Request<Body>) {
        let response = router(self.agent().clone())
            .oneshot(request)
            .await
            .expect("request should be served");
        self.last_status = Some(response.status());
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect response body");
        self.last_body = Some(String::from_utf8_lossy(&bytes).into_owned());
    }
}

fn parse_route(cells: &str) -> Route {
    cells
        .split_whitespace()
        .map(|cell| {
            let (x, y) = cell.split_once(',').expect("cell as x,y");
            Coordinate::new(x.parse().expect("x"), y.parse().expect("y"))
        })
        .collect()
}

#[given(expr = "a vehicle {string} at {int},{int} on an {int}x{int} grid")]
async fn given_vehicle(world: &mut VehicleWorld, id: String, x: i32, y: i32, size: i32, _h: i32) {
    let network = MemoryNetwork::new();
    let config = VehicleConfig {
        address: id,
        start: Coordinate::new(x, y),
        grid: GridConfig { size },
        ..VehicleConfig::default()
    };
    let agent = VehicleAgent::new(
        config,
        network.clone(),
        network,
        Arc::new(VehicleMetrics::new()),
    )
    .expect("valid vehicle config");
    world.agent = Some(Arc::new(agent));
}

#[when("its state is requested")]
async fn when_state_requested(world: &mut VehicleWorld) {
    let request = Request::builder()
        .uri(endpoints::API_V1_STATE)
        .body(Body::empty())
        .expect("request");
    world.send(request).await;
}

#[when(expr = "the route {string} is pushed")]
async fn when_route_pushed(world: &mut VehicleWorld, cells: String) {
    let body = serde_json::to_string(&parse_route(&cells)).expect("route serializes");
    let request = Request::builder()
        .method("POST")
        .uri(endpoints::API_V1_ROUTE)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request");
    world.send(request).await;
}

#[when(expr = "the vehicle drives {int} tick(s)")]
async fn when_drives(world: &mut VehicleWorld, ticks: usize) {
    for _ in 0..ticks {
        world.agent().tick().await;
    }
}

#[when("the health endpoint is called")]
async fn when_health(world: &mut VehicleWorld) {
    let request = Request::builder()
        .uri(endpoints::HEALTH)
        .body(Body::empty())
        .expect("request");
    world.send(request).await;
}

#[then(expr = "the response status should be {int}")]
async fn then_status(world: &mut VehicleWorld, status: u16) {
    assert_eq!(
        world.last_status.map(|s| s.as_u16()),
        Some(status),
        "body: {:?}",
        world.last_body
    );
}

#[then(expr = "the described vehicle should be {string} at {int},{int}")]
async fn then_described_at(world: &mut VehicleWorld, id: String, x: i32, y: i32) {
    let body = world.last_body.as_deref().expect("no response body");
    let state: VehicleState = serde_json::from_str(body).expect("state is json");
    assert_eq!(state.id, id);
    assert_eq!(state.position, Coordinate::new(x, y));
}

#[then("the described vehicle should be idle")]
async fn then_described_idle(world: &mut VehicleWorld) {
    let body = world.last_body.as_deref().expect("no response body");
    let state: VehicleState = serde_json::from_str(body).expect("state is json");
    assert!(state.is_idle());
}

#[then("the vehicle should be following a route")]
async fn then_following(world: &mut VehicleWorld) {
    assert_eq!(world.agent().mode(), DriveMode::RouteFollowing);
}

#[then("the vehicle should not be following a route")]
async fn then_not_following(world: &mut VehicleWorld) {
    assert_ne!(world.agent().mode(), DriveMode::RouteFollowing);
    assert!(world.agent().state().route.is_empty());
}

#[then(expr = "the vehicle route should be {string}")]
async fn then_route_is(world: &mut VehicleWorld, cells: String) {
    assert_eq!(world.agent().state().route, parse_route(&cells));
}

#[tokio::main]
async fn main() {
    VehicleWorld::run("tests/features").await;
}
