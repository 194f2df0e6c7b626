//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! REST routes are nested under `/api/`; the observer WebSocket lives at
//! `/ws`. CORS is permissive — the queue board is served to browsers on
//! the clinic network.
//!
//! NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::api::websocket;

/// Build the full router from a pre-constructed [`ApiContext`].
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/patients/register", post(endpoints::patients::register))
        .route("/patients/queue", get(endpoints::patients::queue))
        .route("/patients/stats", get(endpoints::patients::stats))
        .route("/patients/:id", get(endpoints::patients::detail))
        .route(
            "/doctors",
            get(endpoints::doctors::list).post(endpoints::doctors::create),
        )
        .route(
            "/doctors/:id/start-consultation",
            post(endpoints::doctors::start_consultation),
        )
        .route(
            "/doctors/:id/complete-consultation",
            post(endpoints::doctors::complete_consultation),
        )
        .route(
            "/doctors/:id/skip-patient",
            post(endpoints::doctors::skip_patient),
        )
        .route(
            "/doctors/:id/flag-emergency",
            post(endpoints::doctors::flag_emergency),
        )
        .route("/staff/register-walkin", post(endpoints::staff::register_walkin))
        .route("/staff/add-emergency", post(endpoints::staff::add_emergency))
        .route("/staff/mark-noshow/:patient_id", post(endpoints::staff::mark_noshow))
        .route("/staff/toggle-doctor/:doctor_id", put(endpoints::staff::toggle_doctor))
        .route("/staff/rebalance", post(endpoints::staff::rebalance))
        .route("/staff/logs", get(endpoints::staff::logs))
        .with_state(ctx.clone());

    let ws_routes = Router::new()
        .route("/ws", get(websocket::ws_upgrade))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}
