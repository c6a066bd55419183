use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::web::{AppState, admin, auth, public, scans, settings};

const BANNER: &str = "AI Misinformation Detector Backend is running";

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/settings",
            get(settings::get_settings).post(settings::save_settings),
        )
        .route("/api/scans", get(scans::list_scans).post(scans::save_scan))
        .route("/api/scans/stats", get(scans::scan_stats))
        .route("/api/analyze", post(scans::analyze))
        .route("/api/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/api/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .route("/", get(banner))
        .route("/healthz", get(healthz))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/public/analyze", post(public::analyze))
        .merge(protected)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn banner() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        BANNER,
    )
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
