use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod ai;
pub mod auth;
pub mod bids;
pub mod files;
pub mod health;
pub mod items;
pub mod settings;

fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());
    let body_limit = state.config.max_upload_bytes;

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let bid_routes = Router::new()
        .route("/", get(bids::list_bids).post(bids::create_bid))
        .route("/grouped", get(bids::list_bids_by_city))
        .route(
            "/:id",
            get(bids::get_bid)
                .put(bids::update_bid)
                .delete(bids::delete_bid),
        )
        .route("/:id/items", get(items::list_items).post(items::add_item))
        .route(
            "/:id/items/:item_id",
            patch(items::update_item).delete(items::remove_item),
        )
        .route("/:id/strategy", post(ai::bid_strategy))
        .route("/:id/payment-reminder", post(ai::payment_reminder));

    let ai_routes = Router::new()
        .route("/extract", post(ai::extract))
        .route("/generate", post(ai::generate))
        .route("/extract-bid", post(ai::extract_bid));

    let protected_routes = Router::new()
        .nest("/api/bids", bid_routes)
        .nest("/api/ai", ai_routes)
        .route("/api/dashboard", get(bids::dashboard))
        .route("/api/payments", get(bids::payments))
        .route("/api/upload", post(files::upload_file))
        .route("/api/files", get(files::list_files))
        .route("/api/files/:id", axum::routing::delete(files::delete_file))
        .route("/api/download/:filename", get(files::download_file))
        .route("/api/certificates", get(files::list_certificates))
        .route(
            "/api/settings",
            get(settings::get_settings).post(settings::save_settings),
        )
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(
            state.clone(),
        ));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
