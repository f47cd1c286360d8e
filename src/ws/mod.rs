pub mod connection;
pub mod handler;
pub mod hub;
pub mod protocol;

pub use handler::{ws_handler, AppState, SessionGuard};
pub use hub::Hub;
pub use protocol::{ClientMessage, ServerMessage};

use axum::{routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Push channel on `/ws`; every other path is served from the static asset directory.
pub fn create_router(state: Arc<AppState>, static_dir: impl AsRef<Path>) -> Router {
    let assets = ServeDir::new(static_dir.as_ref()).append_index_html_on_directories(true);

    Router::new()
        .route("/ws", get(ws_handler))
        .fallback_service(assets)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
