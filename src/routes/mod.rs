pub mod opnform;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/opnform", opnform::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
