//! CAR Upload Server
//!
//! Accepts a file over HTTP, packs it into a deterministic CAR, computes the
//! piece commitment (commP) of the CAR, and pins both the CAR and the original
//! file to an IPFS storage node.
//!
//! # Modules
//!
//! - `archive`: file → UnixFS DAG → dense CARv1
//! - `commp`: Fr32 padding and piece commitment
//! - `ipfs`: storage node client (`/api/v0/add`)
//! - `routes`: HTTP handlers

pub mod archive;
pub mod cids;
pub mod commp;
pub mod config;
pub mod error;
pub mod ipfs;
pub mod routes;
pub mod scratch;
pub mod state;
pub mod types;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::upload::router())
        .layer(DefaultBodyLimit::max(state.config().upload.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
