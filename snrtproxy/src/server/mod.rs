pub mod m3u;
pub mod rewrite;
pub mod routes;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::channel::ChannelRegistry;
use crate::store::TokenStore;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChannelRegistry>,
    pub store: Arc<TokenStore>,
    pub client: reqwest::Client,
}

/// Run the HTTP relay server.
pub async fn run_server(
    addr: SocketAddr,
    registry: Arc<ChannelRegistry>,
    store: Arc<TokenStore>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState {
        registry,
        store,
        client: reqwest::Client::new(),
    };

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/playlist.m3u", get(routes::index))
        .route("/reload", get(routes::reload))
        .route("/{channel}", get(routes::channel_playlist))
        .route("/{channel}/{*subpath}", get(routes::channel_subresource))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
