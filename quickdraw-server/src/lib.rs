mod auth;
mod context;
mod docs;
mod errors;
mod health;
mod pagination;
mod rooms;
mod schemas;
mod serialized;

use axum::routing::get;
use log::info;
use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use quickdraw_collab::Collab;

pub use context::ServerContext;
pub use errors::{ServerError, ServerResult};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;
/// The default upper bound on how long a single request may take.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type Router = axum::Router<ServerContext>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Builds the full quickdraw router.
///
/// A request that outlives `request_timeout` is dropped, which also drops any
/// store work it was waiting on.
pub fn router(collab: Arc<Collab>, request_timeout: Duration) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new().nest("/rooms", rooms::router());

    Router::new()
        .merge(health::router())
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .with_state(ServerContext { collab })
}

/// Starts the quickdraw server
pub async fn run_server(collab: Arc<Collab>, config: ServerConfig) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, router(collab, config.request_timeout)).await
}
