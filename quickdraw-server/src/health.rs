use axum::{routing::get, Json};

use crate::Router;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses(
        (status = 200, body = String, description = "OK followed by the server version")
    )
)]
async fn healthcheck() -> Json<String> {
    Json(format!("OK {VERSION}"))
}

pub fn router() -> Router {
    Router::new().route("/healthcheck", get(healthcheck))
}
