//! Dev-only middleware that delays every request by a random amount, to
//! exercise client loading states against a local server.

use axum::{body::Body, http::Request, middleware::Next, response::IntoResponse};
use rand::Rng;
use std::time::Duration;

pub async fn slowdown_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let millis = rand::rng().random_range(200..1500);
    tokio::time::sleep(Duration::from_millis(millis)).await;
    next.run(request).await
}
