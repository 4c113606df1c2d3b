//! Webhook transport.
//!
//! The chat platform adapter posts each user action to `POST /updates` and
//! relays the JSON reply. A `204 No Content` answer means the update was
//! dropped and nothing should be sent.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handler::{Bot, Update};

/// Builds the webhook router.
pub fn router(bot: Arc<Bot>) -> Router {
    Router::new()
        .route("/updates", post(updates))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(bot)
}

async fn updates(State(bot): State<Arc<Bot>>, Json(update): Json<Update>) -> Response {
    match bot.handle(&update).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    active_sessions: usize,
}

async fn health(State(bot): State<Arc<Bot>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        active_sessions: bot.guard().active_sessions(),
    })
}
