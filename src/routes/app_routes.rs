// src/routes/app_routes.rs

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::handlers::message_handlers::{ai_reply, list_messages, send_message};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Chat backend is running" }))
        .route("/messages", get(list_messages))
        .route("/messages/send", post(send_message))
        .route("/messages/ai-reply", post(ai_reply))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
