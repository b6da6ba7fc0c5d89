//! Chat handlers for the HTTP surface.

use axum::{extract::State, Form};
use serde::Deserialize;
use std::sync::Arc;

use crate::chat::ChatService;
use crate::web::error::ApiError;

/// Form body for `POST /post`.
#[derive(Debug, Default, Deserialize)]
pub struct PostForm {
    /// Author name; created on first use.
    pub username: Option<String>,
    /// Message text.
    pub msg: Option<String>,
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{field} is required"))),
    }
}

/// GET /messages - Recent chat history.
pub async fn messages(State(service): State<Arc<ChatService>>) -> String {
    format!(
        "Here are the most recent messages: \n{}",
        service.render_history().await
    )
}

/// POST /post - Post a message as a named user.
pub async fn post(
    State(service): State<Arc<ChatService>>,
    Form(form): Form<PostForm>,
) -> Result<String, ApiError> {
    let username = required("username", form.username)?;
    let msg = required("msg", form.msg)?;

    let line = service.post_as(&username, &msg).await?;
    tracing::debug!(username = %username.trim(), "Message posted over HTTP");

    Ok(format!("Message successfully posted: \n{line}"))
}

/// GET /health - Liveness check.
pub async fn health() -> &'static str {
    "OK"
}
