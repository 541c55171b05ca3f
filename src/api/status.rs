//! Status proxy: `GET /status?model=&taskId=`.
//!
//! Stateless relay of the upstream task status. A 404 from upstream is
//! reported as its own "task not found" error so callers can tell an expired
//! or unknown task apart from a transient failure.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;

use super::auth::{resolve_api_key, UPSTREAM_KEY_HEADER};
use super::error::ApiError;
use super::routes::AppState;
use super::types::StatusQuery;
use super::upstream::{error_message, read_reply, snippet, UpstreamBody};
use crate::models::get_model_by_id;

pub(crate) async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, ApiError> {
    let api_key = resolve_api_key(&state.config, &headers)?;

    let (Some(model_id), Some(task_id)) = (non_blank(query.model), non_blank(query.task_id)) else {
        return Err(ApiError::InvalidRequest(
            "model and taskId are required".to_string(),
        ));
    };

    let model = get_model_by_id(&model_id)
        .ok_or_else(|| ApiError::InvalidRequest(format!("Unknown model: {}", model_id)))?;

    let status_url = format!(
        "{}{}/{}",
        state.config.api_base,
        model.status_endpoint,
        urlencoding::encode(&task_id)
    );
    tracing::debug!(model = %model.id, url = %status_url, "Checking task status");

    let response = state
        .http_client
        .get(&status_url)
        .header(UPSTREAM_KEY_HEADER, &api_key)
        .send()
        .await?;

    // A 404 is "task not found" whatever its body looks like
    if response.status() == StatusCode::NOT_FOUND {
        let text = response.text().await.unwrap_or_default();
        tracing::warn!(
            task_id = %task_id,
            url = %status_url,
            body = %snippet(&text, 200),
            "Task not found upstream"
        );
        return Err(ApiError::NotFound {
            message: format!("Task not found (404). URL: {}", status_url),
        });
    }

    let reply = read_reply(response).await?;

    match reply.body {
        UpstreamBody::NonJson(text) => {
            tracing::error!(
                status = %reply.status,
                body = %snippet(&text, 500),
                "Status check: non-JSON response"
            );
            Err(ApiError::Upstream {
                message: format!(
                    "Upstream server returned a non-JSON response ({}).",
                    reply.status.as_u16()
                ),
                raw_snippet: Some(snippet(&text, 200)),
            })
        }
        UpstreamBody::Json(data) if !reply.status.is_success() => Err(ApiError::UpstreamFailure {
            status: reply.status,
            message: error_message(&data, "Failed to check status"),
            details: data,
        }),
        UpstreamBody::Json(data) => Ok(Json(data)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
