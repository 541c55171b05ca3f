//! Generate proxy: `POST /generate`.
//!
//! Body is `{model, ...params}`. The params are forwarded, minus empty values,
//! to the model's generation endpoint in a single attempt.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use serde_json::{Map, Value};

use super::auth::{resolve_api_key, UPSTREAM_KEY_HEADER};
use super::error::ApiError;
use super::routes::AppState;
use super::upstream::{error_message, read_reply, snippet, UpstreamBody};
use crate::models::get_model_by_id;

pub(crate) async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    // Key first: a missing key is reported whatever the body looks like
    let api_key = resolve_api_key(&state.config, &headers)?;

    let (model_id, params) = split_model(&body)?;
    let model = get_model_by_id(&model_id)
        .ok_or_else(|| ApiError::InvalidRequest(format!("Unknown model: {}", model_id)))?;

    let clean = sanitize_params(params);
    let url = format!("{}{}", state.config.api_base, model.endpoint);
    let forwarded = Value::Object(clean.clone());
    tracing::info!(
        model = %model.id,
        url = %url,
        params = %forwarded,
        "Forwarding generate request"
    );

    let response = state
        .http_client
        .post(&url)
        .header(UPSTREAM_KEY_HEADER, &api_key)
        .json(&clean)
        .send()
        .await?;

    let reply = read_reply(response).await?;
    match reply.body {
        UpstreamBody::NonJson(text) => {
            tracing::error!(
                status = %reply.status,
                body = %snippet(&text, 500),
                "Generate: non-JSON response"
            );
            Err(ApiError::Upstream {
                message: format!(
                    "Upstream API error ({}). Server returned a non-JSON response. Please try again.",
                    reply.status.as_u16()
                ),
                raw_snippet: None,
            })
        }
        UpstreamBody::Json(data) if !reply.status.is_success() => Err(ApiError::UpstreamFailure {
            status: reply.status,
            message: error_message(&data, "API request failed"),
            details: data,
        }),
        UpstreamBody::Json(data) => Ok(Json(data)),
    }
}

/// Split the request body into the model id and the remaining params.
fn split_model(body: &[u8]) -> Result<(String, Map<String, Value>), ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid request body: {}", e)))?;
    let Value::Object(mut params) = value else {
        return Err(ApiError::InvalidRequest(
            "Request body must be a JSON object".to_string(),
        ));
    };

    let model_id = match params.remove("model") {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        _ => return Err(ApiError::InvalidRequest("Model ID is required".to_string())),
    };
    Ok((model_id, params))
}

/// Drop params the upstream rejects: empty strings and nulls.
pub fn sanitize_params(params: Map<String, Value>) -> Map<String, Value> {
    params
        .into_iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .collect()
}
