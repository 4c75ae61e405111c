//! HTTP+REST transport — the same operations as the JSON-RPC transport,
//! exposed as REST routes under `/v1`.
//!
//! Mirrors `axum_integration.rs`'s router/state/SSE-stream structure, with
//! parameters carried in the path and query instead of a JSON-RPC envelope,
//! and SSE frames carrying the raw event payload rather than a JSON-RPC
//! success envelope.
//!
//! # Routes
//!
//! | Route | Response |
//! |-------|----------|
//! | `POST /v1/message:send` | 201 Task/Message |
//! | `POST /v1/message:stream` | 200 SSE |
//! | `GET /v1/tasks/{taskId}` | 200 Task |
//! | `POST /v1/tasks/{taskId}:cancel` | 202 Task |
//! | `POST /v1/tasks/{taskId}:subscribe` | 200 SSE |
//! | `POST /v1/tasks/{taskId}/pushNotificationConfigs` | 201 |
//! | `GET /v1/tasks/{taskId}/pushNotificationConfigs` | 200 |
//! | `GET /v1/tasks/{taskId}/pushNotificationConfigs/{configId}` | 200 |
//! | `DELETE /v1/tasks/{taskId}/pushNotificationConfigs/{configId}` | 204 |
//! | `GET /v1/card` | 200 AgentCard |

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::error;

use crate::error::A2AError;
use crate::types::{AgentCard, JsonRpcError, PushNotificationConfig, StreamResponse};

use super::request_handler::{
    CancelTaskParams, GetTaskParams, RequestHandler, SubscribeToTaskParams,
};

use super::axum_integration::parse_send_message_params;
use super::task_store::TaskListParams;
use crate::types::TaskState;

/// Shared state for the REST routes.
struct AppState {
    handler: Arc<dyn RequestHandler>,
    agent_card: AgentCard,
}

/// Create an axum `Router` exposing the A2A operations as REST routes under
/// `/v1`, per the HTTP+REST binding.
pub fn rest_router(handler: Arc<dyn RequestHandler>, agent_card: AgentCard) -> Router {
    let state = Arc::new(AppState {
        handler,
        agent_card,
    });

    Router::new()
        .route("/v1/message:send", post(handle_message_send))
        .route("/v1/message:stream", post(handle_message_stream))
        .route("/v1/tasks", get(handle_list_tasks))
        .route("/v1/tasks/{task_id}", get(handle_get_task))
        .route("/v1/tasks/{task_id}:cancel", post(handle_cancel_task))
        .route("/v1/tasks/{task_id}:subscribe", post(handle_subscribe))
        .route(
            "/v1/tasks/{task_id}/pushNotificationConfigs",
            post(handle_push_config_create).get(handle_push_config_list),
        )
        .route(
            "/v1/tasks/{task_id}/pushNotificationConfigs/{config_id}",
            get(handle_push_config_get).delete(handle_push_config_delete),
        )
        .route("/v1/card", get(handle_card))
        .with_state(state)
}

/// Build an error response: the status the error maps to on the REST
/// binding, with a JSON-RPC-shaped error body.
fn error_response(err: A2AError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body: JsonRpcError = err.into();
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct HistoryLengthQuery {
    #[serde(rename = "historyLength")]
    history_length: Option<usize>,
}

/// `POST /v1/message:send`.
async fn handle_message_send(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let params = match parse_send_message_params(body) {
        Ok(p) => p,
        Err(e) => {
            return error_response(A2AError::invalid_params(format!("Invalid params: {}", e)));
        }
    };

    match state.handler.on_message_send(params).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => error_response(e),
    }
}

/// `POST /v1/message:stream`.
async fn handle_message_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !state.agent_card.capabilities.streaming.unwrap_or(false) {
        return error_response(A2AError::unsupported_operation(
            "Streaming is not supported by the agent",
        ));
    }

    let params = match parse_send_message_params(body) {
        Ok(p) => p,
        Err(e) => {
            return error_response(A2AError::invalid_params(format!("Invalid params: {}", e)));
        }
    };

    match state.handler.on_message_send_stream(params).await {
        Ok(rx) => raw_sse_response(rx),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ListTasksQuery {
    #[serde(rename = "contextId")]
    context_id: Option<String>,
    status: Option<TaskState>,
    #[serde(rename = "pageSize")]
    page_size: Option<usize>,
    #[serde(rename = "pageToken")]
    page_token: Option<String>,
}

/// `GET /v1/tasks` — supplemental REST route, not in the original route
/// table, mirroring the `tasks/list` JSON-RPC method kept from the teacher.
async fn handle_list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    let params = TaskListParams {
        context_id: query.context_id,
        status: query.status.map(|s| vec![s]),
        page_size: query.page_size,
        page_token: query.page_token,
    };

    match state.handler.on_list_tasks(params).await {
        Ok(response) => {
            let body = serde_json::json!({
                "tasks": response.tasks,
                "nextPageToken": response.next_page_token,
            });
            Json(body).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// `GET /v1/tasks/{taskId}?historyLength=`.
async fn handle_get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Query(query): Query<HistoryLengthQuery>,
) -> Response {
    let params = GetTaskParams {
        id: task_id,
        history_length: query.history_length,
        metadata: None,
        tenant: None,
    };

    match state.handler.on_get_task(params).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => error_response(e),
    }
}

/// `POST /v1/tasks/{taskId}:cancel`.
async fn handle_cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Response {
    let params = CancelTaskParams {
        id: task_id,
        metadata: None,
        tenant: None,
    };

    match state.handler.on_cancel_task(params).await {
        Ok(task) => (StatusCode::ACCEPTED, Json(task)).into_response(),
        Err(e) => error_response(e),
    }
}

/// `POST /v1/tasks/{taskId}:subscribe`.
///
/// Bound to `on_resubscribe_to_task` — the REST binding has no separate
/// "first-time subscribe" call; the initial task snapshot it seeds the
/// stream with is harmless for a fresh subscriber that hasn't seen any
/// events yet.
async fn handle_subscribe(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Response {
    if !state.agent_card.capabilities.streaming.unwrap_or(false) {
        return error_response(A2AError::unsupported_operation(
            "Streaming is not supported by the agent",
        ));
    }

    let params = SubscribeToTaskParams {
        id: task_id,
        metadata: None,
        tenant: None,
    };

    match state.handler.on_resubscribe_to_task(params).await {
        Ok(rx) => raw_sse_response(rx),
        Err(e) => error_response(e),
    }
}

/// `POST /v1/tasks/{taskId}/pushNotificationConfigs`.
async fn handle_push_config_create(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(config): Json<PushNotificationConfig>,
) -> Response {
    if !state.agent_card.capabilities.push_notifications.unwrap_or(false) {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }

    let config_id = config.id.clone().unwrap_or_else(|| task_id.clone());
    let value = serde_json::json!({
        "taskId": task_id,
        "configId": config_id,
        "config": config,
    });

    match state
        .handler
        .on_set_task_push_notification_config(value)
        .await
    {
        Ok(saved) => (StatusCode::CREATED, Json(saved)).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /v1/tasks/{taskId}/pushNotificationConfigs`.
async fn handle_push_config_list(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Response {
    if !state.agent_card.capabilities.push_notifications.unwrap_or(false) {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }

    let value = serde_json::json!({ "id": task_id });
    match state
        .handler
        .on_list_task_push_notification_config(value)
        .await
    {
        Ok(list) => Json(list).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /v1/tasks/{taskId}/pushNotificationConfigs/{configId}`.
async fn handle_push_config_get(
    State(state): State<Arc<AppState>>,
    Path((task_id, config_id)): Path<(String, String)>,
) -> Response {
    if !state.agent_card.capabilities.push_notifications.unwrap_or(false) {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }

    let value = serde_json::json!({
        "id": task_id,
        "pushNotificationConfigId": config_id,
    });
    match state
        .handler
        .on_get_task_push_notification_config(value)
        .await
    {
        Ok(found) => Json(found).into_response(),
        Err(e) => error_response(e),
    }
}

/// `DELETE /v1/tasks/{taskId}/pushNotificationConfigs/{configId}`.
async fn handle_push_config_delete(
    State(state): State<Arc<AppState>>,
    Path((task_id, config_id)): Path<(String, String)>,
) -> Response {
    if !state.agent_card.capabilities.push_notifications.unwrap_or(false) {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }

    let value = serde_json::json!({
        "id": task_id,
        "pushNotificationConfigId": config_id,
    });
    match state
        .handler
        .on_delete_task_push_notification_config(value)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /v1/card`.
async fn handle_card(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.agent_card.clone())
}

// ---- SSE streaming ----

/// Create a REST-binding SSE stream: each `data:` line is the raw event
/// payload (no JSON-RPC envelope). Mirrors `axum_integration::make_sse_stream`
/// but without the envelope wrapping, per the REST transport's framing rule.
fn raw_sse_response(rx: broadcast::Receiver<StreamResponse>) -> Response {
    Sse::new(raw_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn raw_sse_stream(
    mut rx: broadcast::Receiver<StreamResponse>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let is_terminal = match &event {
                        StreamResponse::StatusUpdate(update) => update.r#final,
                        _ => false,
                    };

                    match serde_json::to_string(&event) {
                        Ok(json) => yield Ok(Event::default().data(json)),
                        Err(e) => {
                            error!(error = %e, "Failed to serialize SSE event");
                            let rpc_err: JsonRpcError = A2AError::internal_error(format!(
                                "Failed to serialize event: {}",
                                e
                            ))
                            .into();
                            if let Ok(json) = serde_json::to_string(&rpc_err) {
                                yield Ok(Event::default().event("error").data(json));
                            }
                            break;
                        }
                    }

                    if is_terminal {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "SSE stream lagged — some events were missed");
                }
            }
        }
    }
}
