//! JSON-RPC 2.0 dispatch (spec.md §4.1) plus the `message/send` /
//! `tasks/get` / `tasks/cancel` handlers and the task-execution helpers
//! shared with `sse.rs`'s `message/stream`.
//!
//! Grounded on `examples/original_source/a2a_server/server.py`
//! (`handle_jsonrpc`, `handle_message_send`, `_handle_followup`,
//! `handle_tasks_get`, `handle_tasks_cancel`, `_execute_task`,
//! `_extract_message_text`, `_check_auth`, `_jsonrpc_result`/`_jsonrpc_error`),
//! translated handler-for-handler.

use std::collections::HashMap;

use a2a_core::config::{AuthScheme, AuthenticationConfig};
use a2a_core::error::{BridgeError, ProtocolError};
use a2a_core::salute::PaceLevel;
use a2a_core::task::{HistoryRole, Task, TaskState};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::AppState;

pub async fn handle_jsonrpc(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<HashMap<String, String>>, body: Bytes) -> Response {
    if !check_auth(&headers, &query, &state.config.authentication) {
        return error_response(Value::Null, StatusCode::UNAUTHORIZED, ProtocolError::InvalidRequest.code(), "Unauthorized".to_string());
    }

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return error_response(Value::Null, StatusCode::BAD_REQUEST, ProtocolError::Parse.code(), "Invalid JSON".to_string()),
    };
    let Some(obj) = parsed.as_object() else {
        return error_response(Value::Null, StatusCode::BAD_REQUEST, ProtocolError::InvalidRequest.code(), "Request must be a JSON object".to_string());
    };

    let id = obj.get("id").cloned().unwrap_or(Value::Null);
    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return error_response(id, StatusCode::BAD_REQUEST, ProtocolError::InvalidRequest.code(), "Missing or invalid jsonrpc version (must be \"2.0\")".to_string());
    }

    let method = obj.get("method").and_then(Value::as_str).unwrap_or("").to_string();
    let params = obj.get("params").cloned().unwrap_or_else(|| json!({}));

    tracing::info!(%method, ?id, "A2A request");

    match method.as_str() {
        "message/send" | "SendMessage" => handle_message_send(state, id, params).await,
        "message/stream" | "SendStreamingMessage" => handle_message_stream(state, id, params).await,
        "tasks/get" | "GetTask" => handle_tasks_get(state, id, params).await,
        "tasks/cancel" | "CancelTask" => handle_tasks_cancel(state, id, params).await,
        other => rpc_error(id, ProtocolError::MethodNotFound(other.to_string())),
    }
}

async fn handle_message_send(state: AppState, id: Value, params: Value) -> Response {
    let Some(text) = extract_message_text(&params).filter(|t| !t.is_empty()) else {
        return rpc_error(id, ProtocolError::InvalidParams("no message text provided".to_string()));
    };

    if let Some(existing_id) = existing_task_id(&params) {
        if let Some(existing) = state.registry.get(existing_id) {
            if existing.state == TaskState::InputRequired {
                state.registry.resume(existing_id);
                state.registry.push_user_turn(existing_id, text.clone());
                run_followup(&state, existing_id, text).await;
                let task = state.registry.get(existing_id).expect("task exists after followup");
                return rpc_result(id, task_snapshot(&task, false));
            }
        }
    }

    let task = match state.registry.create(text) {
        Ok(task) => task,
        Err(e) => return rpc_error(id, e),
    };

    if task.state == TaskState::Submitted {
        return rpc_result(id, task_snapshot(&task, false));
    }

    run_new_task(&state, task.id).await;
    let task = state.registry.get(task.id).expect("task exists after execution");
    rpc_result(id, task_snapshot(&task, false))
}

async fn handle_message_stream(state: AppState, id: Value, params: Value) -> Response {
    let Some(text) = extract_message_text(&params).filter(|t| !t.is_empty()) else {
        return rpc_error(id, ProtocolError::InvalidParams("no message text provided".to_string()));
    };
    let task = match state.registry.create(text) {
        Ok(task) => task,
        Err(e) => return rpc_error(id, e),
    };
    // message/stream never replies to a JSON-RPC id directly; the `task`/
    // `status_update` SSE events carry the result instead (spec.md §4.1).
    let _ = id;
    crate::sse::stream_task(state, task.id).into_response()
}

async fn handle_tasks_get(state: AppState, id: Value, params: Value) -> Response {
    let Some(task_id) = task_id_param(&params) else {
        return rpc_error(id, ProtocolError::InvalidParams("missing task id".to_string()));
    };
    let Some(mut task) = state.registry.get(task_id) else {
        return rpc_error(id, ProtocolError::TaskNotFound(task_id.to_string()));
    };
    if !task.state.is_terminal() {
        if let Some(telemetry) = state.bridge.read_latest_telemetry(None) {
            state.registry.set_last_telemetry(task_id, telemetry.clone());
            task.last_telemetry = Some(telemetry);
        }
    }
    rpc_result(id, task_snapshot(&task, true))
}

async fn handle_tasks_cancel(state: AppState, id: Value, params: Value) -> Response {
    let Some(task_id) = task_id_param(&params) else {
        return rpc_error(id, ProtocolError::InvalidParams("missing task id".to_string()));
    };
    let Some(task) = state.registry.get(task_id) else {
        return rpc_error(id, ProtocolError::TaskNotFound(task_id.to_string()));
    };
    if task.state.is_terminal() {
        return rpc_error(id, ProtocolError::NotCancelable(format!("task {task_id} is already terminal")));
    }

    let _ = state.bridge.cancel(&task).await;
    match state.registry.cancel(task_id) {
        Ok(task) => rpc_result(id, task_snapshot(&task, false)),
        Err(e) => rpc_error(id, e),
    }
}

/// Runs a brand-new submission through the bridge to completion (spec.md
/// §4.3/§4.2 `_execute_task`). Shared by `message/send`'s synchronous path,
/// `message/stream`'s background execution, and the registry's
/// `on_task_promoted` dispatch loop.
pub async fn run_new_task(state: &AppState, task_id: Uuid) {
    let Some(mut task) = state.registry.get(task_id) else { return };
    match state.bridge.submit(&mut task).await {
        Ok(result_text) => {
            state.registry.set_agent_context(task_id, task.agent_context_id.clone());
            finish_success(state, task_id, result_text).await;
        }
        Err(e) => fail_with_bridge_error(state, task_id, e),
    }
}

/// Runs a follow-up turn on an `input-required` task that was just resumed.
async fn run_followup(state: &AppState, task_id: Uuid, text: String) {
    let Some(mut task) = state.registry.get(task_id) else { return };
    match state.bridge.submit_followup(&mut task, &text).await {
        Ok(result_text) => {
            state.registry.set_agent_context(task_id, task.agent_context_id.clone());
            finish_success(state, task_id, result_text).await;
        }
        Err(e) => fail_with_bridge_error(state, task_id, e),
    }
}

fn fail_with_bridge_error(state: &AppState, task_id: Uuid, e: BridgeError) {
    let detail = match &e {
        BridgeError::Auth => "authentication rejected by inner agent".to_string(),
        other => other.to_string(),
    };
    state.registry.fail(task_id, detail, vec![]);
}

/// Collects artifacts from the final SALUTE and completes the task — unless
/// that SALUTE shows PACE escalated to `emergency`, in which case the task
/// fails with a synthesized failure report instead (spec.md §7 "Inner-agent
/// emergency").
async fn finish_success(state: &AppState, task_id: Uuid, result_text: String) {
    let telemetry = state.bridge.read_latest_telemetry(None);
    let artifacts = telemetry.as_ref().map(|t| a2a_translator::collect_artifacts(&t.location.files_modified)).unwrap_or_default();

    if let Some(t) = &telemetry {
        if t.status.pace_level == PaceLevel::Emergency {
            let report = a2a_translator::build_failure_report(t, &result_text);
            state.registry.fail(task_id, report, artifacts);
            return;
        }
    }
    state.registry.complete(task_id, result_text, artifacts);
}

/// Builds the on-wire Task snapshot (spec.md §6): `{id, contextId,
/// status:{state, message, timestamp}, artifacts, history?}`.
pub fn task_snapshot(task: &Task, include_history: bool) -> Value {
    let mut status = json!({
        "state": task.state,
        "timestamp": task.updated_at,
    });
    if let Some(message) = status_message_for(task) {
        status["message"] = message;
    }

    let mut snapshot = json!({
        "id": task.id,
        "contextId": task.context_id,
        "status": status,
        "artifacts": task.artifacts,
    });
    if include_history && !task.history.is_empty() {
        snapshot["history"] = serde_json::to_value(&task.history).unwrap_or(Value::Null);
    }
    snapshot
}

fn agent_message(text: &str) -> Value {
    json!({"role": "agent", "parts": [{"type": "text", "text": text}]})
}

fn status_message_for(task: &Task) -> Option<Value> {
    match task.state {
        TaskState::Completed => task.result_text.as_deref().map(agent_message),
        TaskState::Failed => task.error_detail.as_deref().map(agent_message),
        TaskState::InputRequired => task.history.last().map(|turn| {
            json!({
                "role": match turn.role { HistoryRole::User => "user", HistoryRole::Agent => "agent" },
                "parts": [{"type": "text", "text": turn.text}],
            })
        }),
        TaskState::Working => task.last_telemetry.as_ref().map(|t| agent_message(&a2a_translator::salute_to_status_message(t))),
        TaskState::Submitted | TaskState::Canceled => None,
    }
}

/// Message-text extraction (spec.md §4.1): `{message:{parts:[{text}|
/// {kind:"text",text}|{type:"text",text}]}}` (all three part shapes carry a
/// `text` key regardless of the discriminant) or `{message:"raw"}` or
/// `{text:"raw"}`; text parts are concatenated with newlines.
fn extract_message_text(params: &Value) -> Option<String> {
    if let Some(message) = params.get("message") {
        if let Some(parts) = message.get("parts").and_then(Value::as_array) {
            let texts: Vec<&str> = parts.iter().filter_map(|part| part.get("text").and_then(Value::as_str)).filter(|t| !t.is_empty()).collect();
            if !texts.is_empty() {
                return Some(texts.join("\n"));
            }
        }
        if let Some(s) = message.as_str() {
            return Some(s.to_string());
        }
    }
    params.get("text").and_then(Value::as_str).map(str::to_string)
}

/// A follow-up is identified by `taskId`/`task_id`, or by
/// `message.contextId` (spec.md §4.1 `message/send`).
fn existing_task_id(params: &Value) -> Option<Uuid> {
    let raw = params
        .get("taskId")
        .or_else(|| params.get("task_id"))
        .and_then(Value::as_str)
        .or_else(|| params.get("message").and_then(|m| m.get("contextId")).and_then(Value::as_str));
    raw.and_then(|s| Uuid::parse_str(s).ok())
}

fn task_id_param(params: &Value) -> Option<Uuid> {
    params
        .get("id")
        .or_else(|| params.get("taskId"))
        .or_else(|| params.get("task_id"))
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn check_auth(headers: &HeaderMap, query: &HashMap<String, String>, auth: &AuthenticationConfig) -> bool {
    if auth.scheme == AuthScheme::None {
        return true;
    }
    let Some(expected) = auth.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return true;
    };
    if headers.get("X-API-KEY").and_then(|v| v.to_str().ok()) == Some(expected) {
        return true;
    }
    if let Some(bearer) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer ")) {
        if bearer == expected {
            return true;
        }
    }
    query.get("api_key").map(String::as_str) == Some(expected)
}

fn rpc_result(id: Value, result: Value) -> Response {
    (StatusCode::OK, Json(json!({"jsonrpc": "2.0", "id": id, "result": result}))).into_response()
}

fn rpc_error(id: Value, err: ProtocolError) -> Response {
    error_response(id, StatusCode::OK, err.code(), err.to_string())
}

fn error_response(id: Value, status: StatusCode, code: i64, message: String) -> Response {
    (status, Json(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_from_typed_parts() {
        let params = json!({"message": {"parts": [{"kind": "text", "text": "hello"}, {"type": "text", "text": "world"}]}});
        assert_eq!(extract_message_text(&params), Some("hello\nworld".to_string()));
    }

    #[test]
    fn extracts_raw_message_string() {
        let params = json!({"message": "plain text"});
        assert_eq!(extract_message_text(&params), Some("plain text".to_string()));
    }

    #[test]
    fn extracts_fallback_text_field() {
        let params = json!({"text": "fallback"});
        assert_eq!(extract_message_text(&params), Some("fallback".to_string()));
    }

    #[test]
    fn empty_parts_yield_none() {
        let params = json!({"message": {"parts": []}});
        assert_eq!(extract_message_text(&params), None);
    }

    #[test]
    fn auth_none_always_passes() {
        let auth = AuthenticationConfig { scheme: AuthScheme::None, api_key: Some("secret".to_string()) };
        assert!(check_auth(&HeaderMap::new(), &HashMap::new(), &auth));
    }

    #[test]
    fn auth_api_key_requires_header_or_query() {
        let auth = AuthenticationConfig { scheme: AuthScheme::ApiKey, api_key: Some("secret".to_string()) };
        assert!(!check_auth(&HeaderMap::new(), &HashMap::new(), &auth));

        let mut query = HashMap::new();
        query.insert("api_key".to_string(), "secret".to_string());
        assert!(check_auth(&HeaderMap::new(), &query, &auth));
    }
}
