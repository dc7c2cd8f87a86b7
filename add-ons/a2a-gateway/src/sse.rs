//! `message/stream` (spec.md §4.1, §4.2): creates a task, then streams
//! `task`/`status_update` SSE events while the inner agent runs.
//!
//! Grounded on the teacher's `persona_pulse_stream`/`logs_stream` handlers
//! in `add-ons/a2a-gateway/src/main.rs` (the `async_stream::stream!` +
//! `tokio::select!` keepalive idiom) and on
//! `examples/original_source/a2a_server/server.py`'s `handle_message_stream`
//! for the polling/dedup/contingent-escalation semantics.

use std::time::Duration;

use a2a_core::salute::PaceLevel;
use a2a_core::task::{Task, TaskState};
use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::rpc::{run_new_task, task_snapshot};
use crate::AppState;

fn sse_event(event_type: &str, payload: &Value) -> Event {
    Event::default().event(event_type).json_data(payload).unwrap_or_else(|_| Event::default().event(event_type).data("{}"))
}

fn queued_event(task: &Task) -> Value {
    json!({
        "taskId": task.id,
        "contextId": task.context_id,
        "status": {
            "state": "submitted",
            "message": {"role": "agent", "parts": [{"type": "text", "text": "Task queued, waiting for capacity..."}]},
            "timestamp": Utc::now(),
        },
    })
}

fn status_update_event(task: &Task, wire_state: &str, status_message: &str) -> Value {
    json!({
        "taskId": task.id,
        "contextId": task.context_id,
        "status": {
            "state": wire_state,
            "message": status_message,
            "timestamp": Utc::now(),
        },
    })
}

fn input_required_event(task: &Task, message: &str) -> Value {
    json!({
        "taskId": task.id,
        "contextId": task.context_id,
        "status": {
            "state": "input-required",
            "message": {"role": "agent", "parts": [{"type": "text", "text": message}]},
            "timestamp": Utc::now(),
        },
    })
}

fn a2a_state_wire(state: a2a_translator::A2aState) -> &'static str {
    match state {
        a2a_translator::A2aState::Working => "working",
        a2a_translator::A2aState::InputRequired => "input-required",
        a2a_translator::A2aState::Failed => "failed",
    }
}

/// Streams a newly created task to completion. Background execution runs in
/// a spawned task so the poll loop can observe its telemetry concurrently,
/// mirroring the Python original's `asyncio.create_task(self._execute_task(...))`
/// run alongside its own polling `while` loop.
pub fn stream_task(state: AppState, task_id: Uuid) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>> + Send + 'static> {
    let poll_interval = Duration::from_secs(state.config.salute_poll_interval_seconds.max(1));

    let s = stream! {
        let Some(initial) = state.registry.get(task_id) else { return };
        yield Ok(sse_event("task", &task_snapshot(&initial, false)));
        if initial.state == TaskState::Submitted {
            yield Ok(sse_event("status", &queued_event(&initial)));
        }

        let exec_state = state.clone();
        let exec_handle = tokio::spawn(async move { run_new_task(&exec_state, task_id).await });

        let mut last_ts: Option<DateTime<Utc>> = None;
        let mut already_input_required = initial.state == TaskState::InputRequired;

        loop {
            let Some(task) = state.registry.get(task_id) else { break };
            if task.state.is_terminal() || exec_handle.is_finished() {
                break;
            }
            tokio::time::sleep(poll_interval).await;

            let Some(telemetry) = state.bridge.read_latest_telemetry(None) else { continue };
            if last_ts == Some(telemetry.time.timestamp) {
                continue;
            }
            last_ts = Some(telemetry.time.timestamp);

            let Some(task) = state.registry.get(task_id) else { break };
            if task.state.is_terminal() {
                break;
            }

            let status_message = a2a_translator::salute_to_status_message(&telemetry);
            let wire_state = a2a_state_wire(a2a_translator::salute_to_a2a_state(&telemetry));
            yield Ok(sse_event("status_update", &status_update_event(&task, wire_state, &status_message)));

            if telemetry.status.pace_level == PaceLevel::Contingent && !already_input_required {
                let message = a2a_translator::build_contingent_message(&telemetry, &[]);
                state.registry.set_input_required(task_id, message.clone());
                already_input_required = true;
                if let Some(task) = state.registry.get(task_id) {
                    yield Ok(sse_event("status_update", &input_required_event(&task, &message)));
                }
            }
        }

        let _ = exec_handle.await;
        if let Some(final_task) = state.registry.get(task_id) {
            yield Ok(sse_event("task", &task_snapshot(&final_task, false)));
        }
    };

    Sse::new(s).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive"))
}
