//! Task Registry (Q, spec.md §4.2): a single in-memory map plus two ordered
//! lists (`active`, `queue`), all mutations behind one lock; long I/O never
//! runs under it.
//!
//! Grounded on `examples/original_source/a2a_server/task_registry.py`
//! (`TaskRegistry`) and `a2a_core::shared::TaskGovernor`-style
//! lock-serialized mutation. The Python `on_task_promoted` callback fired
//! "outside the lock" becomes an unbounded channel here: every mutation
//! collects the ids it promoted while the lock is held, then sends them
//! once the guard is dropped.

use std::collections::{HashMap, VecDeque};

use a2a_core::error::ProtocolError;
use a2a_core::salute::SaluteReport;
use a2a_core::task::{Artifact, HistoryRole, Task, TaskState};
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Inner {
    tasks: HashMap<Uuid, Task>,
    active: Vec<Uuid>,
    queue: VecDeque<Uuid>,
    max_concurrent: usize,
    max_queued: usize,
}

/// FIFO within the queue; no ordering guarantee between independent tasks
/// beyond that (spec.md §4.2).
pub struct TaskRegistry {
    inner: Mutex<Inner>,
    promoted_tx: mpsc::UnboundedSender<Uuid>,
}

impl TaskRegistry {
    /// Returns the registry plus the receiving half of its promotion
    /// channel — the caller spawns a loop over it to dispatch execution for
    /// every task `promote_next` moves from `queue` into `active`.
    pub fn new(max_concurrent: usize, max_queued: usize) -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner { tasks: HashMap::new(), active: Vec::new(), queue: VecDeque::new(), max_concurrent, max_queued };
        (Self { inner: Mutex::new(inner), promoted_tx: tx }, rx)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Inner) -> (R, Vec<Uuid>)) -> R {
        let (result, promoted) = {
            let mut guard = self.inner.lock().expect("registry lock poisoned");
            f(&mut guard)
        };
        for id in promoted {
            let _ = self.promoted_tx.send(id);
        }
        result
    }

    /// **create** (spec.md §4.2): `QueueFull` if the queue is already at
    /// capacity; otherwise admits to `active` (state `working`) if there's
    /// room, else appends to `queue` (state stays `submitted`).
    pub fn create(&self, message_text: impl Into<String>) -> Result<Task, ProtocolError> {
        self.mutate(|inner| {
            if inner.queue.len() >= inner.max_queued {
                return (Err(ProtocolError::QueueFull), vec![]);
            }
            let mut task = Task::new(message_text);
            let id = task.id;
            if inner.active.len() < inner.max_concurrent {
                inner.active.push(id);
                task.transition(TaskState::Working);
            } else {
                inner.queue.push_back(id);
            }
            inner.tasks.insert(id, task.clone());
            (Ok(task), vec![])
        })
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.inner.lock().expect("registry lock poisoned").tasks.get(&id).cloned()
    }

    pub fn list_active(&self) -> Vec<Uuid> {
        self.inner.lock().expect("registry lock poisoned").active.clone()
    }

    /// **complete** (spec.md §4.2): sets the result, transitions to
    /// terminal, removes from `active`, then `promote_next`.
    pub fn complete(&self, id: Uuid, text: impl Into<String>, artifacts: Vec<Artifact>) {
        self.mutate(|inner| {
            match inner.tasks.get_mut(&id) {
                Some(task) => task.complete(text, artifacts),
                None => return ((), vec![]),
            }
            deactivate(inner, id);
            ((), promote_next(inner))
        })
    }

    /// **fail** (spec.md §4.2): mirrors `complete` for the failure path.
    pub fn fail(&self, id: Uuid, detail: impl Into<String>, partial_artifacts: Vec<Artifact>) {
        self.mutate(|inner| {
            match inner.tasks.get_mut(&id) {
                Some(task) => task.fail(detail, partial_artifacts),
                None => return ((), vec![]),
            }
            deactivate(inner, id);
            ((), promote_next(inner))
        })
    }

    /// **cancel** (spec.md §4.2): fails silently (returns `NotCancelable`)
    /// if terminal; otherwise removes from `queue` if queued, transitions
    /// to `canceled`, and promotes next.
    pub fn cancel(&self, id: Uuid) -> Result<Task, ProtocolError> {
        self.mutate(|inner| {
            let Some(existing) = inner.tasks.get(&id) else {
                return (Err(ProtocolError::TaskNotFound(id.to_string())), vec![]);
            };
            if existing.state.is_terminal() {
                return (Err(ProtocolError::NotCancelable(format!("task {id} is already terminal"))), vec![]);
            }
            inner.tasks.get_mut(&id).expect("just checked above").transition(TaskState::Canceled);
            inner.queue.retain(|queued| *queued != id);
            deactivate(inner, id);
            let promoted = promote_next(inner);
            let result = inner.tasks.get(&id).cloned().expect("task present");
            (Ok(result), promoted)
        })
    }

    /// **set_input_required** (spec.md §4.2): transitions a non-terminal
    /// task and appends `reason` to its history.
    pub fn set_input_required(&self, id: Uuid, reason: impl Into<String>) {
        self.mutate(|inner| {
            if let Some(task) = inner.tasks.get_mut(&id) {
                if !task.state.is_terminal() {
                    task.push_history(HistoryRole::Agent, reason);
                    task.transition(TaskState::InputRequired);
                }
            }
            ((), vec![])
        })
    }

    /// **resume** (spec.md §4.2): `input-required -> working`.
    pub fn resume(&self, id: Uuid) {
        self.mutate(|inner| {
            if let Some(task) = inner.tasks.get_mut(&id) {
                if task.state == TaskState::InputRequired {
                    task.transition(TaskState::Working);
                }
            }
            ((), vec![])
        })
    }

    /// Appends a user turn to history without changing state (used ahead of
    /// `submit_followup` once a task has been resumed).
    pub fn push_user_turn(&self, id: Uuid, text: impl Into<String>) {
        self.mutate(|inner| {
            if let Some(task) = inner.tasks.get_mut(&id) {
                task.push_history(HistoryRole::User, text);
            }
            ((), vec![])
        })
    }

    /// Records the `agent_context_id` the inner agent assigned on submit.
    pub fn set_agent_context(&self, id: Uuid, agent_context_id: Option<String>) {
        self.mutate(|inner| {
            if let Some(task) = inner.tasks.get_mut(&id) {
                task.agent_context_id = agent_context_id;
            }
            ((), vec![])
        })
    }

    /// Refreshes `last_telemetry`/`pace_level` without otherwise touching
    /// task state (spec.md §4.1 `tasks/get`: "if non-terminal, first
    /// refresh `last_telemetry` from the latest SALUTE").
    pub fn set_last_telemetry(&self, id: Uuid, telemetry: SaluteReport) {
        self.mutate(|inner| {
            if let Some(task) = inner.tasks.get_mut(&id) {
                task.pace_level = Some(telemetry.status.pace_level);
                task.last_telemetry = Some(telemetry);
            }
            ((), vec![])
        })
    }
}

fn deactivate(inner: &mut Inner, id: Uuid) {
    inner.active.retain(|active| *active != id);
}

/// **promote_next** (spec.md §4.2): while the queue is non-empty and
/// `active` has capacity, dequeue the head, push to `active`, set state
/// `working`. Returns the ids promoted so the caller can fire
/// `on_task_promoted` once the lock is released.
fn promote_next(inner: &mut Inner) -> Vec<Uuid> {
    let mut promoted = Vec::new();
    while inner.active.len() < inner.max_concurrent {
        let Some(id) = inner.queue.pop_front() else { break };
        let Some(task) = inner.tasks.get_mut(&id) else { continue };
        if task.state == TaskState::Submitted {
            inner.active.push(id);
            task.transition(TaskState::Working);
            promoted.push(id);
        }
    }
    promoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_beyond_concurrency_queues() {
        let (registry, _rx) = TaskRegistry::new(1, 10);
        let first = registry.create("first").unwrap();
        let second = registry.create("second").unwrap();
        assert_eq!(first.state, TaskState::Working);
        assert_eq!(second.state, TaskState::Submitted);
    }

    #[test]
    fn queue_full_is_rejected() {
        let (registry, _rx) = TaskRegistry::new(1, 1);
        registry.create("active").unwrap();
        registry.create("queued").unwrap();
        let err = registry.create("overflow").unwrap_err();
        assert!(matches!(err, ProtocolError::QueueFull));
    }

    #[test]
    fn completing_active_promotes_queued() {
        let (registry, mut rx) = TaskRegistry::new(1, 10);
        let first = registry.create("first").unwrap();
        let second = registry.create("second").unwrap();
        assert_eq!(registry.get(second.id).unwrap().state, TaskState::Submitted);

        registry.complete(first.id, "done", vec![]);

        assert_eq!(registry.get(second.id).unwrap().state, TaskState::Working);
        assert_eq!(rx.try_recv().unwrap(), second.id);
    }

    #[test]
    fn cancel_terminal_task_fails() {
        let (registry, _rx) = TaskRegistry::new(1, 10);
        let task = registry.create("first").unwrap();
        registry.complete(task.id, "done", vec![]);
        let err = registry.cancel(task.id).unwrap_err();
        assert!(matches!(err, ProtocolError::NotCancelable(_)));
    }

    #[test]
    fn cancel_queued_task_removes_from_queue() {
        let (registry, _rx) = TaskRegistry::new(1, 10);
        registry.create("active").unwrap();
        let queued = registry.create("queued").unwrap();
        let canceled = registry.cancel(queued.id).unwrap();
        assert_eq!(canceled.state, TaskState::Canceled);
    }
}
