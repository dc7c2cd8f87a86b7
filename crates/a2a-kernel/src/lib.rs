//! a2a-kernel: the Organization Kernel Dispatcher (K) and Intent/Slot Engine
//! (I) — role selection, tool-palette filtering, the PACE escalation FSM,
//! the tool-result classifier, and SALUTE emission.

pub mod bst;
pub mod classifier;
pub mod dispatcher;
pub mod pace;
pub mod role_select;

pub use bst::{BstAction, BstOutcome};
pub use classifier::{ClassifierTable, FailureKind, ToolFailureState};
pub use dispatcher::{ConversationState, DispatchOutcome, OrgKernelDispatcher};
pub use pace::{evaluate_pace, parse_trigger, Comparator, Metric, PaceMetrics, PaceOutcome, TriggerExpr, ValueExpr};
pub use role_select::{allowed_plans, plan_is_allowed, RoleSelector};
