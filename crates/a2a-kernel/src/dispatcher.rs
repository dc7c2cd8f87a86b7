//! `OrgKernelDispatcher` — the per-turn orchestration entry point tying role
//! selection, PACE, BST, and SALUTE emission together (spec.md §4.5).
//!
//! Grounded on `pagi_core::orchestrator::Orchestrator` (atomics + RwLock
//! shared-state struct, dispatch-method shape) and
//! `_12_org_dispatcher.py::OrgDispatcher.execute`.
//!
//! Re-architects the Python source's dynamic per-agent attributes into a
//! single typed [`ConversationState`] threaded explicitly through the
//! dispatcher (spec.md §9 "Global per-agent data").

use a2a_core::belief::SlotTaxonomy;
use a2a_core::role::RoleProfile;
use a2a_core::salute::{Activity, Environment, Health, Location, PaceLevel, SaluteReport, Status, Time, Unit};
use chrono::Utc;

use crate::bst::{self, BstAction};
use crate::classifier::{ClassifierTable, ToolFailureState};
use crate::pace::{self, PaceMetrics, PaceOutcome};
use crate::role_select::RoleSelector;

/// All per-conversation state that used to live as dynamic attributes on an
/// `agent` object in the source implementation (spec.md §9).
#[derive(Debug, Default)]
pub struct ConversationState {
    pub active_role: Option<RoleProfile>,
    pub pace_level: PaceLevel,
    pub turn_counter: u32,
    pub belief: Option<a2a_core::BeliefState>,
    pub tool_failures: ToolFailureState,
    pub turns_since_progress: u32,
    pub context_fill_pct: f32,
    pub memory_health: Option<String>,
}

/// Result of one `dispatch_turn` call.
pub struct DispatchOutcome {
    pub role: Option<RoleProfile>,
    pub allowed_plans: Option<Vec<String>>,
    pub bst_action: BstAction,
    pub pace: PaceOutcome,
    pub should_emit_salute: bool,
}

pub struct OrgKernelDispatcher {
    selector: RoleSelector,
    classifier_table: ClassifierTable,
    taxonomy: SlotTaxonomy,
}

impl OrgKernelDispatcher {
    pub fn new(selector: RoleSelector, taxonomy: SlotTaxonomy) -> Self {
        Self { selector, classifier_table: ClassifierTable::default_table(), taxonomy }
    }

    pub fn classifier_table(&self) -> &ClassifierTable {
        &self.classifier_table
    }

    /// Runs the full per-turn pipeline (spec.md §4.5 steps 1–6).
    pub fn dispatch_turn(&self, state: &mut ConversationState, message: &str, history: &[String]) -> DispatchOutcome {
        state.turn_counter += 1;

        // Steps 2–3: BST domain classification + role selection.
        let bst_outcome = bst::process(&self.taxonomy, message, history, state.belief.as_ref(), state.turn_counter);
        let domain = bst_outcome.belief.domain.clone();
        state.belief = Some(bst_outcome.belief);

        let selected_role = match self.selector.select_role(&domain) {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(error = %e, "role selection failed; clearing active role");
                None
            }
        };
        state.active_role = selected_role.clone();

        // Step 4: tool palette.
        let allowed_plans = selected_role.as_ref().and_then(crate::role_select::allowed_plans).cloned();

        // Step 5: PACE FSM.
        let max_turns_without_progress =
            selected_role.as_ref().map(|r| r.doctrine.max_turns_without_progress).unwrap_or(u32::MAX);
        let metrics = PaceMetrics {
            max_consecutive: state.tool_failures.max_consecutive(),
            turns_without_progress: state.turns_since_progress,
            context_fill: state.context_fill_pct,
            max_turns_without_progress,
        };
        let pace_plan = selected_role.as_ref().map(|r| r.pace_plan.clone());
        let emergency_text = pace_plan.as_ref().and_then(|p| p.emergency.as_ref()).map(|t| t.trigger.as_str());
        let contingent_expr = pace_plan
            .as_ref()
            .and_then(|p| p.contingent.as_ref())
            .and_then(|t| pace::parse_trigger(&t.trigger).ok());
        let alternate_expr = pace_plan
            .as_ref()
            .and_then(|p| p.alternate.as_ref())
            .and_then(|t| pace::parse_trigger(&t.trigger).ok());
        let pace_outcome = pace::evaluate_pace(
            metrics,
            emergency_text,
            contingent_expr.as_ref(),
            alternate_expr.as_ref(),
            state.pace_level,
        );
        if pace_outcome.transitioned {
            tracing::info!(
                from = %state.pace_level,
                to = %pace_outcome.level,
                "PACE level transitioned"
            );
        }
        state.pace_level = pace_outcome.level;

        // Step 6: SALUTE cadence.
        let interval = selected_role.as_ref().map(|r| r.doctrine.salute_interval_turns).unwrap_or(5).max(1);
        let should_emit_salute = pace_outcome.transitioned || state.turn_counter % interval == 0;

        DispatchOutcome {
            role: selected_role,
            allowed_plans,
            bst_action: bst_outcome.action,
            pace: pace_outcome,
            should_emit_salute,
        }
    }

    /// Builds a SALUTE report snapshot from the current conversation state
    /// (spec.md §3 "SALUTE Report").
    pub fn build_salute(&self, state: &ConversationState, current_task: Option<String>) -> SaluteReport {
        let role = state.active_role.as_ref();
        SaluteReport {
            status: Status {
                state: None,
                progress: 0.0,
                pace_level: state.pace_level,
                health: if state.pace_level == PaceLevel::Emergency { Health::Critical }
                    else if state.pace_level >= PaceLevel::Contingent { Health::Degraded }
                    else { Health::Ok },
            },
            activity: Activity { current_task, bst_domain: state.belief.as_ref().map(|b| b.domain.clone()), ..Default::default() },
            location: Location::default(),
            unit: Unit {
                role_id: role.map(|r| r.role_id.clone()).unwrap_or_default(),
                role_name: role.map(|r| r.role_name.clone()).unwrap_or_default(),
                reports_to: None,
                organization: None,
            },
            time: Time { timestamp: Utc::now(), turns_elapsed: state.turn_counter, turns_since_progress: state.turns_since_progress },
            environment: Environment {
                model: None,
                context_fill_pct: state.context_fill_pct,
                tool_failures_consecutive: state.tool_failures.max_consecutive(),
                tool_failures_total: 0,
                memory_health: state.memory_health.clone(),
            },
        }
    }
}
