//! Tool-result classifier and reflection tracker (spec.md §4.5.2, §12
//! "Reflection tracker").
//!
//! Grounded on spec.md prose directly — no `_30_tool_fallback_advisor.py`
//! body was present in the retrieval pack; struct shape follows
//! `pagi_core::shared::TaskGovernor`'s bounded-history-plus-counter pattern.

use std::collections::{HashMap, VecDeque};

use regex::Regex;

/// Outcome kind for a classified tool failure (spec.md §4.5.2). `None` from
/// [`classify`] means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    NotFound,
    Permission,
    Syntax,
    Network,
    Resource,
    Dependency,
    Execution,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Syntax => "syntax",
            Self::Network => "network",
            Self::Resource => "resource",
            Self::Dependency => "dependency",
            Self::Execution => "execution",
        }
    }
}

struct Rule {
    kind: FailureKind,
    pattern: Regex,
}

/// The ordered regex table; first match wins (spec.md §4.5.2).
pub struct ClassifierTable {
    rules: Vec<Rule>,
}

impl ClassifierTable {
    pub fn default_table() -> Self {
        let specs: &[(FailureKind, &str)] = &[
            (FailureKind::Timeout, r"(?i)\btimed?\s?out\b|\btimeout\b"),
            (FailureKind::NotFound, r"(?i)\bno such file\b|\bnot found\b|\b404\b|\bdoes not exist\b"),
            (FailureKind::Permission, r"(?i)\bpermission denied\b|\baccess denied\b|\b403\b|\bunauthorized\b"),
            (FailureKind::Syntax, r"(?i)\bsyntax error\b|\bparse error\b|\bunexpected token\b|\binvalid syntax\b"),
            (FailureKind::Network, r"(?i)\bconnection refused\b|\bnetwork\b|\bdns\b|\b(50[0-9])\b"),
            (FailureKind::Resource, r"(?i)\bout of memory\b|\bdisk full\b|\bno space left\b|\btoo many open files\b"),
            (FailureKind::Dependency, r"(?i)\bmodule not found\b|\bpackage not found\b|\bno matching version\b|\bunresolved import\b"),
            (FailureKind::Execution, r"(?i)\btraceback\b|\bpanicked\b|\bexit code [1-9]\b|\bexception\b|\berror\b"),
        ];
        let rules = specs
            .iter()
            .map(|(kind, pat)| Rule { kind: *kind, pattern: Regex::new(pat).expect("static pattern") })
            .collect();
        Self { rules }
    }

    pub fn classify(&self, output: &str) -> Option<FailureKind> {
        self.rules.iter().find(|r| r.pattern.is_match(output)).map(|r| r.kind)
    }
}

/// Static `(tool, kind) -> advice` table, with `any` wildcards for both
/// fields (spec.md §4.5.2).
pub fn fallback_advice(tool: &str, kind: FailureKind) -> &'static str {
    match (tool, kind) {
        (_, FailureKind::Timeout) => "The last call timed out; consider a narrower scope or smaller batch.",
        (_, FailureKind::NotFound) => "The referenced path or resource does not exist; verify it before retrying.",
        (_, FailureKind::Permission) => "Permission was denied; check credentials or required scopes.",
        (_, FailureKind::Syntax) => "The call was malformed; re-check argument syntax before retrying.",
        (_, FailureKind::Network) => "A network call failed; check connectivity and retry with backoff.",
        (_, FailureKind::Resource) => "A resource limit was hit; free capacity or reduce batch size.",
        (_, FailureKind::Dependency) => "A dependency is missing; install or pin it before retrying.",
        (_, FailureKind::Execution) => "The tool raised an unhandled error; inspect the trace before retrying.",
    }
}

const STEP_BACK_MESSAGE: &str =
    "Multiple recent tool calls have failed. Step back and reassess the plan before continuing.";
const REFLECTION_THRESHOLD: u32 = 2;
const OVERALL_FAILURE_WINDOW: usize = 20;
const OVERALL_FAILURE_THRESHOLD: usize = 5;

/// Per-conversation tool-failure state (spec.md §4.5.2, §12 reflection
/// tracker). Accessed only from within a single turn of its conversation
/// (spec.md §5 "Shared resources").
#[derive(Debug, Default)]
pub struct ToolFailureState {
    consecutive: HashMap<String, u32>,
    /// The reflection tracker is independent of the general failure
    /// counter: it tracks only consecutive *format* (syntax) errors per
    /// tool, and resets on any success of that tool (spec.md §12).
    format_error_consecutive: HashMap<String, u32>,
    history: VecDeque<(String, FailureKind)>,
}

impl ToolFailureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a tool invocation. Returns the classified
    /// kind, or `None` on success.
    pub fn record(&mut self, table: &ClassifierTable, tool: &str, output: &str) -> Option<FailureKind> {
        match table.classify(output) {
            None => {
                self.consecutive.insert(tool.to_string(), 0);
                self.format_error_consecutive.insert(tool.to_string(), 0);
                None
            }
            Some(kind) => {
                *self.consecutive.entry(tool.to_string()).or_insert(0) += 1;
                if kind == FailureKind::Syntax {
                    *self.format_error_consecutive.entry(tool.to_string()).or_insert(0) += 1;
                } else {
                    self.format_error_consecutive.insert(tool.to_string(), 0);
                }
                if self.history.len() >= OVERALL_FAILURE_WINDOW {
                    self.history.pop_front();
                }
                self.history.push_back((tool.to_string(), kind));
                Some(kind)
            }
        }
    }

    /// Max consecutive-failure counter across all tools (PACE FSM input,
    /// spec.md §4.5.1 `max_consecutive`).
    pub fn max_consecutive(&self) -> u32 {
        self.consecutive.values().copied().max().unwrap_or(0)
    }

    /// Advice to inject before the NEXT tool call, if any per-tool counter
    /// has reached 2, plus a step-back message if overall recent failures
    /// reach 5 (spec.md §4.5.2).
    pub fn advice_for_next_call(&self, table: &ClassifierTable) -> Vec<String> {
        let mut out = Vec::new();
        for (tool, kind) in self.history.iter() {
            if self.consecutive.get(tool).copied().unwrap_or(0) >= 2 {
                out.push(fallback_advice(tool, *kind).to_string());
            }
        }
        out.dedup();
        let _ = table;
        if self.history.len() >= OVERALL_FAILURE_THRESHOLD {
            out.push(STEP_BACK_MESSAGE.to_string());
        }
        out
    }

    /// A reflection prompt asking the agent to diagnose before retrying,
    /// once the same tool's consecutive format-error count reaches 2
    /// (spec.md §12).
    pub fn reflection_prompt(&self, tool: &str) -> Option<String> {
        if self.format_error_consecutive.get(tool).copied().unwrap_or(0) >= REFLECTION_THRESHOLD {
            Some(format!(
                "`{tool}` has failed with a format/syntax error {REFLECTION_THRESHOLD}+ times in a row. \
                 Diagnose the exact cause before retrying."
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_counters() {
        let table = ClassifierTable::default_table();
        let mut state = ToolFailureState::new();
        state.record(&table, "shell", "syntax error near token");
        state.record(&table, "shell", "syntax error near token");
        assert_eq!(state.format_error_consecutive.get("shell").copied(), Some(2));
        state.record(&table, "shell", "ok, 3 files changed");
        assert_eq!(state.format_error_consecutive.get("shell").copied(), Some(0));
        assert_eq!(state.consecutive.get("shell").copied(), Some(0));
    }

    #[test]
    fn reflection_fires_at_two_consecutive_format_errors() {
        let table = ClassifierTable::default_table();
        let mut state = ToolFailureState::new();
        assert!(state.reflection_prompt("shell").is_none());
        state.record(&table, "shell", "SyntaxError: invalid syntax");
        assert!(state.reflection_prompt("shell").is_none());
        state.record(&table, "shell", "SyntaxError: invalid syntax");
        assert!(state.reflection_prompt("shell").is_some());
    }

    #[test]
    fn classifies_known_kinds() {
        let table = ClassifierTable::default_table();
        assert_eq!(table.classify("Connection refused"), Some(FailureKind::Network));
        assert_eq!(table.classify("Permission denied"), Some(FailureKind::Permission));
        assert_eq!(table.classify("file written successfully"), None);
    }
}
