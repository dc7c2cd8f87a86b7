//! Agent Card generation and the 30s cache it's served through (spec.md
//! §4.1, §6).
//!
//! Grounded on `examples/original_source/a2a_server/agent_card.py`
//! (`generate_agent_card`, `_load_active_org`, `_load_org_roles`,
//! `_load_plan_library`, `_build_description`, `_build_auth_section`,
//! `_build_skills`, `_plan_description`). Skills are derived primarily from
//! the plan/workflow library, supplemented by BST domains that no workflow
//! covers — the card advertises skills, it doesn't execute them, so the
//! absence of a workflow-execution engine here is no reason to drop half of
//! what the card reports.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use a2a_core::config::{AuthScheme, AuthenticationConfig, GatewayConfig};
use a2a_core::role::{Organization, RoleProfile, RoleType};
use serde::Deserialize;
use serde_json::{json, Value};

/// The graph workflow library (`plan_library_path`), keyed by plan id.
#[derive(Debug, Clone, Default, Deserialize)]
struct PlanLibrary {
    #[serde(default)]
    plans: HashMap<String, PlanEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlanEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default)]
    triggers: Vec<String>,
    #[serde(default)]
    graph: PlanGraph,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlanGraph {
    #[serde(default)]
    nodes: HashMap<String, PlanNode>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlanNode {
    #[serde(rename = "type", default)]
    node_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

const CACHE_TTL: Duration = Duration::from_secs(30);

/// Caches the generated card for 30s per distinct base URL is overkill for
/// a single-tenant gateway; one slot keyed by the last `base_url` used is
/// enough (spec.md §4.1 "Cached for 30 s").
pub struct AgentCardCache(Mutex<Option<(Instant, String, Value)>>);

impl AgentCardCache {
    pub fn new() -> Self {
        Self(Mutex::new(None))
    }

    pub fn get(&self, config: &GatewayConfig, base_url: &str) -> Value {
        let mut guard = self.0.lock().expect("agent card cache lock poisoned");
        if let Some((at, cached_url, card)) = guard.as_ref() {
            if cached_url == base_url && at.elapsed() < CACHE_TTL {
                return card.clone();
            }
        }
        let card = generate_agent_card(config, base_url);
        *guard = Some((Instant::now(), base_url.to_string(), card.clone()));
        card
    }
}

impl Default for AgentCardCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an A2A Agent Card from the active organization, or a minimal
/// fallback when none is configured (spec.md §4.1).
pub fn generate_agent_card(config: &GatewayConfig, base_url: &str) -> Value {
    let Some(org) = load_active_org(&config.org_dir) else {
        return fallback_card(config, base_url);
    };
    let roles = load_org_roles(&org, &config.roles_dir);
    let plans = load_plan_library(config.plan_library_path.as_deref());

    json!({
        "name": org.name,
        "description": build_description(&roles),
        "url": base_url,
        "version": "1.0",
        "supportedProtocolVersions": ["0.3"],
        "capabilities": {"streaming": true, "pushNotifications": false},
        "authentication": build_auth_section(&config.authentication),
        "defaultInputModes": ["text"],
        "defaultOutputModes": ["text"],
        "skills": build_skills(&roles, &plans),
    })
}

fn load_active_org(org_dir: &str) -> Option<Organization> {
    let raw = fs::read_to_string(Path::new(org_dir).join("active.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Loads the graph workflow library, returning an empty library on any
/// missing path or read/parse failure (spec.md §4.1, `_load_plan_library`).
fn load_plan_library(path: Option<&str>) -> PlanLibrary {
    let Some(path) = path else { return PlanLibrary::default() };
    let Ok(raw) = fs::read_to_string(path) else { return PlanLibrary::default() };
    serde_json::from_str(&raw).unwrap_or_default()
}

fn load_org_roles(org: &Organization, roles_dir: &str) -> Vec<RoleProfile> {
    org.hierarchy
        .iter()
        .filter_map(|role_id| {
            let raw = fs::read_to_string(Path::new(roles_dir).join(format!("{role_id}.json"))).ok()?;
            serde_json::from_str(&raw).ok()
        })
        .collect()
}

fn build_description(roles: &[RoleProfile]) -> String {
    let mut parts = Vec::new();
    let specialist_names: Vec<&str> = roles.iter().filter(|r| r.role_type == RoleType::Specialist).map(|r| r.role_name.as_str()).collect();
    if !specialist_names.is_empty() {
        parts.push(format!("Specialist roles: {}.", specialist_names.join(", ")));
    }
    parts.push("Tasks are routed to specialized roles and executed through the inner agent, with automatic escalation on failure.".to_string());
    parts.join(" ")
}

fn build_auth_section(auth: &AuthenticationConfig) -> Value {
    match auth.scheme {
        AuthScheme::None => json!({"schemes": ["none"]}),
        AuthScheme::ApiKey => json!({"schemes": ["apiKey"], "apiKeyLocation": "header", "apiKeyName": "X-API-KEY"}),
        AuthScheme::Bearer => json!({"schemes": ["bearer"]}),
    }
}

/// Skills are derived primarily from the plan/workflow library, supplemented
/// by BST domains (from active-organization role capabilities) that no
/// workflow covers, minus `conversational` (spec.md §4.1, `_build_skills`).
fn build_skills(roles: &[RoleProfile], plans: &PlanLibrary) -> Vec<Value> {
    let mut skills = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    // 1. Skills from graph workflows. Plan ids are sorted for deterministic
    // output (the Python source iterates an insertion-ordered dict; this
    // repo's `HashMap` has no such order, so we impose one).
    let mut plan_ids: Vec<&String> = plans.plans.keys().collect();
    plan_ids.sort();
    for plan_id in &plan_ids {
        if !seen_ids.insert((*plan_id).clone()) {
            continue;
        }
        let entry = &plans.plans[*plan_id];
        let name = entry.name.clone().unwrap_or_else(|| title_case(&plan_id.replace('_', " ")));
        skills.push(json!({
            "id": plan_id,
            "name": name,
            "description": plan_description(&name, entry),
        }));
    }

    // 2. Skills from BST domains not covered by any workflow.
    let mut all_workflow_domains: HashSet<&str> = HashSet::new();
    for entry in plans.plans.values() {
        all_workflow_domains.extend(entry.domains.iter().map(String::as_str));
    }

    let mut domain_roles: HashMap<String, Vec<String>> = HashMap::new();
    for role in roles {
        for domain in &role.capabilities.bst_domains {
            domain_roles.entry(domain.clone()).or_default().push(role.role_name.clone());
        }
    }

    let mut uncovered: Vec<&String> =
        domain_roles.keys().filter(|d| d.as_str() != "conversational" && !all_workflow_domains.contains(d.as_str())).collect();
    uncovered.sort();

    for domain in uncovered {
        if !seen_ids.insert(domain.clone()) {
            continue;
        }
        let role_names = domain_roles.get(domain).cloned().unwrap_or_default();
        let readable = domain.replace('_', " ");
        let description = if role_names.is_empty() {
            format!("Handles {readable} tasks.")
        } else {
            format!("Handles {readable} tasks. Specialist roles: {}.", role_names.join(", "))
        };
        skills.push(json!({"id": domain, "name": title_case(&readable), "description": description}));
    }

    skills
}

/// Builds a workflow-based skill's description from its task-node graph
/// (spec.md §4.1, `_plan_description`).
fn plan_description(name: &str, entry: &PlanEntry) -> String {
    let mut task_node_ids: Vec<&String> = entry.graph.nodes.keys().collect();
    task_node_ids.sort();
    let task_nodes: Vec<String> = task_node_ids
        .into_iter()
        .filter_map(|id| {
            let node = &entry.graph.nodes[id];
            (node.node_type.as_deref() == Some("task")).then(|| node.name.clone().unwrap_or_else(|| id.clone()))
        })
        .collect();

    let mut parts = Vec::new();
    if !task_nodes.is_empty() {
        let mut steps = task_nodes[..task_nodes.len().min(5)].join(", ");
        if task_nodes.len() > 5 {
            steps.push_str(&format!(", and {} more steps", task_nodes.len() - 5));
        }
        parts.push(format!("Automated workflow: {steps}."));
    } else {
        parts.push(format!("Executes the {name} workflow."));
    }

    if !entry.triggers.is_empty() {
        let examples = &entry.triggers[..entry.triggers.len().min(3)];
        parts.push(format!("Triggers on: {}.", examples.join(", ")));
    }

    parts.join(" ")
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn fallback_card(config: &GatewayConfig, base_url: &str) -> Value {
    json!({
        "name": "A2A Agent",
        "description": "Cognitive-hardened gateway in front of an inner agent. No organization is currently active.",
        "url": base_url,
        "version": "1.0",
        "supportedProtocolVersions": ["0.3"],
        "capabilities": {"streaming": true, "pushNotifications": false},
        "authentication": build_auth_section(&config.authentication),
        "defaultInputModes": ["text"],
        "defaultOutputModes": ["text"],
        "skills": [{
            "id": "general_assistance",
            "name": "General Assistance",
            "description": "Handles general-purpose requests with no specialized role routing.",
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            authentication: AuthenticationConfig::default(),
            agent_connection: a2a_core::config::AgentConnectionConfig::default(),
            task_queue: a2a_core::config::TaskQueueConfig::default(),
            salute_poll_interval_seconds: 2,
            org_dir: "/nonexistent/organizations".to_string(),
            reports_dir: "/nonexistent/reports".to_string(),
            roles_dir: "/nonexistent/organizations/roles".to_string(),
            plan_library_path: None,
        }
    }

    #[test]
    fn missing_org_falls_back() {
        let card = generate_agent_card(&config(), "http://localhost:8080");
        assert_eq!(card["name"], "A2A Agent");
    }

    #[test]
    fn cache_returns_same_value_within_ttl() {
        let cache = AgentCardCache::new();
        let first = cache.get(&config(), "http://localhost:8080");
        let second = cache.get(&config(), "http://localhost:8080");
        assert_eq!(first, second);
    }

    #[test]
    fn title_case_handles_multi_word_domains() {
        assert_eq!(title_case("legal research"), "Legal Research");
    }

    fn role(name: &str, domains: &[&str]) -> RoleProfile {
        RoleProfile {
            role_id: name.to_lowercase().replace(' ', "_"),
            role_name: name.to_string(),
            role_type: RoleType::Specialist,
            capabilities: a2a_core::role::Capabilities { bst_domains: domains.iter().map(|d| d.to_string()).collect(), tool_plans: None },
            doctrine: Default::default(),
            pace_plan: Default::default(),
        }
    }

    #[test]
    fn load_plan_library_defaults_on_missing_path() {
        assert!(load_plan_library(None).plans.is_empty());
        assert!(load_plan_library(Some("/nonexistent/plans.json")).plans.is_empty());
    }

    #[test]
    fn build_skills_derives_from_plan_library_first() {
        let library: PlanLibrary = serde_json::from_value(json!({
            "plans": {
                "legal_research": {
                    "name": "Legal Research",
                    "domains": ["legal_research"],
                    "triggers": ["research this case", "find precedent"],
                    "graph": {
                        "nodes": {
                            "n1": {"type": "task", "name": "Search case law"},
                            "n2": {"type": "task", "name": "Summarize findings"},
                            "n3": {"type": "branch", "name": "Decide next step"},
                        },
                    },
                },
            },
        }))
        .unwrap();
        let roles = vec![role("Paralegal", &["legal_research"])];

        let skills = build_skills(&roles, &library);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0]["id"], "legal_research");
        assert_eq!(skills[0]["name"], "Legal Research");
        let description = skills[0]["description"].as_str().unwrap();
        assert!(description.contains("Search case law, Summarize findings"));
        assert!(description.contains("Triggers on: research this case, find precedent"));
    }

    #[test]
    fn build_skills_supplements_uncovered_bst_domains() {
        let library = PlanLibrary::default();
        let roles = vec![role("Paralegal", &["legal_research", "conversational"])];

        let skills = build_skills(&roles, &library);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0]["id"], "legal_research");
        assert_eq!(skills[0]["name"], "Legal Research");
    }

    #[test]
    fn build_skills_does_not_duplicate_domain_covered_by_plan() {
        let library: PlanLibrary = serde_json::from_value(json!({
            "plans": {
                "legal_research": {
                    "name": "Legal Research",
                    "domains": ["legal_research"],
                    "triggers": [],
                    "graph": {"nodes": {}},
                },
            },
        }))
        .unwrap();
        let roles = vec![role("Paralegal", &["legal_research"])];

        let skills = build_skills(&roles, &library);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0]["id"], "legal_research");
    }
}
