//! Role registry, selection, and tool-palette filter (spec.md §4.5 steps
//! 1–4).
//!
//! Grounded on
//! `examples/original_source/extensions/before_main_llm_call/_12_org_dispatcher.py`
//! (`_load_active_org`, `_select_role`, `_clear_role`) and
//! `pagi_core::knowledge::traits::ModuleRegistry` for the registry shape.
//! The mtime-cached org load is the supplemented feature recorded in
//! SPEC_FULL.md §12.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use a2a_core::role::{Organization, RoleProfile};

struct OrgCacheEntry {
    mtime: SystemTime,
    org: Organization,
}

/// Loads and caches the active organization + role profiles from disk
/// (spec.md §4.5 steps 1–3, §6 filesystem layout).
pub struct RoleSelector {
    org_dir: PathBuf,
    roles_dir: PathBuf,
    org_cache: Mutex<Option<OrgCacheEntry>>,
}

impl RoleSelector {
    pub fn new(org_dir: impl Into<PathBuf>, roles_dir: impl Into<PathBuf>) -> Self {
        Self { org_dir: org_dir.into(), roles_dir: roles_dir.into(), org_cache: Mutex::new(None) }
    }

    fn active_org_path(&self) -> PathBuf {
        self.org_dir.join("active.json")
    }

    /// Load `active.json`, reusing the cached parse while the file's mtime
    /// is unchanged (spec.md §4.5 step 1 "Load `active.json` (mtime-cached).
    /// If absent → no-op").
    pub fn load_active_org(&self) -> std::io::Result<Option<Organization>> {
        let path = self.active_org_path();
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mtime = meta.modified()?;

        {
            let cache = self.org_cache.lock().expect("org cache lock");
            if let Some(entry) = cache.as_ref() {
                if entry.mtime == mtime {
                    return Ok(Some(entry.org.clone()));
                }
            }
        }

        let text = fs::read_to_string(&path)?;
        let org: Organization = serde_json::from_str(&text)?;
        *self.org_cache.lock().expect("org cache lock") = Some(OrgCacheEntry { mtime, org: org.clone() });
        Ok(Some(org))
    }

    pub fn load_role_profile(&self, role_id: &str) -> std::io::Result<Option<RoleProfile>> {
        let path = self.roles_dir.join(format!("{role_id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Selects the role for this turn's BST domain (spec.md §4.5 step 3):
    /// scan the org hierarchy, keep roles whose `bst_domains` contain the
    /// domain, prefer `specialist < executive < commander`.
    pub fn select_role(&self, domain: &str) -> std::io::Result<Option<RoleProfile>> {
        if domain.is_empty() || domain == "conversational" {
            return Ok(None);
        }
        let org = match self.load_active_org()? {
            Some(o) => o,
            None => return Ok(None),
        };
        let mut candidates = Vec::new();
        for role_id in &org.hierarchy {
            if let Some(profile) = self.load_role_profile(role_id)? {
                if profile.capabilities.bst_domains.iter().any(|d| d == domain) {
                    candidates.push(profile);
                }
            }
        }
        candidates.sort_by_key(|r| r.role_type);
        Ok(candidates.into_iter().next())
    }
}

/// Step 4: the allowed-plans list exposed to the agent. `None` means an
/// unrestricted tool palette (spec.md §4.5, §3 "Role Profile").
pub fn allowed_plans(role: &RoleProfile) -> Option<&Vec<String>> {
    role.capabilities.tool_plans.as_ref()
}

/// True if `plan` is permitted for this role's palette.
pub fn plan_is_allowed(role: &RoleProfile, plan: &str) -> bool {
    match allowed_plans(role) {
        None => true,
        Some(plans) => plans.iter().any(|p| p == plan),
    }
}

pub fn org_dir_exists(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::role::{Capabilities, Doctrine, PacePlan, RoleType};
    use std::io::Write;

    fn write_role(dir: &Path, id: &str, role_type: RoleType, domains: &[&str]) {
        let profile = RoleProfile {
            role_id: id.to_string(),
            role_name: id.to_string(),
            role_type,
            capabilities: Capabilities { bst_domains: domains.iter().map(|s| s.to_string()).collect(), tool_plans: None },
            doctrine: Doctrine::default(),
            pace_plan: PacePlan::default(),
        };
        let mut f = fs::File::create(dir.join(format!("{id}.json"))).unwrap();
        f.write_all(serde_json::to_string(&profile).unwrap().as_bytes()).unwrap();
    }

    #[test]
    fn selects_specialist_before_commander() {
        let tmp = tempfile::tempdir().unwrap();
        let org_dir = tmp.path().join("org");
        let roles_dir = tmp.path().join("roles");
        fs::create_dir_all(&org_dir).unwrap();
        fs::create_dir_all(&roles_dir).unwrap();

        write_role(&roles_dir, "commander-1", RoleType::Commander, &["code_review"]);
        write_role(&roles_dir, "specialist-1", RoleType::Specialist, &["code_review"]);

        let org = Organization { name: "test-org".to_string(), hierarchy: vec!["commander-1".to_string(), "specialist-1".to_string()] };
        let mut f = fs::File::create(org_dir.join("active.json")).unwrap();
        f.write_all(serde_json::to_string(&org).unwrap().as_bytes()).unwrap();

        let selector = RoleSelector::new(org_dir, roles_dir);
        let role = selector.select_role("code_review").unwrap().unwrap();
        assert_eq!(role.role_id, "specialist-1");
    }

    #[test]
    fn no_org_file_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let selector = RoleSelector::new(tmp.path().join("org"), tmp.path().join("roles"));
        assert!(selector.select_role("code_review").unwrap().is_none());
    }
}
