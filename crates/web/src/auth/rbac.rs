//! Role-based access control
//!
//! Permissions are `"<resource>.<action>"` strings. A role may grant `*`,
//! a resource wildcard such as `testCase.*`, or exact permissions, and can
//! inherit other roles.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Resources whose permissions fall back to the owning project's
const PROJECT_CHILDREN: &[&str] = &["fixture", "testCase", "step", "testResult"];

/// A role that can be assigned to users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier (e.g., "admin", "editor", "viewer")
    pub id: String,
    pub name: String,
    pub description: String,
    /// Permissions granted by this role
    pub permissions: Vec<String>,
    /// Parent roles
    #[serde(default)]
    pub inherits: Vec<String>,
}

impl Role {
    fn new(id: &str, name: &str, description: &str, permissions: &[&str], inherits: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            inherits: inherits.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// A set of roles loaded together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub version: String,
    pub roles: Vec<Role>,
}

/// Policy engine for evaluating permissions
pub struct PolicyEngine {
    policies: Vec<Policy>,
    /// Compiled role -> permissions map, inheritance resolved
    role_permissions: HashMap<String, HashSet<String>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            policies: Vec::new(),
            role_permissions: HashMap::new(),
        };
        engine.load_default_policy();
        engine
    }

    fn load_default_policy(&mut self) {
        self.add_policy(Policy {
            id: "default".to_string(),
            name: "Default Testdeck Policy".to_string(),
            version: "1.0.0".to_string(),
            roles: vec![
                Role::new("admin", "Administrator", "Full access", &["*"], &[]),
                Role::new(
                    "editor",
                    "Editor",
                    "Can edit test cases, fixtures and steps and start runs",
                    &[
                        "project.create",
                        "project.update",
                        "testCase.*",
                        "fixture.*",
                        "step.*",
                        "testResult.create",
                        "ai.use",
                    ],
                    &["viewer"],
                ),
                Role::new("viewer", "Viewer", "Read-only access", &["project.read"], &[]),
            ],
        });
    }

    /// Add a policy and recompile permissions
    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
        self.compile_permissions();
    }

    /// Compile role -> permission mappings, following inheritance chains.
    fn compile_permissions(&mut self) {
        let roles: HashMap<&str, &Role> = self
            .policies
            .iter()
            .flat_map(|p| &p.roles)
            .map(|r| (r.id.as_str(), r))
            .collect();

        let mut compiled = HashMap::new();
        for id in roles.keys() {
            let mut perms = HashSet::new();
            let mut visited = HashSet::new();
            let mut stack = vec![*id];
            while let Some(current) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                if let Some(role) = roles.get(current) {
                    perms.extend(role.permissions.iter().cloned());
                    stack.extend(role.inherits.iter().map(String::as_str));
                }
            }
            compiled.insert(id.to_string(), perms);
        }
        self.role_permissions = compiled;
    }

    /// Get all permissions for a set of roles
    pub fn permissions_for_roles(&self, roles: &[String]) -> HashSet<String> {
        let mut perms = HashSet::new();
        for role in roles {
            if let Some(role_perms) = self.role_permissions.get(role) {
                perms.extend(role_perms.iter().cloned());
            }
        }
        perms
    }

    /// Check if a set of roles has a specific permission.
    ///
    /// For project children (`fixture`, `testCase`, `step`, `testResult`)
    /// a missing resource permission falls back to `project.<action>`.
    pub fn has_permission(&self, roles: &[String], permission: &str) -> bool {
        let perms = self.permissions_for_roles(roles);
        if grants(&perms, permission) {
            return true;
        }
        match permission.split_once('.') {
            Some((resource, action)) if PROJECT_CHILDREN.contains(&resource) => {
                grants(&perms, &format!("project.{}", action))
            }
            _ => false,
        }
    }

    /// Get all defined roles
    pub fn roles(&self) -> Vec<&Role> {
        self.policies.iter().flat_map(|p| &p.roles).collect()
    }

    pub fn is_known_role(&self, role: &str) -> bool {
        self.role_permissions.contains_key(role)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn grants(perms: &HashSet<String>, permission: &str) -> bool {
    if perms.contains("*") || perms.contains(permission) {
        return true;
    }
    // Resource wildcard (e.g., "testCase.*" matches "testCase.delete")
    permission
        .split_once('.')
        .map_or(false, |(resource, _)| perms.contains(&format!("{}.*", resource)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn roles(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test_case("admin", "project.delete", true; "admin wildcard")]
    #[test_case("admin", "user.create", true; "admin users")]
    #[test_case("editor", "testCase.delete", true; "editor resource wildcard")]
    #[test_case("editor", "project.update", true; "editor project")]
    #[test_case("editor", "project.delete", false; "editor cannot delete projects")]
    #[test_case("editor", "testResult.read", true; "editor inherits viewer via project fallback")]
    #[test_case("viewer", "project.read", true; "viewer reads")]
    #[test_case("viewer", "fixture.read", true; "child read falls back to project")]
    #[test_case("viewer", "step.update", false; "viewer cannot edit")]
    #[test_case("viewer", "ai.use", false; "ai is not a project child")]
    #[test_case("nobody", "project.read", false; "unknown role")]
    fn test_permission_rule(role: &str, permission: &str, allowed: bool) {
        let engine = PolicyEngine::new();
        assert_eq!(engine.has_permission(&roles(&[role]), permission), allowed);
    }

    #[test]
    fn test_project_fallback_grants_children() {
        let mut engine = PolicyEngine::new();
        engine.add_policy(Policy {
            id: "qa".to_string(),
            name: "QA".to_string(),
            version: "1".to_string(),
            roles: vec![Role::new("runner", "Runner", "", &["project.create"], &[])],
        });

        let r = roles(&["runner"]);
        assert!(engine.has_permission(&r, "testResult.create"));
        assert!(engine.has_permission(&r, "fixture.create"));
        assert!(!engine.has_permission(&r, "testResult.delete"));
        assert!(!engine.has_permission(&r, "user.create"));
    }

    #[test]
    fn test_multi_level_inheritance() {
        let mut engine = PolicyEngine::new();
        engine.add_policy(Policy {
            id: "extra".to_string(),
            name: "Extra".to_string(),
            version: "1".to_string(),
            roles: vec![
                Role::new("lead", "Lead", "", &["project.delete"], &["editor"]),
                Role::new("loop-a", "A", "", &[], &["loop-b"]),
                Role::new("loop-b", "B", "", &["ai.use"], &["loop-a"]),
            ],
        });

        let lead = roles(&["lead"]);
        assert!(engine.has_permission(&lead, "project.delete"));
        assert!(engine.has_permission(&lead, "step.create"));
        assert!(engine.has_permission(&lead, "project.read"));

        assert!(engine.has_permission(&roles(&["loop-a"]), "ai.use"));
    }
}
