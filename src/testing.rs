//! Testing utilities for the provider.
//!
//! - [`InMemoryProjectClient`] is a [`ProjectClient`] backed by in-process
//!   maps. It records every call in API form (`PUT /access/api/v1/...`) and
//!   can be told to fail a specific call once.
//! - [`ProviderTester`] wraps a [`ProviderService`] with plan/apply lifecycle
//!   helpers.
//! - The `assert_*` functions check plan results and diagnostics.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use project_provider::testing::{InMemoryProjectClient, ProviderTester};
//! use project_provider::ProjectsProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let client = Arc::new(InMemoryProjectClient::new());
//! let tester = ProviderTester::new(ProjectsProvider::with_client(client.clone()));
//!
//! let state = tester
//!     .lifecycle_create(
//!         "project",
//!         json!({
//!             "key": "myproj",
//!             "display_name": "My Project",
//!             "admin_privileges": [{
//!                 "manage_members": true,
//!                 "manage_resources": true,
//!                 "index_resources": true
//!             }]
//!         }),
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(state["id"], "myproj");
//! assert_eq!(client.mutations(), vec!["POST /access/api/v1/projects"]);
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{
    EnvironmentBody, MembershipBody, ProjectBody, ProjectClient, RoleBody, PROJECTS_PATH,
};
use crate::error::ProviderError;
use crate::mapper::to_role_body;
use crate::model::{MembershipKind, Role};
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

const PREDEFINED_ROLES: [&str; 6] = [
    "Project Admin",
    "Developer",
    "Contributor",
    "Viewer",
    "Release Manager",
    "Security Manager",
];

// =========================================================================
// In-memory backend
// =========================================================================

#[derive(Debug)]
struct StoredProject {
    body: ProjectBody,
    members: Vec<MembershipBody>,
    groups: Vec<MembershipBody>,
    roles: Vec<RoleBody>,
    environments: Vec<String>,
}

impl StoredProject {
    fn new(body: ProjectBody) -> Self {
        let roles = PREDEFINED_ROLES
            .iter()
            .map(|name| RoleBody {
                name: name.to_string(),
                description: String::new(),
                role_type: "PREDEFINED".to_string(),
                environments: vec!["DEV".to_string(), "PROD".to_string()],
                actions: Vec::new(),
            })
            .collect();
        Self {
            body,
            members: Vec::new(),
            groups: Vec::new(),
            roles,
            environments: Vec::new(),
        }
    }

    fn memberships(&mut self, kind: MembershipKind) -> &mut Vec<MembershipBody> {
        match kind {
            MembershipKind::User => &mut self.members,
            MembershipKind::Group => &mut self.groups,
        }
    }
}

#[derive(Debug, Default)]
struct Backend {
    projects: BTreeMap<String, StoredProject>,
    /// Repository key to owning project key.
    repos: BTreeMap<String, Option<String>>,
    calls: Vec<String>,
    failures: Vec<String>,
}

impl Backend {
    /// Log a call; fails it if a pending failure matches.
    fn record(&mut self, method: &str, path: &str) -> Result<(), ProviderError> {
        let call = format!("{} {}", method, path);
        self.calls.push(call.clone());
        if let Some(pos) = self.failures.iter().position(|f| call.starts_with(f.as_str())) {
            self.failures.remove(pos);
            return Err(remote_error(500, method, path, "injected failure"));
        }
        Ok(())
    }

    fn project(
        &mut self,
        key: &str,
        method: &str,
        path: &str,
    ) -> Result<&mut StoredProject, ProviderError> {
        self.projects
            .get_mut(key)
            .ok_or_else(|| remote_error(404, method, path, "project not found"))
    }
}

fn remote_error(status: u16, method: &str, path: &str, body: &str) -> ProviderError {
    ProviderError::Remote {
        status,
        method: method.to_string(),
        url: path.to_string(),
        body: body.to_string(),
    }
}

fn project_path(key: &str) -> String {
    format!("{}/{}", PROJECTS_PATH, key)
}

fn attach_path(repo: &str) -> String {
    format!("{}/_/attach/repositories/{}", PROJECTS_PATH, repo)
}

/// A [`ProjectClient`] that keeps everything in memory.
///
/// New projects start with the backend's predefined roles. Repositories must
/// be registered with [`InMemoryProjectClient::with_repos`] before they can be
/// attached.
#[derive(Debug, Default)]
pub struct InMemoryProjectClient {
    backend: Mutex<Backend>,
}

impl InMemoryProjectClient {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register repositories that projects may attach.
    pub fn with_repos<I, S>(mut self, repos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = self
            .backend
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for repo in repos {
            backend.repos.entry(repo.into()).or_insert(None);
        }
        self
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.backend().calls.clone()
    }

    /// Calls other than `GET` and `HEAD`, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.backend()
            .calls
            .iter()
            .filter(|c| !c.starts_with("GET ") && !c.starts_with("HEAD "))
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.backend().calls.clear();
    }

    /// Fail the next call that starts with `call` (e.g. `"PUT /access/api/v1/projects/p"`).
    pub fn fail_next(&self, call: impl Into<String>) {
        self.backend().failures.push(call.into());
    }

    /// Put a role straight into a project, bypassing the call log.
    pub fn seed_role(&self, key: &str, role: Role) {
        let mut backend = self.backend();
        if let Some(project) = backend.projects.get_mut(key) {
            let body = to_role_body(&role);
            match project.roles.iter_mut().find(|r| r.name == body.name) {
                Some(existing) => *existing = body,
                None => project.roles.push(body),
            }
        }
    }

    /// Names of all roles in a project, predefined ones included.
    pub fn role_names(&self, key: &str) -> Vec<String> {
        self.backend()
            .projects
            .get(key)
            .map(|p| p.roles.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Full remote names of a project's environments.
    pub fn environment_names(&self, key: &str) -> Vec<String> {
        self.backend()
            .projects
            .get(key)
            .map(|p| p.environments.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProjectClient for InMemoryProjectClient {
    async fn project_exists(&self, key: &str) -> Result<bool, ProviderError> {
        let mut backend = self.backend();
        backend.record("HEAD", &project_path(key))?;
        Ok(backend.projects.contains_key(key))
    }

    async fn get_project(&self, key: &str) -> Result<ProjectBody, ProviderError> {
        let path = project_path(key);
        let mut backend = self.backend();
        backend.record("GET", &path)?;
        Ok(backend.project(key, "GET", &path)?.body.clone())
    }

    async fn create_project(&self, body: &ProjectBody) -> Result<(), ProviderError> {
        let mut backend = self.backend();
        backend.record("POST", PROJECTS_PATH)?;
        if backend.projects.contains_key(&body.project_key) {
            return Err(remote_error(409, "POST", PROJECTS_PATH, "project already exists"));
        }
        backend
            .projects
            .insert(body.project_key.clone(), StoredProject::new(body.clone()));
        Ok(())
    }

    async fn update_project(&self, key: &str, body: &ProjectBody) -> Result<(), ProviderError> {
        let path = project_path(key);
        let mut backend = self.backend();
        backend.record("PUT", &path)?;
        backend.project(key, "PUT", &path)?;

        let new_key = body.project_key.clone();
        if new_key != key {
            if backend.projects.contains_key(&new_key) {
                return Err(remote_error(409, "PUT", &path, "project key already in use"));
            }
            if let Some(project) = backend.projects.remove(key) {
                backend.projects.insert(new_key.clone(), project);
            }
            for owner in backend.repos.values_mut() {
                if owner.as_deref() == Some(key) {
                    *owner = Some(new_key.clone());
                }
            }
        }

        let project = backend.project(&new_key, "PUT", &path)?;
        project.body = body.clone();
        Ok(())
    }

    async fn delete_project(&self, key: &str) -> Result<(), ProviderError> {
        let path = project_path(key);
        let mut backend = self.backend();
        backend.record("DELETE", &path)?;
        if backend.projects.remove(key).is_none() {
            return Err(remote_error(404, "DELETE", &path, "project not found"));
        }
        for owner in backend.repos.values_mut() {
            if owner.as_deref() == Some(key) {
                *owner = None;
            }
        }
        Ok(())
    }

    async fn list_memberships(
        &self,
        key: &str,
        kind: MembershipKind,
    ) -> Result<Vec<MembershipBody>, ProviderError> {
        let path = format!("{}/{}", project_path(key), kind.path_segment());
        let mut backend = self.backend();
        backend.record("GET", &path)?;
        Ok(backend.project(key, "GET", &path)?.memberships(kind).clone())
    }

    async fn put_membership(
        &self,
        key: &str,
        kind: MembershipKind,
        body: &MembershipBody,
    ) -> Result<(), ProviderError> {
        let path = format!("{}/{}/{}", project_path(key), kind.path_segment(), body.name);
        let mut backend = self.backend();
        backend.record("PUT", &path)?;
        let memberships = backend.project(key, "PUT", &path)?.memberships(kind);
        match memberships.iter_mut().find(|m| m.name == body.name) {
            Some(existing) => *existing = body.clone(),
            None => memberships.push(body.clone()),
        }
        Ok(())
    }

    async fn delete_membership(
        &self,
        key: &str,
        kind: MembershipKind,
        name: &str,
    ) -> Result<(), ProviderError> {
        let path = format!("{}/{}/{}", project_path(key), kind.path_segment(), name);
        let mut backend = self.backend();
        backend.record("DELETE", &path)?;
        let memberships = backend.project(key, "DELETE", &path)?.memberships(kind);
        let before = memberships.len();
        memberships.retain(|m| m.name != name);
        if memberships.len() == before {
            return Err(remote_error(404, "DELETE", &path, "membership not found"));
        }
        Ok(())
    }

    async fn list_roles(&self, key: &str) -> Result<Vec<RoleBody>, ProviderError> {
        let path = format!("{}/roles", project_path(key));
        let mut backend = self.backend();
        backend.record("GET", &path)?;
        Ok(backend.project(key, "GET", &path)?.roles.clone())
    }

    async fn create_role(&self, key: &str, body: &RoleBody) -> Result<(), ProviderError> {
        let path = format!("{}/roles", project_path(key));
        let mut backend = self.backend();
        backend.record("POST", &path)?;
        let project = backend.project(key, "POST", &path)?;
        if project.roles.iter().any(|r| r.name == body.name) {
            return Err(remote_error(409, "POST", &path, "role already exists"));
        }
        project.roles.push(body.clone());
        Ok(())
    }

    async fn update_role(&self, key: &str, body: &RoleBody) -> Result<(), ProviderError> {
        let path = format!("{}/roles/{}", project_path(key), body.name);
        let mut backend = self.backend();
        backend.record("PUT", &path)?;
        let project = backend.project(key, "PUT", &path)?;
        match project.roles.iter_mut().find(|r| r.name == body.name) {
            Some(existing) => {
                *existing = body.clone();
                Ok(())
            },
            None => Err(remote_error(404, "PUT", &path, "role not found")),
        }
    }

    async fn delete_role(&self, key: &str, name: &str) -> Result<(), ProviderError> {
        let path = format!("{}/roles/{}", project_path(key), name);
        let mut backend = self.backend();
        backend.record("DELETE", &path)?;
        let project = backend.project(key, "DELETE", &path)?;
        let before = project.roles.len();
        project.roles.retain(|r| r.name != name);
        if project.roles.len() == before {
            return Err(remote_error(404, "DELETE", &path, "role not found"));
        }
        Ok(())
    }

    async fn list_repos(&self, key: &str) -> Result<Vec<String>, ProviderError> {
        let path = format!("/artifactory/api/repositories?project={}", key);
        let mut backend = self.backend();
        backend.record("GET", &path)?;
        Ok(backend
            .repos
            .iter()
            .filter(|(_, owner)| owner.as_deref() == Some(key))
            .map(|(repo, _)| repo.clone())
            .collect())
    }

    async fn attach_repo(&self, key: &str, repo: &str) -> Result<(), ProviderError> {
        let path = format!("{}/{}?force=true", attach_path(repo), key);
        let mut backend = self.backend();
        backend.record("PUT", &path)?;
        backend.project(key, "PUT", &path)?;
        match backend.repos.get_mut(repo) {
            Some(owner) => {
                *owner = Some(key.to_string());
                Ok(())
            },
            None => Err(remote_error(404, "PUT", &path, "repository not found")),
        }
    }

    async fn detach_repo(&self, repo: &str) -> Result<(), ProviderError> {
        let path = attach_path(repo);
        let mut backend = self.backend();
        backend.record("DELETE", &path)?;
        match backend.repos.get_mut(repo) {
            Some(owner) => {
                *owner = None;
                Ok(())
            },
            None => Err(remote_error(404, "DELETE", &path, "repository not found")),
        }
    }

    async fn list_environments(&self, key: &str) -> Result<Vec<EnvironmentBody>, ProviderError> {
        let path = format!("{}/environments", project_path(key));
        let mut backend = self.backend();
        backend.record("GET", &path)?;
        Ok(backend
            .project(key, "GET", &path)?
            .environments
            .iter()
            .map(|name| EnvironmentBody { name: name.clone() })
            .collect())
    }

    async fn create_environment(
        &self,
        key: &str,
        body: &EnvironmentBody,
    ) -> Result<(), ProviderError> {
        let path = format!("{}/environments", project_path(key));
        let mut backend = self.backend();
        backend.record("POST", &path)?;
        let project = backend.project(key, "POST", &path)?;
        if project.environments.contains(&body.name) {
            return Err(remote_error(409, "POST", &path, "environment already exists"));
        }
        project.environments.push(body.name.clone());
        Ok(())
    }

    async fn rename_environment(
        &self,
        key: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), ProviderError> {
        let path = format!("{}/environments/{}/rename", project_path(key), old_name);
        let mut backend = self.backend();
        backend.record("POST", &path)?;
        let project = backend.project(key, "POST", &path)?;
        if project.environments.iter().any(|e| e == new_name) {
            return Err(remote_error(409, "POST", &path, "environment already exists"));
        }
        match project.environments.iter_mut().find(|e| *e == old_name) {
            Some(existing) => {
                *existing = new_name.to_string();
                Ok(())
            },
            None => Err(remote_error(404, "POST", &path, "environment not found")),
        }
    }

    async fn delete_environment(&self, key: &str, name: &str) -> Result<(), ProviderError> {
        let path = format!("{}/environments/{}", project_path(key), name);
        let mut backend = self.backend();
        backend.record("DELETE", &path)?;
        let project = backend.project(key, "DELETE", &path)?;
        let before = project.environments.len();
        project.environments.retain(|e| e != name);
        if project.environments.len() == before {
            return Err(remote_error(404, "DELETE", &path, "environment not found"));
        }
        Ok(())
    }
}

// =========================================================================
// Provider tester
// =========================================================================

/// A test harness for [`ProviderService`] implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Configure the provider; error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade resource state from an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read back. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.read(resource_type, created_state).await
    }

    /// Plan, update, then read back. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Plan a delete, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;
        let updated_state = self
            .lifecycle_update(resource_type, created_state, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated_state.clone())
            .await?;
        Ok(updated_state)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changed_paths()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes something without replacing the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changed_paths()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
