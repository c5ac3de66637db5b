//! The provider surface the host drives.
//!
//! [`ProviderService`] is the JSON-in, JSON-out contract: every resource
//! operation takes and returns state as [`serde_json::Value`] and dispatches
//! on the resource type name. [`ProjectsProvider`] implements it for the
//! `project` and `project_environment` resources.
//!
//! # Example
//!
//! ```no_run
//! use project_provider::{ProjectsProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), project_provider::ProviderError> {
//! let provider = ProjectsProvider::new();
//! provider
//!     .configure(json!({"url": "https://example.jfrog.io", "access_token": "token"}))
//!     .await?;
//!
//! let state = provider
//!     .create(
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
//!     .await?;
//! assert_eq!(state["id"], "myproj");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::ProjectClient;
use crate::config::ProviderConfig;
use crate::diff::ProjectDiff;
use crate::environment::EnvironmentOrchestrator;
use crate::error::{ProviderError, ValidationError};
use crate::http::HttpProjectClient;
use crate::mapper::{
    decode_environment, decode_project, encode_environment, encode_project,
    upgrade_project_state,
};
use crate::model::RoleMode;
use crate::project::ProjectOrchestrator;
use crate::schema::{
    environment_schema, project_schema, Diagnostic, ProviderSchema, Schema,
    ENVIRONMENT_RESOURCE, PROJECT_RESOURCE,
};
use crate::types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation::{
    project_violations, validate, validate_environment, validate_project,
};

/// Operations a provider exposes to its host.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata; by default derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata::new(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            schema.resources.keys(),
        )
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state persisted at an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan changes for a resource; a null `proposed_state` plans a delete.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Read the current state of a resource; `Value::Null` when it is gone.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::InvalidRequest(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    Project,
    Environment,
}

impl ResourceKind {
    fn parse(resource_type: &str) -> Result<Self, ProviderError> {
        match resource_type {
            PROJECT_RESOURCE => Ok(Self::Project),
            ENVIRONMENT_RESOURCE => Ok(Self::Environment),
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }
}

/// Provider for projects and project environments.
///
/// Holds no client until [`ProviderService::configure`] succeeds; resource
/// operations before that fail with [`ProviderError::Unconfigured`].
#[derive(Default)]
pub struct ProjectsProvider {
    client: RwLock<Option<Arc<dyn ProjectClient>>>,
}

impl ProjectsProvider {
    /// Create an unconfigured provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that is already configured with `client`.
    pub fn with_client(client: Arc<dyn ProjectClient>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    async fn client(&self) -> Result<Arc<dyn ProjectClient>, ProviderError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(ProviderError::Unconfigured)
    }

    async fn projects(&self) -> Result<ProjectOrchestrator, ProviderError> {
        Ok(ProjectOrchestrator::new(self.client().await?))
    }

    async fn environments(&self) -> Result<EnvironmentOrchestrator, ProviderError> {
        Ok(EnvironmentOrchestrator::new(self.client().await?))
    }

    fn plan_project(
        &self,
        prior_state: Option<&Value>,
        proposed_state: &Value,
    ) -> Result<PlanResult, ProviderError> {
        let desired = decode_project(proposed_state)?;
        validate_project(&desired)?;
        let planned = encode_project(&desired);

        let Some(prior_state) = prior_state else {
            return Ok(PlanResult::with_changes(
                planned.clone(),
                creation_changes(&planned),
                false,
            ));
        };

        let previous = decode_project(prior_state)?;
        let diff = ProjectDiff::between(&previous, &desired);
        if diff.is_empty() {
            return Ok(PlanResult::no_change(planned));
        }
        let changes = diff.changes(&previous, &desired);
        let requires_replace = requires_replacement(&project_schema(), &changes);
        Ok(PlanResult::with_changes(planned, changes, requires_replace))
    }

    fn plan_environment(
        &self,
        prior_state: Option<&Value>,
        proposed_state: &Value,
    ) -> Result<PlanResult, ProviderError> {
        let desired = decode_environment(proposed_state)?;
        validate_environment(&desired)?;
        let planned = encode_environment(&desired);

        let Some(prior_state) = prior_state else {
            return Ok(PlanResult::with_changes(
                planned.clone(),
                creation_changes(&planned),
                false,
            ));
        };

        let previous = decode_environment(prior_state)?;
        let mut changes = Vec::new();
        if previous.project_key != desired.project_key {
            changes.push(AttributeChange::modified(
                "project_key",
                Value::String(previous.project_key.clone()),
                Value::String(desired.project_key.clone()),
            ));
        }
        if previous.name != desired.name {
            changes.push(AttributeChange::modified(
                "name",
                Value::String(previous.name.clone()),
                Value::String(desired.name.clone()),
            ));
        }

        let requires_replace = requires_replacement(&environment_schema(), &changes);
        Ok(PlanResult::with_changes(planned, changes, requires_replace))
    }
}

/// Whether a change touches a top-level attribute marked force-new in `schema`.
fn requires_replacement(schema: &Schema, changes: &[AttributeChange]) -> bool {
    let force_new: BTreeSet<&str> = schema.force_new_attributes().collect();
    changes.iter().any(|change| {
        let attribute = change.path.split('.').next().unwrap_or_default();
        force_new.contains(attribute)
    })
}

/// Every non-null attribute of a new resource, as additions.
fn creation_changes(planned: &Value) -> Vec<AttributeChange> {
    planned
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::added(k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn deletion_plan(prior_state: Option<&Value>) -> PlanResult {
    let changes = prior_state
        .and_then(|state| state.get("id"))
        .map(|id| vec![AttributeChange::removed("id", id.clone())])
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

#[async_trait::async_trait]
impl ProviderService for ProjectsProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::projects()
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let mut diagnostics = validate(&schema.provider, &config);
        if diagnostics.is_empty() {
            if let Err(err) = ProviderConfig::from_json(&config) {
                diagnostics.push(Diagnostic::from(&err));
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::from_json(&config) {
            Ok(config) => config,
            Err(err) => {
                error!(error = %err, "configure failed");
                return Ok(vec![Diagnostic::from(&err)]);
            }
        };

        info!(url = %config.url, "configuring provider");
        let client = HttpProjectClient::new(config)?;
        *self.client.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    #[instrument(skip(self, config))]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let kind = ResourceKind::parse(resource_type)?;
        let schema = match kind {
            ResourceKind::Project => project_schema(),
            ResourceKind::Environment => environment_schema(),
        };

        let mut diagnostics = validate(&schema, &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(
                resource_type,
                diagnostics = diagnostics.len(),
                "config failed structural validation"
            );
            return Ok(diagnostics);
        }

        match kind {
            ResourceKind::Project => {
                let project = decode_project(&config)?;
                diagnostics.extend(project_violations(&project).iter().map(Diagnostic::from));

                let declares_roles = config
                    .get("role")
                    .and_then(Value::as_array)
                    .is_some_and(|roles| !roles.is_empty());
                if project.role_mode == RoleMode::ExternalRoles && declares_roles {
                    diagnostics.push(
                        Diagnostic::warning("role blocks are ignored")
                            .with_detail(
                                "use_project_role_resource is true; roles are managed elsewhere",
                            )
                            .with_attribute("role"),
                    );
                }
            },
            ResourceKind::Environment => {
                let environment = decode_environment(&config)?;
                if let Err(err) = validate_environment(&environment) {
                    let diagnostic = Diagnostic::from(&err);
                    diagnostics.push(match err {
                        ValidationError::InvalidKey => diagnostic.with_attribute("project_key"),
                        _ => diagnostic,
                    });
                }
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, state))]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let version = u64::try_from(version).map_err(|_| {
            ProviderError::InvalidRequest(format!("invalid state version {}", version))
        })?;
        match ResourceKind::parse(resource_type)? {
            ResourceKind::Project => upgrade_project_state(version, state),
            ResourceKind::Environment => Ok(state),
        }
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let kind = ResourceKind::parse(resource_type)?;
        if proposed_state.is_null() {
            return Ok(deletion_plan(prior_state.as_ref()));
        }

        let result = match kind {
            ResourceKind::Project => self.plan_project(prior_state.as_ref(), &proposed_state),
            ResourceKind::Environment => {
                self.plan_environment(prior_state.as_ref(), &proposed_state)
            }
        }?;
        debug!(
            resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        match ResourceKind::parse(resource_type)? {
            ResourceKind::Project => {
                let desired = decode_project(&planned_state)?;
                let created = self.projects().await?.create(&desired).await?;
                Ok(encode_project(&created))
            },
            ResourceKind::Environment => {
                let desired = decode_environment(&planned_state)?;
                let created = self.environments().await?.create(&desired).await?;
                Ok(encode_environment(&created))
            }
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let state = match ResourceKind::parse(resource_type)? {
            ResourceKind::Project => {
                let prior = decode_project(&current_state)?;
                self.projects()
                    .await?
                    .read(&prior.key, Some(&prior))
                    .await?
                    .map(|project| encode_project(&project))
            },
            ResourceKind::Environment => {
                let current = decode_environment(&current_state)?;
                self.environments()
                    .await?
                    .read(&current)
                    .await?
                    .map(|environment| encode_environment(&environment))
            }
        };
        Ok(state.unwrap_or(Value::Null))
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        match ResourceKind::parse(resource_type)? {
            ResourceKind::Project => {
                let previous = decode_project(&prior_state)?;
                let desired = decode_project(&planned_state)?;
                let updated = self.projects().await?.update(&previous, &desired).await?;
                Ok(encode_project(&updated))
            },
            ResourceKind::Environment => {
                let previous = decode_environment(&prior_state)?;
                let desired = decode_environment(&planned_state)?;
                let updated = self
                    .environments()
                    .await?
                    .update(&previous, &desired)
                    .await?;
                Ok(encode_environment(&updated))
            }
        }
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        match ResourceKind::parse(resource_type)? {
            ResourceKind::Project => {
                let key = current_state
                    .get("key")
                    .or_else(|| current_state.get("id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProviderError::InvalidRequest("project state has no key".to_string())
                    })?;
                self.projects().await?.delete(key).await
            },
            ResourceKind::Environment => {
                let current = decode_environment(&current_state)?;
                self.environments().await?.delete(&current).await
            }
        }
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = match ResourceKind::parse(resource_type)? {
            ResourceKind::Project => encode_project(&self.projects().await?.import(id).await?),
            ResourceKind::Environment => {
                encode_environment(&self.environments().await?.import(id).await?)
            }
        };
        info!(resource_type, id, "imported resource");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PROJECT_SCHEMA_VERSION;
    use crate::testing::{
        assert_error_contains, assert_no_errors, assert_plan_changes_attribute,
        assert_plan_no_changes, assert_plan_replaces, assert_plan_updates_in_place,
        InMemoryProjectClient, ProviderTester,
    };
    use serde_json::json;

    fn tester() -> (Arc<InMemoryProjectClient>, ProviderTester<ProjectsProvider>) {
        let client = Arc::new(InMemoryProjectClient::new().with_repos(["repo1", "repo2"]));
        let provider = ProjectsProvider::with_client(client.clone());
        (client, ProviderTester::new(provider))
    }

    fn project_config() -> Value {
        json!({
            "key": "proj",
            "display_name": "Proj",
            "description": "test description",
            "admin_privileges": [{
                "manage_members": true,
                "manage_resources": true,
                "index_resources": true
            }],
            "max_storage_in_gibibytes": 1,
            "block_deployments_on_limit": false,
            "email_notification": true,
            "member": [
                {"name": "user1", "roles": ["Developer", "Project Admin"]},
                {"name": "user2", "roles": ["Developer"]}
            ],
            "group": [
                {"name": "group1", "roles": ["qa"]},
                {"name": "group2", "roles": ["Release Manager"]}
            ],
            "role": [
                {
                    "name": "qa",
                    "description": "QA role",
                    "type": "CUSTOM",
                    "environments": ["DEV"],
                    "actions": ["READ_REPOSITORY", "READ_BUILD"]
                },
                {
                    "name": "devop",
                    "description": "DevOp role",
                    "type": "CUSTOM",
                    "environments": ["DEV", "PROD"],
                    "actions": ["READ_REPOSITORY", "DEPLOY_CACHE_REPOSITORY"]
                }
            ],
            "repos": ["repo1", "repo2"]
        })
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let tester = ProviderTester::new(ProjectsProvider::new());
        let err = tester.create("project", project_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unconfigured));
    }

    #[tokio::test]
    async fn test_configure_without_token_reports_diagnostic() {
        let provider = ProjectsProvider::new();
        let diagnostics = provider
            .configure(json!({"url": "http://localhost:8081", "access_token": ""}))
            .await
            .unwrap();
        if std::env::var("JFROG_ACCESS_TOKEN").is_err()
            && std::env::var("PROJECTS_ACCESS_TOKEN").is_err()
        {
            assert_error_contains(&diagnostics, "no authentication details supplied");
        }
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let provider = ProjectsProvider::new();
        let diagnostics = provider
            .validate_provider_config(json!({
                "url": "https://example.jfrog.io",
                "access_token": "tok"
            }))
            .await
            .unwrap();
        assert_no_errors(&diagnostics);

        let diagnostics = provider
            .validate_provider_config(json!({"url": 8081, "access_token": "tok"}))
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "Invalid type for attribute 'url'");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("url"));

        let diagnostics = provider
            .validate_provider_config(json!({
                "uri": "https://example.jfrog.io",
                "access_token": "tok"
            }))
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "Unsupported attribute 'uri'");

        let diagnostics = provider
            .validate_provider_config(json!({"url": "", "access_token": "tok"}))
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "you must supply a URL");
    }

    #[tokio::test]
    async fn test_metadata_lists_resources() {
        let (_, tester) = tester();
        let types = tester.resource_types();
        assert_eq!(types, vec!["project", "project_environment"]);
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let (_, tester) = tester();
        let err = tester.create("project_role", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let (_, tester) = tester();
        tester
            .validate_resource_config("project", project_config())
            .await
            .unwrap();

        let mut config = project_config();
        config["key"] = json!("Invalid_Key");
        let diagnostics = tester
            .provider()
            .validate_resource_config("project", config)
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "project_key must be 2 - 32");

        let mut config = project_config();
        config["display_name"] = json!("a".repeat(33));
        config["max_storage_in_gibibytes"] = json!(0);
        let diagnostics = tester
            .provider()
            .validate_resource_config("project", config)
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "string must be less than or equal 32 characters long");
        assert_error_contains(&diagnostics, "in the range (1 - 8589934591), got 0");
    }

    #[tokio::test]
    async fn test_validate_structure_before_values() {
        let (_, tester) = tester();
        let mut config = project_config();
        config["admin_privileges"] = json!([]);
        let diagnostics = tester
            .provider()
            .validate_resource_config("project", config)
            .await
            .unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("admin_privileges")));
    }

    #[tokio::test]
    async fn test_external_roles_warns_about_role_blocks() {
        let (_, tester) = tester();
        let mut config = project_config();
        config["use_project_role_resource"] = json!(true);
        let diagnostics = tester
            .provider()
            .validate_resource_config("project", config)
            .await
            .unwrap();
        assert_no_errors(&diagnostics);
        assert!(diagnostics.iter().any(|d| d.attribute.as_deref() == Some("role")));
    }

    #[tokio::test]
    async fn test_project_lifecycle() {
        let (_, tester) = tester();
        let mut updated_config = project_config();
        updated_config["display_name"] = json!("Renamed");
        updated_config["member"] = json!([{"name": "user1", "roles": ["Developer"]}]);
        updated_config["repos"] = json!(["repo2"]);

        let state = tester
            .lifecycle_crud("project", project_config(), updated_config)
            .await
            .unwrap();

        assert_eq!(state["display_name"], "Renamed");
        assert_eq!(state["member"].as_array().unwrap().len(), 1);
        assert_eq!(state["repos"], json!(["repo2"]));
    }

    #[tokio::test]
    async fn test_read_after_create_plans_no_changes() {
        let (_, tester) = tester();
        let state = tester
            .lifecycle_create("project", project_config())
            .await
            .unwrap();

        assert_eq!(state["member"][0]["name"], "user1");
        assert_eq!(state["member"][1]["name"], "user2");
        assert_eq!(state["group"][1]["name"], "group2");

        let plan = tester.plan_update("project", state, project_config()).await.unwrap();
        assert_plan_no_changes(&plan);
    }

    #[tokio::test]
    async fn test_plan_key_change_updates_in_place() {
        let (_, tester) = tester();
        let state = tester
            .lifecycle_create("project", project_config())
            .await
            .unwrap();

        let mut config = project_config();
        config["key"] = json!("proj2");
        let plan = tester
            .plan_update("project", state.clone(), config.clone())
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "key");

        let updated = tester.update("project", state, plan.planned_state).await.unwrap();
        assert_eq!(updated["id"], "proj2");
        assert_eq!(updated["member"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_migration_from_version_zero() {
        let (_, tester) = tester();
        let created = tester
            .lifecycle_create("project", project_config())
            .await
            .unwrap();

        let mut legacy = created.clone();
        legacy.as_object_mut().unwrap().remove("use_project_role_resource");
        let upgraded = tester
            .upgrade_resource_state("project", 0, legacy)
            .await
            .unwrap();
        assert_eq!(upgraded["use_project_role_resource"], false);
        assert_eq!(upgraded["role"].as_array().unwrap().len(), 2);

        let plan = tester
            .plan_update("project", upgraded.clone(), project_config())
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let mut external = project_config();
        external["use_project_role_resource"] = json!(true);
        let state = tester
            .lifecycle_update("project", upgraded, external)
            .await
            .unwrap();
        assert_eq!(state["use_project_role_resource"], true);
        assert_eq!(state["role"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_upgrade_rejects_negative_version() {
        let (_, tester) = tester();
        assert!(tester
            .upgrade_resource_state("project", -1, project_config())
            .await
            .is_err());
        let upgraded = tester
            .upgrade_resource_state("project", PROJECT_SCHEMA_VERSION as i64, json!({"key": "x"}))
            .await
            .unwrap();
        assert_eq!(upgraded, json!({"key": "x"}));
    }

    #[tokio::test]
    async fn test_upgrade_environment_state_passes_through() {
        let (_, tester) = tester();
        let state = json!({"id": "dev", "name": "dev", "project_key": "proj"});
        let upgraded = tester
            .upgrade_resource_state("project_environment", 0, state.clone())
            .await
            .unwrap();
        assert_eq!(upgraded, state);
    }

    #[test]
    fn test_replacement_follows_schema_force_new() {
        let changes = vec![AttributeChange::modified(
            "project_key",
            json!("proj"),
            json!("other"),
        )];
        assert!(requires_replacement(&environment_schema(), &changes));

        let relaxed = environment_schema()
            .with_attribute("project_key", crate::schema::Attribute::required_string());
        assert!(!requires_replacement(&relaxed, &changes));

        let renamed = vec![AttributeChange::modified("name", json!("dev"), json!("qa"))];
        assert!(!requires_replacement(&environment_schema(), &renamed));
    }

    #[tokio::test]
    async fn test_validate_environment_config() {
        let (_, tester) = tester();
        let diagnostics = tester
            .provider()
            .validate_resource_config(
                "project_environment",
                json!({"name": "dev", "project_key": "Bad_Key"}),
            )
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "project_key must be 2 - 32");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("project_key"));

        let diagnostics = tester
            .provider()
            .validate_resource_config(
                "project_environment",
                json!({"name": "", "project_key": "proj"}),
            )
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "name must not be empty");
    }

    #[tokio::test]
    async fn test_read_gone_project_is_null() {
        let (_, tester) = tester();
        let state = tester
            .lifecycle_create("project", project_config())
            .await
            .unwrap();
        tester.delete("project", state.clone()).await.unwrap();
        assert!(tester.read("project", state).await.unwrap().is_null());
    }

    #[tokio::test]
    async fn test_import_project() {
        let (_, tester) = tester();
        tester
            .lifecycle_create("project", project_config())
            .await
            .unwrap();

        let imported = tester.import_resource("project", "proj").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state["key"], "proj");
        assert_eq!(imported[0].state["role"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_environment_lifecycle() {
        let (_, tester) = tester();
        tester
            .lifecycle_create("project", project_config())
            .await
            .unwrap();

        let state = tester
            .lifecycle_create("project_environment", json!({"name": "dev", "project_key": "proj"}))
            .await
            .unwrap();
        assert_eq!(state, json!({"id": "dev", "name": "dev", "project_key": "proj"}));

        let plan = tester
            .plan_update(
                "project_environment",
                state.clone(),
                json!({"name": "qa", "project_key": "proj"}),
            )
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "name");

        let plan = tester
            .plan_update(
                "project_environment",
                state.clone(),
                json!({"name": "dev", "project_key": "other"}),
            )
            .await
            .unwrap();
        assert_plan_replaces(&plan);

        let imported = tester
            .import_resource("project_environment", "proj:dev")
            .await
            .unwrap();
        assert_eq!(imported[0].state["id"], "dev");
    }

    #[tokio::test]
    async fn test_environment_identity_too_long() {
        let (_, tester) = tester();
        let err = tester
            .plan_create(
                "project_environment",
                json!({"name": "a".repeat(28), "project_key": "proj"}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot exceed 32 characters"));
    }

    #[tokio::test]
    async fn test_plan_delete() {
        let (_, tester) = tester();
        let state = tester
            .lifecycle_create("project", project_config())
            .await
            .unwrap();
        let plan = tester.plan_delete("project", state).await.unwrap();
        assert!(plan.planned_state.is_null());
        assert_plan_changes_attribute(&plan, "id");
    }
}
