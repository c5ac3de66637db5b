//! Lifecycle of the `project_environment` resource.
//!
//! An environment is stored remotely as `{project_key}-{name}`. The state
//! keeps the short name; the prefix is added on the way out and stripped on
//! the way back. Moving an environment to another project is a replacement,
//! renaming one within its project is an in-place update.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::client::{ignore_not_found, ProjectClient};
use crate::error::ProviderError;
use crate::mapper::to_environment_body;
use crate::model::ProjectEnvironment;
use crate::validation::validate_environment;

/// Drives the environment lifecycle against a [`ProjectClient`].
#[derive(Clone)]
pub struct EnvironmentOrchestrator {
    client: Arc<dyn ProjectClient>,
}

impl EnvironmentOrchestrator {
    /// Create an orchestrator over the given client.
    pub fn new(client: Arc<dyn ProjectClient>) -> Self {
        Self { client }
    }

    /// Create the environment.
    #[instrument(skip(self), fields(project_key = %desired.project_key, name = %desired.name))]
    pub async fn create(
        &self,
        desired: &ProjectEnvironment,
    ) -> Result<ProjectEnvironment, ProviderError> {
        validate_environment(desired)?;
        self.client
            .create_environment(&desired.project_key, &to_environment_body(desired))
            .await?;
        info!("created environment");
        self.read_back(desired).await
    }

    /// Read the environment; `Ok(None)` when it or its project no longer exists.
    #[instrument(skip(self), fields(project_key = %current.project_key, name = %current.name))]
    pub async fn read(
        &self,
        current: &ProjectEnvironment,
    ) -> Result<Option<ProjectEnvironment>, ProviderError> {
        let environments = match self.client.list_environments(&current.project_key).await {
            Ok(environments) => environments,
            Err(err) if err.is_not_found() => {
                warn!("project not found, treating environment as gone");
                return Ok(None);
            },
            Err(err) => return Err(err),
        };

        let remote_name = current.remote_name();
        Ok(environments
            .iter()
            .find(|env| env.name == remote_name)
            .and_then(|env| ProjectEnvironment::from_remote_name(&current.project_key, &env.name)))
    }

    /// Rename the environment within its project.
    ///
    /// Fails with [`ProviderError::InvalidRequest`] when the project key
    /// changes; that requires replacing the resource.
    #[instrument(
        skip(self, previous),
        fields(project_key = %desired.project_key, name = %desired.name)
    )]
    pub async fn update(
        &self,
        previous: &ProjectEnvironment,
        desired: &ProjectEnvironment,
    ) -> Result<ProjectEnvironment, ProviderError> {
        if previous.project_key != desired.project_key {
            return Err(ProviderError::InvalidRequest(format!(
                "changing project_key from '{}' to '{}' requires replacing the environment",
                previous.project_key, desired.project_key
            )));
        }
        validate_environment(desired)?;

        if previous.name != desired.name {
            self.client
                .rename_environment(
                    &desired.project_key,
                    &previous.remote_name(),
                    &desired.remote_name(),
                )
                .await?;
            info!(from = %previous.name, "renamed environment");
        }
        self.read_back(desired).await
    }

    /// Delete the environment; an already missing one is not an error.
    #[instrument(skip(self), fields(project_key = %current.project_key, name = %current.name))]
    pub async fn delete(&self, current: &ProjectEnvironment) -> Result<(), ProviderError> {
        ignore_not_found(
            self.client
                .delete_environment(&current.project_key, &current.remote_name())
                .await,
        )?;
        info!("deleted environment");
        Ok(())
    }

    /// Import an environment from `{project_key}:{name}`.
    #[instrument(skip(self))]
    pub async fn import(&self, id: &str) -> Result<ProjectEnvironment, ProviderError> {
        let wanted = ProjectEnvironment::parse_import_id(id)?;
        self.read(&wanted)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("environment '{}'", id)))
    }

    async fn read_back(
        &self,
        desired: &ProjectEnvironment,
    ) -> Result<ProjectEnvironment, ProviderError> {
        self.read(desired).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "environment '{}' disappeared after write",
                desired.remote_name()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::model::Project;
    use crate::project::ProjectOrchestrator;
    use crate::testing::InMemoryProjectClient;
    use tokio_test::{assert_err, assert_ok};

    async fn setup() -> (Arc<InMemoryProjectClient>, EnvironmentOrchestrator) {
        let client = Arc::new(InMemoryProjectClient::new());
        ProjectOrchestrator::new(client.clone())
            .create(&Project::new("proj", "Proj"))
            .await
            .unwrap();
        client.clear_calls();
        let orchestrator = EnvironmentOrchestrator::new(client.clone());
        (client, orchestrator)
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let (client, orchestrator) = setup().await;
        let env = ProjectEnvironment::new("proj", "dev");

        let created = orchestrator.create(&env).await.unwrap();
        assert_eq!(created, env);
        assert_eq!(client.environment_names("proj"), vec!["proj-dev"]);
        assert_eq!(
            client.mutations(),
            vec!["POST /access/api/v1/projects/proj/environments"]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_long_identity() {
        let (client, orchestrator) = setup().await;
        let env = ProjectEnvironment::new("proj", "a".repeat(28));

        let err = orchestrator.create(&env).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Validation(ValidationError::CombinedLengthExceeded)
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name_or_bad_key() {
        let (client, orchestrator) = setup().await;

        let err = assert_err!(orchestrator.create(&ProjectEnvironment::new("proj", "")).await);
        assert!(matches!(
            err,
            ProviderError::Validation(ValidationError::Empty { field: "name" })
        ));
        let err = assert_err!(orchestrator.create(&ProjectEnvironment::new("Proj", "dev")).await);
        assert!(matches!(
            err,
            ProviderError::Validation(ValidationError::InvalidKey)
        ));

        assert!(client.calls().is_empty());
        assert!(client.environment_names("proj").is_empty());
    }

    #[tokio::test]
    async fn test_rename_to_empty_name_is_rejected() {
        let (client, orchestrator) = setup().await;
        let previous = orchestrator
            .create(&ProjectEnvironment::new("proj", "dev"))
            .await
            .unwrap();
        client.clear_calls();

        let desired = ProjectEnvironment::new("proj", "");
        assert!(orchestrator.update(&previous, &desired).await.is_err());
        assert!(client.calls().is_empty());
        assert_eq!(client.environment_names("proj"), vec!["proj-dev"]);
    }

    #[tokio::test]
    async fn test_rename() {
        let (client, orchestrator) = setup().await;
        let previous = orchestrator
            .create(&ProjectEnvironment::new("proj", "dev"))
            .await
            .unwrap();
        client.clear_calls();

        let desired = ProjectEnvironment::new("proj", "qa");
        let updated = orchestrator.update(&previous, &desired).await.unwrap();

        assert_eq!(updated, desired);
        assert_eq!(
            client.mutations(),
            vec!["POST /access/api/v1/projects/proj/environments/proj-dev/rename"]
        );
        assert_eq!(client.environment_names("proj"), vec!["proj-qa"]);
    }

    #[tokio::test]
    async fn test_project_key_change_requires_replace() {
        let (_, orchestrator) = setup().await;
        let previous = ProjectEnvironment::new("proj", "dev");
        let desired = ProjectEnvironment::new("other", "dev");

        let err = orchestrator.update(&previous, &desired).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_read_missing_environment_or_project() {
        let (_, orchestrator) = setup().await;
        let missing = ProjectEnvironment::new("proj", "nope");
        assert!(orchestrator.read(&missing).await.unwrap().is_none());

        let orphan = ProjectEnvironment::new("gone", "dev");
        assert!(orchestrator.read(&orphan).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (client, orchestrator) = setup().await;
        let env = orchestrator
            .create(&ProjectEnvironment::new("proj", "dev"))
            .await
            .unwrap();

        assert_ok!(orchestrator.delete(&env).await);
        assert_ok!(orchestrator.delete(&env).await);
        assert!(client.environment_names("proj").is_empty());
    }

    #[tokio::test]
    async fn test_import() {
        let (_, orchestrator) = setup().await;
        orchestrator
            .create(&ProjectEnvironment::new("proj", "dev"))
            .await
            .unwrap();

        let imported = orchestrator.import("proj:dev").await.unwrap();
        assert_eq!(imported, ProjectEnvironment::new("proj", "dev"));

        let err = assert_err!(orchestrator.import("proj:prod").await);
        assert!(err.is_not_found());
        assert!(matches!(
            orchestrator.import("proj-dev").await.unwrap_err(),
            ProviderError::InvalidRequest(_)
        ));
    }
}
