//! Create, read, update, delete and import for the `project` resource.
//!
//! Every mutating operation validates first, then issues a bounded sequence
//! of remote calls one after another, then reads the project back so the
//! returned value reflects what the backend stored.
//!
//! A failure part-way through an update leaves the earlier calls applied;
//! nothing is rolled back. The next plan sees the partial state as drift.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::client::{ignore_not_found, ProjectClient};
use crate::diff::{CollectionDiff, ProjectDiff};
use crate::error::ProviderError;
use crate::mapper::{
    from_remote, managed_role_bodies, to_membership_body, to_project_body, to_role_body,
};
use crate::model::{Membership, MembershipKind, Project, Role};
use crate::validation::{validate_key, validate_project};

/// Drives the project lifecycle against a [`ProjectClient`].
#[derive(Clone)]
pub struct ProjectOrchestrator {
    client: Arc<dyn ProjectClient>,
}

impl ProjectOrchestrator {
    /// Create an orchestrator over the given client.
    pub fn new(client: Arc<dyn ProjectClient>) -> Self {
        Self { client }
    }

    /// Whether the project exists remotely.
    pub async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        self.client.project_exists(key).await
    }

    /// Create the project and its sub-collections.
    #[instrument(skip(self, desired), fields(key = %desired.key))]
    pub async fn create(&self, desired: &Project) -> Result<Project, ProviderError> {
        validate_project(desired)?;
        let key = desired.key.as_str();

        self.client.create_project(&to_project_body(desired)).await?;
        info!(key, "created project");

        for role in managed_role_bodies(desired) {
            self.client.create_role(key, &role).await?;
        }
        for kind in [MembershipKind::User, MembershipKind::Group] {
            for membership in desired.memberships(kind) {
                self.client
                    .put_membership(key, kind, &to_membership_body(membership))
                    .await?;
            }
        }
        for repo in &desired.repos {
            self.client.attach_repo(key, repo).await?;
        }

        self.read_back(key, desired).await
    }

    /// Read the project; `Ok(None)` when it no longer exists.
    #[instrument(skip(self, prior))]
    pub async fn read(
        &self,
        key: &str,
        prior: Option<&Project>,
    ) -> Result<Option<Project>, ProviderError> {
        match self.client.fetch_project(key).await {
            Ok(remote) => Ok(Some(from_remote(&remote, prior))),
            Err(err) if err.is_not_found() => {
                warn!(key, "project not found, treating as gone");
                Ok(None)
            },
            Err(err) => Err(err),
        }
    }

    /// Apply only what changed between `previous` and `desired`.
    ///
    /// Call order: project fields, role additions and updates, members,
    /// groups, role removals, repository attach and detach. A key change
    /// updates the project addressed by the previous key in place.
    #[instrument(skip(self, previous, desired), fields(key = %desired.key))]
    pub async fn update(
        &self,
        previous: &Project,
        desired: &Project,
    ) -> Result<Project, ProviderError> {
        validate_project(desired)?;
        let diff = ProjectDiff::between(previous, desired);
        let key = desired.key.as_str();

        if diff.is_empty() {
            debug!(key, "no changes to apply");
            return self.read_back(key, desired).await;
        }

        if diff.fields_changed {
            self.client
                .update_project(&previous.key, &to_project_body(desired))
                .await?;
            if diff.key_changed {
                info!(from = %previous.key, to = key, "changed project key");
            }
        }

        self.upsert_roles(key, &diff.roles).await?;
        for kind in [MembershipKind::User, MembershipKind::Group] {
            self.apply_memberships(key, kind, diff.memberships(kind))
                .await?;
        }
        for role in &diff.roles.removed {
            ignore_not_found(self.client.delete_role(key, &role.name).await)?;
        }

        for repo in &diff.repos.attach {
            self.client.attach_repo(key, repo).await?;
        }
        for repo in &diff.repos.detach {
            ignore_not_found(self.client.detach_repo(repo).await)?;
        }

        info!(key, "updated project");
        self.read_back(key, desired).await
    }

    /// Delete the project; an already missing project is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        ignore_not_found(self.client.delete_project(key).await)?;
        info!(key, "deleted project");
        Ok(())
    }

    /// Import an existing project by key.
    #[instrument(skip(self))]
    pub async fn import(&self, id: &str) -> Result<Project, ProviderError> {
        validate_key(id)?;
        if !self.exists(id).await? {
            return Err(ProviderError::NotFound(format!("project '{}'", id)));
        }
        self.read(id, None)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("project '{}'", id)))
    }

    async fn read_back(&self, key: &str, desired: &Project) -> Result<Project, ProviderError> {
        self.read(key, Some(desired)).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("project '{}' disappeared after write", key))
        })
    }

    async fn upsert_roles(
        &self,
        key: &str,
        diff: &CollectionDiff<Role>,
    ) -> Result<(), ProviderError> {
        for role in &diff.added {
            let body = to_role_body(role);
            match self.client.create_role(key, &body).await {
                Err(err) if err.is_conflict() => {
                    debug!(key, role = %role.name, "role already exists, replacing");
                    self.client.update_role(key, &body).await?;
                },
                other => other?,
            }
        }
        for role in &diff.updated {
            self.client.update_role(key, &to_role_body(role)).await?;
        }
        Ok(())
    }

    async fn apply_memberships(
        &self,
        key: &str,
        kind: MembershipKind,
        diff: &CollectionDiff<Membership>,
    ) -> Result<(), ProviderError> {
        for membership in diff.added.iter().chain(&diff.updated) {
            self.client
                .put_membership(key, kind, &to_membership_body(membership))
                .await?;
        }
        for membership in &diff.removed {
            ignore_not_found(
                self.client
                    .delete_membership(key, kind, &membership.name)
                    .await,
            )?;
        }
        Ok(())
    }
}
