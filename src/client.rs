//! The remote collaborator the orchestrators talk to.
//!
//! [`ProjectClient`] is the abstract capability over the project-management
//! API. [`crate::http::HttpProjectClient`] implements it over HTTP and
//! [`crate::testing::InMemoryProjectClient`] implements it in memory.
//!
//! Every call either succeeds or fails exactly once from the caller's point of
//! view; retries are the implementation's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::model::MembershipKind;

/// Base path of the projects API.
pub const PROJECTS_PATH: &str = "/access/api/v1/projects";

/// Admin privileges as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdminPrivilegesBody {
    /// Project admins may manage members.
    #[serde(default)]
    pub manage_members: bool,
    /// Project admins may manage resources.
    #[serde(default)]
    pub manage_resources: bool,
    /// Project admins may index resources.
    #[serde(default)]
    pub index_resources: bool,
}

/// Project body for create, update and read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectBody {
    /// Project key.
    pub project_key: String,
    /// Display name.
    pub display_name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Admin privileges.
    #[serde(default)]
    pub admin_privileges: AdminPrivilegesBody,
    /// Quota in bytes, `-1` for unlimited.
    #[serde(default = "unlimited_quota")]
    pub storage_quota_bytes: i64,
    /// When true, deployments continue past the quota.
    #[serde(default = "default_soft_limit")]
    pub soft_limit: bool,
    /// Email admins when the quota is reached.
    #[serde(default)]
    pub storage_quota_email_notification: bool,
}

fn unlimited_quota() -> i64 {
    crate::model::UNLIMITED_STORAGE
}

fn default_soft_limit() -> bool {
    true
}

/// A user or group membership as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipBody {
    /// User or group name.
    pub name: String,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A project role as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBody {
    /// Role name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// `CUSTOM`, `PREDEFINED` or another backend-defined type.
    #[serde(rename = "type")]
    pub role_type: String,
    /// Environment tags.
    #[serde(default)]
    pub environments: Vec<String>,
    /// Permitted actions.
    #[serde(default)]
    pub actions: Vec<String>,
}

/// An environment as sent on the wire; `name` is `{project_key}-{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentBody {
    /// Full remote environment name.
    pub name: String,
}

/// Everything the backend knows about one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProject {
    /// Top-level fields.
    pub project: ProjectBody,
    /// User memberships.
    pub members: Vec<MembershipBody>,
    /// Group memberships.
    pub groups: Vec<MembershipBody>,
    /// All roles, custom and predefined.
    pub roles: Vec<RoleBody>,
    /// Attached repository keys.
    pub repos: Vec<String>,
}

/// Abstract capability over the project-management API.
///
/// All methods are keyed by project key. Implementations map a missing
/// object to [`ProviderError::NotFound`].
#[async_trait]
pub trait ProjectClient: Send + Sync {
    /// Whether a project with this key exists.
    async fn project_exists(&self, key: &str) -> Result<bool, ProviderError>;

    /// Fetch a project's top-level fields.
    async fn get_project(&self, key: &str) -> Result<ProjectBody, ProviderError>;

    /// Create a project. The response body is not used; callers read back.
    async fn create_project(&self, body: &ProjectBody) -> Result<(), ProviderError>;

    /// Update the project addressed by `key`; `body.project_key` may differ to rename it.
    async fn update_project(&self, key: &str, body: &ProjectBody) -> Result<(), ProviderError>;

    /// Delete a project.
    async fn delete_project(&self, key: &str) -> Result<(), ProviderError>;

    /// List user or group memberships.
    async fn list_memberships(
        &self,
        key: &str,
        kind: MembershipKind,
    ) -> Result<Vec<MembershipBody>, ProviderError>;

    /// Create or replace a membership.
    async fn put_membership(
        &self,
        key: &str,
        kind: MembershipKind,
        body: &MembershipBody,
    ) -> Result<(), ProviderError>;

    /// Remove a membership.
    async fn delete_membership(
        &self,
        key: &str,
        kind: MembershipKind,
        name: &str,
    ) -> Result<(), ProviderError>;

    /// List all roles of a project.
    async fn list_roles(&self, key: &str) -> Result<Vec<RoleBody>, ProviderError>;

    /// Create a role.
    async fn create_role(&self, key: &str, body: &RoleBody) -> Result<(), ProviderError>;

    /// Replace a role.
    async fn update_role(&self, key: &str, body: &RoleBody) -> Result<(), ProviderError>;

    /// Delete a role.
    async fn delete_role(&self, key: &str, name: &str) -> Result<(), ProviderError>;

    /// Repository keys attached to a project.
    async fn list_repos(&self, key: &str) -> Result<Vec<String>, ProviderError>;

    /// Attach a repository to a project.
    async fn attach_repo(&self, key: &str, repo: &str) -> Result<(), ProviderError>;

    /// Detach a repository from whatever project holds it.
    async fn detach_repo(&self, repo: &str) -> Result<(), ProviderError>;

    /// List a project's environments.
    async fn list_environments(&self, key: &str) -> Result<Vec<EnvironmentBody>, ProviderError>;

    /// Create an environment.
    async fn create_environment(
        &self,
        key: &str,
        body: &EnvironmentBody,
    ) -> Result<(), ProviderError>;

    /// Rename an environment; both names are full remote names.
    async fn rename_environment(
        &self,
        key: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), ProviderError>;

    /// Delete an environment by full remote name.
    async fn delete_environment(&self, key: &str, name: &str) -> Result<(), ProviderError>;

    /// Fetch a project and all its sub-collections, one call after another.
    async fn fetch_project(&self, key: &str) -> Result<RemoteProject, ProviderError> {
        let project = self.get_project(key).await?;
        let members = self.list_memberships(key, MembershipKind::User).await?;
        let groups = self.list_memberships(key, MembershipKind::Group).await?;
        let roles = self.list_roles(key).await?;
        let repos = self.list_repos(key).await?;
        Ok(RemoteProject {
            project,
            members,
            groups,
            roles,
            repos,
        })
    }
}

/// Treat a not-found error as success.
pub(crate) fn ignore_not_found(result: Result<(), ProviderError>) -> Result<(), ProviderError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_body_defaults() {
        let body: ProjectBody = serde_json::from_value(json!({
            "project_key": "proj",
            "display_name": "Proj"
        }))
        .unwrap();
        assert_eq!(body.storage_quota_bytes, -1);
        assert!(body.soft_limit);
        assert_eq!(body.description, "");
        assert_eq!(body.admin_privileges, AdminPrivilegesBody::default());
    }

    #[test]
    fn test_role_body_type_field() {
        let role: RoleBody = serde_json::from_value(json!({
            "name": "qa",
            "type": "CUSTOM",
            "environments": ["DEV"],
            "actions": ["READ_REPOSITORY"]
        }))
        .unwrap();
        assert_eq!(role.role_type, "CUSTOM");

        let value = serde_json::to_value(&role).unwrap();
        assert_eq!(value["type"], "CUSTOM");
    }

    #[test]
    fn test_ignore_not_found() {
        assert!(ignore_not_found(Err(ProviderError::NotFound("x".into()))).is_ok());
        assert!(ignore_not_found(Err(ProviderError::Unconfigured)).is_err());
        assert!(ignore_not_found(Ok(())).is_ok());
    }
}
