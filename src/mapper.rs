//! State mapping between state JSON, the typed model and wire bodies.
//!
//! Three directions are covered:
//!
//! - **Decode / encode** state JSON as persisted by the host
//!   ([`decode_project`], [`encode_project`]). Decoding applies defaults.
//! - **Forward** to the backend ([`to_project_body`], [`to_membership_body`],
//!   [`managed_role_bodies`]). Roles are only sent in
//!   [`RoleMode::InlineRoles`].
//! - **Reverse** from the backend ([`from_remote`]). The prior state decides
//!   the role mode and the order of members, groups and roles.
//!
//! [`upgrade_project_state`] migrates persisted state from older schema
//! versions without touching the backend.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::{
    AdminPrivilegesBody, EnvironmentBody, MembershipBody, ProjectBody, RemoteProject, RoleBody,
};
use crate::error::ProviderError;
use crate::model::{
    AdminPrivileges, Membership, Project, ProjectEnvironment, Role, RoleMode, RoleType,
    UNLIMITED_STORAGE,
};
use crate::schema::PROJECT_SCHEMA_VERSION;

const CUSTOM_ROLE_TYPE: &str = "CUSTOM";
const PREDEFINED_ROLE_TYPE: &str = "PREDEFINED";

#[derive(Debug, Serialize, Deserialize)]
struct ProjectState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    key: String,
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    admin_privileges: Vec<AdminPrivileges>,
    #[serde(default = "unlimited_storage")]
    max_storage_in_gibibytes: i64,
    #[serde(default)]
    block_deployments_on_limit: bool,
    #[serde(default)]
    email_notification: bool,
    #[serde(default)]
    use_project_role_resource: Option<bool>,
    #[serde(default)]
    member: Vec<Membership>,
    #[serde(default)]
    group: Vec<Membership>,
    #[serde(default)]
    role: Vec<Role>,
    #[serde(default)]
    repos: BTreeSet<String>,
}

fn unlimited_storage() -> i64 {
    UNLIMITED_STORAGE
}

#[derive(Debug, Serialize, Deserialize)]
struct EnvironmentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    project_key: String,
}

// =========================================================================
// State JSON
// =========================================================================

/// Decode project state or configuration JSON, applying defaults.
///
/// A missing `use_project_role_resource` selects [`RoleMode::InlineRoles`].
pub fn decode_project(state: &Value) -> Result<Project, ProviderError> {
    let state: ProjectState = serde_json::from_value(without_nulls(state))?;
    let admin_privileges = state.admin_privileges.first().copied().unwrap_or_default();
    let role_mode = RoleMode::from_flag(state.use_project_role_resource.unwrap_or(false));

    Ok(Project {
        key: state.key,
        display_name: state.display_name,
        description: state.description,
        admin_privileges,
        max_storage_in_gibibytes: state.max_storage_in_gibibytes,
        block_deployments_on_limit: state.block_deployments_on_limit,
        email_notification: state.email_notification,
        role_mode,
        members: normalize_memberships(state.member),
        groups: normalize_memberships(state.group),
        roles: match role_mode {
            RoleMode::InlineRoles => state.role,
            RoleMode::ExternalRoles => Vec::new(),
        },
        repos: state.repos,
    })
}

/// Encode a project as state JSON; `id` is the project key.
pub fn encode_project(project: &Project) -> Value {
    let state = ProjectState {
        id: Some(project.key.clone()),
        key: project.key.clone(),
        display_name: project.display_name.clone(),
        description: project.description.clone(),
        admin_privileges: vec![project.admin_privileges],
        max_storage_in_gibibytes: project.max_storage_in_gibibytes,
        block_deployments_on_limit: project.block_deployments_on_limit,
        email_notification: project.email_notification,
        use_project_role_resource: Some(project.role_mode.as_flag()),
        member: project.members.clone(),
        group: project.groups.clone(),
        role: project.managed_roles().to_vec(),
        repos: project.repos.clone(),
    };
    serde_json::to_value(state).unwrap_or(Value::Null)
}

/// Decode environment state or configuration JSON.
pub fn decode_environment(state: &Value) -> Result<ProjectEnvironment, ProviderError> {
    let state: EnvironmentState = serde_json::from_value(without_nulls(state))?;
    Ok(ProjectEnvironment::new(state.project_key, state.name))
}

/// Encode an environment as state JSON; `id` is the environment name.
pub fn encode_environment(environment: &ProjectEnvironment) -> Value {
    let state = EnvironmentState {
        id: Some(environment.name.clone()),
        name: environment.name.clone(),
        project_key: environment.project_key.clone(),
    };
    serde_json::to_value(state).unwrap_or(Value::Null)
}

/// Migrate project state persisted at an older schema version.
///
/// Version 0 state gains `use_project_role_resource = false`; its role blocks
/// are kept as they are.
pub fn upgrade_project_state(version: u64, state: Value) -> Result<Value, ProviderError> {
    if version > PROJECT_SCHEMA_VERSION {
        return Err(ProviderError::InvalidRequest(format!(
            "project state version {} is newer than supported version {}",
            version, PROJECT_SCHEMA_VERSION
        )));
    }

    let mut state = state;
    if version == 0 {
        let obj = state.as_object_mut().ok_or_else(|| {
            ProviderError::InvalidRequest("project state must be an object".to_string())
        })?;
        let flag = obj
            .entry("use_project_role_resource")
            .or_insert(Value::Bool(false));
        if flag.is_null() {
            *flag = Value::Bool(false);
        }
        debug!("upgraded project state from version 0");
    }
    Ok(state)
}

fn normalize_memberships(memberships: Vec<Membership>) -> Vec<Membership> {
    memberships
        .into_iter()
        .map(|m| Membership::new(m.name, m.roles))
        .collect()
}

fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(without_nulls).collect()),
        other => other.clone(),
    }
}

// =========================================================================
// Forward
// =========================================================================

/// Top-level project body for create and update.
pub fn to_project_body(project: &Project) -> ProjectBody {
    let privileges = project.admin_privileges;
    ProjectBody {
        project_key: project.key.clone(),
        display_name: project.display_name.clone(),
        description: project.description.clone(),
        admin_privileges: AdminPrivilegesBody {
            manage_members: privileges.manage_members,
            manage_resources: privileges.manage_resources,
            index_resources: privileges.index_resources,
        },
        storage_quota_bytes: project.storage_quota_bytes(),
        soft_limit: !project.block_deployments_on_limit,
        storage_quota_email_notification: project.email_notification,
    }
}

/// Membership body.
pub fn to_membership_body(membership: &Membership) -> MembershipBody {
    MembershipBody {
        name: membership.name.clone(),
        roles: membership.roles.clone(),
    }
}

/// Role body.
pub fn to_role_body(role: &Role) -> RoleBody {
    RoleBody {
        name: role.name.clone(),
        description: role.description.clone(),
        role_type: match role.role_type {
            RoleType::Custom => CUSTOM_ROLE_TYPE,
            RoleType::Predefined => PREDEFINED_ROLE_TYPE,
        }
        .to_string(),
        environments: role.environments.iter().cloned().collect(),
        actions: role.actions.iter().cloned().collect(),
    }
}

/// Role bodies this resource sends; empty under [`RoleMode::ExternalRoles`].
pub fn managed_role_bodies(project: &Project) -> Vec<RoleBody> {
    project.managed_roles().iter().map(to_role_body).collect()
}

/// Environment body.
pub fn to_environment_body(environment: &ProjectEnvironment) -> EnvironmentBody {
    EnvironmentBody {
        name: environment.remote_name(),
    }
}

// =========================================================================
// Reverse
// =========================================================================

/// Build a project from the backend's view of it.
///
/// `prior` is the last-known state: it supplies the role mode (inline when
/// absent) and the declaration order that members, groups and roles are
/// returned in. Only custom roles are read back, and none at all under
/// [`RoleMode::ExternalRoles`].
pub fn from_remote(remote: &RemoteProject, prior: Option<&Project>) -> Project {
    let role_mode = prior.map(|p| p.role_mode).unwrap_or_default();
    let body = &remote.project;

    let members: Vec<Membership> = remote.members.iter().map(from_membership_body).collect();
    let groups: Vec<Membership> = remote.groups.iter().map(from_membership_body).collect();
    let roles: Vec<Role> = match role_mode {
        RoleMode::InlineRoles => remote.roles.iter().filter_map(from_role_body).collect(),
        RoleMode::ExternalRoles => Vec::new(),
    };

    let (prior_members, prior_groups, prior_roles) = match prior {
        Some(p) => (p.members.as_slice(), p.groups.as_slice(), p.managed_roles()),
        None => (&[][..], &[][..], &[][..]),
    };

    Project {
        key: body.project_key.clone(),
        display_name: body.display_name.clone(),
        description: body.description.clone(),
        admin_privileges: AdminPrivileges::new(
            body.admin_privileges.manage_members,
            body.admin_privileges.manage_resources,
            body.admin_privileges.index_resources,
        ),
        max_storage_in_gibibytes: Project::gibibytes_from_bytes(body.storage_quota_bytes),
        block_deployments_on_limit: !body.soft_limit,
        email_notification: body.storage_quota_email_notification,
        role_mode,
        members: keep_role_order(
            align(members, prior_members, |m| m.name.as_str()),
            prior_members,
        ),
        groups: keep_role_order(
            align(groups, prior_groups, |g| g.name.as_str()),
            prior_groups,
        ),
        roles: align(roles, prior_roles, |r| r.name.as_str()),
        repos: remote.repos.iter().cloned().collect(),
    }
}

fn from_membership_body(body: &MembershipBody) -> Membership {
    Membership::new(body.name.clone(), body.roles.iter().cloned())
}

fn from_role_body(body: &RoleBody) -> Option<Role> {
    if body.role_type != CUSTOM_ROLE_TYPE {
        return None;
    }
    Some(
        Role::custom(body.name.clone(), body.description.clone())
            .with_environments(body.environments.iter().cloned())
            .with_actions(body.actions.iter().cloned()),
    )
}

/// Reorder `remote` to follow `prior`; unknown entries keep remote order at the end.
fn align<T, F>(remote: Vec<T>, prior: &[T], name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut remaining = remote;
    let mut ordered = Vec::with_capacity(remaining.len());
    for known in prior {
        if let Some(pos) = remaining.iter().position(|r| name(r) == name(known)) {
            ordered.push(remaining.remove(pos));
        }
    }
    ordered.extend(remaining);
    ordered
}

/// Keep the prior role order for memberships whose role set is unchanged.
fn keep_role_order(memberships: Vec<Membership>, prior: &[Membership]) -> Vec<Membership> {
    memberships
        .into_iter()
        .map(|m| match prior.iter().find(|p| p.name == m.name) {
            Some(p) if p.same_roles(&m) => p.clone(),
            _ => m,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_state() -> Value {
        json!({
            "key": "proj",
            "display_name": "Proj",
            "description": "test description",
            "admin_privileges": [{
                "manage_members": true,
                "manage_resources": false,
                "index_resources": true
            }],
            "max_storage_in_gibibytes": 10,
            "block_deployments_on_limit": true,
            "email_notification": false,
            "member": [
                {"name": "user1", "roles": ["Developer", "Project Admin"]},
                {"name": "user2", "roles": ["Developer"]}
            ],
            "group": [
                {"name": "group1", "roles": ["qa"]},
                {"name": "group2", "roles": ["Release Manager"]}
            ],
            "role": [{
                "name": "qa",
                "description": "QA role",
                "type": "CUSTOM",
                "environments": ["DEV"],
                "actions": ["READ_REPOSITORY", "READ_BUILD"]
            }],
            "repos": ["repo2", "repo1"]
        })
    }

    fn remote_for(project: &Project) -> RemoteProject {
        RemoteProject {
            project: to_project_body(project),
            members: project.members.iter().map(to_membership_body).collect(),
            groups: project.groups.iter().map(to_membership_body).collect(),
            roles: managed_role_bodies(project),
            repos: project.repos.iter().cloned().collect(),
        }
    }

    #[test]
    fn test_decode_applies_defaults() {
        let project = decode_project(&json!({
            "key": "proj",
            "display_name": "Proj",
            "description": null,
            "admin_privileges": [{
                "manage_members": true,
                "manage_resources": true,
                "index_resources": true
            }]
        }))
        .unwrap();

        assert_eq!(project.description, "");
        assert_eq!(project.max_storage_in_gibibytes, -1);
        assert!(!project.block_deployments_on_limit);
        assert_eq!(project.role_mode, RoleMode::InlineRoles);
        assert!(project.members.is_empty());
        assert!(project.admin_privileges.manage_members);
    }

    #[test]
    fn test_decode_full_state() {
        let project = decode_project(&full_state()).unwrap();
        assert_eq!(project.members.len(), 2);
        assert_eq!(project.members[0].roles, vec!["Developer", "Project Admin"]);
        assert_eq!(project.groups[1].name, "group2");
        assert_eq!(project.roles.len(), 1);
        assert_eq!(project.roles[0].role_type, RoleType::Custom);
        assert_eq!(
            project.repos.iter().collect::<Vec<_>>(),
            vec!["repo1", "repo2"]
        );
    }

    #[test]
    fn test_decode_external_roles_drops_role_blocks() {
        let mut state = full_state();
        state["use_project_role_resource"] = json!(true);
        let project = decode_project(&state).unwrap();
        assert_eq!(project.role_mode, RoleMode::ExternalRoles);
        assert!(project.roles.is_empty());
    }

    #[test]
    fn test_decode_missing_key_fails() {
        let err = decode_project(&json!({"display_name": "Proj"})).unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[test]
    fn test_encode_decode_state() {
        let project = decode_project(&full_state()).unwrap();
        let state = encode_project(&project);

        assert_eq!(state["id"], "proj");
        assert_eq!(state["use_project_role_resource"], false);
        assert_eq!(state["admin_privileges"][0]["index_resources"], true);
        assert_eq!(state["member"][0]["roles"][1], "Project Admin");
        assert_eq!(decode_project(&state).unwrap(), project);
    }

    #[test]
    fn test_forward_body() {
        let project = decode_project(&full_state()).unwrap();
        let body = to_project_body(&project);

        assert_eq!(body.project_key, "proj");
        assert_eq!(body.storage_quota_bytes, 10 * 1024 * 1024 * 1024);
        assert!(!body.soft_limit);
        assert!(body.admin_privileges.manage_members);
        assert!(!body.admin_privileges.manage_resources);
    }

    #[test]
    fn test_forward_roles_only_inline() {
        let project = decode_project(&full_state()).unwrap();
        let roles = managed_role_bodies(&project);
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role_type, "CUSTOM");
        assert_eq!(roles[0].actions, vec!["READ_BUILD", "READ_REPOSITORY"]);

        let project = project.with_role_mode(RoleMode::ExternalRoles);
        assert!(managed_role_bodies(&project).is_empty());
    }

    #[test]
    fn test_reverse_round_trip() {
        let project = decode_project(&full_state()).unwrap();
        let read = from_remote(&remote_for(&project), Some(&project));
        assert_eq!(read, project);
    }

    #[test]
    fn test_reverse_keeps_prior_order() {
        let project = decode_project(&full_state()).unwrap();
        let mut remote = remote_for(&project);
        remote.members.reverse();
        remote.members[1].roles.reverse();
        remote.groups.reverse();

        let read = from_remote(&remote, Some(&project));
        assert_eq!(read.members, project.members);
        assert_eq!(read.groups, project.groups);
    }

    #[test]
    fn test_reverse_appends_unknown_entries() {
        let project = decode_project(&full_state()).unwrap();
        let mut remote = remote_for(&project);
        remote.members.insert(
            0,
            MembershipBody {
                name: "user3".to_string(),
                roles: vec!["Viewer".to_string()],
            },
        );

        let read = from_remote(&remote, Some(&project));
        let names: Vec<_> = read.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["user1", "user2", "user3"]);
    }

    #[test]
    fn test_reverse_filters_predefined_roles() {
        let project = decode_project(&full_state()).unwrap();
        let mut remote = remote_for(&project);
        remote.roles.push(RoleBody {
            name: "Developer".to_string(),
            description: String::new(),
            role_type: "PREDEFINED".to_string(),
            environments: vec!["DEV".to_string()],
            actions: vec![],
        });

        let read = from_remote(&remote, Some(&project));
        assert_eq!(read.roles.len(), 1);
        assert_eq!(read.roles[0].name, "qa");
    }

    #[test]
    fn test_reverse_external_mode_ignores_remote_roles() {
        let project = decode_project(&full_state()).unwrap();
        let remote = remote_for(&project);
        let prior = project.clone().with_role_mode(RoleMode::ExternalRoles);

        let read = from_remote(&remote, Some(&prior));
        assert_eq!(read.role_mode, RoleMode::ExternalRoles);
        assert!(read.roles.is_empty());
    }

    #[test]
    fn test_reverse_without_prior_defaults_inline() {
        let project = decode_project(&full_state()).unwrap();
        let read = from_remote(&remote_for(&project), None);
        assert_eq!(read.role_mode, RoleMode::InlineRoles);
        assert_eq!(read.roles.len(), 1);
        assert_eq!(read.members.len(), 2);
    }

    #[test]
    fn test_upgrade_v0_adds_flag_and_keeps_roles() {
        let mut state = full_state();
        let mut role2 = state["role"][0].clone();
        role2["name"] = json!("devop");
        state["role"].as_array_mut().unwrap().push(role2);

        let upgraded = upgrade_project_state(0, state).unwrap();
        assert_eq!(upgraded["use_project_role_resource"], false);
        assert_eq!(upgraded["role"].as_array().unwrap().len(), 2);

        let project = decode_project(&upgraded).unwrap();
        assert_eq!(project.role_mode, RoleMode::InlineRoles);
        assert_eq!(project.roles.len(), 2);
    }

    #[test]
    fn test_upgrade_current_version_is_noop() {
        let mut state = full_state();
        state["use_project_role_resource"] = json!(true);
        let upgraded = upgrade_project_state(PROJECT_SCHEMA_VERSION, state.clone()).unwrap();
        assert_eq!(upgraded, state);
    }

    #[test]
    fn test_upgrade_rejects_future_version() {
        assert!(upgrade_project_state(PROJECT_SCHEMA_VERSION + 1, full_state()).is_err());
        assert!(upgrade_project_state(0, json!("nope")).is_err());
    }

    #[test]
    fn test_environment_state() {
        let env = decode_environment(&json!({"name": "dev", "project_key": "proj"})).unwrap();
        assert_eq!(env.remote_name(), "proj-dev");

        let state = encode_environment(&env);
        assert_eq!(state, json!({"id": "dev", "name": "dev", "project_key": "proj"}));
        assert_eq!(to_environment_body(&env).name, "proj-dev");
    }
}
