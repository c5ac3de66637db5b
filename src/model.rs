//! Typed model of the `project` and `project_environment` resources.
//!
//! These are the values the validator, state mapper and diff engine work on.
//! Conversion to and from state JSON and wire bodies lives in [`crate::mapper`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Upper bound for `max_storage_in_gibibytes`; the byte count still fits an `i64`.
pub const MAX_STORAGE_IN_GIBIBYTES: i64 = 8_589_934_591;

/// Sentinel for an unlimited storage quota.
pub const UNLIMITED_STORAGE: i64 = -1;

/// Maximum length of a project display name.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 32;

/// Maximum length of an environment's remote identity (`key-name`).
pub const MAX_ENVIRONMENT_ID_LENGTH: usize = 32;

const BYTES_PER_GIBIBYTE: i64 = 1024 * 1024 * 1024;

/// Per-project administrator capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdminPrivileges {
    /// Project admins may manage members.
    pub manage_members: bool,
    /// Project admins may manage resources.
    pub manage_resources: bool,
    /// Project admins may index resources.
    pub index_resources: bool,
}

impl AdminPrivileges {
    /// Create a privilege block.
    pub fn new(manage_members: bool, manage_resources: bool, index_resources: bool) -> Self {
        Self {
            manage_members,
            manage_resources,
            index_resources,
        }
    }
}

/// Who owns the project's custom roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoleMode {
    /// Roles are declared as `role` blocks on the project itself.
    #[default]
    InlineRoles,
    /// Roles are managed by a separate resource and ignored here.
    ExternalRoles,
}

impl RoleMode {
    /// Mode selected by the `use_project_role_resource` flag.
    pub fn from_flag(use_project_role_resource: bool) -> Self {
        if use_project_role_resource {
            Self::ExternalRoles
        } else {
            Self::InlineRoles
        }
    }

    /// The value of `use_project_role_resource` for this mode.
    pub fn as_flag(self) -> bool {
        matches!(self, Self::ExternalRoles)
    }

    /// Whether role blocks are reconciled by the project resource.
    pub fn manages_roles(self) -> bool {
        matches!(self, Self::InlineRoles)
    }
}

/// Which membership collection an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipKind {
    /// A user (`member` block).
    User,
    /// A group (`group` block).
    Group,
}

impl MembershipKind {
    /// The block name used in configuration.
    pub fn block_name(self) -> &'static str {
        match self {
            Self::User => "member",
            Self::Group => "group",
        }
    }

    /// The path segment used by the remote API.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }
}

/// A user or group with the project roles granted to it.
///
/// Role names keep their declaration order; repeats are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// User or group name.
    pub name: String,
    /// Role names granted within the project.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Membership {
    /// Create a membership, dropping repeated role names.
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for role in roles {
            let role = role.into();
            if !unique.contains(&role) {
                unique.push(role);
            }
        }
        Self {
            name: name.into(),
            roles: unique,
        }
    }

    /// Whether both memberships grant the same roles, ignoring order.
    pub fn same_roles(&self, other: &Membership) -> bool {
        let ours: BTreeSet<&str> = self.roles.iter().map(String::as_str).collect();
        let theirs: BTreeSet<&str> = other.roles.iter().map(String::as_str).collect();
        ours == theirs
    }
}

/// A project member (user).
pub type Member = Membership;

/// A project group.
pub type Group = Membership;

/// Kind of project role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleType {
    /// A role defined for this project.
    #[default]
    Custom,
    /// A role shipped by the backend.
    Predefined,
}

/// A named bundle of actions scoped to environment tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name, unique within the project.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Custom or predefined.
    #[serde(rename = "type", default)]
    pub role_type: RoleType,
    /// Environment tags the role applies to.
    #[serde(default)]
    pub environments: BTreeSet<String>,
    /// Permitted actions.
    #[serde(default)]
    pub actions: BTreeSet<String>,
}

impl Role {
    /// Create a custom role with no environments or actions.
    pub fn custom(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            role_type: RoleType::Custom,
            environments: BTreeSet::new(),
            actions: BTreeSet::new(),
        }
    }

    /// Add environment tags.
    pub fn with_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments
            .extend(environments.into_iter().map(Into::into));
        self
    }

    /// Add permitted actions.
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }
}

/// A project as declared in configuration or observed remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Project key; remote identity.
    pub key: String,
    /// Human-readable name.
    pub display_name: String,
    /// Free-form description.
    pub description: String,
    /// Administrator capabilities.
    pub admin_privileges: AdminPrivileges,
    /// Storage quota in GiB, or [`UNLIMITED_STORAGE`].
    pub max_storage_in_gibibytes: i64,
    /// Reject deployments once the quota is reached.
    pub block_deployments_on_limit: bool,
    /// Email admins when the quota is reached.
    pub email_notification: bool,
    /// Role ownership.
    pub role_mode: RoleMode,
    /// Members in declaration order.
    pub members: Vec<Member>,
    /// Groups in declaration order.
    pub groups: Vec<Group>,
    /// Inline roles in declaration order.
    pub roles: Vec<Role>,
    /// Attached repository keys.
    pub repos: BTreeSet<String>,
}

impl Project {
    /// Create a project with default settings.
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            description: String::new(),
            admin_privileges: AdminPrivileges::default(),
            max_storage_in_gibibytes: UNLIMITED_STORAGE,
            block_deployments_on_limit: false,
            email_notification: false,
            role_mode: RoleMode::InlineRoles,
            members: Vec::new(),
            groups: Vec::new(),
            roles: Vec::new(),
            repos: BTreeSet::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the admin privileges.
    pub fn with_admin_privileges(mut self, privileges: AdminPrivileges) -> Self {
        self.admin_privileges = privileges;
        self
    }

    /// Set the storage quota in GiB.
    pub fn with_max_storage(mut self, gibibytes: i64) -> Self {
        self.max_storage_in_gibibytes = gibibytes;
        self
    }

    /// Set the role ownership mode.
    pub fn with_role_mode(mut self, mode: RoleMode) -> Self {
        self.role_mode = mode;
        self
    }

    /// Append a member.
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Append a group.
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Append an inline role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Attach a repository.
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repos.insert(repo.into());
        self
    }

    /// Roles reconciled by this resource; empty under [`RoleMode::ExternalRoles`].
    pub fn managed_roles(&self) -> &[Role] {
        if self.role_mode.manages_roles() {
            &self.roles
        } else {
            &[]
        }
    }

    /// Memberships of the given kind.
    pub fn memberships(&self, kind: MembershipKind) -> &[Membership] {
        match kind {
            MembershipKind::User => &self.members,
            MembershipKind::Group => &self.groups,
        }
    }

    /// Storage quota as sent to the backend.
    pub fn storage_quota_bytes(&self) -> i64 {
        if self.max_storage_in_gibibytes == UNLIMITED_STORAGE {
            UNLIMITED_STORAGE
        } else {
            self.max_storage_in_gibibytes
                .saturating_mul(BYTES_PER_GIBIBYTE)
        }
    }

    /// Convert a backend byte count back to GiB.
    pub fn gibibytes_from_bytes(bytes: i64) -> i64 {
        if bytes < 0 {
            UNLIMITED_STORAGE
        } else {
            bytes / BYTES_PER_GIBIBYTE
        }
    }
}

/// An environment scoped to a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectEnvironment {
    /// Environment name without the project prefix.
    pub name: String,
    /// Owning project key.
    pub project_key: String,
}

impl ProjectEnvironment {
    /// Create an environment.
    pub fn new(project_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_key: project_key.into(),
        }
    }

    /// Remote identity: `{project_key}-{name}`.
    pub fn remote_name(&self) -> String {
        format!("{}-{}", self.project_key, self.name)
    }

    /// Import identifier: `{project_key}:{name}`.
    pub fn import_id(&self) -> String {
        format!("{}:{}", self.project_key, self.name)
    }

    /// Parse an import identifier of the form `{project_key}:{name}`.
    pub fn parse_import_id(id: &str) -> Result<Self, ProviderError> {
        match id.split_once(':') {
            Some((key, name)) if !key.is_empty() && !name.is_empty() => Ok(Self::new(key, name)),
            _ => Err(ProviderError::InvalidRequest(format!(
                "environment import id must be '<project_key>:<name>', got '{}'",
                id
            ))),
        }
    }

    /// Strip the project prefix from a remote environment name.
    pub fn from_remote_name(project_key: &str, remote_name: &str) -> Option<Self> {
        remote_name
            .strip_prefix(project_key)
            .and_then(|rest| rest.strip_prefix('-'))
            .filter(|name| !name.is_empty())
            .map(|name| Self::new(project_key, name))
    }
}
