//! Minimal change sets between a previous and a desired project.
//!
//! Members, groups and roles are matched by name. An entry only in the desired
//! project is added, one only in the previous project is removed, and one in
//! both with different content is updated. Repository keys are a plain set
//! difference.
//!
//! Output order is deterministic: additions and updates follow the desired
//! declaration order, removals follow the previous declaration order.
//!
//! # Example
//!
//! ```
//! use project_provider::diff::ProjectDiff;
//! use project_provider::model::{Membership, Project};
//!
//! let previous = Project::new("proj", "Proj")
//!     .with_member(Membership::new("user1", ["Developer"]));
//! let desired = Project::new("proj", "Proj")
//!     .with_member(Membership::new("user2", ["Developer"]));
//!
//! let diff = ProjectDiff::between(&previous, &desired);
//! assert_eq!(diff.members.added[0].name, "user2");
//! assert_eq!(diff.members.removed[0].name, "user1");
//! ```

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::model::{Membership, MembershipKind, Project, Role, RoleMode};
use crate::types::AttributeChange;

/// An entry of a name-keyed collection.
pub trait Keyed {
    /// The name the entry is matched by.
    fn key(&self) -> &str;

    /// Whether two entries with the same name need no update.
    fn same_content(&self, other: &Self) -> bool;
}

impl Keyed for Membership {
    fn key(&self) -> &str {
        &self.name
    }

    fn same_content(&self, other: &Self) -> bool {
        self.same_roles(other)
    }
}

impl Keyed for Role {
    fn key(&self) -> &str {
        &self.name
    }

    fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

/// Add/update/remove sets for one name-keyed collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDiff<T> {
    /// Entries to create, in desired order.
    pub added: Vec<T>,
    /// Entries to replace, in desired order.
    pub updated: Vec<T>,
    /// Entries to delete, in previous order.
    pub removed: Vec<T>,
}

impl<T> Default for CollectionDiff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T: Keyed + Clone> CollectionDiff<T> {
    /// Compute the change set from `previous` to `desired`.
    pub fn between(previous: &[T], desired: &[T]) -> Self {
        let mut diff = Self::default();

        for want in desired {
            match previous.iter().find(|have| have.key() == want.key()) {
                None => diff.added.push(want.clone()),
                Some(have) if !have.same_content(want) => diff.updated.push(want.clone()),
                Some(_) => {}
            }
        }

        for have in previous {
            if !desired.iter().any(|want| want.key() == have.key()) {
                diff.removed.push(have.clone());
            }
        }

        diff
    }
}

impl<T> CollectionDiff<T> {
    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Repository keys to attach and detach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoDiff {
    /// Keys to attach, sorted.
    pub attach: Vec<String>,
    /// Keys to detach, sorted.
    pub detach: Vec<String>,
}

impl RepoDiff {
    /// Set difference between two repository sets.
    pub fn between(previous: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            attach: desired.difference(previous).cloned().collect(),
            detach: previous.difference(desired).cloned().collect(),
        }
    }

    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty()
    }
}

/// Everything that differs between two versions of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDiff {
    /// The project key differs.
    pub key_changed: bool,
    /// A top-level field (including the key) differs.
    pub fields_changed: bool,
    /// `use_project_role_resource` differs.
    pub role_mode_changed: bool,
    /// User memberships.
    pub members: CollectionDiff<Membership>,
    /// Group memberships.
    pub groups: CollectionDiff<Membership>,
    /// Inline roles; empty when the desired project uses external roles.
    pub roles: CollectionDiff<Role>,
    /// Repository attachments.
    pub repos: RepoDiff,
}

impl ProjectDiff {
    /// Compute the diff from `previous` to `desired`.
    pub fn between(previous: &Project, desired: &Project) -> Self {
        let roles = match desired.role_mode {
            RoleMode::InlineRoles => {
                CollectionDiff::between(previous.managed_roles(), &desired.roles)
            },
            RoleMode::ExternalRoles => CollectionDiff::default(),
        };

        Self {
            key_changed: previous.key != desired.key,
            fields_changed: top_level_differs(previous, desired),
            role_mode_changed: previous.role_mode != desired.role_mode,
            members: CollectionDiff::between(&previous.members, &desired.members),
            groups: CollectionDiff::between(&previous.groups, &desired.groups),
            roles,
            repos: RepoDiff::between(&previous.repos, &desired.repos),
        }
    }

    /// Whether the two projects are equivalent.
    pub fn is_empty(&self) -> bool {
        !self.fields_changed
            && !self.role_mode_changed
            && self.members.is_empty()
            && self.groups.is_empty()
            && self.roles.is_empty()
            && self.repos.is_empty()
    }

    /// The membership diff of one kind.
    pub fn memberships(&self, kind: MembershipKind) -> &CollectionDiff<Membership> {
        match kind {
            MembershipKind::User => &self.members,
            MembershipKind::Group => &self.groups,
        }
    }

    /// Render the diff as plan attribute changes.
    pub fn changes(&self, previous: &Project, desired: &Project) -> Vec<AttributeChange> {
        let mut changes = Vec::new();

        if self.fields_changed {
            field_change(&mut changes, "key", &previous.key, &desired.key);
            field_change(
                &mut changes,
                "display_name",
                &previous.display_name,
                &desired.display_name,
            );
            field_change(
                &mut changes,
                "description",
                &previous.description,
                &desired.description,
            );
            field_change(
                &mut changes,
                "admin_privileges",
                &previous.admin_privileges,
                &desired.admin_privileges,
            );
            field_change(
                &mut changes,
                "max_storage_in_gibibytes",
                &previous.max_storage_in_gibibytes,
                &desired.max_storage_in_gibibytes,
            );
            field_change(
                &mut changes,
                "block_deployments_on_limit",
                &previous.block_deployments_on_limit,
                &desired.block_deployments_on_limit,
            );
            field_change(
                &mut changes,
                "email_notification",
                &previous.email_notification,
                &desired.email_notification,
            );
        }

        if self.role_mode_changed {
            changes.push(AttributeChange::modified(
                "use_project_role_resource",
                Value::Bool(previous.role_mode.as_flag()),
                Value::Bool(desired.role_mode.as_flag()),
            ));
        }

        for kind in [MembershipKind::User, MembershipKind::Group] {
            collection_changes(
                &mut changes,
                kind.block_name(),
                self.memberships(kind),
                previous.memberships(kind),
            );
        }
        collection_changes(&mut changes, "role", &self.roles, previous.managed_roles());

        for repo in &self.repos.attach {
            changes.push(AttributeChange::added(
                format!("repos.{}", repo),
                Value::String(repo.clone()),
            ));
        }
        for repo in &self.repos.detach {
            changes.push(AttributeChange::removed(
                format!("repos.{}", repo),
                Value::String(repo.clone()),
            ));
        }

        changes
    }
}

fn top_level_differs(previous: &Project, desired: &Project) -> bool {
    previous.key != desired.key
        || previous.display_name != desired.display_name
        || previous.description != desired.description
        || previous.admin_privileges != desired.admin_privileges
        || previous.max_storage_in_gibibytes != desired.max_storage_in_gibibytes
        || previous.block_deployments_on_limit != desired.block_deployments_on_limit
        || previous.email_notification != desired.email_notification
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn field_change<T: Serialize + PartialEq>(
    changes: &mut Vec<AttributeChange>,
    path: &str,
    before: &T,
    after: &T,
) {
    if before != after {
        changes.push(AttributeChange::modified(
            path,
            to_json(before),
            to_json(after),
        ));
    }
}

fn collection_changes<T: Keyed + Serialize>(
    changes: &mut Vec<AttributeChange>,
    block: &str,
    diff: &CollectionDiff<T>,
    previous: &[T],
) {
    for entry in &diff.added {
        changes.push(AttributeChange::added(
            format!("{}.{}", block, entry.key()),
            to_json(entry),
        ));
    }
    for entry in &diff.updated {
        let before = previous
            .iter()
            .find(|p| p.key() == entry.key())
            .map(to_json)
            .unwrap_or(Value::Null);
        changes.push(AttributeChange::modified(
            format!("{}.{}", block, entry.key()),
            before,
            to_json(entry),
        ));
    }
    for entry in &diff.removed {
        changes.push(AttributeChange::removed(
            format!("{}.{}", block, entry.key()),
            to_json(entry),
        ));
    }
}
