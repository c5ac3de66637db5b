//! Configuration validation.
//!
//! Two layers run before any remote call:
//!
//! - **Structural** checks of raw JSON against a [`Schema`]: required
//!   attributes, attribute types and nested block item counts.
//! - **Field rules** on the typed model: key charset and length, display name
//!   length, storage quota range, environment identity length and name
//!   uniqueness within member/group/role blocks.
//!
//! # Example
//!
//! ```
//! use project_provider::model::Project;
//! use project_provider::validation::validate_project;
//!
//! let project = Project::new("my-proj", "My Project").with_max_storage(10);
//! assert!(validate_project(&project).is_ok());
//!
//! let project = Project::new("My-Proj", "My Project");
//! let err = validate_project(&project).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "project_key must be 2 - 32 lowercase alphanumeric and hyphen characters"
//! );
//! ```

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ValidationError;
use crate::model::{
    Project, ProjectEnvironment, MAX_DISPLAY_NAME_LENGTH, MAX_ENVIRONMENT_ID_LENGTH,
    MAX_STORAGE_IN_GIBIBYTES, UNLIMITED_STORAGE,
};
use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema};

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]{0,30}[a-z0-9]$").expect("project key pattern compiles")
});

// =========================================================================
// Field rules
// =========================================================================

/// Check a project key: 2 - 32 lowercase alphanumeric and hyphen characters.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(ValidationError::InvalidKey)
    }
}

/// Check the display name length.
pub fn validate_display_name(display_name: &str) -> Result<(), ValidationError> {
    if display_name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "display_name",
            max: MAX_DISPLAY_NAME_LENGTH,
        });
    }
    Ok(())
}

/// Check a storage quota: either `-1` or within `1..=8589934591`.
pub fn validate_max_storage(gibibytes: i64) -> Result<(), ValidationError> {
    match gibibytes {
        UNLIMITED_STORAGE => Ok(()),
        v if v < 0 => Err(ValidationError::StorageNotUnlimited(v)),
        v if (1..=MAX_STORAGE_IN_GIBIBYTES).contains(&v) => Ok(()),
        v => Err(ValidationError::OutOfRange(v)),
    }
}

/// Check that `{project_key}-{name}` fits the environment identity limit.
pub fn validate_environment_identity(project_key: &str, name: &str) -> Result<(), ValidationError> {
    if project_key.chars().count() + 1 + name.chars().count() > MAX_ENVIRONMENT_ID_LENGTH {
        return Err(ValidationError::CombinedLengthExceeded);
    }
    Ok(())
}

fn validate_unique_names<'a>(
    block: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateName {
                block,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Every field-rule violation of a project, in attribute order.
pub fn project_violations(project: &Project) -> Vec<ValidationError> {
    let checks = [
        validate_key(&project.key),
        validate_display_name(&project.display_name),
        validate_max_storage(project.max_storage_in_gibibytes),
        validate_unique_names("member", project.members.iter().map(|m| m.name.as_str())),
        validate_unique_names("group", project.groups.iter().map(|g| g.name.as_str())),
        validate_unique_names("role", project.managed_roles().iter().map(|r| r.name.as_str())),
    ];
    checks.into_iter().filter_map(Result::err).collect()
}

/// Validate a project, returning the first violation.
pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    match project_violations(project).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate an environment: a valid project key, a non-empty name and a
/// combined identity within the length limit.
pub fn validate_environment(environment: &ProjectEnvironment) -> Result<(), ValidationError> {
    validate_key(&environment.project_key)?;
    if environment.name.is_empty() {
        return Err(ValidationError::Empty { field: "name" });
    }
    validate_environment_identity(&environment.project_key, &environment.name)
}

// =========================================================================
// Structural validation
// =========================================================================

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped
/// - Attribute types must match the schema
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], but returns `Err` with the diagnostics when invalid.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            diagnostics.push(if path.is_empty() {
                diag
            } else {
                diag.with_attribute(path)
            });
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }

    for name in obj.keys() {
        if !block.attributes.contains_key(name) && !block.blocks.contains_key(name) {
            let attr_path = join_path(path, name);
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", attr_path))
                    .with_detail("This attribute is not part of the schema")
                    .with_attribute(attr_path),
            );
        }
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let ok = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => value.is_i64() || value.is_u64(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        let item_path = format!("{}.{}", path, i);
                        validate_attribute_type(element_type, item, &item_path, diagnostics);
                    }
                    true
                },
                None => false,
            }
        },
    };

    if !ok {
        diagnostics.push(type_error(path, type_name(attr_type), value));
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let items: &[Value] = match value {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
            return;
        },
    };

    let len = items.len() as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }

    for (i, item) in items.iter().enumerate() {
        validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Set(_) => "set",
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}
