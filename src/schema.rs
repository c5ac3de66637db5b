//! Schema types and the resource schemas of this provider.
//!
//! Schemas describe the configuration shape of the provider and of the
//! `project` / `project_environment` resources. They drive structural
//! validation (see [`crate::validation::validate`]) and carry the schema
//! version that state upgrades key off.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type name of the project resource.
pub const PROJECT_RESOURCE: &str = "project";

/// Resource type name of the environment resource.
pub const ENVIRONMENT_RESOURCE: &str = "project_environment";

/// Current schema version of the project resource.
///
/// Version 0 predates `use_project_role_resource`.
pub const PROJECT_SCHEMA_VERSION: u64 = 1;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A boolean value.
    Bool,
    /// An ordered list of values of a single type.
    List(Box<AttributeType>),
    /// A set of unique values of a single type.
    Set(Box<AttributeType>),
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a set type.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider.
    pub computed: bool,
    /// The attribute is hidden in logs and plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Flags for a computed attribute.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// If set, changing this attribute forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
    /// Default value applied when the attribute is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    /// A required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// An optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// A computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// An optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// A required bool attribute.
    pub fn required_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::required())
    }

    /// An optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// An optional set of strings.
    pub fn optional_string_set() -> Self {
        Self::new(
            AttributeType::set(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Set a default value for this attribute.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// Zero or more blocks, ordered.
    #[default]
    List,
    /// Zero or more blocks, unordered.
    Set,
}

/// A group of attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The attributes within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Human-readable description of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to this block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A nested block with its nesting mode and item constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block is nested.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Minimum number of blocks required.
    #[serde(default)]
    pub min_items: u32,
    /// Maximum number of blocks allowed (0 = unlimited).
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    /// A list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
        }
    }

    /// A set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Set,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Set the minimum number of blocks required.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks allowed.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// Schema for a resource or the provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The version of this schema (for state upgrades).
    #[serde(default)]
    pub version: u64,
    /// The root block containing all attributes and nested blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Create a new schema with the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Create a schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to the schema.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Names of attributes that force replacement when changed.
    pub fn force_new_attributes(&self) -> impl Iterator<Item = &str> {
        self.block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.force_new)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Schemas for the provider configuration and each resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    #[serde(default)]
    pub provider: Schema,
    /// Schemas keyed by resource type.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Create a new empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// The full schema of this provider.
    pub fn projects() -> Self {
        Self::new()
            .with_provider_config(provider_config_schema())
            .with_resource(PROJECT_RESOURCE, project_schema())
            .with_resource(ENVIRONMENT_RESOURCE, environment_schema())
    }
}

/// Schema of the provider configuration block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "url",
            Attribute::optional_string()
                .with_description(
                    "Base URL of the platform. Defaults to JFROG_URL or PROJECTS_URL.",
                ),
        )
        .with_attribute(
            "access_token",
            Attribute::optional_string()
                .sensitive()
                .with_description("Bearer token issued under Identity and Access."),
        )
        .with_attribute(
            "host_version",
            Attribute::optional_string()
                .with_description("Version of the host, reported in the user agent."),
        )
}

fn membership_block(description: &str) -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_description(description)
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "roles",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::required(),
                ),
            ),
    )
}

/// Schema of the `project` resource.
pub fn project_schema() -> Schema {
    Schema::new(PROJECT_SCHEMA_VERSION)
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "key",
            Attribute::required_string()
                .with_description("2 - 32 lowercase alphanumeric and hyphen characters."),
        )
        .with_attribute(
            "display_name",
            Attribute::required_string().with_description("At most 32 characters."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_default(serde_json::json!("")),
        )
        .with_attribute(
            "max_storage_in_gibibytes",
            Attribute::optional_int64()
                .with_description("-1 for unlimited, otherwise 1 - 8589934591.")
                .with_default(serde_json::json!(-1)),
        )
        .with_attribute(
            "block_deployments_on_limit",
            Attribute::optional_bool().with_default(serde_json::json!(false)),
        )
        .with_attribute(
            "email_notification",
            Attribute::optional_bool().with_default(serde_json::json!(false)),
        )
        .with_attribute(
            "use_project_role_resource",
            Attribute::optional_bool()
                .with_description(
                    "When true, role blocks are ignored and roles are managed elsewhere.",
                )
                .with_default(serde_json::json!(false)),
        )
        .with_attribute("repos", Attribute::optional_string_set())
        .with_block(
            "admin_privileges",
            NestedBlock::set(
                Block::new()
                    .with_attribute("manage_members", Attribute::required_bool())
                    .with_attribute("manage_resources", Attribute::required_bool())
                    .with_attribute("index_resources", Attribute::required_bool()),
            )
            .with_min_items(1)
            .with_max_items(1),
        )
        .with_block("member", membership_block("A user and its project roles."))
        .with_block("group", membership_block("A group and its project roles."))
        .with_block(
            "role",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("description", Attribute::optional_string())
                    .with_attribute("type", Attribute::required_string())
                    .with_attribute(
                        "environments",
                        Attribute::new(
                            AttributeType::set(AttributeType::String),
                            AttributeFlags::required(),
                        ),
                    )
                    .with_attribute(
                        "actions",
                        Attribute::new(
                            AttributeType::set(AttributeType::String),
                            AttributeFlags::required(),
                        ),
                    ),
            ),
        )
}

/// Schema of the `project_environment` resource.
pub fn environment_schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("project_key", Attribute::required_string().with_force_new())
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation.
    Warning,
}

/// A diagnostic message returned to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl From<&crate::error::ValidationError> for Diagnostic {
    fn from(err: &crate::error::ValidationError) -> Self {
        Diagnostic::error(err.to_string()).with_attribute(err.attribute())
    }
}

impl From<&crate::error::ProviderError> for Diagnostic {
    fn from(err: &crate::error::ProviderError) -> Self {
        match err {
            crate::error::ProviderError::Validation(inner) => inner.into(),
            other => Diagnostic::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("A test attribute")
            .with_force_new();

        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.flags.required);
        assert_eq!(attr.description, Some("A test attribute".to_string()));
        assert!(attr.force_new);

        let token = Attribute::optional_string().sensitive();
        assert!(token.flags.sensitive);
        assert!(token.flags.optional);
    }

    #[test]
    fn test_project_schema_shape() {
        let schema = project_schema();
        assert_eq!(schema.version, PROJECT_SCHEMA_VERSION);
        assert!(schema.block.attributes["key"].flags.required);
        assert!(schema.block.attributes["id"].flags.computed);
        assert_eq!(
            schema.block.attributes["max_storage_in_gibibytes"].default,
            Some(serde_json::json!(-1))
        );

        let admin = &schema.block.blocks["admin_privileges"];
        assert_eq!(admin.min_items, 1);
        assert_eq!(admin.max_items, 1);
        assert_eq!(admin.nesting_mode, BlockNestingMode::Set);

        for block in ["member", "group", "role"] {
            assert_eq!(schema.block.blocks[block].nesting_mode, BlockNestingMode::List);
        }
        assert_eq!(schema.force_new_attributes().count(), 0);
    }

    #[test]
    fn test_environment_schema_forces_new_on_project_key() {
        let schema = environment_schema();
        let forced: Vec<_> = schema.force_new_attributes().collect();
        assert_eq!(forced, vec!["project_key"]);
    }

    #[test]
    fn test_provider_schema() {
        let schema = ProviderSchema::projects();
        assert!(schema.provider.block.attributes["access_token"].flags.sensitive);
        assert!(schema.resources.contains_key(PROJECT_RESOURCE));
        assert!(schema.resources.contains_key(ENVIRONMENT_RESOURCE));
    }

    #[test]
    fn test_diagnostic_from_validation_error() {
        let diag = Diagnostic::from(&ValidationError::InvalidKey);
        assert!(diag.is_error());
        assert_eq!(diag.attribute, Some("key".to_string()));
        assert!(diag.summary.contains("lowercase alphanumeric"));
    }

    #[test]
    fn test_diagnostic_builder() {
        let warn = Diagnostic::warning("Roles ignored")
            .with_detail("use_project_role_resource is true")
            .with_attribute("role");

        assert_eq!(warn.severity, DiagnosticSeverity::Warning);
        assert!(!warn.is_error());
        assert_eq!(warn.attribute, Some("role".to_string()));
    }
}
