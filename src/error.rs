//! Error types for the project provider.

use thiserror::Error;

/// A field-level violation found before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The project key does not match the key rule.
    #[error("project_key must be 2 - 32 lowercase alphanumeric and hyphen characters")]
    InvalidKey,

    /// A string attribute exceeds its maximum length.
    #[error("string must be less than or equal {max} characters long")]
    TooLong {
        /// The attribute that was too long.
        field: &'static str,
        /// The maximum allowed length.
        max: usize,
    },

    /// Storage quota is negative but not the unlimited sentinel.
    #[error("expected max_storage_in_gibibytes to be one of [-1], got {0}")]
    StorageNotUnlimited(i64),

    /// Storage quota is outside the bounded positive range.
    #[error(
        "expected max_storage_in_gibibytes to be in the range (1 - {max}), got {0}",
        max = crate::model::MAX_STORAGE_IN_GIBIBYTES
    )]
    OutOfRange(i64),

    /// A required string attribute is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// The empty attribute.
        field: &'static str,
    },

    /// `project_key-name` is longer than an environment identity allows.
    #[error(
        "combined length of project_key and name (separated by '-') cannot exceed 32 characters"
    )]
    CombinedLengthExceeded,

    /// Two blocks of the same kind share a name.
    #[error("duplicate {block} name '{name}'")]
    DuplicateName {
        /// The block kind (`member`, `group` or `role`).
        block: &'static str,
        /// The repeated name.
        name: String,
    },
}

impl ValidationError {
    /// The attribute path the violation applies to.
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::InvalidKey => "key",
            Self::TooLong { field, .. } | Self::Empty { field } => *field,
            Self::StorageNotUnlimited(_) | Self::OutOfRange(_) => "max_storage_in_gibibytes",
            Self::CombinedLengthExceeded => "name",
            Self::DuplicateName { block, .. } => *block,
        }
    }
}

/// Errors that can occur while reconciling resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Local validation failed; nothing was sent to the backend.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The addressed remote object does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The backend rejected a request (conflict, bad request, server error).
    #[error("\n{status} {method} {url}\n{body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// HTTP method of the failed request.
        method: String,
        /// Full request URL.
        url: String,
        /// Raw response body.
        body: String,
    },

    /// Authentication or authorization failure.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Network failure after the retry budget was spent.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider configuration is incomplete or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A resource operation was issued before the provider was configured.
    #[error("Provider is not configured")]
    Unconfigured,

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed state, import identifier or request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Whether the error means the remote object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Remote { status: 404, .. })
    }

    /// Whether the backend reported a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Remote { status: 409, .. })
    }

    /// The HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
