//! Project Provider
//!
//! Resources for managing projects and project environments on a remote
//! platform through its REST API, in the shape an infrastructure-as-code
//! host expects: schema, validation, plan, create/read/update/delete,
//! import and state upgrades.
//!
//! # Overview
//!
//! - **Schema**: [`schema`] describes the provider block and both resources
//! - **Validation**: [`validation`] checks structure and value rules before any remote call
//! - **State mapping**: [`mapper`] converts between host state, the domain
//!   [`model`] and wire bodies
//! - **Diffing**: [`diff`] computes keyed collection changes between two projects
//! - **Orchestration**: [`project`] and [`environment`] sequence remote calls
//! - **Remote API**: [`client`] defines the calls, [`http`] performs them with retries
//! - **Provider surface**: [`ProviderService`], implemented by [`ProjectsProvider`]
//! - **Logging**: [`tracing`] to stderr, see [`logging`]
//! - **Testing**: an in-memory backend and lifecycle helpers in [`testing`]
//!
//! # Resources
//!
//! | Type                  | Identity                 | Import id          |
//! |-----------------------|--------------------------|--------------------|
//! | `project`             | project key              | `{key}`            |
//! | `project_environment` | environment name         | `{project_key}:{name}` |
//!
//! # Quick Start
//!
//! ```no_run
//! use project_provider::{init_logging, ProjectsProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = ProjectsProvider::new();
//!     provider
//!         .configure(json!({"url": "https://example.jfrog.io", "access_token": "token"}))
//!         .await?;
//!
//!     let env = provider
//!         .create("project_environment", json!({"project_key": "myproj", "name": "dev"}))
//!         .await?;
//!     tracing::info!(id = %env["id"], "environment ready");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod diff;
pub mod environment;
pub mod error;
pub mod http;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod project;
pub mod provider;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::ProjectClient;
pub use config::ProviderConfig;
pub use diff::ProjectDiff;
pub use environment::EnvironmentOrchestrator;
pub use error::{ProviderError, ValidationError};
pub use http::HttpProjectClient;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use model::{
    AdminPrivileges, Group, Member, Membership, Project, ProjectEnvironment, Role, RoleMode,
    RoleType,
};
pub use project::ProjectOrchestrator;
pub use provider::{ProjectsProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
