//! # contract: interface to the vendor's data model API
//!
//! This module defines the single trait ([`ModelApi`]) that push, pull and the
//! remote diff talk to, plus the plain data types it exchanges.
//!
//! ## Interface & Extensibility
//! - Implement [`ModelApi`] for a concrete transport (the CLI crate ships a
//!   reqwest client for Sigma).
//! - All methods are async and return [`ApiError`] so callers can tell an
//!   authentication failure from a missing model.
//! - Model documents travel as `serde_json::Value`; their schema belongs to the
//!   vendor and is never validated here.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; with the `test-export-mocks` feature
//!   (on by default) `MockModelApi` is available to integration tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

pub use crate::error::ApiError;

/// One row of the vendor's model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteModel {
    #[serde(rename = "dataModelId")]
    pub data_model_id: String,
    #[serde(default)]
    pub name: String,
}

/// Returned by a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedModel {
    pub data_model_id: String,
}

/// Trait for reading and writing data model definitions on the vendor side.
///
/// The implementor owns authentication and transport details; callers only
/// deal in identifiers and JSON documents.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ModelApi: Send + Sync {
    /// List every data model visible to the credentials.
    async fn list_models(&self) -> Result<Vec<RemoteModel>, ApiError>;

    /// Fetch the full JSON representation of one data model.
    async fn get_model(&self, data_model_id: &str) -> Result<Value, ApiError>;

    /// Create a new data model from a prepared document.
    async fn create_model(&self, spec: &Value) -> Result<CreatedModel, ApiError>;

    /// Replace an existing data model with the given document.
    async fn update_model(&self, data_model_id: &str, spec: &Value) -> Result<Value, ApiError>;
}
