#![doc = "model-sync-core: core logic library for model-sync."]

//! This crate keeps data model JSON files in a repository and data models on
//! the vendor platform in step. It knows nothing about HTTP or credentials:
//! the vendor is reached through the [`contract::ModelApi`] trait, which the
//! CLI crate implements.
//!
//! - [`mapping`]: the YAML file linking local files to remote identifiers
//! - [`push`] / [`pull`]: the two sync directions
//! - [`diff`] and [`git`]: the markdown report for pull requests
//! - [`report`]: per-entry outcomes and the end-of-run summary

pub mod contract;
pub mod diff;
pub mod document;
pub mod error;
pub mod git;
pub mod mapping;
pub mod pull;
pub mod push;
pub mod report;

pub use error::{ApiError, Result, SyncError};
