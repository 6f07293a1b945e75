//! Shared domain types for Mosaic.
//!
//! Documents, vector records, search results, indexing results,
//! configuration and the error taxonomy used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, sha2, thiserror.

pub mod config;
pub mod document;
pub mod error;
pub mod indexing;
pub mod modality;
pub mod retrieval;
pub mod vector;
