//! Indexing pipeline, retrieval logic and port traits for Mosaic.
//!
//! This crate defines the "ports" (backend, parser, chunker and keyword-index
//! traits) that the infrastructure layer implements, and the services built
//! on them. It depends only on `mosaic-types` -- never on `mosaic-infra` or
//! any database/IO crate.

pub mod embedding;
pub mod indexing;
pub mod retrieval;
pub mod vector;

#[cfg(test)]
pub(crate) mod test_support;
