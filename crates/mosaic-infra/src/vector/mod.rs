//! Vector database backends.
//!
//! `QdrantBackend` talks to a Qdrant server over REST; `LanceBackend` keeps
//! collections in an embedded LanceDB directory. Arrow schemas for the
//! LanceDB tables live in [`schema`].

pub mod lance;
pub mod qdrant;
pub mod schema;
