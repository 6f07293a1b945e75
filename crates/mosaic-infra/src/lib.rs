//! Infrastructure implementations for Mosaic.
//!
//! Concrete backends for the ports defined in `mosaic-core`: embedding
//! inference (fastembed, CLIP HTTP service), vector databases (Qdrant REST,
//! embedded LanceDB), the local file parser, the text-splitter chunker and the
//! SQLite FTS5 keyword index. Also owns config loading from the data directory.

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod keyword;
pub mod parser;
pub mod sqlite;
pub mod vector;
