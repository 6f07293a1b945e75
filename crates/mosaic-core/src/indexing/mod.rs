pub mod chunker;
pub mod indexer;
pub mod keyword;
pub mod parser;
pub mod progress;
