pub mod ranking;
pub mod service;
pub mod stats;
