pub mod backend;
pub mod box_backend;
pub mod format;
pub mod provider;
