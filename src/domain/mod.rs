//! Domain layer types and invariants.

pub mod error;
pub mod jobs;
pub mod key_path;
pub mod settings;
pub mod types;
