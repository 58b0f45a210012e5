//! Configuration loading, merging and validation

pub mod env;
pub mod loader;
pub mod merge;
pub mod validation;

pub use env::{RuntimeSettings, DEFAULT_CONFIG_DIR};
pub use loader::ConfigLoader;
pub use merge::{ConfigMerger, MergeDecision, MergeInput, OPTION_KEYS};
pub use validation::{ConfigValidator, ValidationError};
