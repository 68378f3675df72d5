//! Configuration module
//!
//! Loading and validation of `signclash` YAML configuration files.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::{Config, GameConfig, ServerSettings};
pub use validation::{ValidationResult, Validator};
