//! Configuration loading
//!
//! Check definitions are authored in YAML; clause blocks stay loosely typed
//! as [`ConfigValue`] until the query translator turns them into filters.

pub mod file;
pub mod value;

pub use file::{load_checks, parse_checks, ConfigFileError, ChecksFile};
pub use value::{ConfigValue, TypeMismatch};
