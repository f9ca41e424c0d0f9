//! Configuration for the mentor agent and the execution sandbox
//!
//! The chat server reads a YAML file into `MentorConfig`; the sandbox service
//! reads `SandboxConfig` from `PYMENTOR_*` environment variables.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::MentorError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<MentorConfig, MentorError> {
    ConfigLoader::from_file(path).await
}
