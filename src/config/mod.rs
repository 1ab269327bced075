//! JSON configuration files, one per tool.
//!
//! A configuration is read once per invocation and passed down by reference;
//! nothing below reads global state.
pub mod search;
pub mod stitch;

pub use self::search::{AxisRange, ReconstructorConfig, SearchConfig, SharedReferences};
pub use self::stitch::StitchConfig;

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read and deserialize a JSON configuration file.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
