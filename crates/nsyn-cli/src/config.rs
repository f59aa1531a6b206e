//! Configuration file handling for the nsyn CLI
//!
//! ```toml
//! [kernel]
//! resolution_ms = 0.1
//! num_threads = 4
//! max_delay_ms = 20.0
//!
//! [checkpoint]
//! chunk_size = 65536
//! ```

use std::path::{Path, PathBuf};

use nsyn_core::KernelConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Name of the config file inside the user config directory
pub const CONFIG_FILE_NAME: &str = "nsyn.toml";

/// Contents of `nsyn.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Kernel settings
    pub kernel: KernelConfig,

    /// Checkpoint settings
    pub checkpoint: CheckpointConfig,
}

/// `[checkpoint]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Chunk size for parallel dumps; `None` writes through one plain sink
    pub chunk_size: Option<usize>,
}

impl CliConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> CliResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.kernel.validate()?;
        Ok(config)
    }

    /// Load from `path`, which must exist
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Err(CliError::missing_resource(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| CliError::config(format!("invalid config file {}: {}", path.display(), e)))
    }

    /// Load `explicit` if given, otherwise the default file if present,
    /// otherwise defaults
    pub fn resolve(explicit: Option<&Path>) -> CliResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Some(path) if path.exists() => {
                tracing::debug!("using config file {}", path.display());
                Self::load_from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Default location of the config file
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nsyn").join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = CliConfig::from_toml("[kernel]\nnum_threads = 3\n").unwrap();
        assert_eq!(config.kernel.num_threads, 3);
        assert_eq!(config.kernel.resolution_ms, KernelConfig::default().resolution_ms);
        assert_eq!(config.checkpoint.chunk_size, None);
    }

    #[test]
    fn test_invalid_kernel_rejected() {
        assert!(CliConfig::from_toml("[kernel]\nnum_threads = 0\n").is_err());
        assert!(CliConfig::from_toml("[kernel]\nresolution_ms = -1.0\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            CliConfig::resolve(Some(&missing)),
            Err(CliError::MissingResource(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[checkpoint]\nchunk_size = 64\n").unwrap();
        let config = CliConfig::load_from_file(&path).unwrap();
        assert_eq!(config.checkpoint.chunk_size, Some(64));
    }
}
