use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::MAX_POSITION;

/// Index builder configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Bytes of term records buffered in memory before a sorted run is spilled
    pub term_buffer_bytes: usize,
    /// Bytes of global records buffered in memory before a sorted run is spilled
    pub global_buffer_bytes: usize,
    /// Directory for spill files; the system temp dir when unset
    pub run_dir: Option<PathBuf>,
    /// Largest position recorded; tuples above it are dropped
    pub max_position: u16,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        let term_buffer_bytes = 64 * 1024 * 1024;
        Self {
            term_buffer_bytes,
            global_buffer_bytes: term_buffer_bytes / 10,
            run_dir: None,
            max_position: MAX_POSITION,
        }
    }
}

impl BuilderConfig {
    /// Set the in-memory budget of the term sort, scaling the global budget with it
    pub fn with_buffer_bytes(mut self, bytes: usize) -> Self {
        self.term_buffer_bytes = bytes;
        self.global_buffer_bytes = bytes / 10;
        self
    }

    /// Set the directory used for spilled sort runs
    pub fn with_run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_dir = Some(dir.into());
        self
    }

    /// Lower the position limit (it can never exceed 14 bits)
    pub fn with_max_position(mut self, max_position: u16) -> Self {
        self.max_position = max_position.min(MAX_POSITION);
        self
    }
}

/// Image loading configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Memory-map the data files instead of reading them into memory
    pub use_mmap: bool,
    /// Walk every group header of every term at load time
    pub verify_groups: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            use_mmap: true,
            verify_groups: true,
        }
    }
}

impl ImageConfig {
    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn with_group_verification(mut self, verify: bool) -> Self {
        self.verify_groups = verify;
        self
    }
}

/// Query compilation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Token tree depth beyond which nodes compile to nothing
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

impl ParserConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = BuilderConfig::default();
        assert_eq!(config.term_buffer_bytes, 64 * 1024 * 1024);
        assert_eq!(config.global_buffer_bytes, config.term_buffer_bytes / 10);
        assert_eq!(config.max_position, 0x3FFF);
        assert!(config.run_dir.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = BuilderConfig::default()
            .with_buffer_bytes(1000)
            .with_run_dir("/tmp/runs")
            .with_max_position(u16::MAX);
        assert_eq!(config.term_buffer_bytes, 1000);
        assert_eq!(config.global_buffer_bytes, 100);
        assert_eq!(config.run_dir, Some(PathBuf::from("/tmp/runs")));
        assert_eq!(config.max_position, 0x3FFF);
    }

    #[test]
    fn test_config_serializes() {
        let config = ImageConfig::default().with_mmap(false);
        let bytes = bincode::serialize(&config).unwrap();
        let back: ImageConfig = bincode::deserialize(&bytes).unwrap();
        assert!(!back.use_mmap);
        assert!(back.verify_groups);
    }
}
