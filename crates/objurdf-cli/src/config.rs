//! Build configuration file

use std::path::{Path, PathBuf};

use objurdf_core::{
    BuildOptions, CenterMode, CommandDecomposer, ConvexDecomposer, DEFAULT_LOG_FILE,
    DEFAULT_PROTOTYPE, DEFAULT_VHACD_COMMAND, VhacdDecomposer, VhacdOptions,
};
use serde::{Deserialize, Serialize};

/// Decomposition backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecomposerKind {
    /// In-process VHACD
    #[default]
    Vhacd,
    /// External testVHACD-compatible executable
    Command,
}

/// Settings for a library build, loaded from a RON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Prototype URDF, relative to the object folder
    pub prototype: PathBuf,
    /// Decomposition log file
    pub log_file: PathBuf,
    pub center: CenterMode,
    pub decompose_concave: bool,
    pub force_overwrite: bool,
    pub force_decompose: bool,
    pub decomposer: DecomposerKind,
    /// Executable used by [`DecomposerKind::Command`]
    pub vhacd_command: PathBuf,
    pub vhacd: VhacdOptions,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            prototype: PathBuf::from(DEFAULT_PROTOTYPE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            center: CenterMode::default(),
            decompose_concave: false,
            force_overwrite: false,
            force_decompose: false,
            decomposer: DecomposerKind::default(),
            vhacd_command: PathBuf::from(DEFAULT_VHACD_COMMAND),
            vhacd: VhacdOptions::default(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_ron(&content)
    }

    /// Parse configuration from RON text
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Per-build options for the builder
    pub fn build_options(&self, output_folder: Option<PathBuf>) -> BuildOptions {
        BuildOptions {
            output_folder,
            force_overwrite: self.force_overwrite,
            decompose_concave: self.decompose_concave,
            force_decompose: self.force_decompose,
            center: self.center,
            vhacd: self.vhacd.clone(),
        }
    }

    /// Instantiate the selected decomposition backend
    pub fn create_decomposer(&self) -> Box<dyn ConvexDecomposer> {
        match self.decomposer {
            DecomposerKind::Vhacd => Box::new(VhacdDecomposer),
            DecomposerKind::Command => Box::new(CommandDecomposer::new(&self.vhacd_command)),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}
