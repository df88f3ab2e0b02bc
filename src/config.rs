//! Renderer Configuration
//!
//! Pure-data configuration for the frame-graph compiler: where the PEG
//! grammar files live, where pass and frame-graph sources are read from,
//! and which file extensions identify them. Loaded from a JSON file or
//! built in code; every field has a sensible default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{CinderError, Result};

/// File name of the preprocessor grammar inside the grammar directory.
pub const PREPROCESSOR_GRAMMAR_FILE: &str = "preprocessor.peg";
/// File name of the pass grammar inside the grammar directory.
pub const PASS_GRAMMAR_FILE: &str = "pass.peg";
/// File name of the frame-graph grammar inside the grammar directory.
pub const FRAMEGRAPH_GRAMMAR_FILE: &str = "framegraph.peg";

/// Configuration of the frame-graph compiler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Directory the three PEG grammar files are read from.
    pub grammar_dir: PathBuf,
    /// Directory holding pass sources and the frame-graph file.
    pub frame_graph_dir: PathBuf,
    /// Extension of pass source files (the stem is the pass name).
    pub pass_ext: String,
    /// Extension of the single frame-graph file.
    pub frame_graph_ext: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            grammar_dir: PathBuf::from("grammars"),
            frame_graph_dir: PathBuf::from("framegraph"),
            pass_ext: "pass".to_string(),
            frame_graph_ext: "framegraph".to_string(),
        }
    }
}

impl RendererConfig {
    /// Loads the configuration from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CinderError::ConfigMissing(format!("config file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| CinderError::ConfigMissing(format!("config file {}: {e}", path.display())))
    }

    /// Path of one grammar file, checked for existence.
    pub fn grammar_path(&self, file_name: &str) -> Result<PathBuf> {
        let path = self.grammar_dir.join(file_name);
        if !path.is_file() {
            return Err(CinderError::ConfigMissing(format!(
                "grammar file {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// The frame-graph source directory, checked for existence.
    pub fn checked_frame_graph_dir(&self) -> Result<&Path> {
        if !self.frame_graph_dir.is_dir() {
            return Err(CinderError::ConfigMissing(format!(
                "frame-graph directory {}",
                self.frame_graph_dir.display()
            )));
        }
        Ok(&self.frame_graph_dir)
    }
}
