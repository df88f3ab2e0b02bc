//! Error Types
//!
//! This module defines the error types used throughout the renderer core
//! and the light baker.
//!
//! All build-time errors (parsing, validation, pipeline compilation) are
//! fatal to the frame-graph rebuild that produced them; the previously
//! built frame graph stays live. Baking errors abort the bake and leave
//! no partial result behind.

use thiserror::Error;

/// The main error type for the Cinder renderer core.
#[derive(Error, Debug)]
pub enum CinderError {
    // ========================================================================
    // Configuration
    // ========================================================================
    /// A grammar file, the frame-graph file, or the pass directory is absent
    /// (or a shipped grammar file failed to compile).
    #[error("Missing configuration input: {0}")]
    ConfigMissing(String),

    // ========================================================================
    // Pass Compilation
    // ========================================================================
    /// A pass or frame-graph source failed to parse, or used a construct the
    /// pipeline does not support (static samplers, root constants, UAVs).
    #[error("Invalid pass source {file}:{line}:{column}: {message}")]
    InvalidPassSource {
        /// Source file the error was found in
        file: String,
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// What went wrong
        message: String,
    },

    /// Two resource declarations conflict across scopes.
    #[error("Resource name collision: {0}")]
    ResourceNameCollision(String),

    /// Entries of one descriptor table disagree on scope or bind frequency.
    #[error("Descriptor table mixes scopes or bind frequencies: {0}")]
    DescTableMixedFrequency(String),

    /// The shader compiler returned non-success; the compiler log is forwarded.
    #[error("Shader compilation failed for pass '{pass}': {log}")]
    ShaderCompileError {
        /// Pass the shader belongs to
        pass: String,
        /// Compiler diagnostics
        log: String,
    },

    /// Root-signature or PSO creation failed at driver level.
    #[error("Pipeline creation failed for pass '{pass}': {message}")]
    PipelineCreateError {
        /// Pass the pipeline belongs to
        pass: String,
        /// Driver message
        message: String,
    },

    // ========================================================================
    // Light Baker
    // ========================================================================
    /// The bake request cannot be satisfied (no bake position in
    /// current-cluster mode, BSP with no clusters, ...).
    #[error("Baking input invalid: {0}")]
    BakingInputInvalid(String),

    /// The baked-data file is unreadable or malformed.
    #[error("Baked data I/O error: {0}")]
    BakingDataIoError(String),

    // ========================================================================
    // I/O
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result alias used by all public APIs in this crate.
pub type Result<T> = std::result::Result<T, CinderError>;

impl CinderError {
    /// Builds an [`CinderError::InvalidPassSource`] from a byte offset into
    /// `source`, converting the offset into a 1-based line/column pair.
    #[must_use]
    pub fn invalid_source(
        file: &str,
        source: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        let (line, column) = line_column(source, offset);
        CinderError::InvalidPassSource {
            file: file.to_string(),
            line,
            column,
            message: message.into(),
        }
    }
}

/// Converts a byte offset into a 1-based (line, column) pair.
#[must_use]
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let mut line = 1;
    let mut column = 1;
    for ch in source[..clamped].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
