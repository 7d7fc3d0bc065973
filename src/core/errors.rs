//! PDS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PdsError>;

/// Top-level error type for the phone demo sequencer.
#[derive(Debug, Error)]
pub enum PdsError {
    #[error("[PDS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PDS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[PDS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PDS-2001] screen index {index} out of range (screen count {count})")]
    InvalidScreen { index: usize, count: usize },

    #[error("[PDS-2002] view handle {handle} failed: {details}")]
    ViewHandle {
        handle: &'static str,
        details: String,
    },

    #[error("[PDS-2003] effect provider failure: {details}")]
    Effect { details: String },

    #[error("[PDS-2004] invalid geometry: {details}")]
    InvalidGeometry { details: String },

    #[error("[PDS-2005] step {step} panicked: {details}")]
    StepPanicked { step: usize, details: String },

    #[error("[PDS-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[PDS-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PDS-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[PDS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl PdsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PDS-1001",
            Self::MissingConfig { .. } => "PDS-1002",
            Self::ConfigParse { .. } => "PDS-1003",
            Self::InvalidScreen { .. } => "PDS-2001",
            Self::ViewHandle { .. } => "PDS-2002",
            Self::Effect { .. } => "PDS-2003",
            Self::InvalidGeometry { .. } => "PDS-2004",
            Self::StepPanicked { .. } => "PDS-2005",
            Self::Serialization { .. } => "PDS-2101",
            Self::Io { .. } => "PDS-3002",
            Self::ChannelClosed { .. } => "PDS-3003",
            Self::Runtime { .. } => "PDS-3900",
        }
    }

    /// Whether the failure only affects presentation and the sequence may keep going.
    #[must_use]
    pub const fn is_cosmetic(&self) -> bool {
        matches!(
            self,
            Self::ViewHandle { .. }
                | Self::Effect { .. }
                | Self::InvalidGeometry { .. }
                | Self::StepPanicked { .. }
        )
    }

    /// Convenience constructor for view handle failures.
    #[must_use]
    pub fn view(handle: &'static str, details: impl Into<String>) -> Self {
        Self::ViewHandle {
            handle,
            details: details.into(),
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

impl From<serde_json::Error> for PdsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PdsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
