//! Error types for NIC detection.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that end a detection run.
#[derive(Error, Debug)]
pub enum DetectError {
    /// Profile id is not present in the catalog.
    #[error("'{0}' is not a known deployment profile")]
    UnknownProfile(String),

    /// Catalog entry is structurally invalid.
    #[error("Profile '{profile}' is invalid: {reason}")]
    InvalidProfile { profile: String, reason: String },

    /// Catalog file could not be read or parsed.
    #[error("Failed to load profile catalog from {path}: {reason}")]
    CatalogLoad { path: PathBuf, reason: String },

    /// The hardware introspection handle could not be created.
    #[error("Failed to initialize hardware probe: {0}")]
    ProbeInit(String),

    /// Network interfaces could not be enumerated.
    #[error("Network interfaces not found: {0}")]
    Enumeration(String),

    /// No interface passed the inventory prechecks.
    #[error("No network devices available for SR-IOV")]
    NoCandidates,

    /// Fewer qualifying devices than the profile requires.
    #[error("Found {found} NIC(s) available for SR-IOV while {required} are required")]
    InsufficientDevices { found: usize, required: usize },
}

/// Per-device probe failures.
///
/// These never abort a run. The inventory builder degrades the affected
/// field to its failure value and moves on.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Reading a sysfs attribute failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Attribute content could not be parsed.
    #[error("Unexpected value '{value}' in {path}")]
    Parse { path: PathBuf, value: String },

    /// Attribute exists but carries no usable value.
    #[error("{0} is not available")]
    Missing(String),
}

impl ProbeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for fatal detection errors.
pub type DetectResult<T> = Result<T, DetectError>;
