// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Unified error type for release pipeline operations.
#[derive(Debug, Error)]
pub enum AppleReleaseError {
    #[error("{0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("environment variable {0} contains disallowed control characters")]
    EnvDisallowedControlChars(String),

    #[error("{field}: environment variable {name} is not set")]
    UnresolvedEnvVar { field: String, name: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Precondition(String),

    #[error("{tool} not found — {hint}")]
    ToolNotFound { tool: &'static str, hint: &'static str },

    #[error("{0}")]
    ExternalTool(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    RemoteApi(String),

    #[error("{pipe}: {source}")]
    PipeFailed {
        pipe: String,
        #[source]
        source: Box<AppleReleaseError>,
    },

    /// Intentional skip of a pipeline step. Not a failure; the pipeline
    /// logs the reason and continues with the next pipe.
    #[error("{0}")]
    Skip(String),
}

impl AppleReleaseError {
    /// Whether this error signals an intentional skip rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, AppleReleaseError::Skip(_))
    }
}

/// Construct a skip error with the given reason.
///
/// Use this when a pipe determines it should not run, e.g. because the
/// relevant feature was disabled on the command line.
pub fn skip(reason: impl Into<String>) -> AppleReleaseError {
    AppleReleaseError::Skip(reason.into())
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, AppleReleaseError>;
