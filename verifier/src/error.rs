//! Error types for the shipcheck verifier.
//!
//! Errors are fatal to some scope. Configuration and discovery errors end
//! the run before any artefact is inspected; everything else ends the
//! inspection of a single artefact, which is recorded in the run report
//! while the remaining artefacts are still checked. Findings that do not
//! prevent inspection are [`Diagnostic`](shipcheck_common::Diagnostic)
//! values, never errors.

use crate::config::ConfigError;
use crate::lifecycle::extraction::ExtractionError;
use camino::Utf8PathBuf;
use shipcheck_common::{DocumentError, TableError};
use thiserror::Error;

/// Errors that can occur while verifying artefacts.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The packaging configuration is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No artefacts were found and no explicit artefact was given.
    #[error("no {platform} artefacts found under {searched}; build the installers or pass --artefact")]
    Discovery {
        /// Platform whose artefacts were searched for.
        platform: String,
        /// The build-output roots that were searched.
        searched: String,
    },

    /// No `--platform` was given and the host platform has no installers.
    #[error("cannot infer the platform on this host; pass --platform")]
    UnsupportedHost,

    /// The artefact's file name does not match any known installer format.
    #[error("unrecognised artefact format: {path}")]
    UnknownArtefactKind {
        /// Path of the artefact.
        path: Utf8PathBuf,
    },

    /// A metadata document lacks the structure its format requires.
    #[error("{path}: {source}")]
    Document {
        /// Path of the offending document.
        path: Utf8PathBuf,
        /// What was wrong with it.
        #[source]
        source: DocumentError,
    },

    /// An installer-database query returned unusable output.
    #[error("{path}: {source}")]
    Table {
        /// Path of the queried database.
        path: Utf8PathBuf,
        /// What was wrong with the output.
        #[source]
        source: TableError,
    },

    /// The inspected bundle does not contain what its format requires.
    #[error("{path}: {reason}")]
    BundleLayout {
        /// The bundle or directory that was inspected.
        path: Utf8PathBuf,
        /// What was missing.
        reason: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    ExternalTool {
        /// The tool and its first argument, e.g. `hdiutil attach`.
        tool: String,
        /// Exit status description.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// An external tool did not finish within the configured timeout.
    #[error("{tool} did not finish within {seconds} seconds")]
    ExternalToolTimeout {
        /// The tool that was killed.
        tool: String,
        /// The configured timeout.
        seconds: u64,
    },

    /// A tool needed by an enabled check is not installed.
    #[error("required tool {tool} is not installed or not on PATH")]
    ToolMissing {
        /// The missing executable.
        tool: String,
    },

    /// An archive could not be extracted.
    #[error("failed to extract {path}: {source}")]
    Extraction {
        /// The archive being extracted.
        path: Utf8PathBuf,
        /// The underlying extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl VerifyError {
    /// Builds a [`VerifyError::Read`] for `path`.
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using [`VerifyError`].
pub type Result<T> = std::result::Result<T, VerifyError>;
