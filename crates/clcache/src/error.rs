//! Error kinds shared across the cache engine.
//!
//! The closed `AnalysisError` set is never propagated as a build failure:
//! every call site that can produce one catches it, bumps the matching
//! statistics counter, and forwards the invocation to the real compiler
//! unchanged. `Error` covers everything else (lock, store, hashing).

use std::path::PathBuf;

/// Command-line shapes the analyzer refuses to cache (closed set).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// No input source file found on the command line.
    #[error("no source file")]
    NoSourceFile,

    /// More than one source file together with `/Tc` or `/Tp`.
    #[error("multiple source files with /Tc or /Tp")]
    MultipleSourceFilesComplex,

    /// `/link` present, or `/c` absent: the driver is linking.
    #[error("invocation is a link, not a compile")]
    CalledForLink,

    /// `/Yc` or `/Yu` present: precompiled headers are unsupported.
    #[error("invocation uses precompiled headers")]
    CalledWithPch,

    /// `/Zi` present: side-band `.pdb` debug info is unsupported.
    #[error("invocation requests external debug info")]
    ExternalDebugInfo,

    /// `/E`, `/EP`, or `/P` present: the driver only preprocesses.
    #[error("invocation is preprocessing only")]
    CalledForPreprocessing,

    /// A T1-shaped flag (`/NAMEp`) was given an empty parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors from the cache engine's own machinery (not the analyzer).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file expected to exist (source, header, response file) was absent.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// Generic I/O failure with the path that triggered it.
    #[error("io error: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A base-dir-folded path was encountered with no base directory configured.
    #[error("folded path {0} encountered with no base-dir configured")]
    UnconfiguredBaseDir(String),

    /// Cross-process lock could not be acquired before its timeout elapsed.
    #[error("lock {name} not acquired within {timeout_ms}ms")]
    LockTimeout { name: String, timeout_ms: u64 },

    /// Serialization failure on the persistent store.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// `analyze()` classified the invocation as uncacheable.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Result type using the cache engine's own `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Administrative command succeeded, or the compiler returned 0.
    Success = 0,
    /// Administrative command given invalid arguments.
    ArgumentError = 1,
    /// Lock timeout or other internal failure that prevented completion.
    InternalError = 2,
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::LockTimeout { .. } => ExitCode::InternalError,
            Error::NotFound(_) | Error::Io { .. } | Error::Serde(_) => ExitCode::InternalError,
            Error::UnconfiguredBaseDir(_) => ExitCode::InternalError,
            Error::Analysis(_) => ExitCode::ArgumentError,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
