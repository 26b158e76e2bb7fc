use std::path::PathBuf;

/// Errors produced while resolving, installing or removing a formula.
///
/// Every variant aborts the running operation. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The archive could not be retrieved.
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    /// The retrieved bytes do not hash to the pinned checksum.
    #[error("checksum mismatch for {url}\n  expected: {expected}\n    actual: {actual}")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    /// The archive is corrupt, unsupported or does not hold the executable.
    #[error("failed to extract {archive}: {reason}")]
    Extraction { archive: String, reason: String },

    /// A filesystem write or removal under the prefix failed.
    #[error("could not {action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The formula is malformed or fails validation.
    #[error("invalid formula: {0}")]
    InvalidFormula(String),

    /// Neither a library directory nor a shim exists for this name.
    #[error("{0} is not installed")]
    NotInstalled(String),
}

impl InstallError {
    /// Builds a closure mapping an `io::Error` on `path` into [`InstallError::Filesystem`].
    pub fn fs(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> InstallError {
        let path = path.into();
        move |source| InstallError::Filesystem {
            action,
            path,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
