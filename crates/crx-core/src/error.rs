//! Error taxonomy for the packaging pipeline.
//!
//! Each stage returns its own error type; [`PackError`] aggregates them for
//! the caller that turns a failure into a message and exit code.

use std::path::PathBuf;

use crx_schema::{HeaderError, PemError};
use openssl::error::ErrorStack;
use thiserror::Error;

/// Failures while acquiring a private key.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The key file does not exist.
    #[error("Private key not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The key file exists but could not be read.
    #[error("Failed to read private key {}", path.display())]
    Read {
        /// Key file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file text is not PEM or base64.
    #[error("Invalid private key")]
    Pem(#[from] PemError),

    /// The decoded bytes are not a private key.
    #[error("Invalid private key: DER does not parse")]
    Der(#[source] ErrorStack),

    /// The key parsed but is not an RSA key.
    #[error("Unsupported private key type {0}: only RSA keys can sign a CRX")]
    UnsupportedAlgorithm(String),

    /// Key generation failed in the crypto backend.
    #[error("Failed to generate RSA private key")]
    Generate(#[source] ErrorStack),

    /// DER export of the private or public half failed.
    #[error("Failed to export key")]
    Export(#[source] ErrorStack),
}

impl KeyError {
    /// True for errors caused by the content of the key file.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Pem(_) | Self::Der(_) | Self::UnsupportedAlgorithm(_)
        )
    }
}

/// Failures while building the archive payload.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The source directory does not exist or is not a directory.
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The scratch directory could not be created.
    #[error("Unable to create temporary directory")]
    Scratch(#[source] std::io::Error),

    /// Reading a source file or writing the archive failed.
    #[error("Archive I/O failed on {}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("Failed to traverse source directory")]
    Walk(#[from] walkdir::Error),

    /// A path cannot be stored as a zip entry name.
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// The zip encoder failed.
    #[error("Failed to create temporary zip file during packaging")]
    Zip(#[from] zip::result::ZipError),
}

/// Failures while signing the archive.
#[derive(Error, Debug)]
pub enum SignError {
    /// The archive could not be opened or read.
    #[error("Failed to read archive for signing")]
    Read(#[source] std::io::Error),

    /// The signing primitive failed.
    #[error("Unable to sign extension")]
    Crypto(#[source] ErrorStack),
}

/// Failures while persisting a key or writing the package.
#[derive(Error, Debug)]
pub enum WriteError {
    /// A filesystem operation failed.
    #[error("Unable to write {}", path.display())]
    Io {
        /// Destination (or temporary) path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The key or signature does not fit the header.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// The key could not be PEM-encoded.
    #[error("Failed to encode private key")]
    Pem(#[from] PemError),
}

impl WriteError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Failures while reading back or verifying a package.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Reading the package failed.
    #[error("Failed to read package {}", path.display())]
    Io {
        /// Package path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Streaming the payload through the verifier failed.
    #[error("Failed to read package payload")]
    Read(#[source] std::io::Error),

    /// The header is malformed.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// The header declares a version this reader does not understand.
    #[error("Unsupported CRX version {0}")]
    UnsupportedVersion(u32),

    /// The declared key and signature sizes run past the end of the file.
    #[error("Package truncated: header needs {needed} bytes, file has {actual}")]
    Truncated {
        /// Bytes required by the header.
        needed: u64,
        /// Actual file length.
        actual: u64,
    },

    /// The embedded public key is not valid DER.
    #[error("Embedded public key is invalid")]
    PublicKey(#[source] ErrorStack),

    /// The verification primitive failed.
    #[error("Signature verification failed")]
    Crypto(#[source] ErrorStack),

    /// The signature does not match the payload.
    #[error("Signature does not match package contents")]
    BadSignature,
}

/// Top-level pipeline failure, one variant per stage.
#[derive(Error, Debug)]
pub enum PackError {
    /// The extension directory is missing or not a directory.
    #[error("Input directory must exist: {}", .0.display())]
    Input(PathBuf),

    /// Loading, generating or deriving the key failed.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Building the archive payload failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Signing the archive failed.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// Persisting the key or writing the package failed.
    #[error(transparent)]
    Write(#[from] WriteError),
}
