//! Shared wire formats for CRX packages.
//!
//! Everything in this crate is a pure transform over bytes and text: the
//! fixed 16-byte package header, the PEM wrapping used for key files, and
//! the extension ID derived from a public key. Filesystem and crypto work
//! lives in `crx-core`.

pub mod header;
pub mod id;
pub mod pem;

// Re-exports
pub use header::{CrxHeader, HeaderError};
pub use id::ExtensionId;
pub use pem::{PemError, PemKind};

/// Magic bytes at offset 0 of every CRX file.
pub const CRX_MAGIC: [u8; 4] = *b"Cr24";

/// Format version written by this implementation.
pub const CRX_VERSION: u32 = 2;

/// Serialized header length: magic + version + key size + signature size.
pub const CRX_HEADER_LEN: usize = 16;

/// File extension (without dot) of packaged extensions.
pub const CRX_EXTENSION: &str = "crx";

/// File extension (without dot) of PEM private key files.
pub const PEM_EXTENSION: &str = "pem";

/// Number of SHA-256 bytes that make up an extension ID.
pub const EXTENSION_ID_BYTES: usize = 16;
