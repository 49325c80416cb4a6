//! crxpack core: turn an extension directory into a signed CRX package.
//!
//! # Pipeline
//!
//! ```text
//! extension_dir ──► create_archive ──► sign_archive ──► write_package ──► ext.crx
//!                                          ▲
//! ext.pem ──────────► KeyPair ─────────────┘
//! ```
//!
//! [`pack`] runs every stage in order. The stages are also public so callers
//! can drive them individually, e.g. to sign with a key held in memory.

pub mod archive;
pub mod config;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod reader;
pub mod sign;
pub mod writer;

// Re-exports
pub use archive::{ArchivePayload, create_archive};
pub use config::PackConfig;
pub use error::{ArchiveError, KeyError, PackError, SignError, VerifyError, WriteError};
pub use keys::KeyPair;
pub use pipeline::{KeySource, PackOutcome, PackRequest, acquire_key, pack};
pub use reader::CrxPackage;
pub use sign::{Signature, sign_archive, verify_reader};
pub use writer::{PackageSummary, write_package};
