//! End-to-end packaging.
//!
//! ```text
//! validate input -> acquire key -> archive -> sign -> write package
//! ```
//!
//! The scratch directory holding the intermediate archive is owned by this
//! module and removed on every exit path.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crx_schema::{CRX_EXTENSION, CrxHeader, ExtensionId, PEM_EXTENSION};

use crate::archive::create_archive;
use crate::config::PackConfig;
use crate::error::{ArchiveError, PackError};
use crate::keys::KeyPair;
use crate::sign::sign_archive;
use crate::writer::{PackageSummary, write_package};

/// Paths for one packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRequest {
    /// Directory to package.
    pub extension_dir: PathBuf,
    /// Private key to load, or to create if missing.
    pub key_path: PathBuf,
    /// Package destination.
    pub output_path: PathBuf,
}

impl PackRequest {
    /// Build a request, defaulting the key to `<extension_dir>.pem` and the
    /// output to `<extension_dir>.crx`.
    ///
    /// The defaults replace any extension the directory name already has,
    /// so `ext.v2` packs to `ext.crx`. A path without a final name, such as
    /// `.` or `ext/..`, is resolved against the working directory first.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Input`] if a default is needed and no directory
    /// name can be derived, e.g. for `/`.
    pub fn new(
        extension_dir: impl Into<PathBuf>,
        key_path: Option<PathBuf>,
        output_path: Option<PathBuf>,
    ) -> Result<Self, PackError> {
        let extension_dir = extension_dir.into();
        let (key_path, output_path) = match (key_path, output_path) {
            (Some(key), Some(output)) => (key, output),
            (key, output) => {
                let named = named_dir(&extension_dir)?;
                (
                    key.unwrap_or_else(|| named.with_extension(PEM_EXTENSION)),
                    output.unwrap_or_else(|| named.with_extension(CRX_EXTENSION)),
                )
            }
        };
        Ok(Self {
            extension_dir,
            key_path,
            output_path,
        })
    }
}

/// `dir` itself if it ends in a name, otherwise its lexically resolved
/// absolute form.
fn named_dir(dir: &Path) -> Result<PathBuf, PackError> {
    if dir.file_name().is_some() {
        return Ok(dir.to_path_buf());
    }

    let absolute = std::path::absolute(dir).map_err(|_| PackError::Input(dir.to_path_buf()))?;
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }

    if resolved.file_name().is_some() {
        Ok(resolved)
    } else {
        Err(PackError::Input(dir.to_path_buf()))
    }
}

/// Where the signing key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Read from an existing key file.
    Loaded,
    /// Generated for this run and written to the key path.
    Generated,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOutcome {
    /// Package path.
    pub crx_path: PathBuf,
    /// Key file path.
    pub key_path: PathBuf,
    /// Whether the key was loaded or generated.
    pub key_source: KeySource,
    /// ID of the packaged extension.
    pub extension_id: ExtensionId,
    /// Header written to the package.
    pub header: CrxHeader,
    /// Archive payload length.
    pub payload_len: u64,
}

impl PackOutcome {
    /// Total package length.
    pub fn package_len(&self) -> u64 {
        self.header.package_len(self.payload_len)
    }
}

/// Load the key at `path`, or generate one and persist it there if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`PackError::Key`] if loading or generation fails and
/// [`PackError::Write`] if a generated key cannot be persisted.
pub fn acquire_key(path: &Path, config: &PackConfig) -> Result<(KeyPair, KeySource), PackError> {
    if path.exists() {
        let key = KeyPair::load(path)?;
        tracing::info!("Using private key {}", path.display());
        return Ok((key, KeySource::Loaded));
    }

    let key = KeyPair::generate(config.key_bits)?;
    key.persist(path, config.pem_columns)?;
    tracing::info!(
        "Generated {}-bit private key at {}",
        key.bits(),
        path.display()
    );
    Ok((key, KeySource::Generated))
}

/// Package `request.extension_dir` into a signed CRX at `request.output_path`.
///
/// The input directory is checked before any key is loaded or generated.
///
/// # Errors
///
/// Returns the [`PackError`] of the first stage that fails. A failed run
/// never leaves a partial package at the output path, and a key generated
/// by that run is removed again.
pub fn pack(request: &PackRequest, config: &PackConfig) -> Result<PackOutcome, PackError> {
    if !request.extension_dir.is_dir() {
        return Err(PackError::Input(request.extension_dir.clone()));
    }

    let (key, key_source) = acquire_key(&request.key_path, config)?;

    let result = build_package(request, config, &key);
    if result.is_err() && key_source == KeySource::Generated {
        // Don't leave a fresh key behind for a package that was never written.
        if let Err(e) = fs::remove_file(&request.key_path) {
            tracing::warn!(
                "Failed to remove generated key {}: {e}",
                request.key_path.display()
            );
        }
    }
    let summary = result?;

    Ok(PackOutcome {
        crx_path: summary.path,
        key_path: request.key_path.clone(),
        key_source,
        extension_id: key.extension_id(),
        header: summary.header,
        payload_len: summary.payload_len,
    })
}

fn build_package(
    request: &PackRequest,
    config: &PackConfig,
    key: &KeyPair,
) -> Result<PackageSummary, PackError> {
    let scratch = tempfile::Builder::new()
        .prefix("crxpack-")
        .tempdir()
        .map_err(ArchiveError::Scratch)?;

    let archive = create_archive(&request.extension_dir, scratch.path(), config)?;
    let signature = sign_archive(archive.path(), key, config.chunk_size)?;
    tracing::debug!("Signed {} byte archive", archive.size());
    let summary = write_package(
        &archive,
        key.public_key_der(),
        &signature,
        &request.output_path,
    )?;

    if let Err(e) = scratch.close() {
        tracing::warn!("Failed to remove scratch directory: {e}");
    }
    Ok(summary)
}
