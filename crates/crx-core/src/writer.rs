//! Package assembly.
//!
//! The package is written to a temporary file next to the destination and
//! renamed into place only after every byte has been flushed to disk. On any
//! failure the temporary file is removed and the destination is untouched.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crx_schema::CrxHeader;

use crate::archive::ArchivePayload;
use crate::error::WriteError;
use crate::sign::Signature;

/// What was written by [`write_package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    /// Final package path.
    pub path: PathBuf,
    /// Header written at offset 0.
    pub header: CrxHeader,
    /// Number of archive bytes copied after the signature.
    pub payload_len: u64,
}

impl PackageSummary {
    /// Total length of the package file.
    pub fn package_len(&self) -> u64 {
        self.header.package_len(self.payload_len)
    }
}

/// Assemble header, public key, signature and archive into `dest`.
///
/// An existing file at `dest` is replaced atomically.
///
/// # Errors
///
/// Returns [`WriteError`] on any I/O failure, leaving `dest` as it was.
pub fn write_package(
    archive: &ArchivePayload,
    public_key: &[u8],
    signature: &Signature,
    dest: &Path,
) -> Result<PackageSummary, WriteError> {
    let payload = File::open(archive.path()).map_err(WriteError::io(archive.path()))?;
    write_package_from(payload, public_key, signature.as_bytes(), dest)
}

/// Like [`write_package`], reading the archive bytes from `payload`.
///
/// # Errors
///
/// See [`write_package`].
pub fn write_package_from<R: Read>(
    mut payload: R,
    public_key: &[u8],
    signature: &[u8],
    dest: &Path,
) -> Result<PackageSummary, WriteError> {
    let header = CrxHeader::for_lengths(public_key.len(), signature.len())?;

    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".crxpack-").suffix(".tmp");
    // The package is meant to be shared: 0644 minus the umask, like a plain create.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(WriteError::io(dir))?;
    let tmp_path = tmp.path().to_path_buf();

    let payload_len = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let copied = header
            .write_to(&mut out)
            .and_then(|()| out.write_all(public_key))
            .and_then(|()| out.write_all(signature))
            .and_then(|()| io::copy(&mut payload, &mut out))
            .map_err(WriteError::io(&tmp_path))?;
        out.flush().map_err(WriteError::io(&tmp_path))?;
        copied
    };
    // A replaced package keeps its mode.
    if let Ok(existing) = fs::metadata(dest) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(WriteError::io(&tmp_path))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(WriteError::io(&tmp_path))?;

    tmp.persist(dest).map_err(|e| WriteError::Io {
        path: dest.to_path_buf(),
        source: e.error,
    })?;

    let summary = PackageSummary {
        path: dest.to_path_buf(),
        header,
        payload_len,
    };
    tracing::info!(
        "Wrote {} ({} bytes)",
        dest.display(),
        summary.package_len()
    );
    Ok(summary)
}
