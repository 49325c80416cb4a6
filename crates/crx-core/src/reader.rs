//! Reading a package back and checking its signature.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};

use crx_schema::{CRX_HEADER_LEN, CRX_VERSION, CrxHeader, ExtensionId};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::VerifyError;
use crate::sign::verify_reader;

/// A parsed CRX file: header, public key and signature in memory, payload on disk.
#[derive(Debug, Clone)]
pub struct CrxPackage {
    path: PathBuf,
    header: CrxHeader,
    public_key: Vec<u8>,
    signature: Vec<u8>,
    payload_len: u64,
}

impl CrxPackage {
    /// Open and validate the package at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] if the file cannot be read, the magic is wrong,
    /// the version is unsupported, or the declared sizes exceed the file.
    pub fn open(path: &Path) -> Result<Self, VerifyError> {
        let io_err = |source: std::io::Error| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len();

        let mut head = Vec::with_capacity(CRX_HEADER_LEN);
        (&mut file)
            .take(CRX_HEADER_LEN as u64)
            .read_to_end(&mut head)
            .map_err(io_err)?;
        let header = CrxHeader::from_bytes(&head)?;

        if header.version != CRX_VERSION {
            return Err(VerifyError::UnsupportedVersion(header.version));
        }
        if header.payload_offset() > file_len {
            return Err(VerifyError::Truncated {
                needed: header.payload_offset(),
                actual: file_len,
            });
        }

        let mut public_key = vec![0u8; header.key_size as usize];
        file.read_exact(&mut public_key).map_err(io_err)?;
        let mut signature = vec![0u8; header.signature_size as usize];
        file.read_exact(&mut signature).map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            header,
            public_key,
            signature,
            payload_len: file_len - header.payload_offset(),
        })
    }

    /// The decoded header.
    pub fn header(&self) -> &CrxHeader {
        &self.header
    }

    /// Embedded DER public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Embedded signature.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Length of the archive payload.
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// ID of the extension, derived from the embedded key.
    pub fn extension_id(&self) -> ExtensionId {
        ExtensionId::from_public_key(&self.public_key)
    }

    /// A reader positioned at the first payload byte and limited to the payload.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Io`] if the file cannot be reopened.
    pub fn payload_reader(&self) -> Result<Take<File>, VerifyError> {
        let io_err = |source: std::io::Error| VerifyError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = File::open(&self.path).map_err(io_err)?;
        file.seek(SeekFrom::Start(self.header.payload_offset()))
            .map_err(io_err)?;
        Ok(file.take(self.payload_len))
    }

    /// Read the whole payload into memory.
    ///
    /// # Errors
    ///
    /// See [`CrxPackage::payload_reader`].
    pub fn read_payload(&self) -> Result<Vec<u8>, VerifyError> {
        let mut payload = Vec::new();
        self.payload_reader()?
            .read_to_end(&mut payload)
            .map_err(VerifyError::Read)?;
        Ok(payload)
    }

    /// Check the embedded signature over the payload with the embedded key.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::BadSignature`] if the payload was altered or
    /// signed with a different key.
    pub fn verify(&self) -> Result<(), VerifyError> {
        verify_reader(
            self.payload_reader()?,
            &self.public_key,
            &self.signature,
            DEFAULT_CHUNK_SIZE,
        )
    }
}
