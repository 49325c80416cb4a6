//! RSA key acquisition: load from PEM, or generate and persist.

use std::fs;
use std::io::Write;
use std::path::Path;

use crx_schema::pem::{self, PemKind};
use crx_schema::{ExtensionId, PemError};
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Rsa;

use crate::error::{KeyError, WriteError};

/// A private key together with its DER encodings.
///
/// Both encodings are derived once from the key and never change; the
/// public half is what gets embedded in a package.
pub struct KeyPair {
    key: PKey<Private>,
    private_der: Vec<u8>,
    public_der: Vec<u8>,
}

impl KeyPair {
    /// Load a private key from a PEM (or bare base64) file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotFound`] if `path` does not exist,
    /// [`KeyError::Read`] if it cannot be read, and a parse error
    /// ([`KeyError::is_parse_error`]) if the content is not a private key.
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        if !path.exists() {
            return Err(KeyError::NotFound(path.to_path_buf()));
        }

        let text = fs::read_to_string(path).map_err(|source| KeyError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let key = Self::from_pem(&text)?;
        tracing::debug!("Loaded {}-bit key from {}", key.bits(), path.display());
        Ok(key)
    }

    /// Parse a private key from PEM text or bare base64.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the text or the DER inside it is malformed.
    pub fn from_pem(text: &str) -> Result<Self, KeyError> {
        let der = pem::parse_pem(text)?;
        Self::from_private_der(&der)
    }

    /// Parse a DER private key (PKCS#8 `PrivateKeyInfo` or PKCS#1 `RSAPrivateKey`).
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Der`] if the bytes do not parse and
    /// [`KeyError::UnsupportedAlgorithm`] for non-RSA keys.
    pub fn from_private_der(der: &[u8]) -> Result<Self, KeyError> {
        let key = PKey::private_key_from_der(der).map_err(KeyError::Der)?;
        if key.id() != Id::RSA {
            return Err(KeyError::UnsupportedAlgorithm(format!("{:?}", key.id())));
        }
        Self::from_key(key)
    }

    /// Generate a fresh RSA key with a modulus of `bits` bits.
    ///
    /// Blocks until generation completes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generate`] if the crypto backend fails.
    pub fn generate(bits: u32) -> Result<Self, KeyError> {
        tracing::debug!("Generating {bits}-bit RSA key");
        let rsa = Rsa::generate(bits).map_err(KeyError::Generate)?;
        let key = PKey::from_rsa(rsa).map_err(KeyError::Generate)?;
        Self::from_key(key)
    }

    fn from_key(key: PKey<Private>) -> Result<Self, KeyError> {
        let private_der = key.private_key_to_pkcs8().map_err(KeyError::Export)?;
        let public_der = key.public_key_to_der().map_err(KeyError::Export)?;
        Ok(Self {
            key,
            private_der,
            public_der,
        })
    }

    /// PEM text of the private key, wrapped at `columns` characters.
    ///
    /// # Errors
    ///
    /// Returns [`PemError::ZeroColumns`] if `columns` is zero.
    pub fn to_pem(&self, columns: usize) -> Result<String, PemError> {
        pem::format_pem(&self.private_der, PemKind::Private, columns)
    }

    /// Write the PEM-wrapped private key to a new file at `path`.
    ///
    /// The file must not already exist; replacing a key is never implicit.
    /// On Unix the file is created with mode `0600`.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Io`] if the file exists or cannot be written.
    pub fn persist(&self, path: &Path, columns: usize) -> Result<(), WriteError> {
        let pem = self.to_pem(columns)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(WriteError::io(path))?;
        file.write_all(pem.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(WriteError::io(path))?;

        tracing::debug!("Wrote private key to {}", path.display());
        Ok(())
    }

    /// DER `SubjectPublicKeyInfo` of the public half.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> u32 {
        self.key.bits()
    }

    /// ID of an extension signed with this key.
    pub fn extension_id(&self) -> ExtensionId {
        ExtensionId::from_public_key(&self.public_der)
    }

    pub(crate) fn private_key(&self) -> &PKey<Private> {
        &self.key
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .field("public_key_len", &self.public_der.len())
            .finish_non_exhaustive()
    }
}
