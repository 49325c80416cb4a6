//! Extension IDs derived from public keys.

use sha2::{Digest, Sha256};

use crate::EXTENSION_ID_BYTES;

/// Newtype for an extension ID: 32 characters in `a..=p`.
///
/// The ID is the first [`EXTENSION_ID_BYTES`] bytes of SHA-256 over the DER
/// public key, hex-encoded, with each hex digit `0..f` shifted to `a..p`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Derive the ID owned by the holder of `public_key_der`.
    pub fn from_public_key(public_key_der: &[u8]) -> Self {
        let digest = Sha256::digest(public_key_der);
        let hex = hex::encode(&digest[..EXTENSION_ID_BYTES]);
        Self(hex.chars().map(shift_hex_digit).collect())
    }

    /// Return the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// hex::encode only emits lowercase hex digits.
fn shift_hex_digit(c: char) -> char {
    let value = c.to_digit(16).unwrap_or(0) as u8;
    char::from(b'a' + value)
}

impl std::fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        // sha256("") = e3b0c442 98fc1c14 9afbf4c8 996fb924 ...
        assert_eq!(
            ExtensionId::from_public_key(b"").as_str(),
            "odlameecjipmbmbejkplpemijjgpljce"
        );
        assert_eq!(
            ExtensionId::from_public_key(b"hello").as_str(),
            "cmpcenlkfplakdaocgoidlckmfljocjo"
        );
    }

    #[test]
    fn derived_ids_use_only_a_to_p() {
        let id = ExtensionId::from_public_key(&[0x30, 0x81, 0x9f]);
        assert_eq!(id.as_str().len(), EXTENSION_ID_BYTES * 2);
        assert!(id.as_str().bytes().all(|b| (b'a'..=b'p').contains(&b)));
    }
}
