//! The fixed 16-byte CRX header.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "Cr24"
//! 4       4     version          (u32, little-endian)
//! 8       4     key_size         (u32, little-endian)
//! 12      4     signature_size   (u32, little-endian)
//! ```
//!
//! Fields are encoded one at a time; the in-memory layout of [`CrxHeader`]
//! never reaches the wire.

use std::io::Write;

use thiserror::Error;

use crate::{CRX_HEADER_LEN, CRX_MAGIC, CRX_VERSION};

/// Errors produced while encoding or decoding a header.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HeaderError {
    /// Fewer than [`CRX_HEADER_LEN`] bytes were available.
    #[error("CRX header truncated: expected 16 bytes, got {0}")]
    Truncated(usize),

    /// The first four bytes were not `Cr24`.
    #[error("Not a CRX file: bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// A key or signature is too long for a 32-bit size field.
    #[error("{field} of {len} bytes does not fit in a 32-bit header field")]
    TooLarge {
        /// Which field overflowed.
        field: &'static str,
        /// The offending length.
        len: usize,
    },
}

/// Decoded CRX header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrxHeader {
    /// Format version.
    pub version: u32,
    /// Byte length of the DER public key that follows the header.
    pub key_size: u32,
    /// Byte length of the signature that follows the public key.
    pub signature_size: u32,
}

impl CrxHeader {
    /// Build a current-version header for a key and signature of the given lengths.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::TooLarge`] if either length exceeds `u32::MAX`.
    pub fn for_lengths(key_len: usize, signature_len: usize) -> Result<Self, HeaderError> {
        let key_size = u32::try_from(key_len).map_err(|_| HeaderError::TooLarge {
            field: "public key",
            len: key_len,
        })?;
        let signature_size = u32::try_from(signature_len).map_err(|_| HeaderError::TooLarge {
            field: "signature",
            len: signature_len,
        })?;

        Ok(Self {
            version: CRX_VERSION,
            key_size,
            signature_size,
        })
    }

    /// Encode the header field by field.
    pub fn to_bytes(&self) -> [u8; CRX_HEADER_LEN] {
        let mut out = [0u8; CRX_HEADER_LEN];
        out[0..4].copy_from_slice(&CRX_MAGIC);
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.key_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.signature_size.to_le_bytes());
        out
    }

    /// Decode a header from the start of `bytes`. Trailing bytes are ignored.
    ///
    /// The version is returned as found; callers decide which versions they accept.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Truncated`] for short input and
    /// [`HeaderError::BadMagic`] if the magic does not match.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < CRX_HEADER_LEN {
            return Err(HeaderError::Truncated(bytes.len()));
        }

        let magic = field(bytes, 0);
        if magic != CRX_MAGIC {
            return Err(HeaderError::BadMagic(magic));
        }

        Ok(Self {
            version: u32::from_le_bytes(field(bytes, 4)),
            key_size: u32::from_le_bytes(field(bytes, 8)),
            signature_size: u32::from_le_bytes(field(bytes, 12)),
        })
    }

    /// Write the encoded header to `writer`.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Offset of the first payload byte.
    pub fn payload_offset(&self) -> u64 {
        CRX_HEADER_LEN as u64 + u64::from(self.key_size) + u64::from(self.signature_size)
    }

    /// Total file length of a package carrying `payload_len` archive bytes.
    pub fn package_len(&self, payload_len: u64) -> u64 {
        self.payload_offset() + payload_len
    }
}

fn field(bytes: &[u8], at: usize) -> [u8; 4] {
    [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fields_little_endian_without_padding() {
        let header = CrxHeader::for_lengths(162, 128).unwrap();
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], b"Cr24");
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[162, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[128, 0, 0, 0]);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let header = CrxHeader {
            version: 2,
            key_size: 0x0102_0304,
            signature_size: 256,
        };
        assert_eq!(CrxHeader::from_bytes(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = CrxHeader::for_lengths(1, 1).unwrap().to_bytes();
        bytes[0..4].copy_from_slice(b"PK\x03\x04");
        assert_eq!(
            CrxHeader::from_bytes(&bytes),
            Err(HeaderError::BadMagic(*b"PK\x03\x04"))
        );
    }

    #[test]
    fn rejects_short_input() {
        assert_eq!(
            CrxHeader::from_bytes(b"Cr24\x02\x00"),
            Err(HeaderError::Truncated(6))
        );
    }

    #[test]
    fn package_len_accounts_for_every_section() {
        let header = CrxHeader::for_lengths(162, 128).unwrap();
        assert_eq!(header.payload_offset(), 16 + 162 + 128);
        assert_eq!(header.package_len(1000), 16 + 162 + 128 + 1000);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_key_is_rejected() {
        let len = u32::MAX as usize + 1;
        assert_eq!(
            CrxHeader::for_lengths(len, 0),
            Err(HeaderError::TooLarge {
                field: "public key",
                len
            })
        );
    }
}
