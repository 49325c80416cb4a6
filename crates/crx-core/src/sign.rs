//! RSA-SHA1 (PKCS#1 v1.5) signatures over the archive payload.
//!
//! The archive is streamed through the signer in bounded chunks; the
//! signature is finalized only after the reader is exhausted.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::{Signer, Verifier};

use crate::error::{SignError, VerifyError};
use crate::keys::KeyPair;

/// Raw signature bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// The signature bytes as embedded in a package.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Sign the full contents of the archive at `path`.
///
/// # Errors
///
/// Returns [`SignError::Read`] if the archive cannot be opened or read and
/// [`SignError::Crypto`] if the signing primitive fails.
pub fn sign_archive(path: &Path, key: &KeyPair, chunk_size: usize) -> Result<Signature, SignError> {
    let file = File::open(path).map_err(SignError::Read)?;
    let signature = sign_reader(file, key, chunk_size)?;
    tracing::debug!(
        "Signed {} ({} byte signature)",
        path.display(),
        signature.as_bytes().len()
    );
    Ok(signature)
}

/// Sign everything `reader` yields, reading `chunk_size` bytes at a time.
///
/// # Errors
///
/// See [`sign_archive`].
pub fn sign_reader<R: Read>(
    reader: R,
    key: &KeyPair,
    chunk_size: usize,
) -> Result<Signature, SignError> {
    let mut signer =
        Signer::new(MessageDigest::sha1(), key.private_key()).map_err(SignError::Crypto)?;

    for_each_chunk(reader, chunk_size, |chunk| signer.update(chunk))
        .map_err(|e| match e {
            ChunkError::Read(e) => SignError::Read(e),
            ChunkError::Sink(e) => SignError::Crypto(e),
        })?;

    let bytes = signer.sign_to_vec().map_err(SignError::Crypto)?;
    Ok(Signature(bytes))
}

/// Check `signature` over everything `reader` yields against a DER public key.
///
/// # Errors
///
/// Returns [`VerifyError::PublicKey`] for an unusable key,
/// [`VerifyError::BadSignature`] if the signature does not match, and
/// other variants for read or backend failures.
pub fn verify_reader<R: Read>(
    reader: R,
    public_key_der: &[u8],
    signature: &[u8],
    chunk_size: usize,
) -> Result<(), VerifyError> {
    let key = PKey::public_key_from_der(public_key_der).map_err(VerifyError::PublicKey)?;
    let mut verifier = Verifier::new(MessageDigest::sha1(), &key).map_err(VerifyError::Crypto)?;

    for_each_chunk(reader, chunk_size, |chunk| verifier.update(chunk)).map_err(|e| match e {
        ChunkError::Read(e) => VerifyError::Read(e),
        ChunkError::Sink(e) => VerifyError::Crypto(e),
    })?;

    // A malformed signature surfaces as an error stack rather than `false`.
    match verifier.verify(signature) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(VerifyError::BadSignature),
    }
}

enum ChunkError<E> {
    Read(io::Error),
    Sink(E),
}

fn for_each_chunk<R: Read, E>(
    mut reader: R,
    chunk_size: usize,
    mut sink: impl FnMut(&[u8]) -> Result<(), E>,
) -> Result<u64, ChunkError<E>> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ChunkError::Read(e)),
        };
        sink(&buffer[..n]).map_err(ChunkError::Sink)?;
        total += n as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn signature_covers_every_chunk() {
        let key = KeyPair::generate(1024).unwrap();
        let data = payload(10_000);

        // PKCS#1 v1.5 is deterministic, so chunking must not change the result.
        let whole = sign_reader(&data[..], &key, data.len()).unwrap();
        let chunked = sign_reader(&data[..], &key, 7).unwrap();
        assert_eq!(whole, chunked);
        assert_eq!(whole.as_bytes().len(), 128);

        verify_reader(&data[..], key.public_key_der(), whole.as_bytes(), 1024).unwrap();
    }

    #[test]
    fn tail_bytes_affect_the_signature() {
        let key = KeyPair::generate(1024).unwrap();
        let mut data = payload(3 * 64);
        let original = sign_reader(&data[..], &key, 64).unwrap();

        // Change only the final chunk.
        if let Some(last) = data.last_mut() {
            *last ^= 0xff;
        }
        let altered = sign_reader(&data[..], &key, 64).unwrap();
        assert_ne!(original, altered);

        let err = verify_reader(&data[..], key.public_key_der(), original.as_bytes(), 64)
            .unwrap_err();
        assert!(matches!(err, VerifyError::BadSignature));
    }

    #[test]
    fn sign_archive_reads_the_whole_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("extension.zip");
        let data = payload(200_000);
        std::fs::write(&path, &data).unwrap();

        let key = KeyPair::generate(1024).unwrap();
        let from_file = sign_archive(&path, &key, 1 << 16).unwrap();
        let from_memory = sign_reader(&data[..], &key, data.len()).unwrap();
        assert_eq!(from_file, from_memory);
    }

    #[test]
    fn missing_archive_is_a_read_error() {
        let tmp = tempdir().unwrap();
        let key = KeyPair::generate(1024).unwrap();

        let err = sign_archive(&tmp.path().join("missing.zip"), &key, 1024).unwrap_err();
        assert!(matches!(err, SignError::Read(_)));
    }

    #[test]
    fn failing_reader_is_a_read_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device unplugged"))
            }
        }

        let key = KeyPair::generate(1024).unwrap();
        let err = sign_reader(Broken, &key, 1024).unwrap_err();
        assert!(matches!(err, SignError::Read(_)));
    }

    #[test]
    fn wrong_key_does_not_verify() {
        let signer = KeyPair::generate(1024).unwrap();
        let other = KeyPair::generate(1024).unwrap();
        let data = payload(500);

        let signature = sign_reader(&data[..], &signer, 128).unwrap();
        let err =
            verify_reader(&data[..], other.public_key_der(), signature.as_bytes(), 128).unwrap_err();
        assert!(matches!(err, VerifyError::BadSignature));
    }
}
