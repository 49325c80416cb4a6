//! Pipeline configuration.

use crx_schema::pem::DEFAULT_PEM_COLUMNS;

/// Environment variable overriding [`PackConfig::key_bits`].
pub const ENV_KEY_BITS: &str = "CRXPACK_KEY_BITS";

/// Environment variable overriding [`PackConfig::include_hidden`].
pub const ENV_INCLUDE_HIDDEN: &str = "CRXPACK_INCLUDE_HIDDEN";

/// RSA modulus size for newly generated keys.
pub const DEFAULT_KEY_BITS: u32 = 1024;

/// Smallest modulus accepted from the environment.
pub const MIN_KEY_BITS: u32 = 512;

/// Read buffer used when streaming the archive through the signer.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 16;

/// Immutable settings threaded through every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackConfig {
    /// Modulus size used when a key has to be generated.
    pub key_bits: u32,
    /// Line width of persisted PEM key files.
    pub pem_columns: usize,
    /// Buffer size for streaming reads of the archive.
    pub chunk_size: usize,
    /// Archive files and directories whose names start with `.`.
    pub include_hidden: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            pem_columns: DEFAULT_PEM_COLUMNS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            include_hidden: false,
        }
    }
}

impl PackConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_KEY_BITS) {
            match raw.trim().parse::<u32>() {
                Ok(bits) if bits >= MIN_KEY_BITS => config.key_bits = bits,
                _ => tracing::warn!(
                    "Ignoring {ENV_KEY_BITS}={raw:?}: expected an integer >= {MIN_KEY_BITS}"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_INCLUDE_HIDDEN) {
            config.include_hidden = raw == "1" || raw.eq_ignore_ascii_case("true");
        }

        config
    }
}
