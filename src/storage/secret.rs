use crate::error::SharedKeyError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Size in bytes of the shared secret.
pub const SHARED_KEY_SIZE: usize = 32;

/// A shared secret of exactly [`SHARED_KEY_SIZE`] bytes.
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; SHARED_KEY_SIZE]);

impl SharedKey {
    /// Decode a key from standard base64.
    ///
    /// # Errors
    ///
    /// Returns [`SharedKeyError::Decode`] if the value is not valid base64 and
    /// [`SharedKeyError::Length`] if it does not decode to exactly
    /// [`SHARED_KEY_SIZE`] bytes.
    ///
    /// ```rust
    /// use hotswap_plane::storage::SharedKey;
    ///
    /// let key = SharedKey::from_base64("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=").unwrap();
    /// assert_eq!(key.as_bytes(), &[0u8; 32]);
    /// assert!(SharedKey::from_base64("c2hvcnQ=").is_err());
    /// ```
    pub fn from_base64(encoded: &str) -> Result<Self, SharedKeyError> {
        let decoded = STANDARD.decode(encoded)?;
        let key: [u8; SHARED_KEY_SIZE] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| SharedKeyError::Length {
                    expected: SHARED_KEY_SIZE,
                    actual: decoded.len(),
                })?;
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SHARED_KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; SHARED_KEY_SIZE]> for SharedKey {
    fn from(bytes: [u8; SHARED_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}
