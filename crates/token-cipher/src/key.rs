//! Encryption key loading
//!
//! The key arrives as a hex string (case-insensitive). Its decoded length
//! selects the AES variant: 16, 24 or 32 bytes. Deployments use 32.

use common::Secret;

use crate::error::{Error, Result};

/// AES key size, derived from the decoded key length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(KeySize::Aes128),
            24 => Some(KeySize::Aes192),
            32 => Some(KeySize::Aes256),
            _ => None,
        }
    }

    pub fn bits(self) -> usize {
        match self {
            KeySize::Aes128 => 128,
            KeySize::Aes192 => 192,
            KeySize::Aes256 => 256,
        }
    }
}

/// Validated symmetric key material.
pub struct EncryptionKey {
    bytes: Secret<Vec<u8>>,
    size: KeySize,
}

impl EncryptionKey {
    /// Wrap raw key bytes, rejecting lengths AES-GCM cannot use.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let size = KeySize::from_len(bytes.len()).ok_or_else(|| {
            Error::KeyConfiguration(format!(
                "key must be 16, 24 or 32 bytes, got {} bytes",
                bytes.len()
            ))
        })?;
        Ok(Self {
            bytes: Secret::new(bytes),
            size,
        })
    }

    /// Decode a hex-encoded key. Surrounding whitespace is ignored.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let trimmed = key_hex.trim();
        if trimmed.is_empty() {
            return Err(Error::KeyConfiguration("key is empty".into()));
        }
        // The hex error names the offending character, which is key material.
        let bytes = hex::decode(trimmed)
            .map_err(|_| Error::KeyConfiguration("key is not valid hex".into()))?;
        Self::from_bytes(bytes)
    }

    pub fn size(&self) -> KeySize {
        self.size
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.bytes.expose()
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("size", &self.size)
            .field("bytes", &self.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_aes_key_lengths() {
        assert_eq!(
            EncryptionKey::from_hex(&"00".repeat(16)).unwrap().size(),
            KeySize::Aes128
        );
        assert_eq!(
            EncryptionKey::from_hex(&"00".repeat(24)).unwrap().size(),
            KeySize::Aes192
        );
        assert_eq!(
            EncryptionKey::from_hex(&"00".repeat(32)).unwrap().size(),
            KeySize::Aes256
        );
        assert_eq!(KeySize::Aes256.bits(), 256);
    }

    #[test]
    fn hex_is_case_insensitive() {
        let lower = EncryptionKey::from_hex(&"ab".repeat(32)).unwrap();
        let upper = EncryptionKey::from_hex(&"AB".repeat(32)).unwrap();
        assert_eq!(lower.expose(), upper.expose());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let key = EncryptionKey::from_hex(&format!("  {}\n", "11".repeat(32))).unwrap();
        assert_eq!(key.expose(), &[0x11; 32]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = EncryptionKey::from_hex(&"00".repeat(20)).unwrap_err();
        assert!(matches!(err, Error::KeyConfiguration(_)));
        assert!(err.to_string().contains("20 bytes"), "got: {err}");
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            EncryptionKey::from_hex("   ").unwrap_err(),
            Error::KeyConfiguration(_)
        ));
    }

    #[test]
    fn invalid_hex_does_not_echo_key_material() {
        let err = EncryptionKey::from_hex(&format!("{}zz", "00".repeat(31))).unwrap_err();
        assert!(matches!(err, Error::KeyConfiguration(_)));
        assert!(!err.to_string().contains('z'), "got: {err}");
    }

    #[test]
    fn debug_redacts_key_bytes() {
        let key = EncryptionKey::from_hex(&"42".repeat(32)).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("[REDACTED]"), "got: {debug}");
        assert!(!debug.contains("66"), "got: {debug}");
    }
}
