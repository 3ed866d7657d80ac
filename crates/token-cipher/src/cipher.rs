//! AES-GCM sealing and opening of token strings.
//!
//! Each call draws a fresh 96-bit nonce from the OS RNG. Nonce reuse under
//! one key breaks GCM confidentiality, so nonces are never derived or cached.

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, Nonce, OsRng, Tag};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::key::{EncryptionKey, KeySize};

/// Nonce length in bytes (96 bits, standard for GCM)
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Minimum decoded length of a well-formed token
pub const HEADER_LEN: usize = NONCE_LEN + TAG_LEN;

/// Stored tokens carry no associated data.
const ASSOCIATED_DATA: &[u8] = b"";

type Aes192Gcm = AesGcm<Aes192, U12>;

enum Variant {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

/// Encrypts and decrypts tokens under one fixed key.
///
/// Holds no mutable state; share it behind an `Arc` across requests.
pub struct TokenCipher {
    variant: Variant,
    size: KeySize,
}

impl TokenCipher {
    pub fn new(key: &EncryptionKey) -> Result<Self> {
        let bytes = key.expose();
        let variant = match key.size() {
            KeySize::Aes128 => Aes128Gcm::new_from_slice(bytes).map(Variant::Aes128),
            KeySize::Aes192 => Aes192Gcm::new_from_slice(bytes).map(Variant::Aes192),
            KeySize::Aes256 => Aes256Gcm::new_from_slice(bytes).map(Variant::Aes256),
        }
        .map_err(|_| Error::KeyConfiguration("key rejected by AES-GCM".into()))?;

        debug!(key_bits = key.size().bits(), "token cipher initialized");
        Ok(Self {
            variant,
            size: key.size(),
        })
    }

    /// Build a cipher straight from a hex-encoded key.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        Self::new(&EncryptionKey::from_hex(key_hex)?)
    }

    pub fn key_size(&self) -> KeySize {
        self.size
    }

    /// Seal `plaintext` into a storage-safe base64 string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let sealed = match &self.variant {
            Variant::Aes128(c) => seal(c, plaintext.as_bytes()),
            Variant::Aes192(c) => seal(c, plaintext.as_bytes()),
            Variant::Aes256(c) => seal(c, plaintext.as_bytes()),
        }?;
        Ok(BASE64.encode(sealed))
    }

    /// Open a token produced by [`TokenCipher::encrypt`].
    ///
    /// Returns `MalformedInput` when the decoded blob cannot even hold a nonce
    /// and tag; every other failure is a bare `Authentication`.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| Error::Authentication)?;
        if bytes.len() < HEADER_LEN {
            return Err(Error::MalformedInput(bytes.len()));
        }

        let plaintext = match &self.variant {
            Variant::Aes128(c) => open(c, &bytes),
            Variant::Aes192(c) => open(c, &bytes),
            Variant::Aes256(c) => open(c, &bytes),
        }?;

        String::from_utf8(plaintext).map_err(|e| {
            let mut raw = e.into_bytes();
            raw.zeroize();
            Error::Encoding("decrypted token is not valid UTF-8".into())
        })
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher")
            .field("key_size", &self.size)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn seal<C>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>>
where
    C: AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    let nonce = C::generate_nonce(&mut OsRng);
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, ASSOCIATED_DATA, &mut buffer)
        .map_err(|_| Error::Encoding("AES-GCM refused the plaintext".into()))?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + buffer.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&tag);
    sealed.extend_from_slice(&buffer);
    Ok(sealed)
}

fn open<C>(cipher: &C, bytes: &[u8]) -> Result<Vec<u8>>
where
    C: AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    let (nonce, rest) = bytes.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::<C>::from_slice(nonce),
            ASSOCIATED_DATA,
            &mut buffer,
            Tag::<C>::from_slice(tag),
        )
        .map_err(|_| Error::Authentication)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::Aead;
    use std::collections::HashSet;
    use std::sync::Arc;

    const KEY_A: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const KEY_B: &str = "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100";

    fn cipher(key: &str) -> TokenCipher {
        TokenCipher::from_hex(key).unwrap()
    }

    #[test]
    fn roundtrip_preserves_plaintext() {
        let c = cipher(KEY_A);
        for plaintext in [
            "ya29.a0AfH6SMBx-access-token",
            "1//0gRefreshToken_with-symbols+/=",
            "ünïcødé 🔑",
            "",
            &"x".repeat(4096),
        ] {
            let encoded = c.encrypt(plaintext).unwrap();
            assert_eq!(c.decrypt(&encoded).unwrap(), plaintext);
        }
    }

    #[test]
    fn roundtrip_random_printable_strings() {
        use rand::RngExt;

        const WIDE: [char; 6] = ['é', 'ß', 'Ω', '中', '🔑', 'ñ'];
        let mut rng = rand::rng();
        for key in [
            "000102030405060708090a0b0c0d0e0f",
            "000102030405060708090a0b0c0d0e0f1011121314151617",
            KEY_A,
        ] {
            let c = cipher(key);
            for _ in 0..200 {
                let len = rng.random_range(0..512);
                let plaintext: String = (0..len)
                    .map(|_| {
                        if rng.random_range(0..10) == 0 {
                            WIDE[rng.random_range(0..WIDE.len())]
                        } else {
                            char::from(rng.random_range(0x20u8..0x7f))
                        }
                    })
                    .collect();
                let encoded = c.encrypt(&plaintext).unwrap();
                assert_eq!(c.decrypt(&encoded).unwrap(), plaintext, "key {key}");
            }
        }
    }

    #[test]
    fn roundtrip_for_every_key_size() {
        for key in ["00".repeat(16), "00".repeat(24), "00".repeat(32)] {
            let c = cipher(&key);
            let encoded = c.encrypt("token").unwrap();
            assert_eq!(c.decrypt(&encoded).unwrap(), "token");
        }
    }

    #[test]
    fn encoded_layout_is_nonce_tag_ciphertext() {
        let c = cipher(KEY_A);
        let encoded = c.encrypt("abcdef").unwrap();
        let bytes = BASE64.decode(&encoded).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 6);
        assert!(!encoded.contains("abcdef"));
    }

    #[test]
    fn same_plaintext_encrypts_differently_every_time() {
        let c = cipher(KEY_A);
        let outputs: HashSet<String> = (0..200).map(|_| c.encrypt("same").unwrap()).collect();
        assert_eq!(outputs.len(), 200, "every encryption must use a fresh nonce");

        let nonces: HashSet<Vec<u8>> = outputs
            .iter()
            .map(|o| BASE64.decode(o).unwrap()[..NONCE_LEN].to_vec())
            .collect();
        assert_eq!(nonces.len(), 200);
    }

    #[test]
    fn flipping_any_decoded_byte_fails_authentication() {
        let c = cipher(KEY_A);
        let encoded = c.encrypt("refresh-token-value").unwrap();
        let bytes = BASE64.decode(&encoded).unwrap();

        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let result = c.decrypt(&BASE64.encode(&tampered));
            assert!(
                matches!(result, Err(Error::Authentication)),
                "byte {i}: expected Authentication, got {result:?}"
            );
        }
    }

    #[test]
    fn flipping_any_encoded_character_never_yields_plaintext() {
        let c = cipher(KEY_A);
        let encoded = c.encrypt("access-token-value").unwrap();

        for i in 0..encoded.len() {
            let mut tampered = encoded.clone().into_bytes();
            tampered[i] ^= 0x01;
            let tampered = String::from_utf8(tampered).unwrap();
            let result = c.decrypt(&tampered);
            assert!(
                matches!(result, Err(Error::Authentication)),
                "char {i}: expected Authentication, got {result:?}"
            );
        }
    }

    #[test]
    fn wrong_key_fails() {
        let encoded = cipher(KEY_A).encrypt("secret").unwrap();
        let result = cipher(KEY_B).decrypt(&encoded);
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn short_input_is_malformed() {
        let c = cipher(KEY_A);
        let short = BASE64.encode([0u8; HEADER_LEN - 1]);
        assert!(matches!(
            c.decrypt(&short),
            Err(Error::MalformedInput(27))
        ));
        assert!(matches!(c.decrypt(""), Err(Error::MalformedInput(0))));
    }

    #[test]
    fn header_only_input_fails_authentication() {
        // A nonce and tag with an empty ciphertext is structurally valid.
        let c = cipher(KEY_A);
        let header_only = BASE64.encode([0u8; HEADER_LEN]);
        assert!(matches!(
            c.decrypt(&header_only),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn non_base64_input_fails_authentication() {
        let c = cipher(KEY_A);
        assert!(matches!(
            c.decrypt("not base64 at all!!"),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn reads_tokens_sealed_with_detached_tag_layout() {
        // The aead crate appends the tag; stored tokens put it before the
        // ciphertext. Build one by hand and check it opens.
        let key_bytes = hex::decode(KEY_A).unwrap();
        let raw = Aes256Gcm::new_from_slice(&key_bytes).unwrap();
        let nonce = [7u8; NONCE_LEN];
        let ct_and_tag = raw
            .encrypt(Nonce::<Aes256Gcm>::from_slice(&nonce), b"legacy-token".as_ref())
            .unwrap();
        let (ct, tag) = ct_and_tag.split_at(ct_and_tag.len() - TAG_LEN);

        let mut stored = nonce.to_vec();
        stored.extend_from_slice(tag);
        stored.extend_from_slice(ct);

        let c = cipher(KEY_A);
        assert_eq!(c.decrypt(&BASE64.encode(stored)).unwrap(), "legacy-token");
    }

    #[test]
    fn concurrent_use_from_many_threads() {
        let c = Arc::new(cipher(KEY_A));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let plaintext = format!("token-{i}-{j}");
                        let encoded = c.encrypt(&plaintext).unwrap();
                        assert_eq!(c.decrypt(&encoded).unwrap(), plaintext);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn debug_never_shows_key() {
        let c = cipher(KEY_A);
        let debug = format!("{c:?}");
        assert!(debug.contains("Aes256"), "got: {debug}");
        assert!(debug.contains("[REDACTED]"), "got: {debug}");
    }

    #[test]
    fn invalid_key_is_a_configuration_error() {
        assert!(matches!(
            TokenCipher::from_hex("deadbeef"),
            Err(Error::KeyConfiguration(_))
        ));
    }
}
