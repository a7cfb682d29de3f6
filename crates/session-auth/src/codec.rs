//! Authenticated encryption of token records at rest
//!
//! Blobs are `base64(nonce || ciphertext)` under AES-256-GCM with a fresh
//! random nonce per write. The GCM tag makes any corruption, truncation or
//! wrong-key read fail as a whole: decryption yields either the exact record
//! that was written or nothing.
//!
//! Key material comes from a `KeyProvider` (the platform keystore in
//! production) and is only held by the cipher instance.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use rand::RngExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::constants::{KEY_LEN, NONCE_LEN};
use crate::error::{Error, Result};
use crate::record::{TokenMetadata, TokenRecord};

/// Source of the symmetric encryption key.
pub trait KeyProvider: Send + Sync {
    fn encryption_key(&self) -> Result<Secret<Vec<u8>>>;
}

/// A key supplied up front, e.g. read from an env var or a keystore export.
pub struct StaticKey {
    key: Secret<Vec<u8>>,
}

impl StaticKey {
    pub fn new(key: Secret<Vec<u8>>) -> Self {
        Self { key }
    }

    /// Decode a standard-base64 key. Length is checked when the codec is built.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Encryption(format!("invalid base64 key: {e}")))?;
        Ok(Self::new(Secret::new(bytes)))
    }
}

impl KeyProvider for StaticKey {
    fn encryption_key(&self) -> Result<Secret<Vec<u8>>> {
        Ok(self.key.clone())
    }
}

pub struct Codec {
    cipher: Aes256Gcm,
}

impl Codec {
    pub fn new(keys: &dyn KeyProvider) -> Result<Self> {
        let key = keys.encryption_key()?;
        if key.expose().len() != KEY_LEN {
            return Err(Error::Encryption(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                key.expose().len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key.expose())
            .map_err(|e| Error::Encryption(format!("failed to init cipher: {e}")))?;
        Ok(Self { cipher })
    }

    /// Serialize `value` to JSON and seal it.
    pub fn encrypt<T: Serialize>(&self, value: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|e| Error::Encryption(format!("serializing payload: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| Error::Encryption(format!("cipher failure: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    /// Open a blob produced by `encrypt` and deserialize it.
    pub fn decrypt<T: DeserializeOwned>(&self, blob: &str) -> Result<T> {
        let combined = STANDARD
            .decode(blob)
            .map_err(|e| Error::Decryption(format!("invalid base64: {e}")))?;
        if combined.len() <= NONCE_LEN {
            return Err(Error::Decryption("ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::Decryption("authentication tag mismatch".into()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Decryption(format!("malformed payload: {e}")))
    }

    pub fn encrypt_record(&self, record: &TokenRecord) -> Result<String> {
        record.validate()?;
        self.encrypt(record)
    }

    /// `None` for anything that is not an intact, valid record.
    pub fn decrypt_record(&self, blob: &str) -> Option<TokenRecord> {
        let record = self
            .decrypt::<TokenRecord>(blob)
            .and_then(|r| r.validate().map(|()| r));
        match record {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "token blob rejected");
                None
            }
        }
    }

    pub fn encrypt_metadata(&self, metadata: &TokenMetadata) -> Result<String> {
        self.encrypt(metadata)
    }

    pub fn decrypt_metadata(&self, blob: &str) -> Option<TokenMetadata> {
        match self.decrypt::<TokenMetadata>(blob) {
            Ok(metadata) if metadata.expires_at > metadata.issued_at => Some(metadata),
            Ok(_) => {
                debug!("metadata blob has inverted timestamps");
                None
            }
            Err(e) => {
                debug!(error = %e, "metadata blob rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec_with(byte: u8) -> Codec {
        Codec::new(&StaticKey::new(Secret::new(vec![byte; KEY_LEN]))).unwrap()
    }

    fn sample_record() -> TokenRecord {
        TokenRecord::new(
            "at_abc".into(),
            Some("rt_def".into()),
            "Bearer".into(),
            1_760_000_000_000,
            1_760_003_600_000,
        )
        .unwrap()
    }

    fn flip_byte(blob: &str, index: usize) -> String {
        let mut bytes = STANDARD.decode(blob).unwrap();
        let i = index % bytes.len();
        bytes[i] ^= 0x01;
        STANDARD.encode(bytes)
    }

    #[test]
    fn record_roundtrip() {
        let codec = codec_with(7);
        let record = sample_record();
        let blob = codec.encrypt_record(&record).unwrap();
        assert_eq!(codec.decrypt_record(&blob), Some(record));
    }

    #[test]
    fn record_without_refresh_token_roundtrips() {
        let codec = codec_with(7);
        let mut record = sample_record();
        record.refresh_token = None;
        let blob = codec.encrypt_record(&record).unwrap();
        assert_eq!(codec.decrypt_record(&blob), Some(record));
    }

    #[test]
    fn metadata_roundtrip() {
        let codec = codec_with(7);
        let metadata = sample_record().metadata();
        let blob = codec.encrypt_metadata(&metadata).unwrap();
        assert_eq!(codec.decrypt_metadata(&blob), Some(metadata));
    }

    #[test]
    fn flipping_any_byte_is_rejected() {
        let codec = codec_with(7);
        let blob = codec.encrypt_record(&sample_record()).unwrap();
        let len = STANDARD.decode(&blob).unwrap().len();
        for i in 0..len {
            assert!(
                codec.decrypt_record(&flip_byte(&blob, i)).is_none(),
                "tampered byte {i} was accepted"
            );
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let blob = codec_with(7).encrypt_record(&sample_record()).unwrap();
        assert!(codec_with(8).decrypt_record(&blob).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = codec_with(7);
        assert!(codec.decrypt_record("").is_none());
        assert!(codec.decrypt_record("not base64 !!").is_none());
        assert!(codec.decrypt_record("AAAA").is_none());
        assert!(codec.decrypt_metadata("corrupted-value").is_none());
    }

    #[test]
    fn metadata_blob_is_not_a_record() {
        let codec = codec_with(7);
        let blob = codec.encrypt_metadata(&sample_record().metadata()).unwrap();
        assert!(codec.decrypt_record(&blob).is_none());
    }

    #[test]
    fn nonces_differ_between_writes() {
        let codec = codec_with(7);
        let record = sample_record();
        let a = codec.encrypt_record(&record).unwrap();
        let b = codec.encrypt_record(&record).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_record_is_not_encrypted() {
        let codec = codec_with(7);
        let mut record = sample_record();
        record.access_token.clear();
        assert!(matches!(
            codec.encrypt_record(&record),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn short_key_is_rejected() {
        let result = Codec::new(&StaticKey::new(Secret::new(vec![1u8; 16])));
        assert!(matches!(result, Err(Error::Encryption(_))));
    }

    #[test]
    fn base64_key_is_decoded() {
        let encoded = STANDARD.encode([3u8; KEY_LEN]);
        let key = StaticKey::from_base64(&format!("{encoded}\n")).unwrap();
        assert!(Codec::new(&key).is_ok());
        assert!(StaticKey::from_base64("%%%").is_err());
    }
}
