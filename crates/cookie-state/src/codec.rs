//! Authenticated cookie codec
//!
//! Encoded format: `{timestamp}.{payload}.{signature}`, all parts URL-safe
//! base64 (no padding) except the decimal unix timestamp.
//!
//! - `payload` is the JSON serialization of the value, encrypted with
//!   AES-256-GCM when a block key is configured (`nonce || ciphertext`).
//! - `signature` is HMAC-SHA256 over `{cookie_name}|{timestamp}|{payload}`.
//!   Binding the cookie name stops a value minted for one cookie from being
//!   replayed under another.
//!
//! The signature is verified before anything else is parsed, so a tampered
//! value never reaches the JSON decoder.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use axum_extra::extract::cookie::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use ring::hmac;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::cookies::{CookieOptions, build_cookie};
use crate::error::{CodecError, Result};

/// Minimum accepted signing key length in bytes.
pub const MIN_HASH_KEY_LEN: usize = 32;

/// Default validity window of a signed value, independent of the cookie's
/// own Max-Age attribute.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 3600);

const NONCE_LEN: usize = 12;

/// Signs and optionally encrypts cookie values.
///
/// Holds no per-request state. One instance is built at startup and shared.
pub struct CookieCodec {
    signing_key: hmac::Key,
    cipher: Option<Aes256Gcm>,
    max_age: Duration,
}

impl CookieCodec {
    /// Build a codec from a signing key and an optional encryption key.
    ///
    /// The block key may be any non-empty length; it is stretched to 32 bytes
    /// with SHA-256 to form the AES-256 key.
    pub fn new(hash_key: &[u8], block_key: Option<&[u8]>) -> Result<Self> {
        if hash_key.len() < MIN_HASH_KEY_LEN {
            return Err(CodecError::Misconfigured(format!(
                "hash key must be at least {MIN_HASH_KEY_LEN} bytes, got {}",
                hash_key.len()
            )));
        }

        let cipher = match block_key {
            Some([]) => {
                return Err(CodecError::Misconfigured("block key is empty".into()));
            }
            Some(key) => {
                let derived = Sha256::digest(key);
                let cipher = Aes256Gcm::new_from_slice(&derived)
                    .map_err(|e| CodecError::Misconfigured(format!("invalid block key: {e}")))?;
                Some(cipher)
            }
            None => None,
        };

        Ok(Self {
            signing_key: hmac::Key::new(hmac::HMAC_SHA256, hash_key),
            cipher,
            max_age: DEFAULT_MAX_AGE,
        })
    }

    /// Whether values are encrypted as well as signed.
    pub fn encrypts(&self) -> bool {
        self.cipher.is_some()
    }

    /// Encode `value` into an opaque, tamper-evident cookie value.
    ///
    /// Only fails when the value cannot be serialized or the cipher rejects
    /// the input, both of which indicate a programming or key error.
    pub fn encode<T: Serialize>(&self, name: &str, value: &T) -> Result<String> {
        let json = serde_json::to_vec(value).map_err(|e| {
            CodecError::Misconfigured(format!("serializing cookie {name}: {e}"))
        })?;

        let payload = match &self.cipher {
            Some(cipher) => encrypt(cipher, &json)?,
            None => json,
        };

        let body = URL_SAFE_NO_PAD.encode(payload);
        let timestamp = unix_now();
        let tag = hmac::sign(
            &self.signing_key,
            signed_message(name, timestamp, &body).as_bytes(),
        );

        Ok(format!(
            "{timestamp}.{body}.{}",
            URL_SAFE_NO_PAD.encode(tag.as_ref())
        ))
    }

    /// Decode a value produced by [`encode`](Self::encode) for the same cookie name.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> Result<T> {
        let mut parts = value.splitn(3, '.');
        let (Some(timestamp), Some(body), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Malformed(format!(
                "cookie {name} is not timestamp.payload.signature"
            )));
        };

        let tag = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CodecError::Integrity(format!("cookie {name} has an unreadable signature")))?;
        hmac::verify(
            &self.signing_key,
            signed_message(name, timestamp, body).as_bytes(),
            &tag,
        )
        .map_err(|_| CodecError::Integrity(format!("signature mismatch for cookie {name}")))?;

        let issued: u64 = timestamp
            .parse()
            .map_err(|e| CodecError::Malformed(format!("cookie {name} timestamp: {e}")))?;
        if unix_now().saturating_sub(issued) > self.max_age.as_secs() {
            return Err(CodecError::Expired);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| CodecError::Malformed(format!("cookie {name} payload: {e}")))?;

        let json = match &self.cipher {
            Some(cipher) => decrypt(cipher, &payload)?,
            None => payload,
        };

        serde_json::from_slice(&json)
            .map_err(|e| CodecError::Malformed(format!("cookie {name} contents: {e}")))
    }

    /// Read and decode cookie `name` from the incoming jar.
    ///
    /// A missing cookie is not an error: it yields `T::default()`.
    pub fn read<T: DeserializeOwned + Default>(&self, jar: &CookieJar, name: &str) -> Result<T> {
        match jar.get(name) {
            Some(cookie) => self.decode(name, cookie.value()),
            None => Ok(T::default()),
        }
    }

    /// Encode `value` and add it to the outgoing jar as cookie `name`.
    pub fn write<T: Serialize>(
        &self,
        jar: CookieJar,
        name: &str,
        value: &T,
        options: CookieOptions,
    ) -> Result<CookieJar> {
        let encoded = self.encode(name, value)?;
        Ok(jar.add(build_cookie(name, encoded, options)))
    }
}

impl fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieCodec")
            .field("signing_key", &"[REDACTED]")
            .field("encrypts", &self.cipher.is_some())
            .field("max_age", &self.max_age)
            .finish()
    }
}

fn signed_message(name: &str, timestamp: impl fmt::Display, body: &str) -> String {
    format!("{name}|{timestamp}|{body}")
}

fn encrypt(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CodecError::Misconfigured(format!("encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn decrypt(cipher: &Aes256Gcm, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(CodecError::Malformed("encrypted payload too short".into()));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CodecError::Integrity("payload failed authenticated decryption".into()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
