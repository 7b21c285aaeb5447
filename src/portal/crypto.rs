//! Password encryption for the login form.
//!
//! The portal publishes its RSA public key as base64-encoded big-endian
//! modulus and exponent; the login form expects the PKCS#1 v1.5 ciphertext of
//! the UTF-8 password, base64-encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::rand_core::OsRng;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("public key {field} is not valid base64")]
    Encoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("portal public key was rejected")]
    InvalidKey(#[source] rsa::Error),
    #[error("password could not be encrypted")]
    Encrypt(#[source] rsa::Error),
}

/// Build the portal's public key from its base64 components.
pub fn public_key(modulus_b64: &str, exponent_b64: &str) -> Result<RsaPublicKey, CryptoError> {
    let n = decode_component("modulus", modulus_b64)?;
    let e = decode_component("exponent", exponent_b64)?;
    RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
        .map_err(CryptoError::InvalidKey)
}

/// Encrypt `password` for the `mm` login field. Output differs on every call.
pub fn encrypt_password(
    password: &str,
    modulus_b64: &str,
    exponent_b64: &str,
) -> Result<String, CryptoError> {
    let key = public_key(modulus_b64, exponent_b64)?;
    let ciphertext = key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, password.as_bytes())
        .map_err(CryptoError::Encrypt)?;
    Ok(STANDARD.encode(ciphertext))
}

/// Base64 for binary payloads such as the captcha image.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Inverse of [`encode_bytes`]; tolerates a `data:` URL prefix.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = text.split_once(',').map_or(text, |(_, rest)| rest);
    STANDARD.decode(payload.trim())
}

fn decode_component(field: &'static str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value.trim())
        .map_err(|source| CryptoError::Encoding { field, source })
}
