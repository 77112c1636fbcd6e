//! Ed25519 signatures and maker/checker dual verification.
//!
//! Key and signature material arrives as text. Hex is tried first, then the
//! standard and URL-safe base64 alphabets, padded or not.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Decode text key material of an exact byte length.
fn decode_material<const N: usize>(text: &str) -> Option<[u8; N]> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(bytes) = hex::decode(text) {
        if let Ok(arr) = <[u8; N]>::try_from(bytes) {
            return Some(arr);
        }
    }

    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .filter_map(|engine| engine.decode(text).ok())
        .find_map(|bytes| <[u8; N]>::try_from(bytes).ok())
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex or base64 text.
    pub fn decode(text: &str) -> Result<Self> {
        decode_material::<32>(text)
            .map(Self)
            .ok_or(CoreError::InvalidPublicKey)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl From<[u8; 32]> for PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Standard padded base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Parse from hex or base64 text.
    pub fn decode(text: &str) -> Result<Self> {
        decode_material::<64>(text)
            .map(Self)
            .ok_or(CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

impl From<[u8; 64]> for Signature {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

/// A signing keypair.
///
/// Keys are only ever derived from fixed seeds here; issuing keys is the
/// operator's job.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Decode a public key from hex or base64 text.
pub fn decode_public_key(text: &str) -> Result<PublicKey> {
    PublicKey::decode(text)
}

/// Decode a signature from hex or base64 text.
pub fn decode_signature(text: &str) -> Result<Signature> {
    Signature::decode(text)
}

/// Verify `signature` over `payload` with `public_key`, both given as text.
///
/// Malformed keys and signatures verify as `false`; this never errors.
pub fn verify(payload: &[u8], signature: &str, public_key: &str) -> bool {
    let (Ok(key), Ok(sig)) = (PublicKey::decode(public_key), Signature::decode(signature)) else {
        return false;
    };
    key.verify(payload, &sig).is_ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Dual signatures
// ─────────────────────────────────────────────────────────────────────────────

/// Which half of a maker/checker pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    Maker,
    Checker,
}

impl SignerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerRole::Maker => "maker",
            SignerRole::Checker => "checker",
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered public keys for a maker/checker pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuoKeys<'a> {
    pub maker_key: Option<&'a str>,
    pub checker_key: Option<&'a str>,
}

/// Outcome for one signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignerStatus {
    pub present: bool,
    pub verified: bool,
}

/// Result of checking both signatures independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuoVerification {
    pub ok: bool,
    pub maker: SignerStatus,
    pub checker: SignerStatus,
    pub errors: Vec<String>,
}

/// Check a maker signature and a checker signature over the same payload.
///
/// Both halves are always evaluated, so `errors` lists every problem found.
/// `ok` holds only when both signatures are present and verify.
pub fn verify_duo(
    payload: &[u8],
    maker_signature: Option<&str>,
    checker_signature: Option<&str>,
    keys: DuoKeys<'_>,
) -> DuoVerification {
    let mut errors = Vec::new();
    let maker = check_signer(
        SignerRole::Maker,
        payload,
        maker_signature,
        keys.maker_key,
        &mut errors,
    );
    let checker = check_signer(
        SignerRole::Checker,
        payload,
        checker_signature,
        keys.checker_key,
        &mut errors,
    );

    DuoVerification {
        ok: maker.verified && checker.verified,
        maker,
        checker,
        errors,
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|s| !s.is_empty())
}

fn check_signer(
    role: SignerRole,
    payload: &[u8],
    signature: Option<&str>,
    key: Option<&str>,
    errors: &mut Vec<String>,
) -> SignerStatus {
    let Some(signature) = non_blank(signature) else {
        errors.push(format!("{role} signature missing"));
        return SignerStatus::default();
    };
    let rejected = SignerStatus {
        present: true,
        verified: false,
    };

    let Some(key) = non_blank(key) else {
        errors.push(format!("{role} public key missing"));
        return rejected;
    };
    let Ok(key) = PublicKey::decode(key) else {
        errors.push(format!("{role} public key malformed"));
        return rejected;
    };
    let Ok(signature) = Signature::decode(signature) else {
        errors.push(format!("{role} signature malformed"));
        return rejected;
    };

    match key.verify(payload, &signature) {
        Ok(()) => SignerStatus {
            present: true,
            verified: true,
        },
        Err(CoreError::InvalidPublicKey) => {
            errors.push(format!("{role} public key malformed"));
            rejected
        }
        Err(_) => {
            errors.push(format!("{role} signature invalid"));
            rejected
        }
    }
}
