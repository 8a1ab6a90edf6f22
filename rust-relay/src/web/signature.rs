//! Callback URL signatures.
//!
//! The Call Provider fetches our callback URLs asynchronously, so each URL
//! carries a signature binding it to the profile id.
//!
//! The default scheme is `hex(md5(base64(profile_id)))`. It has no secret and
//! only offers tamper evidence, but it is kept byte-compatible so URLs issued
//! by earlier deployments stay valid. Setting `CALLBACK_SIGNING_KEY` switches
//! to HMAC-SHA256, which invalidates every URL issued under the legacy scheme.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// How callback signatures are derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Unkeyed `hex(md5(base64(profile_id)))`
    #[default]
    Legacy,
    /// `hex(hmac_sha256(key, profile_id))`
    Keyed(String),
}

impl SignatureScheme {
    /// Pick the scheme from an optional signing key.
    pub fn from_key(key: Option<&str>) -> Self {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => SignatureScheme::Keyed(k.to_string()),
            None => SignatureScheme::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignatureScheme::Legacy => "legacy-md5",
            SignatureScheme::Keyed(_) => "hmac-sha256",
        }
    }

    /// Derive the signature for a profile id.
    pub fn sign(&self, profile_id: &str) -> String {
        match self {
            SignatureScheme::Legacy => sign(profile_id),
            SignatureScheme::Keyed(key) => keyed_sign(key, profile_id).unwrap_or_default(),
        }
    }

    /// Check a signature taken from a callback URL.
    pub fn verify(&self, profile_id: &str, signature: &str) -> bool {
        let expected = self.sign(profile_id);
        let valid = !expected.is_empty() && constant_time_compare(&expected, signature);

        if !valid {
            warn!(
                profile_id = %profile_id,
                scheme = self.name(),
                expected_length = expected.len(),
                actual_length = signature.len(),
                "callback_signature_mismatch"
            );
        }

        valid
    }
}

/// Legacy signature: `hex(md5(base64(profile_id)))`.
pub fn sign(profile_id: &str) -> String {
    let encoded = STANDARD.encode(profile_id.as_bytes());
    hex::encode(Md5::digest(encoded.as_bytes()))
}

fn keyed_sign(key: &str, profile_id: &str) -> Option<String> {
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("callback_signature_invalid_key");
            return None;
        }
    };
    mac.update(profile_id.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Legacy verification: exact, case-sensitive match against [`sign`].
pub fn verify(profile_id: &str, signature: &str) -> bool {
    SignatureScheme::Legacy.verify(profile_id, signature)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
