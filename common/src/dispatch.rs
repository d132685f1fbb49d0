// Manual dispatch authentication: HMAC-SHA256 over the raw request body,
// hex-encoded, verified against the configured dispatch key.

use crate::errors::DispatchError;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh dispatch key (64 hex characters)
pub fn generate_dispatch_key() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 32] = rng.gen();
    hex::encode(random_bytes)
}

/// Sign a dispatch request body. Used by tests and client tooling.
pub fn sign_dispatch(payload: &[u8], key: &str) -> Result<String, DispatchError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| DispatchError::InvalidKey(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the hex-encoded signature of a dispatch request body.
///
/// Comparison happens in constant time via the Mac verifier. A signature
/// that is not valid hex fails verification rather than erroring.
pub fn verify_dispatch_signature(
    payload: &[u8],
    signature: &str,
    key: &str,
) -> Result<(), DispatchError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| DispatchError::InvalidKey(e.to_string()))?;
    mac.update(payload);

    let Ok(signature_bytes) = hex::decode(signature) else {
        return Err(DispatchError::InvalidSignature);
    };

    mac.verify_slice(&signature_bytes)
        .map_err(|_| DispatchError::InvalidSignature)
}
