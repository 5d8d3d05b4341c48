// PKCE verifier/challenge generation (RFC 7636, S256)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::platform::SecureRandom;
use crate::error::Result;

/// Number of random bytes behind each verifier
const VERIFIER_BYTES: usize = 64;

/// A verifier and its S256 challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a fresh verifier/challenge pair.
///
/// The verifier is 64 random bytes, base64url-encoded without padding
/// (86 characters).
pub fn generate_challenge(rng: &dyn SecureRandom) -> Result<PkcePair> {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rng.fill(&mut bytes)?;

    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = challenge_for(&verifier);

    Ok(PkcePair {
        verifier,
        challenge,
    })
}

/// `BASE64URL(SHA256(verifier))`
pub fn challenge_for(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
