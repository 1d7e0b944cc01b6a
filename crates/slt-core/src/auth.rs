use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};

use crate::HelloAuth;

/// Computes the identify proof for a salted challenge.
///
/// `secret = base64(sha256(password + salt))`, then
/// `proof = base64(sha256(secret + challenge))`.
pub fn auth_proof(password: &str, salt: &str, challenge: &str) -> String {
    let secret = sha256_base64(&[password.as_bytes(), salt.as_bytes()]);
    sha256_base64(&[secret.as_bytes(), challenge.as_bytes()])
}

/// Returns the `authentication` value for an identify frame, or `None` when
/// the server issued no challenge or no password is configured.
pub fn identify_authentication(challenge: Option<&HelloAuth>, password: Option<&str>) -> Option<String> {
    let auth = challenge?;
    let password = password.filter(|password| !password.is_empty())?;
    Some(auth_proof(password, &auth.salt, &auth.challenge))
}

fn sha256_base64(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    BASE64.encode(hasher.finalize())
}
