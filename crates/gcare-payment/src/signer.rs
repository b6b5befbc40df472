//! HMAC-SHA512 over the canonical string.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Keyed signer. The key schedule is computed once; each signature clones it.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha512,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Signer(<REDACTED>)")
    }
}

impl Signer {
    /// `None` only if the MAC refuses the key, which HMAC never does for any
    /// length; an empty key is refused here explicitly.
    pub fn new(secret: &str) -> Option<Self> {
        if secret.is_empty() {
            return None;
        }
        let mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
        Some(Self { mac })
    }

    /// Lowercase hex digest of `data`.
    pub fn sign(&self, data: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison against a hex signature of either case.
    /// Malformed hex is simply a mismatch.
    pub fn verify(&self, data: &str, signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(data.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_128_lowercase_hex_chars() {
        let s = Signer::new("SECRETKEY").unwrap();
        let sig = s.sign("vnp_Amount=100");
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(sig, s.sign("vnp_Amount=100"), "deterministic");
    }

    #[test]
    fn verify_accepts_either_case() {
        let s = Signer::new("SECRETKEY").unwrap();
        let sig = s.sign("x=1");
        assert!(s.verify("x=1", &sig));
        assert!(s.verify("x=1", &sig.to_ascii_uppercase()));
    }

    #[test]
    fn verify_rejects_wrong_key_data_or_garbage() {
        let a = Signer::new("KEY_A").unwrap();
        let b = Signer::new("KEY_B").unwrap();
        let sig = a.sign("x=1");
        assert!(!b.verify("x=1", &sig));
        assert!(!a.verify("x=2", &sig));
        assert!(!a.verify("x=1", "not-hex"));
        assert!(!a.verify("x=1", ""));
        assert!(!a.verify("x=1", &sig[..64]), "truncated digest");
    }

    #[test]
    fn empty_key_is_refused() {
        assert!(Signer::new("").is_none());
    }
}
