/// HMAC-SHA256 secret claims
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Create a hex-encoded HMAC-SHA256 claim over `data` keyed by `secret`
pub fn create_claim(data: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a claim against the one `secret` would produce, in constant time
pub fn verify_claim(data: &str, secret: &str, claim: &str) -> bool {
    let expected = create_claim(data, secret);
    expected.as_bytes().ct_eq(claim.as_bytes()).into()
}

/// Hex SHA-256 of a DER blob, used as a certificate thumbprint
pub fn thumbprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Constant-time string equality
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
