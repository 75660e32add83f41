// Payment signature verification
// HMAC-SHA256 over "<order_id>|<payment_id>" with the gateway key secret, hex encoded

use ring::hmac;
use subtle::ConstantTimeEq;

#[derive(Clone)]
pub struct SignatureVerifier {
    key: hmac::Key,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    /// Lowercase hex signature the gateway would produce for this pair
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        let payload = format!("{}|{}", order_id, payment_id);
        hex::encode(hmac::sign(&self.key, payload.as_bytes()).as_ref())
    }

    /// Constant-time comparison against the expected signature
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let expected = self.sign(order_id, payment_id);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}
