//! HMAC-SHA256 signatures shared with the payment gateway.
//!
//! Both signatures are lowercase hex. Verification decodes the presented
//! value and compares it in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, message: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so `new_from_slice` cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn matches(expected: &[u8], presented_hex: &str) -> bool {
    let Ok(presented) = hex::decode(presented_hex.trim()) else {
        return false;
    };
    !expected.is_empty() && expected.len() == presented.len() && bool::from(expected.ct_eq(&presented))
}

/// Signature over `"{gateway_order_id}|{payment_id}"` returned by checkout.
pub fn payment_signature(secret: &str, gateway_order_id: &str, payment_id: &str) -> String {
    let message = format!("{gateway_order_id}|{payment_id}");
    hex::encode(mac(secret, message.as_bytes()))
}

pub fn verify_payment_signature(secret: &str, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
    let message = format!("{gateway_order_id}|{payment_id}");
    matches(&mac(secret, message.as_bytes()), signature)
}

/// Signature over the raw webhook body.
pub fn body_signature(secret: &str, body: &[u8]) -> String {
    hex::encode(mac(secret, body))
}

pub fn verify_body_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    matches(&mac(secret, body), signature)
}
