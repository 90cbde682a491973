// src/utils/signature.rs

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn checkout_mac(secret: &str, order_id: &str, payment_id: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any size"));
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac
}

/// Hex HMAC-SHA256 of `order_id|payment_id`, as the gateway signs checkout callbacks.
pub fn sign_checkout(secret: &str, order_id: &str, payment_id: &str) -> String {
    hex::encode(checkout_mac(secret, order_id, payment_id).finalize().into_bytes())
}

/// Checks a callback signature in constant time. Malformed hex never matches.
pub fn verify_checkout(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    checkout_mac(secret, order_id, payment_id)
        .verify_slice(&provided)
        .is_ok()
}
