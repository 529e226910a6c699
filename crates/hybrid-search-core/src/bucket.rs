//! Search id generation and A/B bucket assignment.
//!
//! Bucket is computed locally from the freshly generated `search_id` on
//! every call, never read from or written to shared state, so concurrent
//! requests in different buckets can never race on a mutable attribute.

use crate::model::Bucket;
use uuid::Uuid;

/// A 16-hex-digit opaque search id, the first half of a v4 UUID's hex form.
pub fn generate_search_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw[..16].to_string()
}

/// Bucket is deterministic in the parity of `search_id`'s last hex digit:
/// even -> control, odd -> variant.
pub fn bucket_for(search_id: &str) -> Bucket {
    let last = search_id.chars().last().unwrap_or('0');
    let value = last.to_digit(16).unwrap_or(0);
    if value % 2 == 0 {
        Bucket::Control
    } else {
        Bucket::Variant
    }
}

/// Effective `(alpha, beta)` fusion weights for a bucket, given the
/// process-wide defaults and the configured A/B variant weights.
pub fn weights_for(bucket: Bucket, default: (f64, f64), variant: (f64, f64)) -> (f64, f64) {
    match bucket {
        Bucket::Control => default,
        Bucket::Variant => variant,
    }
}
