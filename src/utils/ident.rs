//! Stable short identifiers for deduplication.
//!
//! Watches, subscriptions and registrations are all keyed by a digest over
//! their structured identity, so repeated requests for the same logical
//! resource always map to the same id. Components are length-prefixed before
//! hashing so adjacent fields can never alias each other.

use sha2::Digest;
use sha2::Sha256;

/// Hex length of every identifier produced by this module.
pub const IDENT_LEN: usize = 16;

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let out = hasher.finalize();
    hex::encode(&out[..IDENT_LEN / 2])
}

/// Identifier of a configuration watch: one per (data_id, group) pair.
pub fn watch_id(
    data_id: &str,
    group: &str,
) -> String {
    digest(&["cfg-watch", data_id, group])
}

/// Identifier of a service-change subscription: one per (service, group) pair.
pub fn subscription_id(
    service_name: &str,
    group: &str,
) -> String {
    digest(&["svc-watch", service_name, group])
}

/// Identifier of an instance registration, keyed by network address.
///
/// Multiple registrations per scope are allowed as long as they differ in
/// ip or port.
pub fn instance_id(
    ip: &str,
    port: u32,
) -> String {
    digest(&["instance", ip, &port.to_string()])
}
