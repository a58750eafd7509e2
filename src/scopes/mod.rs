//! Per-group scoped clients.
//!
//! Every group name owns at most one [`ConfigScope`] and one
//! [`NamingScope`], created lazily by the
//! [`ScopeRegistry`](crate::ScopeRegistry) and alive for the registry's
//! lifetime. Scopes own the bookkeeping of everything issued through them:
//! - config watches, deduplicated per `(data_id, group)`
//! - ephemeral instance registrations, keyed by `hash(ip, port)`
//! - service-change subscriptions, deduplicated per `(service, group)`
//!
//! All scope maps sit behind async locks so the dedup existence check, the
//! backend acknowledgment and the entry update form one critical section.
//! Change callbacks run on the backend's delivery task and are never
//! serialized against other watches.

mod config;
mod naming;

pub use config::*;
pub use naming::*;
