//! Orgbill service layer.
//!
//! Wraps the API client behind a keyed query cache: concurrent consumers
//! of the same key share one in-flight request and one cache entry, and
//! observers are notified of entry state changes through watch channels.

pub mod cache;
pub mod keys;
pub mod subscription;

pub use cache::{QueryCache, QueryOptions, QueryOutcome, QueryState};
pub use keys::{subscription_keys, QueryKey};
pub use subscription::{PrefetchTrigger, SubscriptionService};
