//! Composite query keys.
//!
//! A key is the sole cache identity of a query result: same key, same
//! logical entry. Keys are namespaced so unrelated resources can share one
//! cache without colliding.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Composite cache key: `(namespace, scope, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub namespace: &'static str,
    pub scope: &'static str,
    pub id: String,
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}:{}", self.namespace, self.scope, self.id)
    }
}

/// Key constructors for subscription queries.
pub mod subscription_keys {
    use super::QueryKey;

    /// Cache key for one organization's subscription record.
    pub fn org_subscription(org_slug: &str) -> QueryKey {
        QueryKey {
            namespace: "subscription",
            scope: "org",
            id: org_slug.to_string(),
        }
    }
}
