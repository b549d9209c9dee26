//! In-flight request deduplication.
//!
//! The first caller for a signature registers a shared future; later callers
//! with the same signature clone the handle and await the same outcome. The
//! entry is removed by the request itself once it settles.

use std::collections::HashMap;
use std::fmt;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::clients::errors::ApiError;
use crate::clients::http_response::Payload;

pub(crate) type SharedOutcome = Shared<BoxFuture<'static, Result<Payload, ApiError>>>;

/// Whether a caller started the request or attached to one already running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Registration {
    Leader,
    Joined,
}

#[derive(Default)]
pub(crate) struct PendingRequests {
    inner: Mutex<HashMap<String, SharedOutcome>>,
}

impl PendingRequests {
    /// Returns the in-flight future for `signature`, creating it with `start`
    /// if none exists. Lookup and insertion happen under one lock.
    pub(crate) fn join_or_start<F>(&self, signature: &str, start: F) -> (SharedOutcome, Registration)
    where
        F: FnOnce() -> BoxFuture<'static, Result<Payload, ApiError>>,
    {
        let mut map = self.inner.lock();
        if let Some(existing) = map.get(signature) {
            return (existing.clone(), Registration::Joined);
        }
        let shared = start().shared();
        map.insert(signature.to_string(), shared.clone());
        (shared, Registration::Leader)
    }

    pub(crate) fn remove(&self, signature: &str) {
        self.inner.lock().remove(signature);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequests")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_second_caller_joins_first() {
        let pending = PendingRequests::default();
        let starts = Arc::new(AtomicUsize::new(0));

        let make = |starts: Arc<AtomicUsize>| {
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async { Ok(Payload::Text("stock".to_string())) }.boxed()
            }
        };

        let (first, role_a) = pending.join_or_start("GET /x", make(Arc::clone(&starts)));
        let (second, role_b) = pending.join_or_start("GET /x", make(Arc::clone(&starts)));

        assert_eq!(role_a, Registration::Leader);
        assert_eq!(role_b, Registration::Joined);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(pending.len(), 1);

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, b);
        assert_eq!(a.unwrap(), Payload::Text("stock".to_string()));
    }

    #[tokio::test]
    async fn test_joiners_share_errors() {
        let pending = PendingRequests::default();
        let (first, _) = pending.join_or_start("GET /fail", || {
            async { Err(ApiError::http(500, Some("Internal Server Error"))) }.boxed()
        });
        let (second, _) = pending.join_or_start("GET /fail", || unreachable!());

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap_err().status, 500);
        assert_eq!(b.unwrap_err().status, 500);
    }

    #[test]
    fn test_distinct_signatures_do_not_join() {
        let pending = PendingRequests::default();
        let (_, a) = pending.join_or_start("GET /a", || async { Ok(Payload::Json(serde_json::Value::Null)) }.boxed());
        let (_, b) = pending.join_or_start("GET /b", || async { Ok(Payload::Json(serde_json::Value::Null)) }.boxed());

        assert_eq!(a, Registration::Leader);
        assert_eq!(b, Registration::Leader);
        assert_eq!(pending.len(), 2);

        pending.remove("GET /a");
        assert_eq!(pending.len(), 1);
    }
}
