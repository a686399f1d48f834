//! Request-scoped value carrier
//!
//! `RequestContext` is an immutable chain of keyed values plus the request id
//! and an optional deadline. Deriving a context never mutates the parent, so a
//! value (such as an open transaction) is only visible to the call tree that
//! received the derived context.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

/// Slot identifier for values stored in a [`RequestContext`].
///
/// Each connection pool implementation owns its own key, so two backends never
/// read each other's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(&'static str);

impl ContextKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

struct Entry {
    key: ContextKey,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

/// Immutable, cheaply clonable request context.
#[derive(Clone)]
pub struct RequestContext {
    request_id: Arc<str>,
    deadline: Option<Instant>,
    values: Option<Arc<Entry>>,
}

impl RequestContext {
    /// Create a root context with a freshly generated request id.
    pub fn new() -> Self {
        Self::with_request_id(generate_request_id())
    }

    /// Create a root context carrying the given request id.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Arc::from(request_id.into()),
            deadline: None,
            values: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a context that expires at `deadline`.
    ///
    /// An earlier deadline already present on the parent is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Derive a context with `value` stored under `key`.
    ///
    /// Later values shadow earlier ones stored under the same key.
    pub fn with_value<T>(&self, key: ContextKey, value: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            values: Some(Arc::new(Entry {
                key,
                value,
                parent: self.values.clone(),
            })),
            ..self.clone()
        }
    }

    /// Look up the nearest value stored under `key`.
    ///
    /// Returns `None` when the key is absent or the stored value is not a `T`.
    pub fn value<T>(&self, key: ContextKey) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let mut cursor = self.values.as_ref();
        while let Some(entry) = cursor {
            if entry.key == key {
                return entry.value.clone().downcast::<T>().ok();
            }
            cursor = entry.parent.as_ref();
        }
        None
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time-derived id with a prefix, e.g. `req::K2J9QW1Z-3`.
///
/// The leading base36 digits of the nanosecond clock barely change between
/// calls, so they are dropped. The clock part wraps; the process-wide
/// sequence suffix keeps ids unique within a process.
pub(crate) fn time_based_id(prefix: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default().unsigned_abs();
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let encoded = to_base36(nanos);
    let trimmed = encoded.get(5..).unwrap_or(&encoded);
    format!("{prefix}::{trimmed}-{}", to_base36(seq))
}

pub fn generate_request_id() -> String {
    time_based_id("req")
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    const KEY_A: ContextKey = ContextKey::new("a");
    const KEY_B: ContextKey = ContextKey::new("b");

    #[test]
    fn derived_context_does_not_touch_parent() {
        let root = RequestContext::with_request_id("req::test");
        let child = root.with_value(KEY_A, Arc::new(7_u32));

        assert!(root.value::<u32>(KEY_A).is_none());
        assert_eq!(*child.value::<u32>(KEY_A).unwrap(), 7);
        assert_eq!(child.request_id(), "req::test");
    }

    #[test]
    fn nearest_value_shadows() {
        let ctx = RequestContext::new()
            .with_value(KEY_A, Arc::new(1_u32))
            .with_value(KEY_B, Arc::new(2_u32))
            .with_value(KEY_A, Arc::new(3_u32));

        assert_eq!(*ctx.value::<u32>(KEY_A).unwrap(), 3);
        assert_eq!(*ctx.value::<u32>(KEY_B).unwrap(), 2);
    }

    #[test]
    fn wrong_type_is_absent() {
        let ctx = RequestContext::new().with_value(KEY_A, Arc::new("text"));
        assert!(ctx.value::<u32>(KEY_A).is_none());
    }

    #[tokio::test]
    async fn earlier_deadline_wins() {
        let now = Instant::now();
        let early = now + Duration::from_secs(1);
        let late = now + Duration::from_secs(10);

        let ctx = RequestContext::new().with_deadline(early).with_deadline(late);
        assert_eq!(ctx.deadline(), Some(early));
    }

    #[test]
    fn request_ids_are_prefixed() {
        let id = generate_request_id();
        assert!(id.starts_with("req::"));
        assert!(id.len() > "req::".len());
    }

    #[test]
    fn ids_are_unique_within_process() {
        let ids: HashSet<String> = (0..1_000).map(|_| time_based_id("txn")).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn context_key_displays_its_name() {
        assert_eq!(KEY_A.to_string(), "a");
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
    }
}
