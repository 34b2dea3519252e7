//! Rate-limit buckets.
//!
//! One bucket exists per `(client, route)` pair. It is created lazily on the
//! first call and shared by every caller of that pair afterwards.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use super::policy::WaitPolicy;
use super::route::HttpRoute;

/// Marker for "no server feedback received yet".
const UNKNOWN: i64 = i64::MIN;

static RATE_LIMIT: RateLimitSwitch = RateLimitSwitch::new();

static GLOBAL_REGISTRY: Lazy<Arc<BucketRegistry>> = Lazy::new(|| Arc::new(BucketRegistry::new()));

/// Opt-out flag consulted by every [`Bucket::check`].
///
/// With throttling off, `check` never waits and never decrements.
#[derive(Debug, Default)]
pub struct RateLimitSwitch {
    disabled: AtomicBool,
}

impl RateLimitSwitch {
    pub const fn new() -> Self {
        Self {
            disabled: AtomicBool::new(false),
        }
    }

    /// The process-wide switch.
    pub fn global() -> &'static RateLimitSwitch {
        &RATE_LIMIT
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Relaxed);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }
}

/// Turn local throttling off (or back on) for every bucket.
pub fn set_rate_limit_disabled(disabled: bool) {
    RATE_LIMIT.set_disabled(disabled);
}

pub fn rate_limit_disabled() -> bool {
    RATE_LIMIT.is_disabled()
}

/// Identity of an owning client. Buckets never cross identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocate a process-unique identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Result of a single [`Bucket::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Throttling is globally disabled.
    Disabled,
    /// No feedback yet, the call goes through untracked.
    Untracked,
    /// One token consumed.
    Consumed,
    /// Budget exhausted, the wait policy ran.
    Waited,
}

/// Token budget of one route for one client.
pub struct Bucket {
    route: HttpRoute,
    remaining: AtomicI64,
    reset_millis: AtomicU64,
    update_lock: Mutex<()>,
}

impl Bucket {
    fn new(route: HttpRoute) -> Self {
        Self {
            route,
            remaining: AtomicI64::new(UNKNOWN),
            reset_millis: AtomicU64::new(0),
            update_lock: Mutex::new(()),
        }
    }

    pub fn route(&self) -> HttpRoute {
        self.route
    }

    /// Remaining budget, `None` before the first server feedback.
    pub fn remaining(&self) -> Option<i64> {
        match self.remaining.load(Ordering::Acquire) {
            UNKNOWN => None,
            n => Some(n),
        }
    }

    pub fn reset_millis(&self) -> u64 {
        self.reset_millis.load(Ordering::Acquire)
    }

    /// Overwrite the state with the server's latest feedback.
    pub fn update(&self, remaining: i64, reset_millis: u64) {
        let _guard = self.update_lock.lock();
        self.reset_millis.store(reset_millis, Ordering::Release);
        self.remaining.store(remaining.max(UNKNOWN + 1), Ordering::Release);
        debug!(
            "Bucket {} updated: remaining={}, reset={}ms",
            self.route.name(),
            remaining,
            reset_millis
        );
    }

    /// Take one token, or run `policy` when the budget is at or below
    /// `low_water`.
    pub fn check(&self, low_water: i64, policy: &dyn WaitPolicy) -> Check {
        self.check_with(&RATE_LIMIT, low_water, policy)
    }

    /// [`Bucket::check`] against an explicit switch.
    pub fn check_with(&self, switch: &RateLimitSwitch, low_water: i64, policy: &dyn WaitPolicy) -> Check {
        if switch.is_disabled() {
            return Check::Disabled;
        }

        let taken = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == UNKNOWN || current <= low_water {
                    None
                } else {
                    Some(current - 1)
                }
            });

        match taken {
            Ok(_) => Check::Consumed,
            Err(UNKNOWN) => Check::Untracked,
            Err(_) => {
                let reset_secs = self.reset_millis().div_ceil(1000);
                policy.perform(self.route.name(), reset_secs);
                Check::Waited
            }
        }
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("route", &self.route.name())
            .field("remaining", &self.remaining())
            .field("reset_millis", &self.reset_millis())
            .finish()
    }
}

/// Concurrent map from `(client, route)` to its bucket.
#[derive(Default)]
pub struct BucketRegistry {
    buckets: DashMap<(ClientId, HttpRoute), Arc<Bucket>>,
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by clients that don't bring their own.
    pub fn global() -> Arc<BucketRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Bucket for the pair, created on first use.
    ///
    /// Racing first lookups agree on a single instance.
    pub fn get(&self, client: ClientId, route: HttpRoute) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.get(&(client, route)) {
            return Arc::clone(bucket.value());
        }
        let bucket = self
            .buckets
            .entry((client, route))
            .or_insert_with(|| Arc::new(Bucket::new(route)));
        Arc::clone(bucket.value())
    }

    /// Drop every bucket owned by `client`.
    pub fn forget(&self, client: ClientId) {
        self.buckets.retain(|(owner, _), _| *owner != client);
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("bucket_count", &self.buckets.len())
            .finish()
    }
}
