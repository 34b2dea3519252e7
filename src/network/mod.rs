//! Network module - rate-limited access to the remote API.

pub mod bucket;
pub mod client;
pub mod policy;
pub mod route;

#[cfg(test)]
pub(crate) mod testing;

pub use bucket::{
    Bucket, BucketRegistry, Check, ClientId, RateLimitSwitch, rate_limit_disabled, set_rate_limit_disabled,
};
pub use client::{HttpRequest, HttpResponse, HttpTransport, RequestBody, RequestClient, Upload, UreqTransport};
pub use policy::{Interrupter, SleepUntilReset, WaitOutcome, WaitPolicy};
pub use route::{HttpRoute, Method};
