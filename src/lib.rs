//! guildline - client runtime core for a guild-based chat platform.
//!
//! Mirrors server-side objects locally so application code can read them
//! synchronously, while staying consistent with the live event stream and
//! the platform's rate-limited HTTP API.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `network` - Route table, rate-limit buckets, wait policies, request client
//! - `entity` - Platform objects with in-place merge
//! - `cache` - Weakly-owned entity storage with fetch-on-miss
//! - `events` - Event-to-cache update coordinator and listeners
//! - `client` - Ties one identity's request client, cache and coordinator together

pub mod cache;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod network;

pub use client::Client;
pub use config::Config;
pub use error::{ApiError, EventError, PayloadError};
