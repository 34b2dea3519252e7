//! Event handling.
//!
//! Decoded events enter through [`UpdateCoordinator::dispatch`]. Each one is
//! applied to the entity cache first and only then delivered to listeners,
//! so listeners always observe post-event state.
//!
//! Add support for a new event type by:
//! 1. Adding a variant to `EventKind` and decoding it in `EventKind::decode`
//! 2. Adding the matching `Update` variant
//! 3. Applying it in `UpdateCoordinator::apply`

pub mod coordinator;
pub mod model;

pub use coordinator::{Listener, UpdateCoordinator};
pub use model::{Dispatched, Event, EventKind, Update};
