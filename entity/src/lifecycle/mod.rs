//! Lifecycle support for startup and shutdown.
//!
//! Anything constructed during startup registers a teardown callback here so
//! that a failed startup, or an explicit shutdown, unwinds it in reverse order.

mod cleanup;

pub use cleanup::{CleanupCallback, CleanupRegistry, CleanupReport};
