//! Shared resources and the interfaces plugins use to reach them.
//!
//! Resources are built once during startup and shared by every run. The
//! in-process implementations here back the default configuration and tests.

mod cache;
mod interfaces;
mod llm;
mod logging;
mod memory;
pub mod metrics;
mod pool;
mod storage;

pub use cache::InMemoryCache;
pub use interfaces::{
    Cache, Llm, LlmError, LlmResponse, LlmStream, LlmStreamSender, Memory, Resource,
    ResourceCategory, Storage,
};
pub use llm::EchoLlm;
pub use logging::LoggingResource;
pub use memory::InMemoryMemory;
pub use metrics::MetricsCollector;
pub use pool::{PoolGuard, ResourcePool};
pub use storage::InMemoryStorage;
