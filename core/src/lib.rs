//! Chunked, concurrent HTTP downloads.
//!
//! [`DownloadEngine`] probes a resource, splits it into byte ranges and
//! fetches them on a bounded pool of threads while a [`Progress`] snapshot
//! is sampled on a fixed interval.

pub mod checksum;
pub mod chunk;
pub mod config;
pub mod engine;
pub mod error;
pub mod net;
pub mod progress;
pub mod resolver;
pub mod scheduler;
pub mod ticker;

#[cfg(test)]
mod tests;

pub use crate::config::{DownloadConfig, EngineConfig};
pub use crate::engine::{Canceller, DownloadEngine, Engine, ProgressFn};
pub use crate::error::{CoreError, CoreResult};
pub use crate::progress::Progress;
