mod header;
mod config;
mod arena;
mod free_list;
mod allocator;
mod roots;
mod stats;
mod mark_sweep;
mod incremental;
mod collector;
mod diagnostics;

#[cfg(feature = "ffi")]
mod ffi;

pub use collector::Collector;
pub use config::{CollectorConfig, CollectorFlag, CollectorFlags, DEFAULT_INCREMENTAL_RATE};
pub use roots::RootHandle;
pub use stats::Stats;
