//! # Board Lens Watcher
//!
//! Keeps board annotations current while the board changes underneath.
//!
//! ## Loop
//!
//! ```text
//! board container (retry with backoff until it appears)
//!     │
//!     ├──> mutation observer (childList, subtree, class/data-testid)
//!     │      └─> relevance filter ──> signal channel
//!     │
//!     ├──> debounce (500 ms, capped by max batch wait)
//!     │
//!     └──> pass (settings re-read, engine applied)
//!            └─> suppression + grace period so own writes never re-trigger
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use boardlens_dom::{shared, Document};
//! use boardlens_engine::{BoardEngine, EngineConfig, MemoryStore};
//! use boardlens_watcher::{BoardWatcher, BoardWatcherConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> boardlens_watcher::Result<()> {
//!     let document = shared(Document::new());
//!     let engine = BoardEngine::new(EngineConfig::default())?;
//!     let watcher = BoardWatcher::start(
//!         document,
//!         engine,
//!         Arc::new(MemoryStore::new()),
//!         BoardWatcherConfig::default(),
//!     )?;
//!
//!     let mut updates = watcher.subscribe_updates();
//!     if let Ok(update) = updates.recv().await {
//!         println!("pass finished in {} ms", update.duration_ms);
//!     }
//!     watcher.stop().await
//! }
//! ```

mod debounce;
mod error;
mod filter;
mod suppression;
mod watcher;

pub use error::{Result, WatcherError};
pub use filter::{is_relevant, observe_options, OBSERVED_ATTRIBUTES};
pub use suppression::{Suppression, SuppressionGuard};
pub use watcher::{
    BoardWatcher, BoardWatcherConfig, LoopState, PassUpdate, RetryPolicy, WatcherHealth,
};
