//! # Board Lens Engine
//!
//! Work-in-progress annotations for a kanban board render tree.
//!
//! ## Pipeline
//!
//! ```text
//! Document
//!     │
//!     ├──> Column inference (horizontal clustering)
//!     │      └─> column-0 .. column-n
//!     │
//!     ├──> Owner extraction (hidden assignee labels)
//!     │      └─> deduplicated owners + palette colors
//!     │
//!     ├──> Limit evaluators (owner, group, workload)
//!     │      └─> indicator registry (one visible badge per owner)
//!     │
//!     └──> Reconciler (idempotent)
//!            └─> badges, group decoration, card highlights
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use boardlens_engine::fixture::{BoardFixture, CardOwner};
//! use boardlens_engine::{BoardEngine, EngineConfig};
//! use boardlens_protocol::BoardSettings;
//!
//! fn main() -> boardlens_engine::Result<()> {
//!     let mut doc = BoardFixture::new()
//!         .card("A-1", 10.0, CardOwner::named("Alice"))
//!         .document();
//!     let mut engine = BoardEngine::new(EngineConfig::default())?;
//!     let report = engine.run_pass(&mut doc, &BoardSettings::default());
//!
//!     println!("{} columns, {} owners", report.columns.len(), report.owners.len());
//!     Ok(())
//! }
//! ```

mod color;
mod columns;
mod error;
mod indicators;
mod limits;
mod lookup;
mod markup;
mod owners;
mod pipeline;
mod reconcile;
mod settings;

pub mod fixture;

pub use color::{parse_hex, with_alpha, OWNER_PALETTE, UNASSIGNED_COLOR};
pub use columns::{
    cluster_by_offset, column_id, extract_column_name, fallback_column_name, Column,
    ColumnInference, ColumnLayout, DEFAULT_COLUMN_GAP_PX,
};
pub use error::{EngineError, Result};
pub use indicators::{choose_visible, BadgePosition, Indicator, IndicatorKind, IndicatorRegistry};
pub use limits::{
    evaluate_group_limit, evaluate_owner_limit, evaluate_workload, is_exceeded, owners_of,
    CardFacts, Evaluation, LimitKind, WorkloadEntry,
};
pub use lookup::{BoardLookup, BoardView};
pub use markup::*;
pub use owners::{
    display_initials, owner_id_from_avatar_url, resolve_owner_id, Owner, OwnerExtractor,
    OwnerIdentity, OwnerRoster, UNASSIGNED_ID,
};
pub use pipeline::{BoardEngine, EngineConfig, PassOutcome, PassReport, WORKLOAD_SOURCE};
pub use reconcile::{
    AnnotationPlan, AnnotationStats, CardHighlight, GroupDecoration, OwnerBadge, Reconciler,
};
pub use settings::{
    load_settings, save_settings, FileStore, MemoryStore, SettingsManager, SettingsStore,
};
