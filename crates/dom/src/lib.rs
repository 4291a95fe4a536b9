//! # Board Lens DOM
//!
//! In-memory render tree standing in for the host board page.
//!
//! The host side builds and rewrites the tree; the engine reads it through
//! [`Selector`] pattern matching and writes its own annotations back. Every
//! structural, attribute and text write produces a [`MutationRecord`] that is
//! delivered synchronously to registered observers, the same contract a DOM
//! mutation observer offers.
//!
//! ```text
//! host page ──writes──┐
//!                     ├──> Document ──MutationRecord──> observers
//! reconciler ─writes──┘
//! ```
//!
//! ## Example
//!
//! ```
//! use boardlens_dom::{Document, NodeSpec, Rect, Selector};
//!
//! let mut doc = Document::new();
//! let root = doc.root();
//! let card = doc
//!     .append_spec(
//!         root,
//!         &NodeSpec::new("div")
//!             .attr("data-testid", "platform-board-kit.ui.card.card")
//!             .rect(Rect::new(10.0, 0.0, 200.0, 80.0)),
//!     )
//!     .unwrap();
//! let cards = doc.query_all(root, &Selector::attr_eq("data-testid", "platform-board-kit.ui.card.card"));
//! assert_eq!(cards, vec![card]);
//! ```

mod document;
mod error;
mod node;
mod observer;
mod selector;
mod snapshot;

pub use document::Document;
pub use error::{DomError, Result};
pub use node::{NodeId, Rect};
pub use observer::{MutationListener, MutationRecord, ObserveOptions, ObserverId};
pub use selector::{ElementLike, Selector};
pub use snapshot::{NodeSnapshot, NodeSpec};

use std::sync::{Arc, Mutex};

/// Render tree shared between the host side, the engine and the change loop.
pub type SharedDocument = Arc<Mutex<Document>>;

/// Wraps a document for sharing.
#[must_use]
pub fn shared(document: Document) -> SharedDocument {
    Arc::new(Mutex::new(document))
}
