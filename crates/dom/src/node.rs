use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Arena handle of a node. Handles are never reused, so a handle to a removed
/// node stays invalid forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout box in page coordinates, the equivalent of a bounding client rect.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) tag: String,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) classes: Vec<String>,
    pub(crate) style: BTreeMap<String, String>,
    pub(crate) text: Option<String>,
    pub(crate) rect: Option<Rect>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            classes: Vec::new(),
            style: BTreeMap::new(),
            text: None,
            rect: None,
            parent: None,
            children: Vec::new(),
        }
    }
}
