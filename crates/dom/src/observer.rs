use crate::snapshot::NodeSnapshot;
use crate::NodeId;
use std::sync::Arc;

/// Callback invoked synchronously, while the document is borrowed, for every
/// record an observer is subscribed to. Listeners must not touch the document.
pub type MutationListener = Arc<dyn Fn(&MutationRecord) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeSnapshot>,
        removed: Vec<NodeSnapshot>,
    },
    Attributes {
        target: NodeSnapshot,
        attribute: String,
    },
    CharacterData {
        target: NodeId,
    },
}

impl MutationRecord {
    /// Node whose position decides whether an observer sees the record.
    #[must_use]
    pub fn anchor(&self) -> Option<NodeId> {
        match self {
            Self::ChildList { target, .. } | Self::CharacterData { target } => Some(*target),
            Self::Attributes { target, .. } => target.id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    pub attributes: bool,
    pub attribute_filter: Option<Vec<String>>,
    pub character_data: bool,
}

impl ObserveOptions {
    /// Child list plus filtered attributes over the whole subtree.
    #[must_use]
    pub fn subtree_with_attributes(filter: &[&str]) -> Self {
        Self {
            child_list: true,
            subtree: true,
            attributes: true,
            attribute_filter: Some(filter.iter().map(|name| (*name).to_string()).collect()),
            character_data: false,
        }
    }

    pub(crate) fn accepts(&self, record: &MutationRecord) -> bool {
        match record {
            MutationRecord::ChildList { .. } => self.child_list,
            MutationRecord::CharacterData { .. } => self.character_data,
            MutationRecord::Attributes { attribute, .. } => {
                self.attributes
                    && self
                        .attribute_filter
                        .as_ref()
                        .map_or(true, |filter| filter.iter().any(|name| name == attribute))
            }
        }
    }
}

pub(crate) struct Registration {
    pub(crate) id: ObserverId,
    pub(crate) target: NodeId,
    pub(crate) options: ObserveOptions,
    pub(crate) listener: MutationListener,
}
