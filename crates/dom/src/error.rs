use crate::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("cannot insert {child} under {parent}: parent lies inside the child subtree")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("reference node {reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },

    #[error("the root node cannot be detached")]
    RootDetach,
}
