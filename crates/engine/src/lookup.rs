//! Read-only view of one pass, shared with features that need to know where
//! a card sits and who owns it without re-running inference.

use crate::columns::ColumnLayout;
use crate::limits::CardFacts;
use crate::owners::{Owner, OwnerRoster};
use boardlens_dom::NodeId;

pub trait BoardLookup {
    /// Distinct owners of `cards`, in first-seen order. Cards without an
    /// owner are skipped.
    fn owners_for_cards(&self, cards: &[NodeId]) -> Vec<Owner>;

    fn card_column_id(&self, card: NodeId) -> Option<String>;
}

/// Columns, owners and per-card facts computed by one pass.
#[derive(Debug, Clone, Default)]
pub struct BoardView {
    pub(crate) layout: ColumnLayout,
    pub(crate) roster: OwnerRoster,
    pub(crate) facts: Vec<CardFacts>,
}

impl BoardView {
    #[must_use]
    pub const fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    #[must_use]
    pub const fn roster(&self) -> &OwnerRoster {
        &self.roster
    }

    #[must_use]
    pub fn facts(&self) -> &[CardFacts] {
        &self.facts
    }

    /// Visible cards in board order.
    #[must_use]
    pub fn cards(&self) -> Vec<NodeId> {
        self.facts.iter().map(|facts| facts.card).collect()
    }
}

impl BoardLookup for BoardView {
    fn owners_for_cards(&self, cards: &[NodeId]) -> Vec<Owner> {
        let mut out: Vec<Owner> = Vec::new();
        for card in cards {
            if let Some(owner) = self.roster.owner_for_card(*card) {
                if !out.iter().any(|o| o.id == owner.id) {
                    out.push(owner.clone());
                }
            }
        }
        out
    }

    fn card_column_id(&self, card: NodeId) -> Option<String> {
        self.layout.card_column_id(card).map(str::to_string)
    }
}
