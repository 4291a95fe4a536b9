//! Builder for board-shaped render trees using the host's markup, shared by
//! tests and by `board-lens` snapshot generation.

use boardlens_dom::{Document, NodeSpec, Rect};

const CARD_WIDTH: f64 = 250.0;
const CARD_HEIGHT: f64 = 80.0;
const CARD_SPACING: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardOwner {
    Named {
        name: String,
        avatar_url: Option<String>,
    },
    Unassigned,
    Missing,
}

impl CardOwner {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(name: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            avatar_url: Some(avatar_url.into()),
        }
    }
}

#[derive(Debug, Clone)]
struct CardFixture {
    key: String,
    left: f64,
    owner: CardOwner,
    label_prefix: String,
}

#[derive(Debug, Clone)]
struct ColumnFixture {
    name: Option<String>,
    cards: Vec<CardFixture>,
}

#[derive(Debug, Clone)]
pub struct BoardFixture {
    columns: Vec<ColumnFixture>,
    label_prefix: String,
    owner_avatars: bool,
}

impl Default for BoardFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardFixture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            label_prefix: "Assignee:".to_string(),
            owner_avatars: true,
        }
    }

    /// Prefix written into hidden assignee labels of cards added afterwards.
    #[must_use]
    pub fn label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = prefix.into();
        self
    }

    /// Whether cards carry `ak-avatar` widgets that badges attach to.
    #[must_use]
    pub const fn owner_avatars(mut self, enabled: bool) -> Self {
        self.owner_avatars = enabled;
        self
    }

    /// Starts a new host column; `None` renders it without any header.
    #[must_use]
    pub fn column(mut self, name: Option<&str>) -> Self {
        self.columns.push(ColumnFixture {
            name: name.map(str::to_string),
            cards: Vec::new(),
        });
        self
    }

    /// Adds a card at horizontal offset `left` to the last column.
    #[must_use]
    pub fn card(mut self, key: &str, left: f64, owner: CardOwner) -> Self {
        if self.columns.is_empty() {
            self = self.column(None);
        }
        let label_prefix = self.label_prefix.clone();
        if let Some(column) = self.columns.last_mut() {
            column.cards.push(CardFixture {
                key: key.to_string(),
                left,
                owner,
                label_prefix,
            });
        }
        self
    }

    #[must_use]
    pub fn build(&self) -> NodeSpec {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| self.column_spec(index, column));
        NodeSpec::new("div")
            .attr("data-testid", "software-board.board")
            .rect(Rect::new(0.0, 0.0, 2000.0, 1200.0))
            .children(columns)
    }

    /// A document whose body holds the built board.
    #[must_use]
    pub fn document(&self) -> Document {
        Document::from_spec(&NodeSpec::new("body").child(self.build()))
    }

    fn column_spec(&self, index: usize, column: &ColumnFixture) -> NodeSpec {
        #[allow(clippy::cast_precision_loss)]
        let fallback_left = index as f64 * 300.0;
        let left = column
            .cards
            .iter()
            .map(|card| card.left)
            .reduce(f64::min)
            .unwrap_or(fallback_left);

        let mut spec = NodeSpec::new("div")
            .attr("data-testid", "platform-board-kit.ui.column.draggable-column")
            .rect(Rect::new(left - 5.0, 0.0, CARD_WIDTH + 20.0, 1100.0));
        if let Some(name) = &column.name {
            spec = spec.child(
                NodeSpec::new("div").class("column-header").child(
                    NodeSpec::new("h2")
                        .attr("aria-label", name.as_str())
                        .text(format!("{name} {}", column.cards.len())),
                ),
            );
        }

        let cards = column
            .cards
            .iter()
            .enumerate()
            .map(|(row, card)| self.card_spec(row, card));
        spec.child(
            NodeSpec::new("div")
                .attr("data-testid", "platform-board-kit.ui.column.column-cards")
                .children(cards),
        )
    }

    fn card_spec(&self, row: usize, card: &CardFixture) -> NodeSpec {
        #[allow(clippy::cast_precision_loss)]
        let top = 100.0 + row as f64 * CARD_SPACING;
        let mut surface = NodeSpec::new("div").child(NodeSpec::new("span").text(card.key.as_str()));

        match &card.owner {
            CardOwner::Named { name, avatar_url } => {
                let mut wrapper = NodeSpec::new("div").attr(
                    "data-testid",
                    "software-board.common.fields.assignee-field-static.avatar-wrapper",
                );
                if self.owner_avatars {
                    let mut inner =
                        NodeSpec::new("span").attr("data-testid", "ak-avatar--inner");
                    if let Some(url) = avatar_url {
                        inner = inner.child(
                            NodeSpec::new("img")
                                .attr("src", url.as_str())
                                .attr("alt", name.as_str()),
                        );
                    }
                    wrapper = wrapper.child(
                        NodeSpec::new("div")
                            .attr("data-testid", "ak-avatar")
                            .child(inner)
                            .child(
                                NodeSpec::new("span")
                                    .attr("data-testid", "ak-avatar--label")
                                    .text(name.as_str()),
                            ),
                    );
                } else if let Some(url) = avatar_url {
                    wrapper = wrapper.child(NodeSpec::new("img").attr("src", url.as_str()));
                }
                wrapper = wrapper.child(
                    NodeSpec::new("span")
                        .attr("hidden", "")
                        .text(format!("{} {name}", card.label_prefix)),
                );
                surface = surface.child(wrapper);
            }
            CardOwner::Unassigned => {
                surface = surface.child(
                    NodeSpec::new("span")
                        .attr("aria-hidden", "true")
                        .text("Unassigned"),
                );
            }
            CardOwner::Missing => {}
        }

        NodeSpec::new("div")
            .attr("data-testid", "platform-board-kit.ui.card.card")
            .attr("id", format!("card-{}", card.key))
            .rect(Rect::new(card.left, top, CARD_WIDTH, CARD_HEIGHT))
            .child(
                NodeSpec::new("div")
                    .attr(
                        "data-testid",
                        "software-context-menu.ui.context-menu.children-wrapper",
                    )
                    .child(surface),
            )
    }
}
