//! Logical columns inferred from card geometry.
//!
//! Cards are sorted by their left offset and scanned left to right; a gap
//! wider than the threshold between two neighbours starts a new column.
//! Column ids depend only on the resulting rank (`column-<index>`), so they
//! stay stable however the host renders its own column elements. Host
//! column elements are consulted for display names only.

use crate::markup::BoardMarkup;
use boardlens_dom::{Document, NodeId, Rect, Selector};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const DEFAULT_COLUMN_GAP_PX: f64 = 150.0;
const MAX_HEADER_NAME_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    pub index: usize,
    pub card_count: usize,
    /// Horizontal extent of the column's cards.
    pub left: f64,
    pub right: f64,
    #[serde(skip)]
    pub element: Option<NodeId>,
}

#[must_use]
pub fn column_id(index: usize) -> String {
    format!("column-{index}")
}

/// Result of one inference: the ordered columns and which column each
/// visible card landed in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnLayout {
    columns: Vec<Column>,
    assignment: BTreeMap<NodeId, usize>,
}

impl ColumnLayout {
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Empty means the board is not readable yet, not that it has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn column_for_card(&self, card: NodeId) -> Option<&Column> {
        self.assignment
            .get(&card)
            .and_then(|index| self.columns.get(*index))
    }

    #[must_use]
    pub fn card_column_id(&self, card: NodeId) -> Option<&str> {
        self.column_for_card(card).map(|column| column.id.as_str())
    }

    #[must_use]
    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == id)
    }
}

/// Groups items by offset. Items are sorted ascending (stable for equal
/// offsets) and a new group starts whenever the distance to the previous
/// item exceeds `threshold`.
pub fn cluster_by_offset<T: Copy>(items: &[(T, f64)], threshold: f64) -> Vec<Vec<T>> {
    let mut sorted: Vec<(T, f64)> = items.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut groups: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut prev: Option<f64> = None;
    for (item, offset) in sorted {
        if let Some(prev) = prev {
            if (offset - prev).abs() > threshold && !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        }
        current.push(item);
        prev = Some(offset);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Positional name used when the host column carries no readable name.
#[must_use]
pub fn fallback_column_name(index: usize, total: usize) -> String {
    if index == 0 {
        return "TO DO".to_string();
    }
    if index + 1 == total {
        return "DONE".to_string();
    }
    let interior = match (total, index) {
        (3..=5, 1) => Some("IN PROGRESS"),
        (4 | 5, 2) => Some("TESTING"),
        (5, 3) => Some("REVIEW"),
        _ => None,
    };
    interior.map_or_else(|| format!("Column {}", index + 1), str::to_string)
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnInference<'a> {
    markup: &'a BoardMarkup,
    gap_threshold: f64,
}

impl<'a> ColumnInference<'a> {
    #[must_use]
    pub const fn new(markup: &'a BoardMarkup, gap_threshold: f64) -> Self {
        Self {
            markup,
            gap_threshold,
        }
    }

    /// Every card element currently attached to the document.
    #[must_use]
    pub fn board_cards(&self, doc: &Document) -> Vec<NodeId> {
        doc.query_all(doc.root(), &self.markup.card)
    }

    #[must_use]
    pub fn layout(&self, doc: &Document, cards: &[NodeId]) -> ColumnLayout {
        let positioned: Vec<(NodeId, f64)> = cards
            .iter()
            .filter_map(|card| visible_rect(doc, *card).map(|rect| (*card, rect.left)))
            .collect();
        let groups = cluster_by_offset(&positioned, self.gap_threshold);
        let total = groups.len();

        let mut layout = ColumnLayout::default();
        for (index, group) in groups.into_iter().enumerate() {
            let element = group
                .iter()
                .find_map(|card| doc.closest(*card, &self.markup.column));
            let name = element
                .and_then(|el| extract_column_name(doc, self.markup, el))
                .unwrap_or_else(|| fallback_column_name(index, total));

            let rects: Vec<Rect> = group.iter().filter_map(|c| visible_rect(doc, *c)).collect();
            let left = rects.iter().map(|r| r.left).fold(f64::INFINITY, f64::min);
            let right = rects.iter().map(Rect::right).fold(f64::NEG_INFINITY, f64::max);

            for card in &group {
                layout.assignment.insert(*card, index);
            }
            layout.columns.push(Column {
                id: column_id(index),
                name,
                index,
                card_count: group.len(),
                left,
                right,
                element,
            });
        }
        layout
    }

    /// Pure inference over the given cards; empty when none is visible.
    #[must_use]
    pub fn infer_columns(&self, doc: &Document, cards: &[NodeId]) -> Vec<Column> {
        self.layout(doc, cards).into_columns()
    }

    /// Re-derives the clustering over the whole board and reports the
    /// column holding `card`.
    #[must_use]
    pub fn card_column_id(&self, doc: &Document, card: NodeId) -> Option<String> {
        let cards = self.board_cards(doc);
        self.layout(doc, &cards)
            .card_column_id(card)
            .map(str::to_string)
    }
}

fn visible_rect(doc: &Document, card: NodeId) -> Option<Rect> {
    doc.rect(card)
        .filter(|rect| rect.left.is_finite() && (rect.width > 0.0 || rect.height > 0.0))
}

fn pattern(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

fn strip_counter_suffix(text: &str) -> String {
    static SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
    match pattern(&SUFFIX, r"\s*\d+\s*$") {
        Some(re) => re.replace(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

fn strip_counters(text: &str) -> String {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    static SPACES: OnceLock<Option<Regex>> = OnceLock::new();
    let mut out = strip_counter_suffix(text);
    if let Some(re) = pattern(&PREFIX, r"^\d+\s*") {
        out = re.replace(&out, "").into_owned();
    }
    if let Some(re) = pattern(&SPACES, r"\s+") {
        out = re.replace_all(&out, " ").into_owned();
    }
    out.trim().to_string()
}

/// Whether `node` sits inside a card or an engine artifact below `column`.
/// Neither ever names the column.
fn inside_card_or_annotation(
    doc: &Document,
    markup: &BoardMarkup,
    column: NodeId,
    node: NodeId,
) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == column {
            return false;
        }
        if doc.matches(id, &markup.card) || doc.matches(id, &markup.annotation) {
            return true;
        }
        current = doc.parent(id);
    }
    false
}

fn column_own_match(
    doc: &Document,
    markup: &BoardMarkup,
    column: NodeId,
    selector: &Selector,
) -> Option<NodeId> {
    doc.query_all(column, selector)
        .into_iter()
        .find(|node| !inside_card_or_annotation(doc, markup, column, *node))
}

/// Best-effort display name of a host column element.
#[must_use]
pub fn extract_column_name(doc: &Document, markup: &BoardMarkup, column: NodeId) -> Option<String> {
    if let Some(heading) = column_own_match(doc, markup, column, &markup.column_heading) {
        if let Some(label) = doc.attribute(heading, "aria-label") {
            let label = label.trim();
            if !label.is_empty() && !label.chars().all(|c| c.is_ascii_digit()) {
                return Some(label.to_string());
            }
        }
    }

    if let Some(marker) = column_own_match(doc, markup, column, &markup.column_name_marker) {
        if let Some(title) = doc.attribute(marker, "title").filter(|t| !t.trim().is_empty()) {
            return Some(title.trim().to_string());
        }
        let cleaned = strip_counter_suffix(&doc.text_content(marker));
        if !cleaned.is_empty() {
            return Some(cleaned);
        }
    }

    let header = column_own_match(doc, markup, column, &markup.column_header_like)?;
    let cleaned = strip_counters(&doc.text_content(header));
    (!cleaned.is_empty() && cleaned.chars().count() < MAX_HEADER_NAME_CHARS).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{BoardFixture, CardOwner};
    use boardlens_dom::NodeSpec;
    use pretty_assertions::assert_eq;

    fn nine_card_board() -> BoardFixture {
        let mut board = BoardFixture::new().column(None);
        for (i, left) in [10.0, 12.0, 15.0, 200.0, 205.0, 400.0, 402.0, 405.0, 408.0]
            .into_iter()
            .enumerate()
        {
            board = board.card(&format!("K-{i}"), left, CardOwner::Missing);
        }
        board
    }

    #[test]
    fn clusters_follow_gaps() {
        let items: Vec<(usize, f64)> = [405.0, 10.0, 200.0, 12.0, 402.0, 205.0, 15.0, 400.0, 408.0]
            .into_iter()
            .enumerate()
            .collect();
        let groups = cluster_by_offset(&items, DEFAULT_COLUMN_GAP_PX);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 2, 4]);
        assert_eq!(groups[0], vec![1, 3, 6]);
    }

    #[test]
    fn gap_is_measured_from_previous_card() {
        // 0 -> 140 -> 280 never exceeds the threshold step by step.
        let items = [(0, 0.0), (1, 140.0), (2, 280.0)];
        assert_eq!(cluster_by_offset(&items, 150.0).len(), 1);
        assert!(cluster_by_offset::<u8>(&[], 150.0).is_empty());
    }

    #[test]
    fn nine_cards_make_three_columns() {
        let doc = nine_card_board().document();
        let markup = BoardMarkup::default();
        let inference = ColumnInference::new(&markup, DEFAULT_COLUMN_GAP_PX);
        let cards = inference.board_cards(&doc);
        let columns = inference.infer_columns(&doc, &cards);

        let summary: Vec<(&str, &str, usize)> = columns
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str(), c.card_count))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("column-0", "TO DO", 3),
                ("column-1", "IN PROGRESS", 2),
                ("column-2", "DONE", 4),
            ]
        );
        assert_eq!(inference.card_column_id(&doc, cards[4]).as_deref(), Some("column-1"));
    }

    #[test]
    fn fallback_names_by_board_width() {
        let names = |total: usize| -> Vec<String> {
            (0..total).map(|i| fallback_column_name(i, total)).collect()
        };
        assert_eq!(names(1), vec!["TO DO"]);
        assert_eq!(names(4), vec!["TO DO", "IN PROGRESS", "TESTING", "DONE"]);
        assert_eq!(
            names(5),
            vec!["TO DO", "IN PROGRESS", "TESTING", "REVIEW", "DONE"]
        );
        assert_eq!(names(6)[2], "Column 3");
    }

    #[test]
    fn host_names_are_preferred() {
        let doc = BoardFixture::new()
            .column(Some("Backlog"))
            .card("A-1", 10.0, CardOwner::Missing)
            .column(Some("Doing"))
            .card("A-2", 320.0, CardOwner::Missing)
            .document();
        let markup = BoardMarkup::default();
        let inference = ColumnInference::new(&markup, DEFAULT_COLUMN_GAP_PX);
        let cards = inference.board_cards(&doc);
        let names: Vec<String> = inference
            .infer_columns(&doc, &cards)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Backlog", "Doing"]);
    }

    #[test]
    fn name_extraction_order() {
        let markup = BoardMarkup::default();
        let doc = Document::from_spec(
            &NodeSpec::new("body")
                .child(
                    NodeSpec::new("section")
                        .child(NodeSpec::new("h2").attr("aria-label", "12"))
                        .child(
                            NodeSpec::new("span")
                                .attr("data-testid", "column-name")
                                .text("Review 7"),
                        ),
                )
                .child(NodeSpec::new("section").child(NodeSpec::new("div").attr("title", "QA")))
                .child(
                    NodeSpec::new("section")
                        .child(NodeSpec::new("header").text("3  Ready   for   release 14")),
                )
                .child(
                    NodeSpec::new("section").child(
                        NodeSpec::new("h3").text("x".repeat(60)),
                    ),
                ),
        );
        let sections = doc.children(doc.root()).to_vec();
        let name = |i: usize| extract_column_name(&doc, &markup, sections[i]);

        assert_eq!(name(0).as_deref(), Some("Review"));
        assert_eq!(name(1).as_deref(), Some("QA"));
        assert_eq!(name(2).as_deref(), Some("Ready for release"));
        assert_eq!(name(3), None);
    }

    #[test]
    fn card_content_and_badges_never_name_a_column() {
        let markup = BoardMarkup::default();
        let card = NodeSpec::new("div")
            .attr("data-testid", "platform-board-kit.ui.card.card")
            .child(NodeSpec::new("span").attr("title", "Fix login flow"));
        let badge = NodeSpec::new("div")
            .class(crate::markup::AVATAR_BADGE_CONTAINER_CLASS)
            .child(
                NodeSpec::new("div")
                    .class(crate::markup::AVATAR_BADGE_CLASS)
                    .attr("title", "Alice: 2/2 cards in limited columns"),
            );
        let doc = Document::from_spec(
            &NodeSpec::new("body")
                .child(NodeSpec::new("section").child(card.clone()).child(badge))
                .child(
                    NodeSpec::new("section")
                        .child(card)
                        .child(NodeSpec::new("div").attr("title", "QA")),
                ),
        );
        let sections = doc.children(doc.root()).to_vec();

        assert_eq!(extract_column_name(&doc, &markup, sections[0]), None);
        assert_eq!(
            extract_column_name(&doc, &markup, sections[1]).as_deref(),
            Some("QA")
        );
    }

    #[test]
    fn invisible_cards_are_ignored() {
        let mut doc = nine_card_board().document();
        let markup = BoardMarkup::default();
        let inference = ColumnInference::new(&markup, DEFAULT_COLUMN_GAP_PX);
        let cards = inference.board_cards(&doc);
        doc.set_rect(cards[0], Rect::new(10.0, 0.0, 0.0, 0.0)).unwrap();

        let layout = inference.layout(&doc, &cards);
        assert_eq!(layout.columns()[0].card_count, 2);
        assert_eq!(layout.card_column_id(cards[0]), None);
        assert!(inference.layout(&doc, &[]).is_empty());
    }
}
