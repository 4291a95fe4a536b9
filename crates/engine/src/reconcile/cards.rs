use super::{apply_styles, clear_styles, each_artifact, single_child_with_class};
use crate::color::with_alpha;
use crate::markup::{
    BoardMarkup, CARD_COLOR_ATTR, CARD_HIGHLIGHT_STYLES, CARD_LIMIT_ATTR, CARD_OVERLOADED_ATTR,
    CARD_OVERLOADED_CLASS, CARD_WARNING_ICON_CLASS,
};
use crate::Result;
use boardlens_dom::{Document, NodeId, NodeSpec, Selector};
use std::collections::BTreeMap;

/// A card contributing to an exceeded owner limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardHighlight {
    pub card: NodeId,
    pub color: String,
    pub limit_id: String,
}

/// Visible surface of a card: the first `div` inside the context menu
/// wrapper, or the card itself.
pub(crate) fn card_surface(doc: &Document, markup: &BoardMarkup, card: NodeId) -> NodeId {
    doc.query(card, &markup.card_surface_wrapper)
        .and_then(|wrapper| {
            doc.children(wrapper)
                .iter()
                .copied()
                .find(|child| doc.tag(*child) == Some("div"))
        })
        .unwrap_or(card)
}

fn surface_styles(color: &str) -> Vec<(&'static str, String)> {
    vec![
        ("border-left", format!("10px solid {color}")),
        ("padding-left", "10px".to_string()),
        ("background-color", with_alpha(color, 0.4)),
        ("border", format!("5px solid {color}")),
        ("border-radius", "6px".to_string()),
        (
            "box-shadow",
            format!("0 0 0 3px {}, 0 0 15px {}", with_alpha(color, 0.3), with_alpha(color, 0.2)),
        ),
        ("position", "relative".to_string()),
    ]
}

fn icon_styles(color: &str) -> Vec<(&'static str, String)> {
    vec![
        ("position", "absolute".to_string()),
        ("top", "5px".to_string()),
        ("right", "5px".to_string()),
        ("width", "22px".to_string()),
        ("height", "22px".to_string()),
        ("border-radius", "50%".to_string()),
        ("background", "white".to_string()),
        ("border", format!("2px solid {color}")),
        ("z-index", "10000".to_string()),
        ("pointer-events", "none".to_string()),
    ]
}

pub(super) fn reconcile(
    doc: &mut Document,
    markup: &BoardMarkup,
    highlights: &[CardHighlight],
    failures: &mut Vec<String>,
) -> Result<usize> {
    let mut desired: BTreeMap<NodeId, &CardHighlight> = BTreeMap::new();
    for highlight in highlights {
        if doc.contains(highlight.card) {
            desired.entry(highlight.card).or_insert(highlight);
        }
    }

    let stale: Vec<NodeId> = doc
        .query_all(doc.root(), &Selector::attr(CARD_OVERLOADED_ATTR))
        .into_iter()
        .filter(|card| !desired.contains_key(card))
        .collect();
    each_artifact(doc, failures, "card unmark", stale, |doc, card| {
        unmark(doc, markup, card)
    });

    Ok(each_artifact(doc, failures, "card highlight", desired, |doc, (card, highlight)| {
        mark(doc, markup, card, highlight)
    }))
}

fn mark(doc: &mut Document, markup: &BoardMarkup, card: NodeId, highlight: &CardHighlight) -> Result<()> {
    doc.set_attribute(card, CARD_OVERLOADED_ATTR, "true")?;
    doc.set_attribute(card, CARD_COLOR_ATTR, &highlight.color)?;
    doc.set_attribute(card, CARD_LIMIT_ATTR, &highlight.limit_id)?;
    doc.add_class(card, CARD_OVERLOADED_CLASS)?;

    let surface = card_surface(doc, markup, card);
    apply_styles(doc, surface, &surface_styles(&highlight.color))?;

    let styles = icon_styles(&highlight.color);
    match single_child_with_class(doc, surface, CARD_WARNING_ICON_CLASS)? {
        Some(icon) => {
            apply_styles(doc, icon, &styles)?;
        }
        None => {
            let mut spec = NodeSpec::new("div").class(CARD_WARNING_ICON_CLASS).text("⚠️");
            for (property, value) in styles {
                spec = spec.style(property, value);
            }
            doc.append_spec(surface, &spec)?;
        }
    }
    Ok(())
}

fn unmark(doc: &mut Document, markup: &BoardMarkup, card: NodeId) -> Result<()> {
    doc.remove_attribute(card, CARD_OVERLOADED_ATTR)?;
    doc.remove_attribute(card, CARD_COLOR_ATTR)?;
    doc.remove_attribute(card, CARD_LIMIT_ATTR)?;
    doc.remove_class(card, CARD_OVERLOADED_CLASS)?;

    let surface = card_surface(doc, markup, card);
    clear_styles(doc, surface, CARD_HIGHLIGHT_STYLES)?;
    for icon in super::children_with_class(doc, surface, CARD_WARNING_ICON_CLASS) {
        doc.remove(icon)?;
    }
    Ok(())
}
