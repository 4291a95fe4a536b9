use boardlens_dom::{MutationRecord, NodeSnapshot, ObserveOptions};
use boardlens_engine::BoardMarkup;

/// Attributes whose change can move a card between columns.
pub const OBSERVED_ATTRIBUTES: &[&str] = &["class", "data-testid"];

#[must_use]
pub fn observe_options() -> ObserveOptions {
    ObserveOptions::subtree_with_attributes(OBSERVED_ATTRIBUTES)
}

fn is_card_or_container(markup: &BoardMarkup, node: &NodeSnapshot) -> bool {
    markup.change_card.matches(node) || markup.change_card_container.matches(node)
}

/// Whether `record` may change column membership or ownership of a card.
#[must_use]
pub fn is_relevant(markup: &BoardMarkup, record: &MutationRecord) -> bool {
    match record {
        MutationRecord::ChildList { added, removed, .. } => added
            .iter()
            .chain(removed)
            .any(|node| is_card_or_container(markup, node)),
        MutationRecord::Attributes { target, attribute } => {
            OBSERVED_ATTRIBUTES.contains(&attribute.as_str())
                && (markup.change_card.matches(target) || markup.change_column.matches(target))
        }
        MutationRecord::CharacterData { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardlens_dom::{Document, MutationListener, NodeSpec};
    use std::sync::{Arc, Mutex};

    fn recorded(doc: &mut Document) -> Arc<Mutex<Vec<MutationRecord>>> {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        let listener: MutationListener = Arc::new(move |record: &MutationRecord| {
            sink.lock().unwrap().push(record.clone());
        });
        let root = doc.root();
        doc.observe(root, observe_options(), listener).unwrap();
        records
    }

    #[test]
    fn card_moves_are_relevant() {
        let markup = BoardMarkup::default();
        let mut doc = Document::new();
        let root = doc.root();
        let column = doc
            .append_spec(
                root,
                &NodeSpec::new("div").attr("data-testid", "platform-board-kit.ui.column.draggable-column"),
            )
            .unwrap();
        let records = recorded(&mut doc);

        let card = doc
            .append_spec(
                column,
                &NodeSpec::new("div").attr("data-testid", "platform-board-kit.ui.card.card"),
            )
            .unwrap();
        doc.add_class(column, "is-dragging").unwrap();
        doc.remove(card).unwrap();

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| is_relevant(&markup, r)));
    }

    #[test]
    fn unrelated_writes_are_ignored() {
        let markup = BoardMarkup::default();
        let mut doc = Document::new();
        let root = doc.root();
        let toolbar = doc.append_spec(root, &NodeSpec::new("div").class("toolbar")).unwrap();
        let records = recorded(&mut doc);

        doc.append_spec(toolbar, &NodeSpec::new("span").text("Filters")).unwrap();
        doc.add_class(toolbar, "active").unwrap();
        doc.set_text(toolbar, "Board").unwrap();

        let records = records.lock().unwrap();
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| !is_relevant(&markup, r)));
    }

    #[test]
    fn style_writes_are_not_observed() {
        let mut doc = Document::new();
        let root = doc.root();
        let card = doc
            .append_spec(
                root,
                &NodeSpec::new("div").attr("data-testid", "platform-board-kit.ui.card.card"),
            )
            .unwrap();
        let records = recorded(&mut doc);
        doc.set_style(card, "border", "1px solid red").unwrap();
        doc.set_attribute(card, "title", "K-1").unwrap();
        assert!(records.lock().unwrap().is_empty());
    }
}
