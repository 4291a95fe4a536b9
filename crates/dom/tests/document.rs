use boardlens_dom::{
    shared, Document, MutationListener, MutationRecord, NodeSpec, ObserveOptions, Rect, Selector,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::thread;

const CARD: &str = "platform-board-kit.ui.card.card";

fn card_selector() -> Selector {
    Selector::attr_eq("data-testid", CARD)
}

#[test]
fn sparse_snapshot_fills_defaults() {
    let raw = r#"{
        "tag": "body",
        "children": [{
            "attributes": { "data-testid": "platform-board-kit.ui.card.card" },
            "rect": { "left": 10.0, "top": 100.0, "width": 250.0, "height": 80.0 },
            "children": [{ "tag": "span", "text": "K-1" }]
        }]
    }"#;
    let spec: NodeSpec = serde_json::from_str(raw).unwrap();
    let doc = Document::from_spec(&spec);

    let card = doc.query(doc.root(), &card_selector()).unwrap();
    assert_eq!(doc.tag(card), Some("div"));
    assert_eq!(doc.rect(card), Some(Rect::new(10.0, 100.0, 250.0, 80.0)));
    assert_eq!(doc.text_content(doc.root()), "K-1");
    assert!(doc.classes(card).is_empty());
}

#[test]
fn annotated_tree_reloads_unchanged() {
    let mut doc = Document::from_spec(
        &NodeSpec::new("body").child(
            NodeSpec::new("div")
                .attr("data-testid", CARD)
                .rect(Rect::new(10.0, 0.0, 200.0, 80.0))
                .child(NodeSpec::new("span").text("K-7")),
        ),
    );
    let card = doc.query(doc.root(), &card_selector()).unwrap();
    doc.add_class(card, "bl-wip-overloaded").unwrap();
    doc.set_style(card, "border", "5px solid #FF5630").unwrap();
    doc.append_spec(card, &NodeSpec::new("div").class("bl-wip-warning-icon").text("⚠️"))
        .unwrap();

    let written = serde_json::to_string(&doc.to_spec(doc.root()).unwrap()).unwrap();
    let reloaded = Document::from_spec(&serde_json::from_str(&written).unwrap());

    assert_eq!(reloaded.to_spec(reloaded.root()), doc.to_spec(doc.root()));
    let card = reloaded.query(reloaded.root(), &card_selector()).unwrap();
    assert_eq!(reloaded.style(card, "border"), Some("5px solid #FF5630"));
    assert_eq!(reloaded.text_content(card), "K-7⚠️");
}

#[test]
fn disconnected_observer_hears_nothing() {
    let mut doc = Document::new();
    let root = doc.root();
    let seen: Arc<Mutex<Vec<MutationRecord>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let listener: MutationListener = Arc::new(move |record: &MutationRecord| {
        sink.lock().unwrap().push(record.clone());
    });
    let observer = doc
        .observe(root, ObserveOptions::subtree_with_attributes(&["class"]), listener)
        .unwrap();

    let card = doc.append_spec(root, &NodeSpec::new("div").attr("data-testid", CARD)).unwrap();
    doc.add_class(card, "selected").unwrap();
    doc.set_attribute(card, "title", "ignored by the filter").unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);

    assert!(doc.disconnect(observer));
    assert!(!doc.disconnect(observer));
    assert_eq!(doc.observer_count(), 0);
    doc.remove(card).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(doc.mutation_count(), 4);
}

#[test]
fn shared_document_accepts_writes_from_another_thread() {
    let document = shared(Document::from_spec(
        &NodeSpec::new("body").child(NodeSpec::new("div").attr("data-testid", CARD)),
    ));

    let writer = Arc::clone(&document);
    thread::spawn(move || {
        let mut doc = writer.lock().unwrap();
        let card = doc.query(doc.root(), &card_selector()).unwrap();
        doc.set_attribute(card, "data-bl-wip-overloaded", "true").unwrap();
    })
    .join()
    .unwrap();

    let doc = document.lock().unwrap();
    let marked = doc.query_all(doc.root(), &Selector::attr("data-bl-wip-overloaded"));
    assert_eq!(marked.len(), 1);
    assert_eq!(doc.attribute(marked[0], "data-testid"), Some(CARD));
}
