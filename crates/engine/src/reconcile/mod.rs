//! Idempotent annotation of the render tree.
//!
//! ```text
//! AnnotationPlan
//!     │
//!     ├──> avatars  (one badge per owner avatar, highest priority indicator)
//!     ├──> groups   (column decoration + floating header strip)
//!     └──> cards    (inline highlight + warning icon)
//! ```
//!
//! Every artifact carries a `bl-` marker class or `data-bl-*` attribute, so
//! each sub-reconciler can find what it owns, update it in place and remove
//! only what is stale. With unchanged input a second run emits no mutation.

mod avatars;
mod cards;
mod groups;

pub use avatars::OwnerBadge;
pub use cards::CardHighlight;
pub use groups::GroupDecoration;

use crate::markup::BoardMarkup;
use crate::Result;
use boardlens_dom::{Document, NodeId};
use log::{error, warn};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct AnnotationPlan {
    pub badges: Vec<OwnerBadge>,
    pub groups: Vec<GroupDecoration>,
    pub highlights: Vec<CardHighlight>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationStats {
    pub badges: usize,
    pub decorated_columns: usize,
    pub group_headers: usize,
    pub highlighted_cards: usize,
    /// Render tree records produced by this run.
    pub mutations: u64,
    pub failures: Vec<String>,
}

/// Owns every annotation artifact in the tree and the little state needed to
/// keep logging quiet across passes.
#[derive(Debug, Default)]
pub struct Reconciler {
    geometry_warned: BTreeSet<String>,
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `plan`. A failing artifact or sub-reconciler is logged and
    /// recorded in the stats; everything else still runs.
    pub fn apply(
        &mut self,
        doc: &mut Document,
        markup: &BoardMarkup,
        plan: &AnnotationPlan,
    ) -> AnnotationStats {
        let before = doc.mutation_count();
        let mut stats = AnnotationStats::default();

        match avatars::reconcile(doc, markup, &plan.badges, &mut stats.failures) {
            Ok(count) => stats.badges = count,
            Err(err) => record_failure(&mut stats, "avatar badges", &err),
        }
        match groups::reconcile(
            doc,
            markup,
            &plan.groups,
            &mut self.geometry_warned,
            &mut stats.failures,
        ) {
            Ok((columns, headers)) => {
                stats.decorated_columns = columns;
                stats.group_headers = headers;
            }
            Err(err) => record_failure(&mut stats, "group decoration", &err),
        }
        match cards::reconcile(doc, markup, &plan.highlights, &mut stats.failures) {
            Ok(count) => stats.highlighted_cards = count,
            Err(err) => record_failure(&mut stats, "card highlight", &err),
        }

        stats.mutations = doc.mutation_count() - before;
        stats
    }

    /// Removes every annotation artifact.
    pub fn clear(&mut self, doc: &mut Document, markup: &BoardMarkup) -> AnnotationStats {
        self.geometry_warned.clear();
        self.apply(doc, markup, &AnnotationPlan::default())
    }
}

fn record_failure(stats: &mut AnnotationStats, stage: &str, err: &crate::EngineError) {
    error!("Annotation stage '{stage}' failed: {err}");
    stats.failures.push(format!("{stage}: {err}"));
}

/// Runs `update` for every artifact. A failing artifact is logged and
/// recorded; the rest still run. Returns how many succeeded.
pub(crate) fn each_artifact<T>(
    doc: &mut Document,
    failures: &mut Vec<String>,
    stage: &str,
    items: impl IntoIterator<Item = T>,
    mut update: impl FnMut(&mut Document, T) -> Result<()>,
) -> usize {
    let mut done = 0;
    for item in items {
        match update(doc, item) {
            Ok(()) => done += 1,
            Err(err) => {
                warn!("Annotation of one {stage} failed, continuing: {err}");
                failures.push(format!("{stage}: {err}"));
            }
        }
    }
    done
}

/// Sets each property, returning how many actually changed.
pub(crate) fn apply_styles(doc: &mut Document, id: NodeId, styles: &[(&str, String)]) -> Result<usize> {
    let mut changed = 0;
    for (property, value) in styles {
        if doc.set_style(id, property, value)? {
            changed += 1;
        }
    }
    Ok(changed)
}

pub(crate) fn clear_styles(doc: &mut Document, id: NodeId, properties: &[&str]) -> Result<()> {
    for property in properties {
        doc.remove_style(id, property)?;
    }
    Ok(())
}

/// Direct children of `parent` carrying `class`.
pub(crate) fn children_with_class(doc: &Document, parent: NodeId, class: &str) -> Vec<NodeId> {
    doc.children(parent)
        .iter()
        .copied()
        .filter(|child| doc.has_class(*child, class))
        .collect()
}

/// Keeps the first match and removes duplicates left by earlier runs.
pub(crate) fn single_child_with_class(
    doc: &mut Document,
    parent: NodeId,
    class: &str,
) -> Result<Option<NodeId>> {
    let mut found = children_with_class(doc, parent, class).into_iter();
    let first = found.next();
    for duplicate in found {
        warn!("Removing duplicate '{class}' under {parent}");
        doc.remove(duplicate)?;
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardlens_dom::NodeSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn vanished_artifact_does_not_stop_the_others() {
        let mut doc = Document::from_spec(
            &NodeSpec::new("body")
                .child(NodeSpec::new("div"))
                .child(NodeSpec::new("div"))
                .child(NodeSpec::new("div")),
        );
        let cards = doc.children(doc.root()).to_vec();
        doc.remove(cards[1]).unwrap();

        let mut failures = Vec::new();
        let done = each_artifact(
            &mut doc,
            &mut failures,
            "card highlight",
            cards.clone(),
            |doc, card| {
                doc.set_attribute(card, crate::markup::CARD_OVERLOADED_ATTR, "true")?;
                Ok(())
            },
        );

        assert_eq!(done, 2);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("card highlight: "));
        assert!(doc.has_attribute(cards[2], crate::markup::CARD_OVERLOADED_ATTR));
    }
}
