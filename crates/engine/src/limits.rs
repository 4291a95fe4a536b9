//! Limit evaluation over the per-pass card facts. Every call is a full
//! recompute; nothing is carried between passes.

use crate::owners::UNASSIGNED_ID;
use boardlens_dom::NodeId;
use boardlens_protocol::{GroupLimit, OwnerLimit, WorkloadSettings};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Column and owner of one visible card, resolved once per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFacts {
    pub card: NodeId,
    pub column_id: Option<String>,
    pub column_name: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Owner,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub limit_id: String,
    pub kind: LimitKind,
    /// Owner the limit applies to; `None` for group limits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub limit: i64,
    pub current_count: usize,
    pub exceeded: bool,
    #[serde(skip)]
    pub contributing: Vec<NodeId>,
    /// Every card of the limit's owner, inside the limited columns or not.
    /// Empty for group limits.
    #[serde(skip)]
    pub all_owner_cards: Vec<NodeId>,
}

/// Boundary inclusive, and only once at least one card contributes.
#[must_use]
pub fn is_exceeded(count: usize, limit: i64) -> bool {
    count > 0 && i64::try_from(count).unwrap_or(i64::MAX) >= limit
}

fn distinct(cards: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
    let mut seen = BTreeSet::new();
    cards.into_iter().filter(|card| seen.insert(*card)).collect()
}

fn in_columns(facts: &CardFacts, column_ids: &[String]) -> bool {
    facts
        .column_id
        .as_ref()
        .is_some_and(|id| column_ids.iter().any(|wanted| wanted == id))
}

#[must_use]
pub fn evaluate_owner_limit(limit: &OwnerLimit, cards: &[CardFacts]) -> Evaluation {
    let owned: Vec<&CardFacts> = cards
        .iter()
        .filter(|facts| facts.owner_id.as_deref() == Some(limit.user_id.as_str()))
        .collect();
    let contributing = distinct(
        owned
            .iter()
            .filter(|facts| in_columns(facts, &limit.column_ids))
            .map(|facts| facts.card),
    );
    let current_count = contributing.len();
    Evaluation {
        limit_id: limit.id.clone(),
        kind: LimitKind::Owner,
        owner_id: Some(limit.user_id.clone()),
        limit: limit.limit,
        current_count,
        exceeded: is_exceeded(current_count, limit.limit),
        contributing,
        all_owner_cards: distinct(owned.iter().map(|facts| facts.card)),
    }
}

#[must_use]
pub fn evaluate_group_limit(limit: &GroupLimit, cards: &[CardFacts]) -> Evaluation {
    let contributing = distinct(
        cards
            .iter()
            .filter(|facts| in_columns(facts, &limit.column_ids))
            .map(|facts| facts.card),
    );
    let current_count = contributing.len();
    Evaluation {
        limit_id: limit.id.clone(),
        kind: LimitKind::Group,
        owner_id: None,
        limit: limit.limit,
        current_count,
        exceeded: is_exceeded(current_count, limit.limit),
        contributing,
        all_owner_cards: Vec::new(),
    }
}

/// Distinct owners of `cards`, the unassigned bucket excluded.
#[must_use]
pub fn owners_of(cards: &[NodeId], facts: &[CardFacts]) -> Vec<String> {
    let wanted: BTreeSet<NodeId> = cards.iter().copied().collect();
    let mut out: Vec<String> = Vec::new();
    for fact in facts.iter().filter(|f| wanted.contains(&f.card)) {
        if let Some(owner) = fact.owner_id.as_deref() {
            if owner != UNASSIGNED_ID && !out.iter().any(|o| o == owner) {
                out.push(owner.to_string());
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadEntry {
    pub owner_id: String,
    pub in_progress: usize,
    pub overloaded: bool,
}

/// Per-owner count of cards sitting in progress-like columns.
#[must_use]
pub fn evaluate_workload(settings: &WorkloadSettings, cards: &[CardFacts]) -> Vec<WorkloadEntry> {
    let progress: Vec<String> = settings
        .progress_columns
        .iter()
        .map(|name| name.to_uppercase())
        .collect();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();
    for facts in cards {
        let Some(owner) = facts.owner_id.as_deref().filter(|o| *o != UNASSIGNED_ID) else {
            continue;
        };
        let Some(column) = facts.column_name.as_deref() else {
            continue;
        };
        let column = column.to_uppercase();
        if !progress.iter().any(|name| column.contains(name.as_str())) {
            continue;
        }
        let count = counts.entry(owner).or_insert(0);
        if *count == 0 {
            order.push(owner);
        }
        *count += 1;
    }
    order
        .into_iter()
        .map(|owner| {
            let in_progress = counts.get(owner).copied().unwrap_or(0);
            WorkloadEntry {
                owner_id: owner.to_string(),
                in_progress,
                overloaded: in_progress > 0 && in_progress >= settings.threshold,
            }
        })
        .collect()
}
