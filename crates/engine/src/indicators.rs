use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorKind {
    OwnerLimit,
    GroupLimit,
    Workload,
    Custom,
}

impl IndicatorKind {
    /// Lower wins.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::OwnerLimit => 0,
            Self::GroupLimit => 1,
            Self::Workload => 2,
            Self::Custom => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OwnerLimit => "owner-limit",
            Self::GroupLimit => "group-limit",
            Self::Workload => "workload",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgePosition {
    TopRight,
    TopLeft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub owner_id: String,
    pub kind: IndicatorKind,
    pub color: String,
    pub tooltip: String,
    pub position: BadgePosition,
    /// Id of the limit (or rule) that produced the indicator.
    pub source: String,
}

/// The one indicator to render: highest priority kind, first registered on
/// ties.
#[must_use]
pub fn choose_visible(indicators: &[Indicator]) -> Option<&Indicator> {
    let mut best: Option<&Indicator> = None;
    for indicator in indicators {
        if best.map_or(true, |b| indicator.kind.priority() < b.kind.priority()) {
            best = Some(indicator);
        }
    }
    best
}

/// Indicators per owner in registration order. At most one entry exists
/// per `(kind, source)` pair for an owner.
#[derive(Debug, Clone, Default)]
pub struct IndicatorRegistry {
    by_owner: BTreeMap<String, Vec<Indicator>>,
}

impl IndicatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or updates in place, keeping the original registration slot.
    pub fn register(&mut self, indicator: Indicator) {
        let entries = self.by_owner.entry(indicator.owner_id.clone()).or_default();
        match entries
            .iter_mut()
            .find(|e| e.kind == indicator.kind && e.source == indicator.source)
        {
            Some(existing) => *existing = indicator,
            None => entries.push(indicator),
        }
    }

    pub fn remove(&mut self, owner_id: &str, kind: IndicatorKind, source: &str) -> bool {
        let Some(entries) = self.by_owner.get_mut(owner_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| !(e.kind == kind && e.source == source));
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.by_owner.remove(owner_id);
        }
        removed
    }

    /// Makes `indicators` the complete set produced by `(kind, source)`:
    /// owners missing from it lose theirs, present ones are updated in place.
    pub fn sync_source(&mut self, kind: IndicatorKind, source: &str, indicators: Vec<Indicator>) {
        let keep: BTreeSet<String> = indicators.iter().map(|i| i.owner_id.clone()).collect();
        let stale: Vec<String> = self
            .by_owner
            .iter()
            .filter(|(owner, entries)| {
                !keep.contains(*owner) && entries.iter().any(|e| e.kind == kind && e.source == source)
            })
            .map(|(owner, _)| owner.clone())
            .collect();
        for owner in stale {
            self.remove(&owner, kind, source);
        }
        for indicator in indicators {
            self.register(indicator);
        }
    }

    /// Drops computed indicators whose source is no longer configured.
    /// Custom indicators are left alone.
    pub fn retain_sources(&mut self, active: &BTreeSet<String>) {
        for entries in self.by_owner.values_mut() {
            entries.retain(|e| e.kind == IndicatorKind::Custom || active.contains(&e.source));
        }
        self.by_owner.retain(|_, entries| !entries.is_empty());
    }

    #[must_use]
    pub fn indicators(&self, owner_id: &str) -> &[Indicator] {
        match self.by_owner.get(owner_id) {
            Some(entries) => entries,
            None => &[],
        }
    }

    #[must_use]
    pub fn visible(&self, owner_id: &str) -> Option<&Indicator> {
        choose_visible(self.indicators(owner_id))
    }

    /// Visible indicator of every owner that has one.
    #[must_use]
    pub fn visible_all(&self) -> BTreeMap<&str, &Indicator> {
        self.by_owner
            .iter()
            .filter_map(|(owner, entries)| choose_visible(entries).map(|i| (owner.as_str(), i)))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_owner.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn indicator(owner: &str, kind: IndicatorKind, source: &str) -> Indicator {
        Indicator {
            owner_id: owner.into(),
            kind,
            color: "#FF0000".into(),
            tooltip: format!("{source} exceeded"),
            position: BadgePosition::TopRight,
            source: source.into(),
        }
    }

    #[test]
    fn owner_limit_outranks_group_limit() {
        let mut registry = IndicatorRegistry::new();
        registry.register(indicator("alice", IndicatorKind::GroupLimit, "dev"));
        registry.register(indicator("alice", IndicatorKind::OwnerLimit, "alice-dev"));

        assert_eq!(registry.visible("alice").map(|i| i.kind), Some(IndicatorKind::OwnerLimit));

        registry.remove("alice", IndicatorKind::OwnerLimit, "alice-dev");
        assert_eq!(registry.visible("alice").map(|i| i.source.as_str()), Some("dev"));
    }

    #[test]
    fn ties_keep_first_registered() {
        let mut registry = IndicatorRegistry::new();
        registry.register(indicator("bob", IndicatorKind::GroupLimit, "qa"));
        registry.register(indicator("bob", IndicatorKind::GroupLimit, "dev"));
        registry.register(indicator("bob", IndicatorKind::GroupLimit, "qa"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.visible("bob").map(|i| i.source.as_str()), Some("qa"));
    }

    #[test]
    fn sync_source_replaces_owner_set() {
        let mut registry = IndicatorRegistry::new();
        registry.sync_source(
            IndicatorKind::GroupLimit,
            "dev",
            vec![
                indicator("alice", IndicatorKind::GroupLimit, "dev"),
                indicator("bob", IndicatorKind::GroupLimit, "dev"),
            ],
        );
        registry.sync_source(
            IndicatorKind::GroupLimit,
            "dev",
            vec![indicator("bob", IndicatorKind::GroupLimit, "dev")],
        );

        assert!(registry.indicators("alice").is_empty());
        assert_eq!(registry.visible_all().len(), 1);
    }

    #[test]
    fn retain_sources_keeps_custom() {
        let mut registry = IndicatorRegistry::new();
        registry.register(indicator("alice", IndicatorKind::OwnerLimit, "gone"));
        registry.register(indicator("alice", IndicatorKind::Custom, "pinned"));
        registry.register(indicator("bob", IndicatorKind::Workload, "workload"));

        registry.retain_sources(&BTreeSet::from(["workload".to_string()]));

        assert_eq!(registry.visible("alice").map(|i| i.kind), Some(IndicatorKind::Custom));
        assert_eq!(registry.visible("bob").map(|i| i.kind), Some(IndicatorKind::Workload));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn choose_visible_on_empty() {
        assert_eq!(choose_visible(&[]), None);
    }
}
