//! One evaluation pass: columns, then owners, then limits, then annotations.

use crate::columns::{Column, ColumnInference, ColumnLayout, DEFAULT_COLUMN_GAP_PX};
use crate::indicators::{BadgePosition, Indicator, IndicatorKind, IndicatorRegistry};
use crate::limits::{
    evaluate_group_limit, evaluate_owner_limit, evaluate_workload, owners_of, CardFacts,
    Evaluation, WorkloadEntry,
};
use crate::lookup::BoardView;
use crate::markup::{BoardMarkup, OwnerLabels};
use crate::owners::{Owner, OwnerExtractor};
use crate::reconcile::{
    AnnotationPlan, AnnotationStats, CardHighlight, GroupDecoration, OwnerBadge, Reconciler,
};
use crate::{EngineError, Result};
use boardlens_dom::{Document, NodeId, Rect};
use boardlens_protocol::{BoardSettings, GroupLimit, OwnerLimit};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;

pub const WORKLOAD_SOURCE: &str = "workload";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Horizontal gap, in pixels, that separates two columns.
    pub column_gap_threshold: f64,
    pub markup: BoardMarkup,
    pub labels: OwnerLabels,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            column_gap_threshold: DEFAULT_COLUMN_GAP_PX,
            markup: BoardMarkup::default(),
            labels: OwnerLabels::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.column_gap_threshold.is_finite() || self.column_gap_threshold <= 0.0 {
            return Err(EngineError::InvalidSettings(format!(
                "column gap threshold must be a positive number, got {}",
                self.column_gap_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Applied,
    /// No visible card yet; annotations were left untouched.
    BoardNotReady,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub columns: Vec<Column>,
    pub owners: Vec<Owner>,
    pub owner_limits: Vec<Evaluation>,
    pub group_limits: Vec<Evaluation>,
    pub workload: Vec<WorkloadEntry>,
    /// The indicator shown for each owner that has one.
    pub indicators: Vec<Indicator>,
    pub annotations: AnnotationStats,
    pub duration_ms: u64,
}

impl PassReport {
    fn not_ready(started: Instant) -> Self {
        Self {
            outcome: PassOutcome::BoardNotReady,
            columns: Vec::new(),
            owners: Vec::new(),
            owner_limits: Vec::new(),
            group_limits: Vec::new(),
            workload: Vec::new(),
            indicators: Vec::new(),
            annotations: AnnotationStats::default(),
            duration_ms: elapsed_ms(started),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.outcome == PassOutcome::Applied
    }

    /// True when any enabled owner limit of `owner_id` is exceeded.
    #[must_use]
    pub fn is_owner_over_limit(&self, owner_id: &str) -> bool {
        self.owner_limits
            .iter()
            .any(|eval| eval.exceeded && eval.owner_id.as_deref() == Some(owner_id))
    }

    #[must_use]
    pub fn is_group_over_limit(&self, group_id: &str) -> bool {
        self.group_limits
            .iter()
            .any(|eval| eval.exceeded && eval.limit_id == group_id)
    }

    #[must_use]
    pub fn evaluation(&self, limit_id: &str) -> Option<&Evaluation> {
        self.owner_limits
            .iter()
            .chain(&self.group_limits)
            .find(|eval| eval.limit_id == limit_id)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Explicit column ids win; otherwise names are matched against the inferred
/// column names, case-insensitively.
fn resolve_column_ids(ids: &[String], names: &[String], layout: &ColumnLayout) -> Vec<String> {
    if !ids.is_empty() {
        return ids.to_vec();
    }
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let wanted = name.trim().to_uppercase();
        for column in layout.columns() {
            if column.name.trim().to_uppercase() == wanted && !out.contains(&column.id) {
                out.push(column.id.clone());
            }
        }
    }
    out
}

/// Owns the per-board state that outlives a pass: the indicator registry
/// and the reconciler.
#[derive(Debug)]
pub struct BoardEngine {
    config: EngineConfig,
    registry: IndicatorRegistry,
    reconciler: Reconciler,
}

impl BoardEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: IndicatorRegistry::new(),
            reconciler: Reconciler::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &IndicatorRegistry {
        &self.registry
    }

    /// Registers an indicator owned by another feature. It takes part in the
    /// priority merge below every computed kind and survives passes until
    /// removed.
    pub fn register_custom(&mut self, mut indicator: Indicator) {
        indicator.kind = IndicatorKind::Custom;
        self.registry.register(indicator);
    }

    pub fn remove_custom(&mut self, owner_id: &str, source: &str) -> bool {
        self.registry.remove(owner_id, IndicatorKind::Custom, source)
    }

    /// Columns, owners and card facts of the current tree. Read-only.
    #[must_use]
    pub fn inspect(&self, doc: &Document, settings: &BoardSettings) -> BoardView {
        let inference = ColumnInference::new(&self.config.markup, self.config.column_gap_threshold);
        let cards = inference.board_cards(doc);
        let layout = inference.layout(doc, &cards);
        let roster = OwnerExtractor::new(&self.config.markup, &self.config.labels).roster(
            doc,
            &cards,
            &settings.assignee_colors.custom_colors,
        );
        let facts = cards
            .iter()
            .map(|card| {
                let column = layout.column_for_card(*card);
                CardFacts {
                    card: *card,
                    column_id: column.map(|c| c.id.clone()),
                    column_name: column.map(|c| c.name.clone()),
                    owner_id: roster.owner_id_for_card(*card).map(str::to_string),
                }
            })
            .collect();
        BoardView {
            layout,
            roster,
            facts,
        }
    }

    /// Runs one full pass against `doc`.
    pub fn run_pass(&mut self, doc: &mut Document, settings: &BoardSettings) -> PassReport {
        let started = Instant::now();
        let view = self.inspect(doc, settings);
        if view.layout.is_empty() {
            debug!("No visible cards; board not ready");
            return PassReport::not_ready(started);
        }

        let owner_limits: Vec<(OwnerLimit, Evaluation)> = if settings.personal_wip_limits.enabled {
            settings
                .personal_wip_limits
                .limits
                .iter()
                .map(|limit| {
                    let mut resolved = limit.clone();
                    resolved.column_ids =
                        resolve_column_ids(&limit.column_ids, &limit.column_names, &view.layout);
                    let eval = evaluate_owner_limit(&resolved, &view.facts);
                    (resolved, eval)
                })
                .collect()
        } else {
            Vec::new()
        };
        let group_limits: Vec<(GroupLimit, Evaluation)> =
            if settings.column_group_wip_limits.enabled {
                settings
                    .column_group_wip_limits
                    .limits
                    .iter()
                    .map(|limit| {
                        let mut resolved = limit.clone();
                        resolved.column_ids = resolve_column_ids(
                            &limit.column_ids,
                            &limit.column_names,
                            &view.layout,
                        );
                        if resolved.column_ids.is_empty() {
                            debug!("Group '{}' matches no column on this board", limit.id);
                        }
                        let eval = evaluate_group_limit(&resolved, &view.facts);
                        (resolved, eval)
                    })
                    .collect()
            } else {
                Vec::new()
            };
        let workload = if settings.workload.enabled {
            evaluate_workload(&settings.workload, &view.facts)
        } else {
            Vec::new()
        };

        self.sync_indicators(settings, &view, &owner_limits, &group_limits, &workload);

        let tree: &Document = doc;
        let groups = group_limits
            .iter()
            .map(|(limit, eval)| group_decoration(tree, &view.layout, limit, eval))
            .collect();
        let plan = AnnotationPlan {
            badges: self.badges(&view),
            groups,
            highlights: owner_limits
                .iter()
                .filter(|(_, eval)| eval.exceeded)
                .flat_map(|(limit, eval)| {
                    eval.contributing.iter().map(move |card| CardHighlight {
                        card: *card,
                        color: limit.effective_color().to_string(),
                        limit_id: limit.id.clone(),
                    })
                })
                .collect(),
        };
        let annotations = self.reconciler.apply(doc, &self.config.markup, &plan);

        let indicators = self
            .registry
            .visible_all()
            .into_values()
            .cloned()
            .collect();
        let report = PassReport {
            outcome: PassOutcome::Applied,
            columns: view.layout.columns().to_vec(),
            owners: view.roster.owners().to_vec(),
            owner_limits: owner_limits.into_iter().map(|(_, eval)| eval).collect(),
            group_limits: group_limits.into_iter().map(|(_, eval)| eval).collect(),
            workload,
            indicators,
            annotations,
            duration_ms: elapsed_ms(started),
        };
        let exceeded = report
            .owner_limits
            .iter()
            .chain(&report.group_limits)
            .filter(|eval| eval.exceeded)
            .count();
        if report.annotations.failures.is_empty() {
            debug!(
                "Pass applied: {} columns, {} owners, {} limits exceeded, {} mutations",
                report.columns.len(),
                report.owners.len(),
                exceeded,
                report.annotations.mutations
            );
        } else {
            warn!(
                "Pass applied with {} failed annotation stages",
                report.annotations.failures.len()
            );
        }
        report
    }

    /// Removes every annotation from `doc` and forgets computed indicators.
    pub fn clear(&mut self, doc: &mut Document) -> AnnotationStats {
        self.registry.retain_sources(&BTreeSet::new());
        let stats = self.reconciler.clear(doc, &self.config.markup);
        info!("Cleared board annotations ({} mutations)", stats.mutations);
        stats
    }

    fn sync_indicators(
        &mut self,
        settings: &BoardSettings,
        view: &BoardView,
        owner_limits: &[(OwnerLimit, Evaluation)],
        group_limits: &[(GroupLimit, Evaluation)],
        workload: &[WorkloadEntry],
    ) {
        let mut active: BTreeSet<String> = BTreeSet::new();

        for (limit, eval) in owner_limits {
            active.insert(limit.id.clone());
            let indicators = if eval.exceeded {
                vec![Indicator {
                    owner_id: limit.user_id.clone(),
                    kind: IndicatorKind::OwnerLimit,
                    color: limit.effective_color().to_string(),
                    tooltip: format!(
                        "{}: {}/{} cards in limited columns",
                        limit.user_name, eval.current_count, eval.limit
                    ),
                    position: BadgePosition::TopRight,
                    source: limit.id.clone(),
                }]
            } else {
                Vec::new()
            };
            self.registry
                .sync_source(IndicatorKind::OwnerLimit, &limit.id, indicators);
        }

        for (limit, eval) in group_limits {
            active.insert(limit.id.clone());
            let indicators = if eval.exceeded {
                owners_of(&eval.contributing, &view.facts)
                    .into_iter()
                    .map(|owner_id| Indicator {
                        owner_id,
                        kind: IndicatorKind::GroupLimit,
                        color: limit.effective_warning_color().to_string(),
                        tooltip: format!(
                            "Group \"{}\" over limit: {}/{}",
                            limit.name, eval.current_count, eval.limit
                        ),
                        position: BadgePosition::TopLeft,
                        source: limit.id.clone(),
                    })
                    .collect()
            } else {
                Vec::new()
            };
            self.registry
                .sync_source(IndicatorKind::GroupLimit, &limit.id, indicators);
        }

        if settings.workload.enabled {
            active.insert(WORKLOAD_SOURCE.to_string());
            let indicators = workload
                .iter()
                .filter(|entry| entry.overloaded)
                .map(|entry| Indicator {
                    owner_id: entry.owner_id.clone(),
                    kind: IndicatorKind::Workload,
                    color: settings.workload.color.clone(),
                    tooltip: format!("{} cards in progress", entry.in_progress),
                    position: BadgePosition::TopRight,
                    source: WORKLOAD_SOURCE.to_string(),
                })
                .collect();
            self.registry
                .sync_source(IndicatorKind::Workload, WORKLOAD_SOURCE, indicators);
        }

        self.registry.retain_sources(&active);
    }

    fn badges(&self, view: &BoardView) -> Vec<OwnerBadge> {
        self.registry
            .visible_all()
            .into_iter()
            .filter_map(|(owner_id, indicator)| {
                let owner = view.roster.owner(owner_id)?;
                Some(OwnerBadge {
                    owner_name: owner.name.clone(),
                    indicator: indicator.clone(),
                })
            })
            .collect()
    }
}

/// Host column elements of the group in board order, and their horizontal
/// extent when every one of them reports geometry.
fn group_decoration(
    doc: &Document,
    layout: &ColumnLayout,
    limit: &GroupLimit,
    eval: &Evaluation,
) -> GroupDecoration {
    let mut inferred: Vec<&Column> = limit
        .column_ids
        .iter()
        .filter_map(|id| layout.column(id))
        .collect();
    inferred.sort_by_key(|column| column.index);

    let mut columns: Vec<NodeId> = Vec::new();
    for element in inferred.iter().filter_map(|column| column.element) {
        if !columns.contains(&element) {
            columns.push(element);
        }
    }
    let rects: Option<Vec<Rect>> = columns.iter().map(|column| doc.rect(*column)).collect();
    let span = rects.filter(|rects| !rects.is_empty()).map(|rects| {
        let left = rects.iter().map(|r| r.left).fold(f64::INFINITY, f64::min);
        let right = rects.iter().map(Rect::right).fold(f64::NEG_INFINITY, f64::max);
        (left, right)
    });

    let color = if eval.exceeded {
        limit.effective_warning_color().to_string()
    } else {
        limit.base_color.clone()
    };
    GroupDecoration {
        group_id: limit.id.clone(),
        name: limit.name.clone(),
        limit: limit.limit,
        current_count: eval.current_count,
        exceeded: eval.exceeded,
        color,
        columns,
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{BoardFixture, CardOwner};
    use boardlens_protocol::GroupLimitSettings;

    #[test]
    fn invalid_gap_threshold_is_rejected() {
        for threshold in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let config = EngineConfig {
                column_gap_threshold: threshold,
                ..EngineConfig::default()
            };
            assert!(BoardEngine::new(config).is_err());
        }
    }

    #[test]
    fn group_columns_resolve_by_name() {
        let mut doc = BoardFixture::new()
            .column(Some("To Do"))
            .card("A-1", 10.0, CardOwner::named("Alice"))
            .column(Some("Review"))
            .card("A-2", 400.0, CardOwner::named("Alice"))
            .card("A-3", 400.0, CardOwner::named("Bob"))
            .document();
        let settings = BoardSettings {
            column_group_wip_limits: GroupLimitSettings {
                enabled: true,
                limits: vec![GroupLimit {
                    id: "review".into(),
                    name: "Review".into(),
                    column_names: vec!["review".into()],
                    limit: 2,
                    ..GroupLimit::default()
                }],
            },
            ..BoardSettings::default()
        };
        let mut engine = BoardEngine::new(EngineConfig::default()).unwrap();
        let report = engine.run_pass(&mut doc, &settings);
        let eval = report.evaluation("review").unwrap();
        assert_eq!((eval.current_count, eval.exceeded), (2, true));
        assert!(report.is_group_over_limit("review"));
        assert!(!report.is_group_over_limit("missing"));
    }

    #[test]
    fn resolve_prefers_explicit_ids() {
        let layout = ColumnLayout::default();
        assert_eq!(
            resolve_column_ids(&["column-4".into()], &["DONE".into()], &layout),
            vec!["column-4".to_string()]
        );
        assert!(resolve_column_ids(&[], &["DONE".into()], &layout).is_empty());
    }
}
