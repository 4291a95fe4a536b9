use super::{
    apply_styles, children_with_class, clear_styles, each_artifact, single_child_with_class,
};
use crate::color::with_alpha;
use crate::markup::{
    BoardMarkup, GROUP_ATTR, GROUP_COLOR_PROPERTY, GROUP_COLUMN_STYLES, GROUP_HEADER_CLASS,
    GROUP_HEADER_CONTAINER_CLASS, GROUP_HEADER_COUNTER_CLASS, GROUP_HEADER_HEIGHT_PX,
    GROUP_HEADER_HOST_ATTR, GROUP_HEADER_ID_ATTR, GROUP_HEADER_NAME_CLASS,
};
use crate::Result;
use boardlens_dom::{Document, NodeId, NodeSpec, Selector};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

const HOST_STYLES: &[&str] = &["position", "padding-top"];

/// Visual state of one configured column group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDecoration {
    pub group_id: String,
    pub name: String,
    pub limit: i64,
    pub current_count: usize,
    pub exceeded: bool,
    /// Warning color when exceeded, base color otherwise.
    pub color: String,
    /// Host column elements of the group, leftmost first.
    pub columns: Vec<NodeId>,
    /// Horizontal extent of the group's inferred columns, when known.
    pub span: Option<(f64, f64)>,
}

pub(super) fn reconcile(
    doc: &mut Document,
    markup: &BoardMarkup,
    groups: &[GroupDecoration],
    geometry_warned: &mut BTreeSet<String>,
    failures: &mut Vec<String>,
) -> Result<(usize, usize)> {
    let mut desired: BTreeMap<NodeId, &GroupDecoration> = BTreeMap::new();
    for group in groups {
        for column in &group.columns {
            if doc.contains(*column) {
                desired.entry(*column).or_insert(group);
            }
        }
    }

    let stale: Vec<NodeId> = doc
        .query_all(doc.root(), &Selector::attr(GROUP_ATTR))
        .into_iter()
        .filter(|column| !desired.contains_key(column))
        .collect();
    each_artifact(doc, failures, "group column cleanup", stale, |doc, column| {
        doc.remove_attribute(column, GROUP_ATTR)?;
        clear_styles(doc, column, GROUP_COLUMN_STYLES)
    });
    let decorated = each_artifact(doc, failures, "group column", desired, |doc, (column, group)| {
        decorate_column(doc, column, group)
    });

    let mut headers: BTreeMap<String, NodeId> = BTreeMap::new();
    each_artifact(doc, failures, "group header", groups, |doc, group| {
        if let Some(header) = place_header(doc, markup, group, geometry_warned)? {
            headers.insert(group.group_id.clone(), header);
        }
        Ok(())
    });
    remove_stale_headers(doc, &headers)?;

    Ok((decorated, headers.len()))
}

fn decorate_column(doc: &mut Document, column: NodeId, group: &GroupDecoration) -> Result<()> {
    doc.set_attribute(column, GROUP_ATTR, &group.group_id)?;
    let (shadow, radius) = if group.exceeded {
        (format!("0 0 0 3px {}", group.color), "8px")
    } else {
        ("none".to_string(), "6px")
    };
    apply_styles(
        doc,
        column,
        &[
            (GROUP_COLOR_PROPERTY, group.color.clone()),
            ("box-shadow", shadow),
            ("border-radius", radius.to_string()),
            ("background-color", with_alpha(&group.color, 0.05)),
        ],
    )?;
    Ok(())
}

fn board_for(doc: &Document, markup: &BoardMarkup, column: NodeId) -> Option<NodeId> {
    markup
        .board_containers
        .iter()
        .find_map(|selector| doc.closest(column, selector))
        .or_else(|| doc.parent(column))
}

fn place_header(
    doc: &mut Document,
    markup: &BoardMarkup,
    group: &GroupDecoration,
    geometry_warned: &mut BTreeSet<String>,
) -> Result<Option<NodeId>> {
    let Some(first) = group.columns.iter().copied().find(|c| doc.contains(*c)) else {
        return Ok(None);
    };
    let Some((left, right)) = group.span else {
        if geometry_warned.insert(group.group_id.clone()) {
            warn!(
                "Group '{}': column geometry unavailable, header skipped",
                group.group_id
            );
        }
        return Ok(None);
    };
    let Some(board) = board_for(doc, markup, first) else {
        debug!("Group '{}': no board container for header", group.group_id);
        return Ok(None);
    };

    let container = ensure_container(doc, board)?;
    let board_left = doc.rect(board).map_or(0.0, |rect| rect.left);
    let counter = format!("{}/{}", group.current_count, group.limit);

    let existing = children_with_class(doc, container, GROUP_HEADER_CLASS)
        .into_iter()
        .find(|h| doc.attribute(*h, GROUP_HEADER_ID_ATTR) == Some(group.group_id.as_str()));
    let header = match existing {
        Some(header) if header_is_complete(doc, header) => header,
        stale => {
            if let Some(stale) = stale {
                doc.remove(stale)?;
            }
            let spec = NodeSpec::new("div")
                .class(GROUP_HEADER_CLASS)
                .attr(GROUP_HEADER_ID_ATTR, group.group_id.as_str())
                .child(
                    NodeSpec::new("span")
                        .class(GROUP_HEADER_NAME_CLASS)
                        .attr("title", group.name.as_str())
                        .text(group.name.as_str()),
                )
                .child(
                    NodeSpec::new("span")
                        .class(GROUP_HEADER_COUNTER_CLASS)
                        .text(counter.as_str()),
                );
            doc.append_spec(container, &spec)?
        }
    };

    apply_styles(
        doc,
        header,
        &[
            ("position", "absolute".to_string()),
            ("left", format!("{}px", (left - board_left).round())),
            ("width", format!("{}px", (right - left).max(0.0).round())),
            ("height", "32px".to_string()),
            ("background", with_alpha(&group.color, 0.15)),
            ("border", format!("1px solid {}", group.color)),
            ("border-radius", "4px".to_string()),
            ("color", group.color.clone()),
        ],
    )?;
    for child in doc.children(header).to_vec() {
        if doc.has_class(child, GROUP_HEADER_NAME_CLASS) {
            doc.set_attribute(child, "title", &group.name)?;
            doc.set_text(child, &group.name)?;
        } else if doc.has_class(child, GROUP_HEADER_COUNTER_CLASS) {
            doc.set_text(child, &counter)?;
            apply_styles(doc, child, &[("background", group.color.clone())])?;
        }
    }
    Ok(Some(header))
}

fn header_is_complete(doc: &Document, header: NodeId) -> bool {
    let has = |class: &str| doc.children(header).iter().any(|c| doc.has_class(*c, class));
    has(GROUP_HEADER_NAME_CLASS) && has(GROUP_HEADER_COUNTER_CLASS)
}

fn ensure_container(doc: &mut Document, board: NodeId) -> Result<NodeId> {
    if let Some(container) = single_child_with_class(doc, board, GROUP_HEADER_CONTAINER_CLASS)? {
        return Ok(container);
    }
    let spec = NodeSpec::new("div")
        .class(GROUP_HEADER_CONTAINER_CLASS)
        .style("position", "absolute")
        .style("top", "0")
        .style("left", "0")
        .style("right", "0")
        .style("height", format!("{GROUP_HEADER_HEIGHT_PX}px"))
        .style("pointer-events", "none");
    let first = doc.children(board).first().copied();
    let container = doc.insert_spec_before(board, &spec, first)?;

    doc.set_attribute(board, GROUP_HEADER_HOST_ATTR, "true")?;
    apply_styles(
        doc,
        board,
        &[
            ("position", "relative".to_string()),
            ("padding-top", format!("{GROUP_HEADER_HEIGHT_PX}px")),
        ],
    )?;
    Ok(container)
}

fn remove_stale_headers(doc: &mut Document, keep: &BTreeMap<String, NodeId>) -> Result<()> {
    let kept: BTreeSet<NodeId> = keep.values().copied().collect();
    let containers = doc.query_all(doc.root(), &Selector::class(GROUP_HEADER_CONTAINER_CLASS));
    for container in containers {
        for header in doc.children(container).to_vec() {
            if !kept.contains(&header) {
                doc.remove(header)?;
            }
        }
        if doc.children(container).is_empty() {
            let host = doc.parent(container);
            doc.remove(container)?;
            if let Some(host) = host {
                if doc.remove_attribute(host, GROUP_HEADER_HOST_ATTR)? {
                    clear_styles(doc, host, HOST_STYLES)?;
                }
            }
        }
    }
    Ok(())
}
