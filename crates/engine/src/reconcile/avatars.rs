use super::{apply_styles, each_artifact, single_child_with_class};
use crate::indicators::{BadgePosition, Indicator};
use crate::markup::{
    BoardMarkup, AVATAR_BADGE_CLASS, AVATAR_BADGE_CONTAINER_CLASS, AVATAR_BADGE_KIND_ATTR,
    AVATAR_BADGE_OWNER_ATTR, AVATAR_BADGE_SOURCE_ATTR,
};
use crate::owners::{owner_id_from_avatar_url, resolve_owner_id};
use crate::Result;
use boardlens_dom::{Document, NodeId, NodeSpec, Selector};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// The visible indicator of one owner. Avatars are matched by owner id;
/// the name is only used for avatars whose image carries no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerBadge {
    pub owner_name: String,
    pub indicator: Indicator,
}

fn avatar_name(
    doc: &Document,
    markup: &BoardMarkup,
    avatar: NodeId,
    img: Option<NodeId>,
) -> Option<String> {
    let label = doc
        .query(avatar, &markup.avatar_label)
        .map(|label| doc.text_content(label).trim().to_string());
    let alt = img
        .and_then(|img| doc.attribute(img, "alt"))
        .map(|alt| alt.trim().to_string());
    label
        .filter(|name| !name.is_empty())
        .or_else(|| alt.filter(|name| !name.is_empty()))
}

/// Badge of the owner `avatar` shows. The avatar's id is resolved the way
/// card owners are: account id or gravatar hash from the image, else a hash
/// of the exact name.
fn badge_for<'b>(
    doc: &Document,
    markup: &BoardMarkup,
    avatar: NodeId,
    badges: &'b [OwnerBadge],
) -> Option<&'b OwnerBadge> {
    let img = doc.query(avatar, &Selector::tag("img"));
    let url_id = img
        .and_then(|img| doc.attribute(img, "src"))
        .and_then(owner_id_from_avatar_url);
    let name = avatar_name(doc, markup, avatar, img);
    let id = url_id
        .clone()
        .or_else(|| name.as_deref().map(|name| resolve_owner_id(None, name)))?;

    badges
        .iter()
        .find(|badge| badge.indicator.owner_id == id)
        .or_else(|| {
            let name = name.as_deref().filter(|_| url_id.is_none())?;
            badges.iter().find(|badge| badge.owner_name == name)
        })
}

fn container_styles(position: BadgePosition) -> (Vec<(&'static str, String)>, &'static str) {
    let (side, other) = match position {
        BadgePosition::TopRight => ("right", "left"),
        BadgePosition::TopLeft => ("left", "right"),
    };
    (
        vec![
            ("position", "absolute".to_string()),
            ("top", "-4px".to_string()),
            (side, "-4px".to_string()),
            ("z-index", "999999".to_string()),
            ("pointer-events", "none".to_string()),
        ],
        other,
    )
}

fn icon_styles(color: &str) -> Vec<(&'static str, String)> {
    vec![
        ("width", "14px".to_string()),
        ("height", "14px".to_string()),
        ("border-radius", "50%".to_string()),
        ("font-size", "10px".to_string()),
        ("color", color.to_string()),
        ("box-shadow", format!("0 0 6px {color}")),
    ]
}

pub(super) fn reconcile(
    doc: &mut Document,
    markup: &BoardMarkup,
    badges: &[OwnerBadge],
    failures: &mut Vec<String>,
) -> Result<usize> {
    let mut desired: BTreeMap<NodeId, &OwnerBadge> = BTreeMap::new();
    for avatar in doc.query_all(doc.root(), &markup.avatar) {
        let Some(badge) = badge_for(doc, markup, avatar, badges) else {
            continue;
        };
        match doc.query(avatar, &markup.avatar_inner) {
            Some(inner) => {
                desired.entry(inner).or_insert(badge);
            }
            None => debug!("Avatar {avatar} has no inner element; badge skipped"),
        }
    }

    let hosts: BTreeSet<NodeId> = desired.keys().copied().collect();
    let stale: Vec<NodeId> = doc
        .query_all(doc.root(), &Selector::class(AVATAR_BADGE_CONTAINER_CLASS))
        .into_iter()
        .filter(|container| !doc.parent(*container).is_some_and(|p| hosts.contains(&p)))
        .collect();
    each_artifact(doc, failures, "avatar badge removal", stale, |doc, container| {
        Ok(doc.remove(container)?)
    });

    Ok(each_artifact(doc, failures, "avatar badge", desired, |doc, (inner, badge)| {
        render(doc, inner, &badge.indicator)
    }))
}

fn render(doc: &mut Document, inner: NodeId, indicator: &Indicator) -> Result<()> {
    doc.set_style(inner, "position", "relative")?;
    let (container_css, opposite) = container_styles(indicator.position);

    let Some(container) = single_child_with_class(doc, inner, AVATAR_BADGE_CONTAINER_CLASS)? else {
        let mut icon = NodeSpec::new("div")
            .class(AVATAR_BADGE_CLASS)
            .attr(AVATAR_BADGE_KIND_ATTR, indicator.kind.as_str())
            .attr(AVATAR_BADGE_SOURCE_ATTR, indicator.source.as_str())
            .attr(AVATAR_BADGE_OWNER_ATTR, indicator.owner_id.as_str())
            .attr("title", indicator.tooltip.as_str())
            .text("⚠️");
        for (property, value) in icon_styles(&indicator.color) {
            icon = icon.style(property, value);
        }
        let mut spec = NodeSpec::new("div").class(AVATAR_BADGE_CONTAINER_CLASS).child(icon);
        for (property, value) in container_css {
            spec = spec.style(property, value);
        }
        doc.append_spec(inner, &spec)?;
        return Ok(());
    };

    apply_styles(doc, container, &container_css)?;
    doc.remove_style(container, opposite)?;

    let icon = match single_child_with_class(doc, container, AVATAR_BADGE_CLASS)? {
        Some(icon) => icon,
        None => {
            let icon = doc.append_spec(container, &NodeSpec::new("div").class(AVATAR_BADGE_CLASS))?;
            doc.set_text(icon, "⚠️")?;
            icon
        }
    };
    doc.set_attribute(icon, AVATAR_BADGE_KIND_ATTR, indicator.kind.as_str())?;
    doc.set_attribute(icon, AVATAR_BADGE_SOURCE_ATTR, &indicator.source)?;
    doc.set_attribute(icon, AVATAR_BADGE_OWNER_ATTR, &indicator.owner_id)?;
    doc.set_attribute(icon, "title", &indicator.tooltip)?;
    apply_styles(doc, icon, &icon_styles(&indicator.color))?;
    Ok(())
}
