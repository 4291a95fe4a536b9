//! Owner extraction and identity resolution.
//!
//! A card's owner is read from a hidden assignee label. Ids come from the
//! most stable signal available: the account id embedded in the avatar URL,
//! then a gravatar hash, then a hash of the display name. Colors are handed
//! out in first-seen order, so they are only meaningful within one roster.

use crate::color::{OWNER_PALETTE, UNASSIGNED_COLOR};
use crate::markup::{BoardMarkup, OwnerLabels};
use boardlens_dom::{Document, NodeId, Selector};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const UNASSIGNED_ID: &str = "unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Owner {
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.id == UNASSIGNED_ID
    }
}

/// What a single card says about its owner, before colors are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerIdentity {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

enum LabelMatch {
    Named(String),
    Unassigned,
    /// Assignee prefix with nothing after it.
    Blank,
}

/// Deduplicated owners of one pass plus the card → owner mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerRoster {
    owners: Vec<Owner>,
    by_card: BTreeMap<NodeId, usize>,
}

impl OwnerRoster {
    #[must_use]
    pub fn owners(&self) -> &[Owner] {
        &self.owners
    }

    #[must_use]
    pub fn owner(&self, id: &str) -> Option<&Owner> {
        self.owners.iter().find(|owner| owner.id == id)
    }

    #[must_use]
    pub fn owner_for_card(&self, card: NodeId) -> Option<&Owner> {
        self.by_card
            .get(&card)
            .and_then(|index| self.owners.get(*index))
    }

    #[must_use]
    pub fn owner_id_for_card(&self, card: NodeId) -> Option<&str> {
        self.owner_for_card(card).map(|owner| owner.id.as_str())
    }

    /// Cards attributed to `owner_id`, in board order.
    #[must_use]
    pub fn cards_of(&self, owner_id: &str) -> Vec<NodeId> {
        let Some(index) = self.owners.iter().position(|o| o.id == owner_id) else {
            return Vec::new();
        };
        self.by_card
            .iter()
            .filter(|(_, i)| **i == index)
            .map(|(card, _)| *card)
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OwnerExtractor<'a> {
    markup: &'a BoardMarkup,
    labels: &'a OwnerLabels,
}

impl<'a> OwnerExtractor<'a> {
    #[must_use]
    pub const fn new(markup: &'a BoardMarkup, labels: &'a OwnerLabels) -> Self {
        Self { markup, labels }
    }

    /// Reads the owner of one card. `None` when the card carries no owner
    /// signal at all; never fails on malformed markup.
    #[must_use]
    pub fn identity_for_card(&self, doc: &Document, card: NodeId) -> Option<OwnerIdentity> {
        for label in doc.query_all(card, &self.markup.hidden_label) {
            match self.classify(&doc.text_content(label)) {
                Some(LabelMatch::Named(name)) => {
                    let scope = doc.closest(label, &Selector::tag("div")).unwrap_or(card);
                    let src = doc
                        .query(scope, &Selector::tag("img"))
                        .and_then(|img| doc.attribute(img, "src"));
                    return Some(self.named_identity(doc, card, src, name));
                }
                Some(LabelMatch::Unassigned) => return Some(self.unassigned_identity()),
                Some(LabelMatch::Blank) => return None,
                None => {}
            }
        }

        for container in doc.query_all(card, &self.markup.assignee_container) {
            let mut candidates: Vec<(String, Option<String>)> = Vec::new();
            if let Some(label) = doc.attribute(container, "aria-label") {
                candidates.push((label.to_string(), None));
            }
            for img in doc.query_all(container, &Selector::tag("img")) {
                if let Some(alt) = doc.attribute(img, "alt") {
                    let src = doc.attribute(img, "src").map(str::to_string);
                    candidates.push((alt.to_string(), src));
                }
            }
            for (text, src) in candidates {
                match self.classify(&text) {
                    Some(LabelMatch::Named(name)) => {
                        return Some(self.named_identity(doc, card, src.as_deref(), name));
                    }
                    Some(LabelMatch::Unassigned) => return Some(self.unassigned_identity()),
                    Some(LabelMatch::Blank) | None => {}
                }
            }
        }
        None
    }

    /// Builds the roster for `cards`: first-seen deduplication, configured
    /// color overrides, palette colors by position.
    #[must_use]
    pub fn roster(
        &self,
        doc: &Document,
        cards: &[NodeId],
        custom_colors: &BTreeMap<String, String>,
    ) -> OwnerRoster {
        let mut identities: Vec<OwnerIdentity> = Vec::new();
        let mut by_card = BTreeMap::new();
        for card in cards {
            let Some(identity) = self.identity_for_card(doc, *card) else {
                continue;
            };
            let index = match identities.iter().position(|i| i.id == identity.id) {
                Some(index) => index,
                None => {
                    identities.push(identity);
                    identities.len() - 1
                }
            };
            by_card.insert(*card, index);
        }

        let owners = identities
            .into_iter()
            .enumerate()
            .map(|(index, identity)| {
                let color = custom_colors
                    .get(&identity.id)
                    .filter(|c| !c.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| {
                        if identity.id == UNASSIGNED_ID {
                            UNASSIGNED_COLOR.to_string()
                        } else {
                            OWNER_PALETTE[index % OWNER_PALETTE.len()].to_string()
                        }
                    });
                Owner {
                    id: identity.id,
                    name: identity.name,
                    display_name: identity.display_name,
                    color,
                    avatar_url: identity.avatar_url,
                }
            })
            .collect();
        OwnerRoster { owners, by_card }
    }

    #[must_use]
    pub fn extract_owners_from_all_cards(
        &self,
        doc: &Document,
        custom_colors: &BTreeMap<String, String>,
    ) -> Vec<Owner> {
        let cards = doc.query_all(doc.root(), &self.markup.card);
        self.roster(doc, &cards, custom_colors).owners
    }

    /// Owner of `card` colored consistently with the whole board.
    #[must_use]
    pub fn owner_for_card(
        &self,
        doc: &Document,
        card: NodeId,
        custom_colors: &BTreeMap<String, String>,
    ) -> Option<Owner> {
        let id = self.identity_for_card(doc, card)?.id;
        self.extract_owners_from_all_cards(doc, custom_colors)
            .into_iter()
            .find(|owner| owner.id == id)
    }

    /// Avatar image of the card's assignee field, then any gravatar, then any
    /// avatar-looking image.
    #[must_use]
    pub fn avatar_url_for_card(&self, doc: &Document, card: NodeId) -> Option<String> {
        if let Some(wrapper) = doc.query(card, &self.markup.assignee_avatar_image) {
            if let Some(img) = doc.query(wrapper, &Selector::tag("img")) {
                return doc.attribute(img, "src").map(str::to_string);
            }
        }
        [&self.markup.gravatar_image, &self.markup.any_avatar_image]
            .into_iter()
            .filter_map(|selector| doc.query(card, selector))
            .find_map(|img| doc.attribute(img, "src").filter(|s| !s.is_empty()))
            .map(str::to_string)
    }

    fn classify(&self, text: &str) -> Option<LabelMatch> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        for prefix in &self.labels.assignee_prefixes {
            if let Some(rest) = text.strip_prefix(prefix.as_str()) {
                let name = rest.trim();
                return Some(if name.is_empty() {
                    LabelMatch::Blank
                } else {
                    LabelMatch::Named(name.to_string())
                });
            }
        }
        self.labels
            .unassigned_markers
            .iter()
            .any(|marker| marker == text)
            .then_some(LabelMatch::Unassigned)
    }

    fn named_identity(
        &self,
        doc: &Document,
        card: NodeId,
        src: Option<&str>,
        name: String,
    ) -> OwnerIdentity {
        OwnerIdentity {
            id: resolve_owner_id(src, &name),
            display_name: display_initials(&name),
            avatar_url: self.avatar_url_for_card(doc, card),
            name,
        }
    }

    fn unassigned_identity(&self) -> OwnerIdentity {
        OwnerIdentity {
            id: UNASSIGNED_ID.to_string(),
            name: self.labels.unassigned_name.clone(),
            display_name: self.labels.unassigned_display_name.clone(),
            avatar_url: None,
        }
    }
}

fn account_id_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(\d+:[0-9a-f-]{36})/").ok())
        .as_ref()
}

fn gravatar_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"avatar/([0-9a-f]+)").ok())
        .as_ref()
}

/// Account id or gravatar hash embedded in an avatar URL.
#[must_use]
pub fn owner_id_from_avatar_url(src: &str) -> Option<String> {
    let captured = |re: Option<&Regex>| {
        re.and_then(|re| re.captures(src))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    };
    captured(account_id_pattern())
        .or_else(|| captured(gravatar_pattern()).map(|hash| format!("gravatar:{hash}")))
}

/// Stable owner id from the avatar URL when it embeds one, otherwise from
/// the display name.
#[must_use]
pub fn resolve_owner_id(avatar_src: Option<&str>, name: &str) -> String {
    avatar_src
        .and_then(owner_id_from_avatar_url)
        .unwrap_or_else(|| format!("name:{}", name_hash(name)))
}

fn name_hash(name: &str) -> String {
    let digest = Sha256::digest(name.trim().as_bytes());
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}

/// Uppercased initials of the first three words.
#[must_use]
pub fn display_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(3)
        .collect()
}
