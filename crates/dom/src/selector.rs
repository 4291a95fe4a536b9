use crate::node::Node;
use crate::snapshot::NodeSnapshot;

/// Read access shared by live nodes and detached snapshots, enough to run a
/// [`Selector`] against either.
pub trait ElementLike {
    fn tag(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<&str>;
    fn classes(&self) -> &[String];

    fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| c == class)
    }
}

impl ElementLike for Node {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}

impl ElementLike for NodeSnapshot {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Structural pattern over a single element. Compound selectors are built
/// with [`Selector::and`] / [`Selector::or`]; ancestry is handled by the
/// document (`closest`, scoped `query_all`), not by the selector itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Any,
    Tag(String),
    HasAttr(String),
    AttrEq(String, String),
    AttrContains(String, String),
    AttrPrefix(String, String),
    Class(String),
    ClassContains(String),
    AllOf(Vec<Selector>),
    AnyOf(Vec<Selector>),
    Not(Box<Selector>),
}

impl Selector {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into().to_ascii_lowercase())
    }

    pub fn attr(name: impl Into<String>) -> Self {
        Self::HasAttr(name.into())
    }

    pub fn attr_eq(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttrEq(name.into(), value.into())
    }

    pub fn attr_contains(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttrContains(name.into(), value.into())
    }

    pub fn attr_prefix(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttrPrefix(name.into(), value.into())
    }

    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    pub fn class_contains(fragment: impl Into<String>) -> Self {
        Self::ClassContains(fragment.into())
    }

    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::AllOf(mut parts) => {
                parts.push(other);
                Self::AllOf(parts)
            }
            first => Self::AllOf(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::AnyOf(mut parts) => {
                parts.push(other);
                Self::AnyOf(parts)
            }
            first => Self::AnyOf(vec![first, other]),
        }
    }

    pub fn matches<E: ElementLike + ?Sized>(&self, element: &E) -> bool {
        match self {
            Self::Any => true,
            Self::Tag(tag) => element.tag() == tag.as_str(),
            Self::HasAttr(name) => element.attribute(name).is_some(),
            Self::AttrEq(name, value) => element.attribute(name) == Some(value.as_str()),
            Self::AttrContains(name, value) => element
                .attribute(name)
                .is_some_and(|actual| actual.contains(value.as_str())),
            Self::AttrPrefix(name, value) => element
                .attribute(name)
                .is_some_and(|actual| actual.starts_with(value.as_str())),
            Self::Class(class) => element.has_class(class),
            Self::ClassContains(fragment) => element
                .classes()
                .iter()
                .any(|c| c.contains(fragment.as_str())),
            Self::AllOf(parts) => parts.iter().all(|part| part.matches(element)),
            Self::AnyOf(parts) => parts.iter().any(|part| part.matches(element)),
            Self::Not(inner) => !inner.matches(element),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::NodeSpec;

    fn snapshot(spec: &NodeSpec) -> NodeSnapshot {
        NodeSnapshot {
            id: None,
            tag: spec.tag.to_ascii_lowercase(),
            attributes: spec.attributes.clone(),
            classes: spec.classes.clone(),
        }
    }

    #[test]
    fn attribute_operators() {
        let el = snapshot(
            &NodeSpec::new("div")
                .attr("data-testid", "platform-board-kit.ui.card.card")
                .class("ghx-list-item"),
        );

        assert!(Selector::attr_eq("data-testid", "platform-board-kit.ui.card.card").matches(&el));
        assert!(Selector::attr_contains("data-testid", "card").matches(&el));
        assert!(Selector::attr_prefix("data-testid", "platform-board-kit").matches(&el));
        assert!(!Selector::attr_prefix("data-testid", "card").matches(&el));
        assert!(Selector::class_contains("ghx-list").matches(&el));
        assert!(!Selector::class("ghx-list").matches(&el));
        assert!(!Selector::attr("hidden").matches(&el));
    }

    #[test]
    fn compound_selectors_flatten() {
        let sel = Selector::tag("img")
            .or(Selector::tag("svg"))
            .or(Selector::tag("span"));
        assert!(matches!(&sel, Selector::AnyOf(parts) if parts.len() == 3));

        let el = snapshot(&NodeSpec::new("SPAN").attr("hidden", ""));
        assert!(sel.matches(&el));
        assert!(Selector::tag("span").and(Selector::attr("hidden")).matches(&el));

        let root_only = Selector::attr_contains("data-testid", "ak-avatar")
            .and(Selector::not(Selector::attr_contains("data-testid", "ak-avatar--")));
        let avatar = snapshot(&NodeSpec::new("div").attr("data-testid", "ak-avatar"));
        let inner = snapshot(&NodeSpec::new("div").attr("data-testid", "ak-avatar--inner"));
        assert!(root_only.matches(&avatar));
        assert!(!root_only.matches(&inner));
    }
}
