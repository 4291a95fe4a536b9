//! Structural patterns the engine reads from the host board, and the marker
//! names of everything it writes back.

use boardlens_dom::Selector;

/// Selectors for the host board's markup. Host markup drifts between
/// releases, so every pattern is data rather than code.
#[derive(Debug, Clone)]
pub struct BoardMarkup {
    pub card: Selector,
    /// Wrapper whose first `div` child is the visible card surface.
    pub card_surface_wrapper: Selector,
    pub column: Selector,
    /// Tried in order; the first match is the observed container.
    pub board_containers: Vec<Selector>,
    pub column_heading: Selector,
    pub column_name_marker: Selector,
    pub column_header_like: Selector,
    pub hidden_label: Selector,
    pub assignee_container: Selector,
    pub assignee_avatar_image: Selector,
    pub gravatar_image: Selector,
    pub any_avatar_image: Selector,
    pub avatar: Selector,
    pub avatar_label: Selector,
    pub avatar_inner: Selector,
    pub change_card: Selector,
    pub change_card_container: Selector,
    pub change_column: Selector,
    /// Roots of everything the engine writes into the tree.
    pub annotation: Selector,
}

impl Default for BoardMarkup {
    fn default() -> Self {
        let heading = Selector::tag("h2").or(Selector::tag("h3"));
        Self {
            card: Selector::attr_eq("data-testid", "platform-board-kit.ui.card.card"),
            card_surface_wrapper: Selector::attr_eq(
                "data-testid",
                "software-context-menu.ui.context-menu.children-wrapper",
            ),
            column: Selector::attr_eq(
                "data-testid",
                "platform-board-kit.ui.column.draggable-column",
            )
            .or(Selector::attr_eq(
                "data-component-selector",
                "platform-board-kit.ui.column.draggable-column",
            ))
            .or(Selector::class("__board-test-hook__column")),
            board_containers: vec![
                Selector::attr_eq("data-testid", "board-view"),
                Selector::attr_eq("data-testid", "software-board.board"),
                Selector::class("ghx-columns"),
                Selector::attr_eq("id", "ghx-pool"),
                Selector::attr_eq("id", "ghx-board-column"),
            ],
            column_heading: heading.clone().and(Selector::attr("aria-label")),
            column_name_marker: Selector::attr_contains("data-testid", "column-name")
                .or(Selector::attr_contains("data-testid", "column-title"))
                .or(Selector::attr("title")),
            column_header_like: heading
                .or(Selector::tag("header"))
                .or(Selector::class_contains("header"))
                .or(Selector::class_contains("title")),
            hidden_label: Selector::attr("hidden").or(Selector::attr_eq("aria-hidden", "true")),
            assignee_container: Selector::attr_contains("data-testid", "assignee")
                .or(Selector::attr_contains("data-testid", "avatar")),
            assignee_avatar_image: Selector::attr_eq(
                "data-testid",
                "software-board.common.fields.assignee-field-static.avatar-wrapper",
            ),
            gravatar_image: Selector::tag("img").and(Selector::attr_contains("src", "gravatar.com")),
            any_avatar_image: Selector::tag("img").and(Selector::attr_contains("src", "avatar")),
            avatar: Selector::attr_contains("data-testid", "ak-avatar")
                .and(Selector::not(Selector::attr_contains("data-testid", "ak-avatar--"))),
            avatar_label: Selector::attr_contains("data-testid", "ak-avatar--label"),
            avatar_inner: Selector::attr_contains("data-testid", "ak-avatar--inner"),
            change_card: Selector::attr_contains("data-testid", "card")
                .or(Selector::attr_contains("id", "card-"))
                .or(Selector::attr_contains("data-testid", "issue")),
            change_card_container: Selector::class_contains("ghx-list")
                .or(Selector::attr_contains("data-testid", "column-cards")),
            change_column: Selector::attr_contains("data-testid", "column")
                .or(Selector::class("__board-test-hook__column")),
            annotation: Selector::class(AVATAR_BADGE_CONTAINER_CLASS)
                .or(Selector::class(AVATAR_BADGE_CLASS))
                .or(Selector::class(CARD_WARNING_ICON_CLASS))
                .or(Selector::class(GROUP_HEADER_CONTAINER_CLASS))
                .or(Selector::class(GROUP_HEADER_CLASS)),
        }
    }
}

/// Label texts identifying the owner of a card.
#[derive(Debug, Clone)]
pub struct OwnerLabels {
    pub assignee_prefixes: Vec<String>,
    pub unassigned_markers: Vec<String>,
    pub unassigned_name: String,
    pub unassigned_display_name: String,
}

impl Default for OwnerLabels {
    fn default() -> Self {
        Self {
            assignee_prefixes: vec!["Assignee:".to_string(), "Исполнитель:".to_string()],
            unassigned_markers: vec!["Unassigned".to_string(), "Не назначено".to_string()],
            unassigned_name: "Не назначено".to_string(),
            unassigned_display_name: "Н/Н".to_string(),
        }
    }
}

pub const CARD_OVERLOADED_ATTR: &str = "data-bl-wip-overloaded";
pub const CARD_COLOR_ATTR: &str = "data-bl-wip-color";
pub const CARD_LIMIT_ATTR: &str = "data-bl-wip-limit";
pub const CARD_OVERLOADED_CLASS: &str = "bl-wip-overloaded";
pub const CARD_WARNING_ICON_CLASS: &str = "bl-wip-warning-icon";

/// Inline style properties the card highlight owns.
pub const CARD_HIGHLIGHT_STYLES: &[&str] = &[
    "border-left",
    "padding-left",
    "background-color",
    "border",
    "border-radius",
    "box-shadow",
    "position",
];

pub const AVATAR_BADGE_CONTAINER_CLASS: &str = "bl-avatar-indicator-container";
pub const AVATAR_BADGE_CLASS: &str = "bl-avatar-indicator";
pub const AVATAR_BADGE_KIND_ATTR: &str = "data-bl-indicator-kind";
pub const AVATAR_BADGE_SOURCE_ATTR: &str = "data-bl-indicator-source";
pub const AVATAR_BADGE_OWNER_ATTR: &str = "data-bl-owner";

pub const GROUP_ATTR: &str = "data-bl-group";
pub const GROUP_COLOR_PROPERTY: &str = "--bl-group-color";
pub const GROUP_COLUMN_STYLES: &[&str] = &[
    GROUP_COLOR_PROPERTY,
    "box-shadow",
    "border-radius",
    "background-color",
];
pub const GROUP_HEADER_CONTAINER_CLASS: &str = "bl-group-header-container";
pub const GROUP_HEADER_CLASS: &str = "bl-group-header";
pub const GROUP_HEADER_ID_ATTR: &str = "data-group-id";
pub const GROUP_HEADER_NAME_CLASS: &str = "bl-group-header-name";
pub const GROUP_HEADER_COUNTER_CLASS: &str = "bl-group-header-counter";
pub const GROUP_HEADER_HOST_ATTR: &str = "data-bl-header-host";
pub const GROUP_HEADER_HEIGHT_PX: u32 = 55;
