//! Configuration records exchanged between the settings surface, the
//! persisted blob and the annotation engine.

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// Namespaced key under which the whole settings blob is stored.
pub const SETTINGS_KEY: &str = "board-lens.settings";

pub const DEFAULT_OWNER_LIMIT_COLOR: &str = "#808080";
pub const DEFAULT_GROUP_WARNING_COLOR: &str = "#FF0000";
pub const DEFAULT_GROUP_BASE_COLOR: &str = "#DFE1E6";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardSettings {
    pub schema_version: u32,
    pub personal_wip_limits: OwnerLimitSettings,
    pub column_group_wip_limits: GroupLimitSettings,
    pub assignee_colors: OwnerColorSettings,
    pub workload: WorkloadSettings,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            personal_wip_limits: OwnerLimitSettings::default(),
            column_group_wip_limits: GroupLimitSettings::default(),
            assignee_colors: OwnerColorSettings::default(),
            workload: WorkloadSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerLimitSettings {
    pub enabled: bool,
    pub limits: Vec<OwnerLimit>,
}

/// Cap on the number of one owner's cards across a set of columns.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerLimit {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub column_ids: Vec<String>,
    pub column_names: Vec<String>,
    pub limit: i64,
    pub color: Option<String>,
}

impl OwnerLimit {
    #[must_use]
    pub fn effective_color(&self) -> &str {
        self.color
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_OWNER_LIMIT_COLOR)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupLimitSettings {
    pub enabled: bool,
    pub limits: Vec<GroupLimit>,
}

/// Cap on the number of cards (any owner) across a named group of columns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupLimit {
    pub id: String,
    pub name: String,
    pub column_ids: Vec<String>,
    pub column_names: Vec<String>,
    pub limit: i64,
    pub base_color: String,
    pub warning_color: Option<String>,
}

impl Default for GroupLimit {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            column_ids: Vec::new(),
            column_names: Vec::new(),
            limit: 0,
            base_color: DEFAULT_GROUP_BASE_COLOR.to_string(),
            warning_color: None,
        }
    }
}

impl GroupLimit {
    #[must_use]
    pub fn effective_warning_color(&self) -> &str {
        self.warning_color
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_GROUP_WARNING_COLOR)
    }
}

/// Per-owner color overrides keyed by resolved owner id.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerColorSettings {
    pub custom_colors: BTreeMap<String, String>,
}

/// Flags owners holding too many cards in "in progress" style columns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadSettings {
    pub enabled: bool,
    pub threshold: usize,
    pub progress_columns: Vec<String>,
    pub color: String,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 2,
            progress_columns: vec![
                "IN PROGRESS".to_string(),
                "В РАБОТЕ".to_string(),
                "DOING".to_string(),
            ],
            color: "#000000".to_string(),
        }
    }
}

/// Parses a persisted blob. Unknown fields are ignored and missing ones take
/// their defaults, so older blobs keep loading.
pub fn parse_settings(raw: &str) -> Result<BoardSettings> {
    serde_json::from_str(raw).context("invalid board settings blob")
}

pub fn serialize_settings(settings: &BoardSettings) -> Result<String> {
    serde_json::to_string(settings).map_err(Into::into)
}

/// JSON schema of the settings blob, for settings forms.
pub fn settings_schema() -> Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(BoardSettings)).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_blob_fills_defaults() {
        let raw = r##"{
            "personalWipLimits": {
                "enabled": true,
                "limits": [{"id": "l1", "userId": "name:abc", "columnIds": ["column-2"], "limit": 3}]
            },
            "somethingElse": 42
        }"##;
        let settings = parse_settings(raw).unwrap();

        assert!(settings.personal_wip_limits.enabled);
        assert_eq!(settings.personal_wip_limits.limits[0].column_ids, vec!["column-2"]);
        assert_eq!(settings.personal_wip_limits.limits[0].effective_color(), DEFAULT_OWNER_LIMIT_COLOR);
        assert!(!settings.column_group_wip_limits.enabled);
        assert_eq!(settings.workload.threshold, 2);
        assert_eq!(settings.schema_version, SETTINGS_SCHEMA_VERSION);
    }

    #[test]
    fn serialized_blob_uses_camel_case() {
        let mut settings = BoardSettings::default();
        settings.column_group_wip_limits.limits.push(GroupLimit {
            id: "g1".into(),
            name: "Dev".into(),
            warning_color: Some("#AA0000".into()),
            ..GroupLimit::default()
        });
        let raw = serialize_settings(&settings).unwrap();

        assert!(raw.contains("\"columnGroupWipLimits\""));
        assert!(raw.contains("\"warningColor\":\"#AA0000\""));
        assert_eq!(parse_settings(&raw).unwrap(), settings);
    }

    #[test]
    fn blank_colors_fall_back() {
        let group = GroupLimit {
            warning_color: Some("  ".into()),
            ..GroupLimit::default()
        };
        assert_eq!(group.effective_warning_color(), DEFAULT_GROUP_WARNING_COLOR);
    }

    #[test]
    fn schema_names_settings_sections() {
        let schema = settings_schema().unwrap().to_string();
        assert!(schema.contains("personalWipLimits"));
        assert!(schema.contains("columnGroupWipLimits"));
    }
}
