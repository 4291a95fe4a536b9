//! Persistence boundary for [`BoardSettings`] and the manager that applies
//! explicit consumer edits.
//!
//! The whole configuration is one JSON blob under [`SETTINGS_KEY`]. Stores
//! only move opaque strings; parsing happens here.

use crate::{EngineError, Result};
use boardlens_protocol::{
    parse_settings, serialize_settings, BoardSettings, GroupLimit, OwnerLimit, SETTINGS_KEY,
};
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key-value store holding serialized settings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| EngineError::Other("settings store lock poisoned".into()))
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store whose single settings file is exactly `path`.
    pub fn for_settings_file(path: &Path) -> Result<Self> {
        let expected = format!("{SETTINGS_KEY}.json");
        if path.file_name().and_then(|n| n.to_str()) != Some(expected.as_str()) {
            return Err(EngineError::InvalidSettings(format!(
                "settings file must be named {expected}: {}",
                path.display()
            )));
        }
        let dir = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
        Ok(Self::new(dir))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            && !key.starts_with('.');
        if !valid {
            return Err(EngineError::InvalidSettings(format!("invalid store key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Reads settings; a missing blob yields defaults.
pub fn load_settings(store: &dyn SettingsStore) -> Result<BoardSettings> {
    match store.get(SETTINGS_KEY)? {
        Some(raw) if !raw.trim().is_empty() => {
            parse_settings(&raw).map_err(|err| EngineError::InvalidSettings(format!("{err:#}")))
        }
        _ => {
            debug!("No stored settings under {SETTINGS_KEY}; using defaults");
            Ok(BoardSettings::default())
        }
    }
}

pub fn save_settings(store: &dyn SettingsStore, settings: &BoardSettings) -> Result<()> {
    let raw = serialize_settings(settings).map_err(|err| EngineError::Other(format!("{err:#}")))?;
    store.set(SETTINGS_KEY, &raw)
}

/// Applies explicit edits to the configuration, persisting after each one.
pub struct SettingsManager<S: SettingsStore> {
    store: S,
    settings: BoardSettings,
}

impl<S: SettingsStore> SettingsManager<S> {
    pub fn open(store: S) -> Result<Self> {
        let settings = load_settings(&store)?;
        Ok(Self { store, settings })
    }

    #[must_use]
    pub const fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Drops local state in favour of what the store currently holds.
    pub fn reload(&mut self) -> Result<&BoardSettings> {
        self.settings = load_settings(&self.store)?;
        Ok(&self.settings)
    }

    /// Adds an owner limit, assigning an id when none is given. Returns the
    /// id.
    pub fn add_owner_limit(&mut self, mut limit: OwnerLimit) -> Result<String> {
        if limit.user_id.trim().is_empty() {
            return Err(EngineError::InvalidSettings("owner limit needs a user id".into()));
        }
        if limit.column_ids.is_empty() && limit.column_names.is_empty() {
            return Err(EngineError::InvalidSettings(format!(
                "owner limit for '{}' names no columns",
                limit.user_id
            )));
        }
        limit.id = self.claim_id(&limit.id, "owner")?;
        let id = limit.id.clone();
        self.settings.personal_wip_limits.limits.push(limit);
        self.persist()?;
        info!("Added owner limit {id}");
        Ok(id)
    }

    pub fn add_group_limit(&mut self, mut limit: GroupLimit) -> Result<String> {
        if limit.name.trim().is_empty() {
            return Err(EngineError::InvalidSettings("group limit needs a name".into()));
        }
        if limit.column_ids.is_empty() && limit.column_names.is_empty() {
            return Err(EngineError::InvalidSettings(format!(
                "group '{}' names no columns",
                limit.name
            )));
        }
        limit.id = self.claim_id(&limit.id, "group")?;
        let id = limit.id.clone();
        self.settings.column_group_wip_limits.limits.push(limit);
        self.persist()?;
        info!("Added group limit {id}");
        Ok(id)
    }

    /// Removes the owner or group limit with `id`. `false` when none matched.
    pub fn remove_limit(&mut self, id: &str) -> Result<bool> {
        let owners = &mut self.settings.personal_wip_limits.limits;
        let groups = &mut self.settings.column_group_wip_limits.limits;
        let before = owners.len() + groups.len();
        owners.retain(|limit| limit.id != id);
        groups.retain(|limit| limit.id != id);
        if owners.len() + groups.len() == before {
            return Ok(false);
        }
        self.persist()?;
        info!("Removed limit {id}");
        Ok(true)
    }

    /// Sets or, with `None`, clears the custom color of an owner.
    pub fn set_owner_color(&mut self, owner_id: &str, color: Option<&str>) -> Result<()> {
        let colors = &mut self.settings.assignee_colors.custom_colors;
        match color.map(str::trim).filter(|c| !c.is_empty()) {
            Some(color) => {
                colors.insert(owner_id.to_string(), color.to_string());
            }
            None => {
                colors.remove(owner_id);
            }
        }
        self.persist()
    }

    pub fn set_owner_limits_enabled(&mut self, enabled: bool) -> Result<()> {
        self.settings.personal_wip_limits.enabled = enabled;
        self.persist()
    }

    pub fn set_group_limits_enabled(&mut self, enabled: bool) -> Result<()> {
        self.settings.column_group_wip_limits.enabled = enabled;
        self.persist()
    }

    pub fn set_workload_enabled(&mut self, enabled: bool) -> Result<()> {
        self.settings.workload.enabled = enabled;
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        save_settings(&self.store, &self.settings)
    }

    fn id_taken(&self, id: &str) -> bool {
        self.settings
            .personal_wip_limits
            .limits
            .iter()
            .any(|limit| limit.id == id)
            || self
                .settings
                .column_group_wip_limits
                .limits
                .iter()
                .any(|limit| limit.id == id)
    }

    fn claim_id(&self, requested: &str, prefix: &str) -> Result<String> {
        let requested = requested.trim();
        if !requested.is_empty() {
            if self.id_taken(requested) {
                return Err(EngineError::InvalidSettings(format!(
                    "limit id '{requested}' already exists"
                )));
            }
            return Ok(requested.to_string());
        }
        Ok((1..)
            .map(|n| format!("{prefix}-{n}"))
            .find(|id| !self.id_taken(id))
            .unwrap_or_else(|| prefix.to_string()))
    }
}
