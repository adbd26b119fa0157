//! Notification policy settings and their reloadable handle.
//!
//! # Responsibility
//! - Parse notification settings from JSON with per-key defaults.
//! - Share one current settings value between managers, notifiers and API
//!   handlers, and refresh it when configuration changes.
//!
//! # Invariants
//! - Unknown keys are rejected instead of silently ignored.
//! - Readers always observe a complete settings value, never a partial reload.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Process-wide notification policy values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationSettings {
    /// Page size for paginated list views.
    pub paginate_by: u32,
    /// Persist unrecognized notify attributes into `data`.
    pub use_jsonfield: bool,
    /// Enables the `deleted` flag and every deleted-state operation.
    pub soft_delete: bool,
    /// Default item count for live list endpoints.
    pub num_to_fetch: u32,
    /// Seconds an external unread-count cache may hold a value.
    pub cache_timeout: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            paginate_by: 20,
            use_jsonfield: false,
            soft_delete: false,
            num_to_fetch: 10,
            cache_timeout: 2,
        }
    }
}

impl NotificationSettings {
    /// Parses settings from a JSON object. Missing keys use defaults.
    pub fn from_json(text: &str) -> SettingsResult<Self> {
        serde_json::from_str(text).map_err(SettingsError::Parse)
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors raised while loading settings.
#[derive(Debug)]
pub enum SettingsError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read settings `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid notification settings: {err}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

/// Where a [`SettingsHandle`] reads its values from on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    Defaults,
    Json(String),
    File(PathBuf),
}

impl SettingsSource {
    fn load(&self) -> SettingsResult<NotificationSettings> {
        match self {
            Self::Defaults => Ok(NotificationSettings::default()),
            Self::Json(text) => NotificationSettings::from_json(text),
            Self::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
                    path: path.clone(),
                    source,
                })?;
                NotificationSettings::from_json(&text)
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Defaults => "defaults",
            Self::Json(_) => "json",
            Self::File(_) => "file",
        }
    }
}

struct SettingsState {
    source: SettingsSource,
    current: NotificationSettings,
}

/// Shared, reloadable settings value.
///
/// Clones share the same underlying state, so a `reload` through any clone is
/// visible to every manager built from it.
#[derive(Clone)]
pub struct SettingsHandle {
    state: Arc<RwLock<SettingsState>>,
}

impl SettingsHandle {
    /// Loads settings once from `source` and keeps the source for reloads.
    pub fn load(source: SettingsSource) -> SettingsResult<Self> {
        let current = source.load()?;
        info!(
            "event=settings_load module=settings status=ok source={} soft_delete={} use_jsonfield={}",
            source.label(),
            current.soft_delete,
            current.use_jsonfield
        );
        Ok(Self {
            state: Arc::new(RwLock::new(SettingsState { source, current })),
        })
    }

    /// Wraps fixed values. `reload` restores exactly these values.
    pub fn fixed(settings: NotificationSettings) -> Self {
        let source = SettingsSource::Json(
            serde_json::to_string(&settings).unwrap_or_else(|_| "{}".to_string()),
        );
        Self {
            state: Arc::new(RwLock::new(SettingsState {
                source,
                current: settings,
            })),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> NotificationSettings {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
    }

    pub fn soft_delete(&self) -> bool {
        self.snapshot().soft_delete
    }

    pub fn use_jsonfield(&self) -> bool {
        self.snapshot().use_jsonfield
    }

    /// Re-reads the configured source and swaps in the new values.
    ///
    /// On failure the previous values stay active.
    pub fn reload(&self) -> SettingsResult<NotificationSettings> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.source.load() {
            Ok(settings) => {
                state.current = settings;
                info!(
                    "event=settings_reload module=settings status=ok source={} soft_delete={} use_jsonfield={}",
                    state.source.label(),
                    settings.soft_delete,
                    settings.use_jsonfield
                );
                Ok(settings)
            }
            Err(err) => {
                warn!(
                    "event=settings_reload module=settings status=error source={} error={err}",
                    state.source.label()
                );
                Err(err)
            }
        }
    }

    /// Replaces the source and current values in one step.
    pub fn replace(&self, settings: NotificationSettings) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.source = SettingsSource::Json(
            serde_json::to_string(&settings).unwrap_or_else(|_| "{}".to_string()),
        );
        state.current = settings;
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::fixed(NotificationSettings::default())
    }
}

impl std::fmt::Debug for SettingsHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsHandle")
            .field("current", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationSettings, SettingsError, SettingsHandle, SettingsSource};
    use std::io::Write;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = NotificationSettings::from_json(r#"{"soft_delete": true}"#).unwrap();
        assert!(settings.soft_delete);
        assert!(!settings.use_jsonfield);
        assert_eq!(settings.paginate_by, 20);
        assert_eq!(settings.num_to_fetch, 10);
        assert_eq!(settings.cache_timeout, 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = NotificationSettings::from_json(r#"{"SOFT_DELETE": true}"#).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn reload_reads_file_changes_and_keeps_old_values_on_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"soft_delete": false}}"#).unwrap();
        let handle = SettingsHandle::load(SettingsSource::File(file.path().to_path_buf())).unwrap();
        assert!(!handle.soft_delete());

        std::fs::write(file.path(), r#"{"soft_delete": true, "use_jsonfield": true}"#).unwrap();
        let reloaded = handle.reload().unwrap();
        assert!(reloaded.soft_delete);
        assert!(handle.use_jsonfield());

        std::fs::write(file.path(), "not json").unwrap();
        handle.reload().unwrap_err();
        assert!(handle.soft_delete());
    }

    #[test]
    fn clones_observe_replacement() {
        let handle = SettingsHandle::default();
        let clone = handle.clone();
        handle.replace(NotificationSettings {
            soft_delete: true,
            ..NotificationSettings::default()
        });
        assert!(clone.soft_delete());

        clone.reload().unwrap();
        assert!(handle.soft_delete());
    }
}
