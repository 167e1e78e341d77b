//! Application-level configuration loading: document paths and view tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TITO_LOBBY_CONFIG_PATH";
/// Application identifier scoping profile documents.
const DEFAULT_APP_ID: &str = "com.zachallegretti.tito";
/// Flat collection holding every lobby document.
const DEFAULT_LOBBY_COLLECTION: &str = "betLobbies";
/// Buffered view events per lobby view before slow listeners start lagging.
const DEFAULT_VIEW_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    app_id: String,
    lobby_collection: String,
    view_event_capacity: usize,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        app_id = %app_config.app_id,
                        lobby_collection = %app_config.lobby_collection,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn lobby_collection(&self) -> &str {
        &self.lobby_collection
    }

    pub fn view_event_capacity(&self) -> usize {
        self.view_event_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.into(),
            lobby_collection: DEFAULT_LOBBY_COLLECTION.into(),
            view_event_capacity: DEFAULT_VIEW_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file; every key is optional.
struct RawConfig {
    #[serde(default)]
    app_id: Option<String>,
    #[serde(default)]
    lobby_collection: Option<String>,
    #[serde(default)]
    view_event_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            app_id: value
                .app_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or(defaults.app_id),
            lobby_collection: value
                .lobby_collection
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.lobby_collection),
            // A broadcast channel cannot be built with zero capacity.
            view_event_capacity: value
                .view_event_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.view_event_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
