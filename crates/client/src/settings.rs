use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use parlor_api::{ClientConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::admin::AdminConfig;

pub const SETTINGS_DIRECTORY_NAME: &str = "parlor";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "PARLOR_";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOG_LIMIT: u32 = 100;
pub const DEFAULT_USER_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_log_limit")]
    pub log_limit: u32,
    #[serde(default = "default_user_limit")]
    pub user_limit: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: None,
            poll_interval_secs: default_poll_interval_secs(),
            log_limit: default_log_limit(),
            user_limit: default_user_limit(),
        }
    }
}

impl ClientSettings {
    pub fn normalized(mut self) -> Self {
        self.base_url = if self.base_url.trim().is_empty() {
            default_base_url()
        } else {
            self.base_url.trim().to_string()
        };
        self.request_timeout_secs = self.request_timeout_secs.filter(|secs| *secs > 0);
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = DEFAULT_POLL_INTERVAL_SECS;
        }
        if self.log_limit == 0 {
            self.log_limit = DEFAULT_LOG_LIMIT;
        }
        if self.user_limit == 0 {
            self.user_limit = DEFAULT_USER_LIMIT;
        }

        self
    }

    pub fn to_client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.base_url);
        match self.request_timeout_secs {
            Some(secs) => config.with_request_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    /// Same settings pointed at another server.
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..self.clone()
        }
        .normalized()
    }

    pub fn admin_config(&self) -> AdminConfig {
        AdminConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            log_limit: Some(self.log_limit),
            user_limit: Some(self.user_limit),
        }
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parlor"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Saves `settings` and makes them current; on error nothing changes.
    pub fn update(&self, settings: ClientSettings) -> Result<Arc<ClientSettings>, SettingsError> {
        let settings = Arc::new(settings.normalized());
        let encoded = serde_json::to_vec_pretty(settings.as_ref()).context(EncodeSnafu {
            stage: "encode-settings",
        })?;
        write_replacing(&self.config_path, &encoded)?;
        tracing::info!(path = ?self.config_path, base_url = %settings.base_url, "saved settings");

        self.settings.store(Arc::clone(&settings));
        Ok(settings)
    }

    fn load_from_disk(path: &Path) -> ClientSettings {
        let mut figment = Figment::from(Serialized::defaults(ClientSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!(path = ?path, "settings file not found, using defaults");
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        match figment.extract::<ClientSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "failed to parse settings, using defaults");
                ClientSettings::default()
            }
        }
    }
}

/// Writes next to `path` first so a crash never leaves a torn settings file.
fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), SettingsError> {
    if let Some(directory) = path.parent() {
        std::fs::create_dir_all(directory).context(PrepareDirectorySnafu {
            stage: "prepare-settings-directory",
            directory,
        })?;
    }

    let staged = path.with_extension("json.partial");
    std::fs::write(&staged, contents).context(StageSnafu {
        stage: "stage-settings-file",
        path: &staged,
    })?;
    std::fs::rename(&staged, path).context(ReplaceSnafu {
        stage: "replace-settings-file",
        path,
    })
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot encode settings on `{stage}`: {source}"))]
    Encode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("cannot create {} on `{stage}`: {source}", directory.display()))]
    PrepareDirectory {
        stage: &'static str,
        directory: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot write {} on `{stage}`: {source}", path.display()))]
    Stage {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot move new settings into {} on `{stage}`: {source}", path.display()))]
    Replace {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_log_limit() -> u32 {
    DEFAULT_LOG_LIMIT
}

fn default_user_limit() -> u32 {
    DEFAULT_USER_LIMIT
}
