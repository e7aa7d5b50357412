use crate::error::{HarnessError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the source tree when `general.source_dir` is unset.
pub const SOURCE_DIR_VAR: &str = "topsrcdir";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_test_root")]
    pub test_root: Utf8PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: Utf8PathBuf,
    pub source_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonSettings {
    #[serde(default = "default_daemon_binary")]
    pub binary: Utf8PathBuf,
    /// Seconds to wait after SIGTERM before escalating to SIGKILL.
    /// Unset means `stop` blocks until the daemon exits on its own.
    pub stop_timeout_secs: Option<u64>,
    #[serde(default = "default_plugins")]
    pub plugins: Utf8PathBuf,
    #[serde(default)]
    pub gap: u32,
    #[serde(default = "default_players")]
    pub players: Vec<Handler>,
    #[serde(default = "default_tracklength")]
    pub tracklength: Vec<Handler>,
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,
}

/// A per-extension handler line, e.g. `player *.ogg execraw disorder-decode`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Handler {
    pub pattern: String,
    pub command: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSettings {
    #[serde(default = "default_client_binary")]
    pub binary: Utf8PathBuf,
    #[serde(default = "default_client_args")]
    pub extra_args: Vec<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetConfig {
    #[serde(default = "default_track_asset")]
    pub track: Utf8PathBuf,
    #[serde(default = "default_scratch_asset")]
    pub scratch: Utf8PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default = "default_user_name")]
    pub name: String,
    #[serde(default = "default_user_password")]
    pub password: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            test_root: default_test_root(),
            log_dir: default_log_dir(),
            source_dir: None,
        }
    }
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            binary: default_daemon_binary(),
            stop_timeout_secs: None,
            plugins: default_plugins(),
            gap: 0,
            players: default_players(),
            tracklength: default_tracklength(),
            stopwords: default_stopwords(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            binary: default_client_binary(),
            extra_args: default_client_args(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            track: default_track_asset(),
            scratch: default_scratch_asset(),
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            password: default_user_password(),
        }
    }
}

// Default value functions
fn default_test_root() -> Utf8PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
        .join("testroot")
}

fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

fn default_daemon_binary() -> Utf8PathBuf {
    Utf8PathBuf::from("disorderd")
}

fn default_plugins() -> Utf8PathBuf {
    Utf8PathBuf::from("../plugins")
}

const MEDIA_EXTENSIONS: [&str; 4] = ["mp3", "ogg", "wav", "flac"];

fn default_players() -> Vec<Handler> {
    MEDIA_EXTENSIONS
        .iter()
        .map(|ext| Handler {
            pattern: format!("*.{ext}"),
            command: "execraw disorder-decode".to_owned(),
        })
        .collect()
}

fn default_tracklength() -> Vec<Handler> {
    MEDIA_EXTENSIONS
        .iter()
        .map(|ext| Handler {
            pattern: format!("*.{ext}"),
            command: "disorder-tracklength".to_owned(),
        })
        .collect()
}

fn default_stopwords() -> Vec<String> {
    let mut words: Vec<String> = (1..=9).map(|n| format!("{n:02}")).collect();
    words.extend((1..=30).map(|n| n.to_string()));
    words.extend(
        "the a an and to too in on of we i am as im for is"
            .split_whitespace()
            .map(str::to_owned),
    );
    words
}

fn default_client_binary() -> Utf8PathBuf {
    Utf8PathBuf::from("disorder")
}

fn default_client_args() -> Vec<String> {
    vec!["--no-per-user-config".to_owned()]
}

const fn default_poll_interval() -> u64 {
    1000
}

fn default_track_asset() -> Utf8PathBuf {
    Utf8PathBuf::from("sounds/slap.ogg")
}

fn default_scratch_asset() -> Utf8PathBuf {
    Utf8PathBuf::from("sounds/scratch.ogg")
}

fn default_user_name() -> String {
    "fred".to_owned()
}

fn default_user_password() -> String {
    "fredpass".to_owned()
}

impl HarnessConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file(Self::search_paths())
            .ok_or_else(|| HarnessError::Config("Config file not found".to_owned()))?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HarnessError::Config(format!("Failed to read config: {}", e)))?;

        let mut config: HarnessConfig = toml::from_str(&content)
            .map_err(|e| HarnessError::Config(format!("Failed to parse config: {}", e)))?;

        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load the first config file found, or the defaults when there is none.
    ///
    /// A file that exists but does not parse or validate is an error: the
    /// defaults point the harness at a test root it would wipe.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first_or_default(Self::search_paths())
    }

    fn load_first_or_default<I>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        match Self::find_config_file(candidates) {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }

    fn search_paths() -> Vec<PathBuf> {
        [
            Some(PathBuf::from("dtest.toml")),
            dirs::config_dir().map(|p| p.join("dtest/dtest.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn find_config_file<I>(candidates: I) -> Option<PathBuf>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        candidates.into_iter().find(|candidate| candidate.exists())
    }

    fn expand_paths(&mut self) {
        fn expand_tilde(path: &Utf8PathBuf) -> Utf8PathBuf {
            let path_str = path.as_str();
            if path_str.starts_with("~/") {
                if let Some(home) = dirs::home_dir() {
                    if let Some(home_str) = home.to_str() {
                        return Utf8PathBuf::from(path_str.replacen("~", home_str, 1));
                    }
                }
            }
            path.clone()
        }

        self.general.test_root = expand_tilde(&self.general.test_root);
        self.general.log_dir = expand_tilde(&self.general.log_dir);
        if let Some(source_dir) = &self.general.source_dir {
            self.general.source_dir = Some(expand_tilde(source_dir));
        }
    }

    fn validate(&self) -> Result<()> {
        if self.general.test_root.as_str().is_empty() || self.general.test_root == "/" {
            return Err(HarnessError::Config(format!(
                "Refusing to use test root {:?}",
                self.general.test_root
            )));
        }
        if self.client.poll_interval_ms == 0 {
            return Err(HarnessError::Config(
                "client.poll_interval_ms must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Locate the source tree holding the fixed assets.
    pub fn source_dir(&self) -> Result<Utf8PathBuf> {
        if let Some(dir) = &self.general.source_dir {
            return Ok(dir.clone());
        }
        let dir = std::env::var(SOURCE_DIR_VAR).map_err(|_| {
            HarnessError::Environment(format!(
                "general.source_dir is unset and ${SOURCE_DIR_VAR} is not set"
            ))
        })?;
        Ok(Utf8PathBuf::from(dir))
    }

    /// Resolve asset paths against the source tree.
    pub fn resolve_assets(&self) -> Result<Assets> {
        let source = self.source_dir()?;
        let resolve = |p: &Utf8Path| {
            if p.is_absolute() {
                p.to_owned()
            } else {
                source.join(p)
            }
        };
        Ok(Assets {
            track: resolve(&self.assets.track),
            scratch: resolve(&self.assets.scratch),
        })
    }

    pub fn stop_policy(&self) -> StopPolicy {
        match self.daemon.stop_timeout_secs {
            Some(secs) => StopPolicy::Escalate(Duration::from_secs(secs)),
            None => StopPolicy::Wait,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.client.poll_interval_ms)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            daemon: DaemonSettings::default(),
            client: ClientSettings::default(),
            assets: AssetConfig::default(),
            user: UserConfig::default(),
        }
    }
}

/// Absolute paths of the fixed files copied into every environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assets {
    /// Placeholder audio copied to every fixture track.
    pub track: Utf8PathBuf,
    pub scratch: Utf8PathBuf,
}

/// How `ProcessController::stop` waits for the daemon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StopPolicy {
    /// Block until the daemon exits, however long that takes.
    #[default]
    Wait,
    /// Wait up to the given duration after SIGTERM, then SIGKILL.
    Escalate(Duration),
}
