use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use serde::Deserialize;
use url::Url;

use crate::error::ParlorErr;
use crate::error::Result;
use crate::flags::PARLOR_API_VERSION;
use crate::flags::PARLOR_HOME;
use crate::flags::PARLOR_RECONNECT_DELAY_MS;
use crate::flags::PARLOR_SERVER_URL;

const CONFIG_TOML_FILE: &str = "config.toml";

/// Resolved client configuration, merged from `config.toml`, environment
/// defaults and command-line overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the chat server, e.g. `http://127.0.0.1:8000`.
    pub server_url: Url,

    /// API version token inserted after `/api/` in every endpoint path.
    pub api_version: String,

    /// Fixed delay between a push channel drop and the next attempt.
    pub reconnect_delay: Duration,

    /// Drop a pushed message that duplicates one already rendered from the
    /// history snapshot.
    pub dedup_history_overlap: bool,

    /// Directory holding `config.toml` and `log/`.
    pub parlor_home: PathBuf,
}

/// On-disk shape of `~/.parlor/config.toml`. Every field is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigToml {
    pub server_url: Option<String>,
    pub api_version: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
    pub dedup_history_overlap: Option<bool>,
}

/// Optional overrides for user configuration (e.g., from CLI flags).
#[derive(Default, Debug, Clone)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub api_version: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
}

impl Config {
    /// Load configuration from `config.toml` under the parlor home, applying
    /// `overrides` with the highest precedence.
    pub fn load_with_overrides(overrides: ConfigOverrides) -> Result<Self> {
        let parlor_home = find_parlor_home()?;
        let cfg = load_config_as_toml(&parlor_home)?;
        Self::load_from_base_config_with_overrides(cfg, overrides, parlor_home)
    }

    /// Meant to be used exclusively for tests: callers supply the parsed
    /// `ConfigToml` and home directory instead of reading the environment.
    pub fn load_from_base_config_with_overrides(
        cfg: ConfigToml,
        overrides: ConfigOverrides,
        parlor_home: PathBuf,
    ) -> Result<Self> {
        let ConfigOverrides {
            server_url,
            api_version,
            reconnect_delay_ms,
        } = overrides;

        let raw_url = server_url
            .or(cfg.server_url)
            .unwrap_or_else(|| PARLOR_SERVER_URL.to_string());
        let server_url = parse_server_url(&raw_url)?;

        let api_version = api_version
            .or(cfg.api_version)
            .unwrap_or_else(|| PARLOR_API_VERSION.to_string());
        let api_version = api_version.trim().to_string();
        if api_version.is_empty() || api_version.contains('/') {
            return Err(ParlorErr::Config(format!(
                "api_version must be a single non-empty path segment, got `{api_version}`"
            )));
        }

        let reconnect_delay = reconnect_delay_ms
            .or(cfg.reconnect_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(*PARLOR_RECONNECT_DELAY_MS);
        if reconnect_delay.is_zero() {
            return Err(ParlorErr::Config(
                "reconnect_delay_ms must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server_url,
            api_version,
            reconnect_delay,
            dedup_history_overlap: cfg.dedup_history_overlap.unwrap_or(true),
            parlor_home,
        })
    }

    /// `{server}/api/{version}/messages`, used for both history and posting.
    pub fn messages_url(&self) -> Result<Url> {
        self.api_url(&["messages"])
    }

    /// `ws://{host}/api/{version}/ws/{username}`. The scheme follows the
    /// server URL (`https` maps to `wss`) and the username is encoded as a
    /// single path segment.
    pub fn push_url(&self, username: &str) -> Result<Url> {
        let mut url = self.api_url(&["ws", username])?;
        let scheme = match self.server_url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|()| ParlorErr::InvalidUrl {
            url: self.server_url.to_string(),
            reason: format!("cannot switch scheme to {scheme}"),
        })?;
        Ok(url)
    }

    fn api_url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.server_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| ParlorErr::InvalidUrl {
                url: self.server_url.to_string(),
                reason: "url cannot be a base".to_string(),
            })?;
            segments.pop_if_empty();
            segments.push("api");
            segments.push(&self.api_version);
            segments.extend(tail);
        }
        Ok(url)
    }
}

fn parse_server_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| ParlorErr::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(ParlorErr::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        }),
        other => Err(ParlorErr::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{other}`, expected http or https"),
        }),
    }
}

/// Read `config.toml` from `parlor_home`. A missing file yields defaults; a
/// file that fails to parse is an error.
pub fn load_config_as_toml(parlor_home: &Path) -> Result<ConfigToml> {
    let path = parlor_home.join(CONFIG_TOML_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) => toml::from_str(&contents)
            .map_err(|e| ParlorErr::Config(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigToml::default()),
        Err(e) => Err(e.into()),
    }
}

/// Returns the parlor home directory: `$PARLOR_HOME` when set, otherwise
/// `~/.parlor`. Does not verify that the directory exists.
pub fn find_parlor_home() -> std::io::Result<PathBuf> {
    if let Some(home) = *PARLOR_HOME {
        return Ok(PathBuf::from(home));
    }
    let mut p = home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    p.push(".parlor");
    Ok(p)
}

/// Returns the path to the folder where parlor logs are stored. Does not
/// verify that the directory exists.
pub fn log_dir(config: &Config) -> PathBuf {
    config.parlor_home.join("log")
}
