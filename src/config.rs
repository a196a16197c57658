//! Runtime configuration: TOML file merged with command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
pub const DEFAULT_ALERT_PATTERN: &str = r"^(NEW:|(NEWS|JUST IN|BREAKING|SCOOP|BOMBSHELL)\b)";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub credentials: Credentials,
    /// Base URL of the PDS / entryway, without the `/xrpc` suffix.
    pub service: String,
    /// Seconds between two timeline polls.
    pub interval: u64,
    /// Number of timeline items requested per poll.
    pub limit: u32,
    /// HTTP request timeout in seconds.
    pub timeout: u64,
    pub sound: SoundConfig,
    pub display: DisplayConfig,
    pub log: LogConfig,
    pub retry: RetryConfig,
    /// Case-insensitive pattern marking a post as critical.
    pub alert_pattern: String,
    /// Number of recent post ids remembered for deduplication.
    pub seen_capacity: usize,
    pub critical_only: bool,
    pub silent: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Credentials {
    pub handle: String,
    pub app_password: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SoundConfig {
    pub enabled: bool,
    /// Audio file played on critical posts (needs the `sound` feature).
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub typing: bool,
    /// Delay between characters of the typing effect, in milliseconds.
    pub typing_delay_ms: u64,
    pub strip_emoji: bool,
    /// Render line breaks as a visible glyph instead of a space.
    pub line_break_glyph: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Fetch attempts per poll cycle before giving up until the next cycle.
    pub max_attempts: u32,
    /// Linear backoff step between attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            service: DEFAULT_SERVICE.to_string(),
            interval: 30,
            limit: 20,
            timeout: 10,
            sound: SoundConfig::default(),
            display: DisplayConfig::default(),
            log: LogConfig::default(),
            retry: RetryConfig::default(),
            alert_pattern: DEFAULT_ALERT_PATTERN.to_string(),
            seen_capacity: 1000,
            critical_only: false,
            silent: false,
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            typing: false,
            typing_delay_ms: 8,
            strip_emoji: false,
            line_break_glyph: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "bsky".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub handle: Option<String>,
    pub app_password: Option<String>,
    pub interval: Option<u64>,
    pub limit: Option<u32>,
    pub log_dir: Option<PathBuf>,
    pub critical_only: bool,
    pub silent: bool,
    pub no_sound: bool,
    pub typing: bool,
    pub strip_emoji: bool,
}

impl Config {
    /// Default config file location, `~/.config/skyfeed/config.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("skyfeed").join("config.toml"))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load `path`; a missing file at the default location yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        match fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(handle) = overrides.handle {
            self.credentials.handle = handle;
        }
        if let Some(password) = overrides.app_password {
            self.credentials.app_password = password;
        }
        if let Some(interval) = overrides.interval {
            self.interval = interval;
        }
        if let Some(limit) = overrides.limit {
            self.limit = limit;
        }
        if let Some(dir) = overrides.log_dir {
            self.log.dir = Some(dir);
        }
        self.critical_only |= overrides.critical_only;
        self.silent |= overrides.silent;
        self.display.typing |= overrides.typing;
        self.display.strip_emoji |= overrides.strip_emoji;
        if overrides.no_sound {
            self.sound.enabled = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.handle.trim().is_empty() || self.credentials.app_password.is_empty() {
            return Err(Error::Config(
                "missing credentials: set --handle/--app-password or [credentials] in the config file"
                    .to_string(),
            ));
        }
        if self.interval == 0 {
            return Err(Error::Config("interval must be greater than 0".to_string()));
        }
        if self.timeout == 0 {
            return Err(Error::Config("timeout must be greater than 0".to_string()));
        }
        if !(1..=100).contains(&self.limit) {
            return Err(Error::Config(format!(
                "limit must be between 1 and 100, got {}",
                self.limit
            )));
        }
        // A whole timeline page has to fit, or ids from one poll evict
        // each other and come back as new on the next.
        if self.seen_capacity < self.limit as usize {
            return Err(Error::Config(format!(
                "seen_capacity ({}) must be at least limit ({})",
                self.seen_capacity, self.limit
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if let Some(dir) = &self.log.dir {
            if !dir.is_dir() {
                return Err(Error::LogDir(dir.clone()));
            }
        }
        regex::RegexBuilder::new(&self.alert_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid alert_pattern: {e}")))?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> Config {
        let mut config = Config::default();
        config.credentials.handle = "alice.bsky.social".to_string();
        config.credentials.app_password = "xxxx-xxxx-xxxx-xxxx".to_string();
        config
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
interval = 45
critical_only = true

[credentials]
handle = "alice.bsky.social"
app_password = "secret"

[log]
prefix = "timeline"
"#,
        )
        .unwrap();
        assert_eq!(config.interval, 45);
        assert!(config.critical_only);
        assert_eq!(config.credentials.handle, "alice.bsky.social");
        assert_eq!(config.log.prefix, "timeline");
        assert_eq!(config.limit, 20);
        assert!(config.sound.enabled);
        assert_eq!(config.alert_pattern, DEFAULT_ALERT_PATTERN);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("interval = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config.apply(Overrides {
            handle: Some("bob.test".to_string()),
            app_password: Some("pw".to_string()),
            interval: Some(5),
            no_sound: true,
            critical_only: true,
            ..Overrides::default()
        });
        assert_eq!(config.credentials.handle, "bob.test");
        assert_eq!(config.interval, 5);
        assert!(!config.sound.enabled);
        assert!(config.critical_only);
        assert!(!config.silent);
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(matches!(
            Config::default().validate(),
            Err(Error::Config(_))
        ));
        assert!(with_credentials().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = with_credentials();
        config.interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = with_credentials();
        config.timeout = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_seen_capacity_below_limit() {
        let mut config = with_credentials();
        config.limit = 20;
        config.seen_capacity = 5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.seen_capacity = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_dir_must_exist() {
        let mut config = with_credentials();
        config.log.dir = Some(PathBuf::from("/definitely/not/here"));
        assert!(matches!(config.validate(), Err(Error::LogDir(_))));

        let dir = tempfile::tempdir().unwrap();
        config.log.dir = Some(dir.path().to_path_buf());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_pattern() {
        let mut config = with_credentials();
        config.alert_pattern = "(unclosed".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let err = Config::load(Some(Path::new("/no/such/skyfeed.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "limit = 30\n[sound]\nenabled = false\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.limit, 30);
        assert!(!config.sound.enabled);
    }
}
