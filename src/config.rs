//! Configuration for the Telegram API session and the scrape run
//!
//! Loads configuration from config.yml file

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::scrape::fetcher::{FetchSettings, RetryPolicy};
use crate::scrape::writer::validate_handle;

/// Default constants (fallback if config.yml not found)
pub const SESSION_NAME: &str = "scraper_session";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const CHECKPOINT_FILE_NAME: &str = "scrape_checkpoint.json";
pub const DEFAULT_MAX_MESSAGES: usize = 100_000;
pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_REQUEST_DELAY_SECS: f64 = 2.0;
pub const DEFAULT_ERROR_DELAY_SECS: f64 = 10.0;
pub const DEFAULT_MAX_ERROR_DELAY_SECS: f64 = 300.0;

/// Channels scraped when neither config.yml nor the command line name any.
pub const DEFAULT_CHANNELS: &[&str] = &["lebanondebate", "Lebanon_24", "sadadahiechannel"];

/// Single channel mode runs a short, gentler scrape.
pub const SINGLE_CHANNEL_LIMIT: usize = 1000;
pub const SINGLE_CHANNEL_BATCH_SIZE: usize = 100;
pub const SINGLE_CHANNEL_REQUEST_DELAY_SECS: f64 = 1.0;
pub const SINGLE_CHANNEL_ERROR_DELAY_SECS: f64 = 5.0;

/// YAML config structures
#[derive(Debug, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramConfig>,
    scrape: Option<ScrapeConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
    session_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeConfig {
    data_dir: Option<PathBuf>,
    checkpoint_file: Option<PathBuf>,
    max_messages: Option<usize>,
    batch_size: Option<usize>,
    request_delay_secs: Option<f64>,
    error_delay_secs: Option<f64>,
    max_error_delay_secs: Option<f64>,
    max_retries: Option<u32>,
    channels: Option<Vec<String>>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub api_id: i32,
    pub api_hash: String,
    pub session_name: String,
    pub data_dir: PathBuf,
    pub checkpoint_file: PathBuf,
    pub max_messages: usize,
    pub batch_size: usize,
    pub request_delay: Duration,
    pub error_delay: Duration,
    pub max_error_delay: Duration,
    pub max_retries: Option<u32>,
    pub channels: Vec<String>,
}

/// Locations searched when no `--config` path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["config.yml", "../config.yml"];

impl Config {
    /// Load from an explicit path, or fall back to the usual search.
    ///
    /// An explicit path that cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::discover(DEFAULT_CONFIG_PATHS)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the first candidate file that exists.
    ///
    /// Built-in defaults apply only when none of them exists; a file that is
    /// present but unreadable or malformed is an error.
    pub fn discover<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                info!(path = %path.display(), "Loading configuration");
                return Self::load_from_file(path);
            }
        }

        debug!("No config.yml found, using defaults");
        Self::load_dotenv();
        Ok(Self::defaults())
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Some(var_name) = value.as_deref().and_then(placeholder_name) {
            if let Ok(env_val) = std::env::var(var_name) {
                return env_val;
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        value
            .filter(|v| placeholder_name(v).is_none())
            .unwrap_or_default()
    }

    /// Resolve an integer value from string config or env var
    fn resolve_env_i32(value: Option<String>, env_key: &str) -> i32 {
        if let Some(ref v) = value {
            if let Some(var_name) = placeholder_name(v) {
                if let Some(parsed) = std::env::var(var_name).ok().and_then(|s| s.parse().ok()) {
                    return parsed;
                }
            }
            // Explicit numbers in the file win over the environment
            if let Ok(parsed) = v.parse::<i32>() {
                return parsed;
            }
        }
        std::env::var(env_key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        let telegram = yaml.telegram.unwrap_or_default();
        let scrape = yaml.scrape.unwrap_or_default();

        let data_dir = scrape
            .data_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let checkpoint_file = scrape
            .checkpoint_file
            .unwrap_or_else(|| data_dir.join(CHECKPOINT_FILE_NAME));
        let channels = match scrape.channels {
            Some(list) => normalize_channels(list),
            None => default_channels(),
        };

        Ok(Self {
            api_id: Self::resolve_env_i32(telegram.api_id, "TELEGRAM_API_ID"),
            api_hash: Self::resolve_env_string(telegram.api_hash, "TELEGRAM_API_HASH"),
            session_name: telegram
                .session_name
                .unwrap_or_else(|| SESSION_NAME.to_string()),
            data_dir,
            checkpoint_file,
            max_messages: scrape.max_messages.unwrap_or(DEFAULT_MAX_MESSAGES),
            batch_size: scrape.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            request_delay: secs(scrape.request_delay_secs, DEFAULT_REQUEST_DELAY_SECS)?,
            error_delay: secs(scrape.error_delay_secs, DEFAULT_ERROR_DELAY_SECS)?,
            max_error_delay: secs(scrape.max_error_delay_secs, DEFAULT_MAX_ERROR_DELAY_SECS)?,
            max_retries: scrape.max_retries,
            channels,
        })
    }

    /// Create config with environment credentials and built-in defaults
    pub fn defaults() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Self {
            api_id: Self::resolve_env_i32(None, "TELEGRAM_API_ID"),
            api_hash: Self::resolve_env_string(None, "TELEGRAM_API_HASH"),
            session_name: SESSION_NAME.to_string(),
            checkpoint_file: data_dir.join(CHECKPOINT_FILE_NAME),
            data_dir,
            max_messages: DEFAULT_MAX_MESSAGES,
            batch_size: DEFAULT_BATCH_SIZE,
            request_delay: Duration::from_secs_f64(DEFAULT_REQUEST_DELAY_SECS),
            error_delay: Duration::from_secs_f64(DEFAULT_ERROR_DELAY_SECS),
            max_error_delay: Duration::from_secs_f64(DEFAULT_MAX_ERROR_DELAY_SECS),
            max_retries: None,
            channels: default_channels(),
        }
    }

    /// Reject settings the scrape loop cannot make progress with.
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(Error::InvalidArgument(
                "max_messages must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_error_delay < self.error_delay {
            return Err(Error::InvalidArgument(format!(
                "max_error_delay_secs ({:?}) is shorter than error_delay_secs ({:?})",
                self.max_error_delay, self.error_delay
            )));
        }
        for channel in &self.channels {
            validate_handle(channel)?;
        }
        Ok(())
    }

    pub fn session_file(&self) -> String {
        format!("{}.session", self.session_name)
    }

    pub fn lock_file(&self) -> String {
        format!("{}.lock", self.session_name)
    }

    /// Fetch settings for the orchestrated multi-channel run.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            max_messages: self.max_messages,
            batch_size: self.batch_size,
            request_delay: self.request_delay,
            retry: RetryPolicy {
                base_delay: self.error_delay,
                max_delay: self.max_error_delay,
                max_retries: self.max_retries,
            },
        }
    }

    /// Fetch settings for single channel mode.
    pub fn single_channel_settings(&self, limit: usize, batch_size: usize) -> FetchSettings {
        let error_delay = Duration::from_secs_f64(SINGLE_CHANNEL_ERROR_DELAY_SECS);
        FetchSettings {
            max_messages: limit,
            batch_size,
            request_delay: Duration::from_secs_f64(SINGLE_CHANNEL_REQUEST_DELAY_SECS),
            retry: RetryPolicy {
                base_delay: error_delay,
                max_delay: self.max_error_delay.max(error_delay),
                max_retries: self.max_retries,
            },
        }
    }
}

/// Extract `VAR` from a `${VAR}` placeholder.
fn placeholder_name(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
}

fn secs(value: Option<f64>, default: f64) -> Result<Duration> {
    let value = value.unwrap_or(default);
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("invalid delay: {} seconds", value)))
}

/// Strip `@` prefixes, drop blanks and duplicates while keeping order.
pub fn normalize_channels<I, S>(channels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result: Vec<String> = Vec::new();
    for channel in channels {
        let channel = channel.as_ref().trim();
        let channel = channel.strip_prefix('@').unwrap_or(channel);
        if !channel.is_empty() && !result.iter().any(|c| c == channel) {
            result.push(channel.to_string());
        }
    }
    result
}

fn default_channels() -> Vec<String> {
    DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }

    fn write_yaml(name: &str, yaml: &str) -> PathBuf {
        let temp_file = std::env::temp_dir().join(name);
        std::fs::write(&temp_file, yaml).unwrap();
        temp_file
    }

    #[test]
    fn defaults_match_constants() {
        let config = Config::defaults();

        assert_eq!(config.session_name, SESSION_NAME);
        assert_eq!(config.max_messages, DEFAULT_MAX_MESSAGES);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.request_delay, Duration::from_secs(2));
        assert_eq!(config.error_delay, Duration::from_secs(10));
        assert_eq!(config.max_retries, None);
        assert_eq!(
            config.checkpoint_file,
            PathBuf::from("data").join("scrape_checkpoint.json")
        );
        assert_eq!(config.channels.len(), DEFAULT_CHANNELS.len());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
telegram:
  api_id: 12345
  api_hash: "test_hash"
  session_name: "my_session"

scrape:
  data_dir: "/tmp/scrape_out"
  max_messages: 500
  batch_size: 50
  request_delay_secs: 0.5
  error_delay_secs: 3
  max_error_delay_secs: 60
  max_retries: 7
  channels:
    - "@first"
    - second
    - first
"#;
        let temp_file = write_yaml("scraper_config_full.yml", yaml);

        let config = Config::load_from_file(&temp_file).unwrap();

        assert_eq!(config.session_name, "my_session");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/scrape_out"));
        assert_eq!(
            config.checkpoint_file,
            PathBuf::from("/tmp/scrape_out/scrape_checkpoint.json")
        );
        assert_eq!(config.max_messages, 500);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.request_delay, Duration::from_millis(500));
        assert_eq!(config.error_delay, Duration::from_secs(3));
        assert_eq!(config.max_error_delay, Duration::from_secs(60));
        assert_eq!(config.max_retries, Some(7));
        assert_eq!(config.channels, vec!["first", "second"]);

        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn explicit_checkpoint_file_is_kept() {
        let yaml = r#"
scrape:
  data_dir: out
  checkpoint_file: state/progress.json
"#;
        let temp_file = write_yaml("scraper_config_checkpoint.yml", yaml);

        let config = Config::load_from_file(&temp_file).unwrap();
        assert_eq!(config.checkpoint_file, PathBuf::from("state/progress.json"));

        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn env_placeholders_are_resolved_from_environment() {
        let _lock = ENV_LOCK.lock().unwrap();
        let yaml = r#"
telegram:
  api_id: "${SCRAPER_TEST_API_ID}"
  api_hash: "${SCRAPER_TEST_API_HASH}"
"#;
        let temp_file = write_yaml("scraper_config_env.yml", yaml);

        let _id = EnvGuard::set("SCRAPER_TEST_API_ID", "4242");
        let _hash = EnvGuard::set("SCRAPER_TEST_API_HASH", "hash_from_env");

        let config = Config::load_from_file(&temp_file).unwrap();

        assert_eq!(config.api_id, 4242);
        assert_eq!(config.api_hash, "hash_from_env");

        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn numeric_yaml_api_id_wins_over_environment() {
        let _lock = ENV_LOCK.lock().unwrap();
        let yaml = r#"
telegram:
  api_id: 321
"#;
        let temp_file = write_yaml("scraper_config_numeric.yml", yaml);
        let _id = EnvGuard::set("TELEGRAM_API_ID", "9999");

        let config = Config::load_from_file(&temp_file).unwrap();
        assert_eq!(config.api_id, 321);

        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn missing_credentials_fall_back_to_environment() {
        let _lock = ENV_LOCK.lock().unwrap();
        let temp_file = write_yaml("scraper_config_no_telegram.yml", "scrape: {}\n");
        let _id = EnvGuard::set("TELEGRAM_API_ID", "777");
        let _hash = EnvGuard::set("TELEGRAM_API_HASH", "env_hash");

        let config = Config::load_from_file(&temp_file).unwrap();
        assert_eq!(config.api_id, 777);
        assert_eq!(config.api_hash, "env_hash");
        assert_eq!(config.channels.len(), DEFAULT_CHANNELS.len());

        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = Config::defaults();
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn validate_rejects_zero_max_messages() {
        let mut config = Config::defaults();
        config.max_messages = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn validate_rejects_inverted_backoff_bounds() {
        let mut config = Config::defaults();
        config.max_error_delay = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_delay_is_a_config_error() {
        let temp_file = write_yaml(
            "scraper_config_negative_delay.yml",
            "scrape:\n  request_delay_secs: -1\n",
        );

        let result = Config::load_from_file(&temp_file);
        assert!(matches!(result, Err(Error::Config(_))));

        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn fetch_settings_carry_retry_policy() {
        let mut config = Config::defaults();
        config.max_retries = Some(3);

        let settings = config.fetch_settings();
        assert_eq!(settings.max_messages, DEFAULT_MAX_MESSAGES);
        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(settings.retry.base_delay, Duration::from_secs(10));
        assert_eq!(settings.retry.max_retries, Some(3));
    }

    #[test]
    fn single_channel_settings_use_gentler_pacing() {
        let config = Config::defaults();
        let settings =
            config.single_channel_settings(SINGLE_CHANNEL_LIMIT, SINGLE_CHANNEL_BATCH_SIZE);

        assert_eq!(settings.max_messages, 1000);
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.request_delay, Duration::from_secs(1));
        assert_eq!(settings.retry.base_delay, Duration::from_secs(5));
    }

    #[test]
    fn session_and_lock_files_derive_from_session_name() {
        let config = Config::defaults();
        assert_eq!(config.session_file(), "scraper_session.session");
        assert_eq!(config.lock_file(), "scraper_session.lock");
    }

    #[test]
    fn normalize_channels_strips_at_and_dedupes() {
        let channels = normalize_channels(["@a", " b ", "", "a", "@c"]);
        assert_eq!(channels, vec!["a", "b", "c"]);
    }

    #[test]
    fn discover_without_any_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let candidates = [temp.path().join("config.yml"), temp.path().join("other.yml")];

        let config = Config::discover(&candidates).unwrap();
        assert_eq!(config.channels.len(), DEFAULT_CHANNELS.len());
    }

    #[test]
    fn discover_reports_malformed_default_file() {
        let temp = tempfile::tempdir().unwrap();
        let local = temp.path().join("config.yml");
        let parent = temp.path().join("parent.yml");
        std::fs::write(&local, "scrape:\n  channels: [my_channel\n  max_messages: 5\n").unwrap();
        std::fs::write(&parent, "scrape:\n  channels: [other]\n").unwrap();

        let result = Config::discover(&[local, parent]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn discover_uses_first_existing_candidate() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("config.yml");
        let parent = temp.path().join("parent.yml");
        std::fs::write(&parent, "scrape:\n  channels: [from_parent]\n").unwrap();

        let config = Config::discover(&[missing, parent]).unwrap();
        assert_eq!(config.channels, vec!["from_parent"]);
    }

    #[test]
    fn validate_rejects_handles_that_are_not_usernames() {
        let mut config = Config::defaults();
        config.channels = vec!["a.b".to_string()];
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn load_from_file_fails_on_missing_file() {
        let result = Config::load_from_file("/nonexistent/path/config.yml");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_from_file_fails_on_invalid_yaml() {
        let temp_file = write_yaml("scraper_config_invalid.yml", "{ invalid yaml [");

        let result = Config::load_from_file(&temp_file);
        assert!(result.is_err());

        std::fs::remove_file(temp_file).ok();
    }
}
