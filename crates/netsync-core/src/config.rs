//! Configuration module for netsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{CompareStrategy, ConflictAction, ConflictResolution, DeleteScope, Direction};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for netsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub retry: RetryConfig,
    pub rate_limiting: RateLimitingConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Remote service endpoint and credentials.
///
/// The credentials are handed to the transport adapter untouched; netsync
/// itself never signs requests.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Service host name, e.g. `example-nsu.akamaihd.net`.
    pub host: String,
    /// Name of the upload account key.
    pub key_name: String,
    /// Secret key material.
    pub key: String,
    /// Storage group / CP code that prefixes every remote path.
    pub cp_code: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

// The key must never end up in logs.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("key_name", &self.key_name)
            .field("key", &if self.key.is_empty() { "" } else { "<redacted>" })
            .field("cp_code", &self.cp_code)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Retry executor settings applied to every remote primitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Randomize each delay within `[0, delay]`.
    pub jitter: bool,
}

/// Client-side request rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    /// Burst size (tokens) per operation class.
    pub capacity: u32,
    /// Sustained requests per second per operation class.
    pub refill_per_second: f64,
}

/// A single conflict rule as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRuleConfig {
    /// Glob pattern matched against the relative path.
    pub pattern: String,
    /// Action to take for matching paths.
    pub action: ConflictAction,
}

/// Synchronization defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub direction: Direction,
    pub compare_strategy: CompareStrategy,
    pub conflict_resolution: ConflictResolution,
    /// Ordered rules; the first matching pattern wins.
    pub conflict_rules: Vec<ConflictRuleConfig>,
    pub delete_extraneous: DeleteScope,
    pub dry_run: bool,
    /// Maximum per-entry tasks in flight during a directory sync.
    pub max_concurrency: usize,
    /// Glob patterns (relative paths) pruned from local walks.
    pub ignore: Vec<String>,
    /// Follow local symlinks while walking.
    pub follow_symlinks: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl LoggingConfig {
    /// Filter directive for a `tracing_subscriber::EnvFilter`.
    ///
    /// Scopes the level to the netsync crates so dependencies stay quiet.
    pub fn env_filter(&self) -> String {
        ["netsync_core", "netsync_remote", "netsync_conflict", "netsync_sync"]
            .iter()
            .map(|krate| format!("{krate}={}", self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/netsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("netsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            key_name: String::new(),
            key: String::new(),
            cp_code: String::new(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            refill_per_second: 10.0,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Upload,
            compare_strategy: CompareStrategy::Size,
            conflict_resolution: ConflictResolution::PreferLocal,
            conflict_rules: Vec::new(),
            delete_extraneous: DeleteScope::None,
            dry_run: false,
            max_concurrency: 5,
            ignore: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.max_attempts"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- remote ---
        if self.remote.timeout_ms == 0 {
            push("remote.timeout_ms", "must be greater than 0".into());
        }
        if !self.remote.key.is_empty() && self.remote.key_name.is_empty() {
            push(
                "remote.key_name",
                "must be set when remote.key is provided".into(),
            );
        }

        // --- retry ---
        if self.retry.max_attempts == 0 {
            push("retry.max_attempts", "must be greater than 0".into());
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            push(
                "retry.max_delay_ms",
                format!(
                    "max_delay_ms ({}) must not be less than base_delay_ms ({})",
                    self.retry.max_delay_ms, self.retry.base_delay_ms
                ),
            );
        }

        // --- rate_limiting ---
        if self.rate_limiting.capacity == 0 {
            push("rate_limiting.capacity", "must be greater than 0".into());
        }
        if !(self.rate_limiting.refill_per_second > 0.0) {
            push(
                "rate_limiting.refill_per_second",
                "must be greater than 0".into(),
            );
        }

        // --- sync ---
        if self.sync.max_concurrency == 0 {
            push("sync.max_concurrency", "must be greater than 0".into());
        }
        for (idx, rule) in self.sync.conflict_rules.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(&rule.pattern) {
                push(
                    &format!("sync.conflict_rules[{idx}].pattern"),
                    format!("invalid glob pattern '{}': {e}", rule.pattern),
                );
            }
        }
        for (idx, pattern) in self.sync.ignore.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                push(
                    &format!("sync.ignore[{idx}]"),
                    format!("invalid glob pattern '{pattern}': {e}"),
                );
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use netsync_core::config::ConfigBuilder;
/// use netsync_core::domain::Direction;
///
/// let config = ConfigBuilder::new()
///     .remote_host("example-nsu.akamaihd.net")
///     .sync_direction(Direction::Both)
///     .sync_max_concurrency(8)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // -- remote --

    pub fn remote_host(mut self, host: impl Into<String>) -> Self {
        self.config.remote.host = host.into();
        self
    }

    pub fn remote_credentials(mut self, key_name: impl Into<String>, key: impl Into<String>) -> Self {
        self.config.remote.key_name = key_name.into();
        self.config.remote.key = key.into();
        self
    }

    pub fn remote_cp_code(mut self, cp_code: impl Into<String>) -> Self {
        self.config.remote.cp_code = cp_code.into();
        self
    }

    pub fn remote_timeout_ms(mut self, ms: u64) -> Self {
        self.config.remote.timeout_ms = ms;
        self
    }

    // -- retry --

    pub fn retry_max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_delays_ms(mut self, base: u64, max: u64) -> Self {
        self.config.retry.base_delay_ms = base;
        self.config.retry.max_delay_ms = max;
        self
    }

    pub fn retry_jitter(mut self, jitter: bool) -> Self {
        self.config.retry.jitter = jitter;
        self
    }

    // -- rate_limiting --

    pub fn rate_limiting(mut self, capacity: u32, refill_per_second: f64) -> Self {
        self.config.rate_limiting.capacity = capacity;
        self.config.rate_limiting.refill_per_second = refill_per_second;
        self
    }

    // -- sync --

    pub fn sync_direction(mut self, direction: Direction) -> Self {
        self.config.sync.direction = direction;
        self
    }

    pub fn sync_compare_strategy(mut self, strategy: CompareStrategy) -> Self {
        self.config.sync.compare_strategy = strategy;
        self
    }

    pub fn sync_conflict_resolution(mut self, resolution: ConflictResolution) -> Self {
        self.config.sync.conflict_resolution = resolution;
        self
    }

    /// Append a conflict rule; rules keep insertion order.
    pub fn sync_conflict_rule(mut self, pattern: impl Into<String>, action: ConflictAction) -> Self {
        self.config.sync.conflict_rules.push(ConflictRuleConfig {
            pattern: pattern.into(),
            action,
        });
        self
    }

    pub fn sync_delete_extraneous(mut self, scope: DeleteScope) -> Self {
        self.config.sync.delete_extraneous = scope;
        self
    }

    pub fn sync_dry_run(mut self, dry_run: bool) -> Self {
        self.config.sync.dry_run = dry_run;
        self
    }

    pub fn sync_max_concurrency(mut self, n: usize) -> Self {
        self.config.sync.max_concurrency = n;
        self
    }

    pub fn sync_ignore(mut self, pattern: impl Into<String>) -> Self {
        self.config.sync.ignore.push(pattern.into());
        self
    }

    pub fn sync_follow_symlinks(mut self, follow: bool) -> Self {
        self.config.sync.follow_symlinks = follow;
        self
    }

    // -- logging --

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
