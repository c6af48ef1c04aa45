//! SinkConfig - Config Loader output
//!
//! Describes the complete sink configuration: buffer thresholds, retry policy,
//! startup probing, shutdown, and the two destinations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::ContractError;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Accumulator thresholds
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Retry and backoff policy
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Startup reachability probing
    #[serde(default)]
    pub startup: StartupConfig,

    /// Shutdown behavior
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Primary destination
    pub primary: DestinationConfig,

    /// Optional overflow destination
    #[serde(default)]
    pub secondary: Option<SecondaryConfig>,

    /// Credential selection for the destination clients
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl SinkConfig {
    /// Minimal configuration around a primary destination, all other values default
    pub fn with_primary(primary: DestinationConfig) -> Self {
        Self {
            version: ConfigVersion::V1,
            buffer: BufferConfig::default(),
            backoff: BackoffConfig::default(),
            startup: StartupConfig::default(),
            shutdown: ShutdownConfig::default(),
            primary,
            secondary: None,
            credentials: CredentialsConfig::default(),
        }
    }
}

/// Accumulator flush thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Flush before the pending byte count would exceed this
    #[serde(default = "default_byte_limit")]
    pub byte_limit: usize,

    /// Flush before the pending record count would exceed this
    #[serde(default = "default_record_limit")]
    pub record_limit: usize,

    /// Flush at most this long after the previous flush
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
}

impl BufferConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            byte_limit: default_byte_limit(),
            record_limit: default_record_limit(),
            time_limit_ms: default_time_limit_ms(),
        }
    }
}

fn default_byte_limit() -> usize {
    4_500_000
}

fn default_record_limit() -> usize {
    500
}

fn default_time_limit_ms() -> u64 {
    5_000
}

/// Retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Lower bound for a retry delay (milliseconds)
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,

    /// Upper bound for a freshly drawn retry delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Retries against one destination before failing over
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl BackoffConfig {
    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_min_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    10
}

/// Startup probing cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Sleep between failed reachability checks (milliseconds)
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl StartupConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

fn default_check_interval_ms() -> u64 {
    1_000
}

/// Shutdown behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long shutdown waits for outstanding writes and retries (milliseconds)
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

fn default_grace_period_ms() -> u64 {
    10_000
}

/// Destination definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Destination name (stream or queue identity)
    pub name: String,

    /// Destination implementation
    #[serde(default)]
    pub kind: DestinationKind,

    /// Implementation-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl DestinationConfig {
    pub fn new(name: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: HashMap::new(),
        }
    }
}

/// Destination implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    #[default]
    Log,
    File,
}

/// Overflow destination with its stricter per-request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryConfig {
    #[serde(flatten)]
    pub destination: DestinationConfig,

    /// Maximum events per request
    #[serde(default = "default_max_records_per_request")]
    pub max_records_per_request: usize,

    /// Maximum summed payload bytes per request
    #[serde(default = "default_max_bytes_per_request")]
    pub max_bytes_per_request: usize,
}

impl SecondaryConfig {
    pub fn new(destination: DestinationConfig) -> Self {
        Self {
            destination,
            max_records_per_request: default_max_records_per_request(),
            max_bytes_per_request: default_max_bytes_per_request(),
        }
    }

    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_records: self.max_records_per_request,
            max_bytes: self.max_bytes_per_request,
        }
    }
}

fn default_max_records_per_request() -> usize {
    10
}

// 256 KiB message ceiling, leaving room for base64 expansion
fn default_max_bytes_per_request() -> usize {
    192 * 1024
}

/// Per-request ceilings consumed by the batch splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLimits {
    pub max_records: usize,
    pub max_bytes: usize,
}

/// Raw credential settings
///
/// Each key is either a literal secret or one of the special values
/// `default`, `iam` or `env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credential")]
    pub access_key: String,
    #[serde(default = "default_credential")]
    pub secret_key: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            access_key: default_credential(),
            secret_key: default_credential(),
        }
    }
}

fn default_credential() -> String {
    "default".to_string()
}

/// Resolved credential source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsMode {
    /// Provider chain of the client library
    Default,
    /// Instance profile
    Iam,
    /// Process environment
    Env,
    /// Literal keys
    Static {
        access_key: String,
        secret_key: String,
    },
}

impl CredentialsConfig {
    const SPECIAL: [(&'static str, CredentialsMode); 3] = [
        ("default", CredentialsMode::Default),
        ("iam", CredentialsMode::Iam),
        ("env", CredentialsMode::Env),
    ];

    /// Resolve the credential source
    ///
    /// A special value must appear in both keys or in neither.
    ///
    /// # Errors
    /// Returns a validation error for a half-special pair or an empty literal key
    pub fn resolve(&self) -> Result<CredentialsMode, ContractError> {
        for (special, mode) in Self::SPECIAL {
            let access = self.access_key == special;
            let secret = self.secret_key == special;
            match (access, secret) {
                (true, true) => return Ok(mode),
                (true, false) | (false, true) => {
                    return Err(ContractError::config_validation(
                        "credentials",
                        format!("access_key and secret_key must both be '{special}' or neither"),
                    ))
                }
                (false, false) => {}
            }
        }

        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(ContractError::config_validation(
                "credentials",
                "access_key and secret_key cannot be empty",
            ));
        }

        Ok(CredentialsMode::Static {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        })
    }
}
