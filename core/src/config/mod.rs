//! typed configuration tree (spec §6). loading from a text or key-value
//! source is out of scope; an external loader is expected to either
//! construct these structs directly or, with the `env-config` feature,
//! `serde::Deserialize` them from whatever format it speaks. Every group's
//! fields may additionally be overridden by an environment variable via
//! [`Config::apply_env_overrides`].

mod env;

use std::time::Duration;

pub use env::EnvOverrideError;
use env::env_override;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub enum TimeUnit {
    Ns,
    Us,
    Ms,
    S,
}

impl std::str::FromStr for TimeUnit {
    type Err = EnvOverrideError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Ns" => Ok(Self::Ns),
            "Us" => Ok(Self::Us),
            "Ms" => Ok(Self::Ms),
            "S" => Ok(Self::S),
            other => Err(EnvOverrideError::InvalidEnumValue(other.to_string())),
        }
    }
}

impl TimeUnit {
    pub fn to_duration(self, limit: u64) -> Duration {
        match self {
            Self::Ns => Duration::from_nanos(limit),
            Self::Us => Duration::from_micros(limit),
            Self::Ms => Duration::from_millis(limit),
            Self::S => Duration::from_secs(limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub enum PreferredStreamKind {
    Backward,
    Bidirectional,
}

impl std::str::FromStr for PreferredStreamKind {
    type Err = EnvOverrideError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Backward" => Ok(Self::Backward),
            "Bidirectional" => Ok(Self::Bidirectional),
            other => Err(EnvOverrideError::InvalidEnumValue(other.to_string())),
        }
    }
}

impl From<PreferredStreamKind> for dp_wire::StreamKind {
    fn from(kind: PreferredStreamKind) -> Self {
        match kind {
            PreferredStreamKind::Backward => Self::Backward,
            PreferredStreamKind::Bidirectional => Self::Bidirectional,
        }
    }
}

/// `query.recovery.stream.decomposition`. carries the strategy's own
/// parameters rather than a bare tag, since `None` is the only variant with
/// none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub enum Decomposition {
    None,
    Horizontal { n: u32 },
    Vertical { n: u32 },
    Grid { h: u32, v: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct TlsConfig {
    pub enabled: bool,
    pub default: bool,
    pub trusted_certs_path: Option<String>,
    pub client_certs_path: Option<String>,
    pub client_key_path: Option<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self { enabled: true, default: true, trusted_certs_path: None, client_certs_path: None, client_key_path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct TimeoutConfig {
    pub enabled: bool,
    pub limit: u64,
    pub unit: TimeUnit,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { enabled: true, limit: 30, unit: TimeUnit::S }
    }
}

impl TimeoutConfig {
    pub fn duration(&self) -> Option<Duration> {
        self.enabled.then(|| self.unit.to_duration(self.limit))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct TransportConfig {
    pub plaintext_ok: bool,
    pub max_message_bytes: usize,
    pub keep_alive_without_calls: bool,
    pub compression_gzip: bool,
    pub timeout: TimeoutConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            plaintext_ok: false,
            max_message_bytes: 4 * 1024 * 1024,
            keep_alive_without_calls: false,
            compression_gzip: false,
            timeout: TimeoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct ConnectionConfig {
    pub host_url: String,
    pub port: u16,
    pub tls: TlsConfig,
    pub transport: TransportConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { host_url: "localhost".to_string(), port: 443, tls: TlsConfig::default(), transport: TransportConfig::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct BufferConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub back_pressure: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { enabled: true, capacity: 1024, back_pressure: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct BinningConfig {
    pub enabled: bool,
    pub max_bytes: i64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self { enabled: true, max_bytes: 4 * 1024 * 1024 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct ConcurrencyGroup {
    pub enabled: bool,
    pub pivot_count: usize,
    pub max_streams: usize,
}

impl Default for ConcurrencyGroup {
    fn default() -> Self {
        Self { enabled: true, pivot_count: 1, max_streams: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct IngestionStreamConfig {
    pub preferred_kind: PreferredStreamKind,
    pub buffer: BufferConfig,
    pub binning: BinningConfig,
    pub concurrency: ConcurrencyGroup,
}

impl Default for IngestionStreamConfig {
    fn default() -> Self {
        Self {
            preferred_kind: PreferredStreamKind::Bidirectional,
            buffer: BufferConfig::default(),
            binning: BinningConfig::default(),
            concurrency: ConcurrencyGroup::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct QueryRecoveryStreamConfig {
    pub preferred_kind: PreferredStreamKind,
    pub decomposition: Decomposition,
    pub max_streams: usize,
}

impl Default for QueryRecoveryStreamConfig {
    fn default() -> Self {
        Self { preferred_kind: PreferredStreamKind::Bidirectional, decomposition: Decomposition::None, max_streams: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct ConcurrencyConfig {
    pub enabled: bool,
    pub pivot_size: usize,
    pub max_threads: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { enabled: true, pivot_size: 1, max_threads: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = EnvOverrideError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Trace" => Ok(Self::Trace),
            "Debug" => Ok(Self::Debug),
            "Info" => Ok(Self::Info),
            "Warn" => Ok(Self::Warn),
            "Error" => Ok(Self::Error),
            other => Err(EnvOverrideError::InvalidEnumValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enabled: true, level: LogLevel::Info }
    }
}

/// the full tree, rooted at one environment-variable prefix for overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "env-config", derive(serde::Deserialize))]
pub struct Config {
    pub connection: ConnectionConfig,
    pub ingestion_stream: IngestionStreamConfig,
    pub query_recovery_stream: QueryRecoveryStreamConfig,
    pub concurrency: ConcurrencyConfig,
    pub timeout: TimeoutConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// apply every environment variable named `{root}_{PATH}_{NAME}` that is
    /// currently set, parsing the target field's scalar type and matching
    /// enum values case-sensitively against constant names (spec §6). fails
    /// on the first value that doesn't parse.
    pub fn apply_env_overrides(&mut self, root: &str) -> Result<()> {
        env_override!(self, root, {
            "CONNECTION_HOST_URL" => connection.host_url: String,
            "CONNECTION_PORT" => connection.port: u16,
            "CONNECTION_TLS_ENABLED" => connection.tls.enabled: bool,
            "CONNECTION_TLS_DEFAULT" => connection.tls.default: bool,
            "CONNECTION_TRANSPORT_PLAINTEXT_OK" => connection.transport.plaintext_ok: bool,
            "CONNECTION_TRANSPORT_MAX_MESSAGE_BYTES" => connection.transport.max_message_bytes: usize,
            "CONNECTION_TRANSPORT_KEEP_ALIVE_WITHOUT_CALLS" => connection.transport.keep_alive_without_calls: bool,
            "CONNECTION_TRANSPORT_COMPRESSION_GZIP" => connection.transport.compression_gzip: bool,
            "CONNECTION_TRANSPORT_TIMEOUT_ENABLED" => connection.transport.timeout.enabled: bool,
            "CONNECTION_TRANSPORT_TIMEOUT_LIMIT" => connection.transport.timeout.limit: u64,
            "CONNECTION_TRANSPORT_TIMEOUT_UNIT" => connection.transport.timeout.unit: TimeUnit,
            "INGESTION_STREAM_PREFERRED_KIND" => ingestion_stream.preferred_kind: PreferredStreamKind,
            "INGESTION_STREAM_BUFFER_ENABLED" => ingestion_stream.buffer.enabled: bool,
            "INGESTION_STREAM_BUFFER_CAPACITY" => ingestion_stream.buffer.capacity: usize,
            "INGESTION_STREAM_BUFFER_BACK_PRESSURE" => ingestion_stream.buffer.back_pressure: bool,
            "INGESTION_STREAM_BINNING_ENABLED" => ingestion_stream.binning.enabled: bool,
            "INGESTION_STREAM_BINNING_MAX_BYTES" => ingestion_stream.binning.max_bytes: i64,
            "INGESTION_STREAM_CONCURRENCY_ENABLED" => ingestion_stream.concurrency.enabled: bool,
            "INGESTION_STREAM_CONCURRENCY_PIVOT_COUNT" => ingestion_stream.concurrency.pivot_count: usize,
            "INGESTION_STREAM_CONCURRENCY_MAX_STREAMS" => ingestion_stream.concurrency.max_streams: usize,
            "QUERY_RECOVERY_STREAM_PREFERRED_KIND" => query_recovery_stream.preferred_kind: PreferredStreamKind,
            "QUERY_RECOVERY_STREAM_MAX_STREAMS" => query_recovery_stream.max_streams: usize,
            "CONCURRENCY_ENABLED" => concurrency.enabled: bool,
            "CONCURRENCY_PIVOT_SIZE" => concurrency.pivot_size: usize,
            "CONCURRENCY_MAX_THREADS" => concurrency.max_threads: usize,
            "TIMEOUT_ENABLED" => timeout.enabled: bool,
            "TIMEOUT_LIMIT" => timeout.limit: u64,
            "TIMEOUT_UNIT" => timeout.unit: TimeUnit,
            "LOGGING_ENABLED" => logging.enabled: bool,
            "LOGGING_LEVEL" => logging.level: LogLevel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip() {
        let config = Config::default();
        assert_eq!(config.connection.port, 443);
        assert_eq!(config.ingestion_stream.preferred_kind, PreferredStreamKind::Bidirectional);
    }

    #[test]
    fn env_override_applies_scalar_and_enum_fields() {
        std::env::set_var("DP_TEST_A_CONNECTION_PORT", "9443");
        std::env::set_var("DP_TEST_A_LOGGING_LEVEL", "Debug");
        let mut config = Config::default();
        config.apply_env_overrides("DP_TEST_A").unwrap();
        assert_eq!(config.connection.port, 9443);
        assert_eq!(config.logging.level, LogLevel::Debug);
        std::env::remove_var("DP_TEST_A_CONNECTION_PORT");
        std::env::remove_var("DP_TEST_A_LOGGING_LEVEL");
    }

    #[test]
    fn invalid_override_value_is_config_invalid() {
        std::env::set_var("DP_TEST_B_CONNECTION_PORT", "not-a-port");
        let mut config = Config::default();
        let err = config.apply_env_overrides("DP_TEST_B").unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
        std::env::remove_var("DP_TEST_B_CONNECTION_PORT");
    }

    #[test]
    fn absent_env_vars_leave_defaults_untouched() {
        let mut config = Config::default();
        config.apply_env_overrides("DP_TEST_NONE").unwrap();
        assert_eq!(config, Config::default());
    }
}
