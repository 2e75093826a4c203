//! Client configuration types and builders.

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use widerow_core::{ConsistencyLevel, ErrorKind, WideRowError};

use crate::connection::ClockResolution;
use crate::operation::OperationType;

/// Default server address.
const DEFAULT_ADDRESS: &str = "127.0.0.1:9160";
/// Default number of retries after a failed attempt.
const DEFAULT_RETRIES: u32 = 1;
/// Default pause between attempts.
const DEFAULT_RETRY_PAUSE: Duration = Duration::ZERO;
/// Default jitter applied to the retry pause.
const DEFAULT_JITTER: f64 = 0.0;
/// Error kinds retried on another connection unless configured otherwise.
const DEFAULT_RETRYABLE: [ErrorKind; 2] = [ErrorKind::Unavailable, ErrorKind::Timeout];

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Bounds and classification for retrying a failed operation on another connection.
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverPolicy {
    read_retries: u32,
    write_retries: u32,
    retry_pause: Duration,
    jitter: f64,
    retryable: Vec<ErrorKind>,
}

impl FailoverPolicy {
    /// Creates a new failover policy builder.
    pub fn builder() -> FailoverPolicyBuilder {
        FailoverPolicyBuilder::new()
    }

    /// Never retries; the first failure is returned.
    pub fn fail_fast() -> Self {
        Self::with_retries(0)
    }

    /// Retries once on the next available connection.
    pub fn on_fail_try_one_next_available() -> Self {
        Self::with_retries(1)
    }

    /// Retries on every available connection. The pool size bounds the attempts.
    pub fn on_fail_try_all_available() -> Self {
        Self::with_retries(u32::MAX)
    }

    fn with_retries(retries: u32) -> Self {
        Self {
            read_retries: retries,
            write_retries: retries,
            retry_pause: DEFAULT_RETRY_PAUSE,
            jitter: DEFAULT_JITTER,
            retryable: DEFAULT_RETRYABLE.to_vec(),
        }
    }

    /// Returns the retry budget for reads.
    pub fn read_retries(&self) -> u32 {
        self.read_retries
    }

    /// Returns the retry budget for writes.
    pub fn write_retries(&self) -> u32 {
        self.write_retries
    }

    /// Returns the retry budget for an operation of the given kind.
    pub fn retries_for(&self, op_type: OperationType) -> u32 {
        match op_type {
            OperationType::Read => self.read_retries,
            OperationType::Write => self.write_retries,
        }
    }

    /// Returns the pause between attempts before jitter.
    pub fn retry_pause(&self) -> Duration {
        self.retry_pause
    }

    /// Returns the jitter factor applied to the retry pause.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Returns the error kinds that trigger a retry.
    pub fn retryable(&self) -> &[ErrorKind] {
        &self.retryable
    }

    /// Returns `true` if `error` may be retried on another connection.
    pub fn is_retryable(&self, error: &WideRowError) -> bool {
        self.retryable.contains(&error.kind())
    }

    /// Returns the pause to wait before the next attempt, with jitter applied.
    pub fn pause_before_retry(&self) -> Duration {
        if self.retry_pause.is_zero() {
            return Duration::ZERO;
        }

        let factor = if self.jitter > 0.0 {
            let mut rng = rand::thread_rng();
            1.0 + rng.gen_range(-self.jitter..=self.jitter)
        } else {
            1.0
        };

        Duration::from_secs_f64(self.retry_pause.as_secs_f64() * factor)
    }
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self::on_fail_try_one_next_available()
    }
}

/// Builder for `FailoverPolicy`.
#[derive(Debug, Clone, Default)]
pub struct FailoverPolicyBuilder {
    read_retries: Option<u32>,
    write_retries: Option<u32>,
    retry_pause: Option<Duration>,
    jitter: Option<f64>,
    retryable: Option<Vec<ErrorKind>>,
}

impl From<FailoverPolicy> for FailoverPolicyBuilder {
    fn from(policy: FailoverPolicy) -> Self {
        Self {
            read_retries: Some(policy.read_retries),
            write_retries: Some(policy.write_retries),
            retry_pause: Some(policy.retry_pause),
            jitter: Some(policy.jitter),
            retryable: Some(policy.retryable),
        }
    }
}

impl FailoverPolicyBuilder {
    /// Creates a new failover policy builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry budget for both reads and writes.
    pub fn max_retries(self, retries: u32) -> Self {
        self.read_retries(retries).write_retries(retries)
    }

    /// Sets the retry budget for reads.
    pub fn read_retries(mut self, retries: u32) -> Self {
        self.read_retries = Some(retries);
        self
    }

    /// Sets the retry budget for writes.
    pub fn write_retries(mut self, retries: u32) -> Self {
        self.write_retries = Some(retries);
        self
    }

    /// Sets the pause between attempts.
    pub fn retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = Some(pause);
        self
    }

    /// Sets the jitter factor (0.0 to 1.0) applied to the retry pause.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Sets the error kinds that trigger a retry, replacing the defaults.
    pub fn retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = Some(kinds.into_iter().collect());
        self
    }

    /// Builds the failover policy, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `jitter` is outside 0.0..=1.0
    /// - `NotFound` is listed as retryable
    pub fn build(self) -> Result<FailoverPolicy, ConfigError> {
        let jitter = self.jitter.unwrap_or(DEFAULT_JITTER);
        if !(0.0..=1.0).contains(&jitter) {
            return Err(ConfigError::new("jitter must be between 0.0 and 1.0"));
        }

        let requested = self.retryable.unwrap_or_else(|| DEFAULT_RETRYABLE.to_vec());
        if requested.contains(&ErrorKind::NotFound) {
            return Err(ConfigError::new("not-found errors cannot be retryable"));
        }
        let mut retryable = Vec::with_capacity(requested.len());
        for kind in requested {
            if !retryable.contains(&kind) {
                retryable.push(kind);
            }
        }

        Ok(FailoverPolicy {
            read_retries: self.read_retries.unwrap_or(DEFAULT_RETRIES),
            write_retries: self.write_retries.unwrap_or(DEFAULT_RETRIES),
            retry_pause: self.retry_pause.unwrap_or(DEFAULT_RETRY_PAUSE),
            jitter,
            retryable,
        })
    }
}

/// How the pool picks among healthy connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancing {
    /// Cycle through connections in order.
    #[default]
    RoundRobin,
    /// Pick a connection at random.
    Random,
}

impl std::str::FromStr for LoadBalancing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(LoadBalancing::RoundRobin),
            "random" => Ok(LoadBalancing::Random),
            _ => Err(format!("unknown load balancing strategy: {s}")),
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    addresses: Vec<SocketAddr>,
    clock_resolution: ClockResolution,
    load_balancing: LoadBalancing,
}

impl PoolConfig {
    /// Creates a new pool configuration builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Returns the configured server addresses.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Returns the clock resolution used for generated write stamps.
    pub fn clock_resolution(&self) -> ClockResolution {
        self.clock_resolution
    }

    /// Returns the host selection strategy.
    pub fn load_balancing(&self) -> LoadBalancing {
        self.load_balancing
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            addresses: vec![default_address()],
            clock_resolution: ClockResolution::default(),
            load_balancing: LoadBalancing::default(),
        }
    }
}

fn default_address() -> SocketAddr {
    DEFAULT_ADDRESS
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 9160)))
}

/// Builder for `PoolConfig`.
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    addresses: Vec<SocketAddr>,
    clock_resolution: Option<ClockResolution>,
    load_balancing: Option<LoadBalancing>,
}

impl PoolConfigBuilder {
    /// Creates a new pool configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a server address.
    pub fn add_address(mut self, address: SocketAddr) -> Self {
        self.addresses.push(address);
        self
    }

    /// Sets the server addresses, replacing any previously configured.
    pub fn addresses(mut self, addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    /// Sets the clock resolution for generated write stamps.
    pub fn clock_resolution(mut self, resolution: ClockResolution) -> Self {
        self.clock_resolution = Some(resolution);
        self
    }

    /// Sets the host selection strategy.
    pub fn load_balancing(mut self, strategy: LoadBalancing) -> Self {
        self.load_balancing = Some(strategy);
        self
    }

    /// Builds the pool configuration, returning an error if validation fails.
    pub fn build(self) -> Result<PoolConfig, ConfigError> {
        let mut addresses = if self.addresses.is_empty() {
            vec![default_address()]
        } else {
            self.addresses
        };

        let before = addresses.len();
        let mut seen = std::collections::HashSet::new();
        addresses.retain(|a| seen.insert(*a));
        if addresses.len() != before {
            return Err(ConfigError::new("addresses must not contain duplicates"));
        }

        Ok(PoolConfig {
            addresses,
            clock_resolution: self.clock_resolution.unwrap_or_default(),
            load_balancing: self.load_balancing.unwrap_or_default(),
        })
    }
}

/// Main client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pool: PoolConfig,
    failover: FailoverPolicy,
    consistency_level: ConsistencyLevel,
}

impl ClientConfig {
    /// Creates a new client configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the pool configuration.
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    /// Returns the failover policy.
    pub fn failover(&self) -> &FailoverPolicy {
        &self.failover
    }

    /// Returns the consistency level used by keyspaces opened with this config.
    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency_level
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            failover: FailoverPolicy::default(),
            consistency_level: ConsistencyLevel::default(),
        }
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    pool: PoolConfigBuilder,
    failover: FailoverPolicyBuilder,
    consistency_level: Option<ConsistencyLevel>,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures pool settings using a builder function.
    pub fn pool<F>(mut self, f: F) -> Self
    where
        F: FnOnce(PoolConfigBuilder) -> PoolConfigBuilder,
    {
        self.pool = f(self.pool);
        self
    }

    /// Configures failover settings using a builder function.
    pub fn failover<F>(mut self, f: F) -> Self
    where
        F: FnOnce(FailoverPolicyBuilder) -> FailoverPolicyBuilder,
    {
        self.failover = f(self.failover);
        self
    }

    /// Replaces the failover settings with a preset policy.
    pub fn failover_policy(mut self, policy: FailoverPolicy) -> Self {
        self.failover = policy.into();
        self
    }

    /// Adds a server address.
    pub fn add_address(mut self, address: SocketAddr) -> Self {
        self.pool = self.pool.add_address(address);
        self
    }

    /// Sets the server addresses.
    pub fn addresses(mut self, addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.pool = self.pool.addresses(addresses);
        self
    }

    /// Sets the consistency level.
    pub fn consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = Some(level);
        self
    }

    /// Builds the client configuration, returning an error if validation fails.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        Ok(ClientConfig {
            pool: self.pool.build()?,
            failover: self.failover.build()?,
            consistency_level: self.consistency_level.unwrap_or_default(),
        })
    }
}
