//! Serial link configuration, read from the environment.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;
use std::env;
use std::string::String;

/// Environment variable naming the serial port, e.g. `/dev/ttyACM0`.
pub const PORT_VAR: &str = "SMCC_SERIAL_PORT";
/// Environment variable overriding the baud rate.
pub const BAUD_RATE_VAR: &str = "SMCC_BAUD_RATE";
/// Environment variable overriding the read timeout, in seconds.
pub const TIMEOUT_VAR: &str = "SMCC_TIMEOUT_SECS";
/// Environment variable overriding the post-open settle time, in seconds.
pub const SETTLE_VAR: &str = "SMCC_SETTLE_SECS";

pub const DEFAULT_BAUD_RATE: usize = 9600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// The board resets when the port is opened and needs this long to boot.
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(var) => write!(f, "{var} is not set"),
            Self::Invalid { var, value } => write!(f, "{var} has an invalid value: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: usize,
    /// How long a whole reply may take to arrive.
    pub timeout: Duration,
    /// How long to wait after opening the port before the first command.
    pub settle_time: Duration,
}

impl SerialConfig {
    /// Default settings for `port`.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            settle_time: DEFAULT_SETTLE_TIME,
        }
    }

    /// Reads the configuration from the environment, loading `.env` first if present.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` if `SMCC_SERIAL_PORT` is not set and
    /// `ConfigError::Invalid` if any override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    /// See [`SerialConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let port = lookup(PORT_VAR)
            .filter(|port| !port.trim().is_empty())
            .ok_or(ConfigError::Missing(PORT_VAR))?;
        let mut config = Self::new(port);
        if let Some(baud_rate) = parse_var(&lookup, BAUD_RATE_VAR)? {
            config.baud_rate = baud_rate;
        }
        if let Some(secs) = parse_var::<f64, _>(&lookup, TIMEOUT_VAR)? {
            config.timeout = seconds(TIMEOUT_VAR, secs)?;
        }
        if let Some(secs) = parse_var::<f64, _>(&lookup, SETTLE_VAR)? {
            config.settle_time = seconds(SETTLE_VAR, secs)?;
        }
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&'static str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { var, value })
}

fn seconds(var: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::Invalid {
        var,
        value: std::format!("{secs}"),
    })
}
