//! Rig configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. Environment variables (prefixed with `MORPH_DRIVE_`, `__` separates nested keys)
//!
//! Every key is optional; a missing file section falls back to the defaults below.
//!
//! # Example
//! ```no_run
//! use morph_drive::config::RigConfig;
//!
//! let config = RigConfig::load_from("config/rig.toml")?;
//! config.validate()?;
//! println!("Port: {} @ {} baud", config.port, config.baud_rate);
//! # Ok::<(), morph_drive::error::DriveError>(())
//! ```
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! timeout = 1.0
//! init_position = [65, 65, 65]
//!
//! [connect]
//! retries = 3
//! delay = 2.0
//!
//! [handshake]
//! ready_signal = "ROBOT_READY_SIGNAL"
//! timeout = 10.0
//! ```

use crate::error::{AppResult, DriveError};
use crate::link::{PortSettings, DEFAULT_CONNECT_DELAY, DEFAULT_CONNECT_RETRIES};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ready literal the rig firmware prints once it accepts commands.
pub const DEFAULT_READY_SIGNAL: &str = "ROBOT_READY_SIGNAL";

/// Top-level rig configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Communication speed
    pub baud_rate: u32,
    /// Serial read timeout in seconds
    pub timeout: f64,
    /// Forces DEBUG logging when set
    pub debug: bool,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Optional starting actuator position. Kept dynamic so a scalar or a table is
    /// reported as a construction error instead of a parse error.
    pub init_position: Option<toml::Value>,
    /// Connection retry policy
    pub connect: ConnectSettings,
    /// Ready-signal handshake performed after connecting
    pub handshake: HandshakeSettings,
}

/// Retry policy for opening the serial port
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectSettings {
    /// Number of open attempts before giving up
    pub retries: u32,
    /// Seconds to wait between failed attempts
    pub delay: f64,
}

/// Ready-signal handshake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeSettings {
    /// Literal line the device emits when ready
    pub ready_signal: String,
    /// Seconds to wait for the ready line
    pub timeout: f64,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout: 1.0,
            debug: false,
            log_level: "info".to_string(),
            init_position: None,
            connect: ConnectSettings::default(),
            handshake: HandshakeSettings::default(),
        }
    }
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            retries: DEFAULT_CONNECT_RETRIES,
            delay: DEFAULT_CONNECT_DELAY.as_secs_f64(),
        }
    }
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            ready_signal: DEFAULT_READY_SIGNAL.to_string(),
            timeout: 10.0,
        }
    }
}

impl ConnectSettings {
    /// Backoff between failed attempts.
    pub fn delay(&self) -> AppResult<Duration> {
        seconds("connect.delay", self.delay)
    }
}

impl HandshakeSettings {
    /// Wall-clock bound on the ready wait.
    pub fn timeout(&self) -> AppResult<Duration> {
        seconds("handshake.timeout", self.timeout)
    }
}

impl RigConfig {
    /// Load configuration from a specific file path and `MORPH_DRIVE_` environment variables
    ///
    /// Example: `MORPH_DRIVE_CONNECT__RETRIES=5`
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MORPH_DRIVE_").split("__"))
            .extract()
            .map_err(DriveError::from)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(DriveError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.port.trim().is_empty() {
            return Err(DriveError::Configuration("port must not be empty".into()));
        }

        if self.baud_rate == 0 {
            return Err(DriveError::Configuration(
                "baud_rate must be a positive integer".into(),
            ));
        }

        if self.handshake.ready_signal.trim().is_empty() {
            return Err(DriveError::Configuration(
                "handshake.ready_signal must not be empty".into(),
            ));
        }

        self.read_timeout()?;
        self.connect.delay()?;
        self.handshake.timeout()?;

        Ok(())
    }

    /// Serial read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> AppResult<Duration> {
        seconds("timeout", self.timeout)
    }

    /// Settings used to open the serial port.
    pub fn port_settings(&self) -> AppResult<PortSettings> {
        Ok(PortSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            timeout: self.read_timeout()?,
        })
    }

    /// Resolve the starting actuator position for an action space with `arity` dimensions.
    ///
    /// An absent or empty `init_position` yields zeros. Integers are taken as-is, floats
    /// are truncated, anything else fails.
    pub fn initial_position(&self, arity: usize) -> AppResult<Vec<i64>> {
        let values = match &self.init_position {
            None => return Ok(vec![0; arity]),
            Some(toml::Value::Array(values)) if values.is_empty() => {
                return Ok(vec![0; arity]);
            }
            Some(toml::Value::Array(values)) => values,
            Some(other) => {
                return Err(DriveError::InvalidInitPosition(
                    other.type_str().to_string(),
                ))
            }
        };

        let position = values
            .iter()
            .map(|value| match value {
                toml::Value::Integer(v) => Ok(*v),
                toml::Value::Float(v) if v.is_finite() => Ok(v.trunc() as i64),
                other => Err(DriveError::InvalidInitPosition(format!(
                    "element of type {}",
                    other.type_str()
                ))),
            })
            .collect::<AppResult<Vec<i64>>>()?;

        if position.len() != arity {
            return Err(DriveError::InitPositionArity {
                expected: arity,
                actual: position.len(),
            });
        }

        Ok(position)
    }
}

fn seconds(key: &str, value: f64) -> AppResult<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        DriveError::Configuration(format!(
            "{key} must be a non-negative number of seconds, got {value}"
        ))
    })
}
