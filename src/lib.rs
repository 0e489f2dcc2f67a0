//! # morph_drive
//!
//! Host-side driver for a physical actuator/sensor rig on a serial line. The rig is
//! exposed as a control loop (`reset`, `apply_action`, `get_observation`) so that a
//! learning or scripted controller can drive hardware the same way it drives a
//! simulation.
//!
//! ## Crate Structure
//!
//! - **`link`**: One owned serial channel. Connect with retry, line writes with input
//!   flushing, trimmed line reads, the ready-signal handshake and idempotent close.
//!   `link::mock` provides a scripted device for tests.
//! - **`session`**: `DeviceSession`, the control-loop adapter. Write-command framing,
//!   acknowledgement draining, zero-observation fallback and the session lifecycle.
//! - **`rigs`**: Concrete `Rig` implementations, currently the three-servo `ServoTripod`.
//! - **`config`**: `RigConfig`, loaded from TOML plus `MORPH_DRIVE_` environment variables.
//! - **`error`**: The `DriveError` enum for the few conditions that stop the driver.
//! - **`logging`**: `tracing-subscriber` initialisation for binaries.

pub mod config;
pub mod error;
pub mod link;
pub mod logging;
pub mod rigs;
pub mod session;

pub use config::RigConfig;
pub use error::{AppResult, DriveError};
pub use link::{Link, PortSettings};
pub use session::{DeviceSession, Observation, Rig, SessionState, Space};
