//! Device session layer: the control-loop contract on top of a [`Link`].
//!
//! A [`DeviceSession`] owns exactly one link and one [`Rig`]. It turns
//! `apply_action` / `get_observation` / `reset` into line exchanges, drains the
//! device's acknowledgements, and keeps the loop alive when the device misbehaves:
//! malformed sensor data becomes [`Observation::ZERO`], a missing ready signal or
//! acknowledgement is a warning. Only connection exhaustion and bad construction
//! arguments are errors.
//!
//! # Example
//!
//! ```no_run
//! use morph_drive::config::RigConfig;
//! use morph_drive::rigs::ServoTripod;
//! use morph_drive::session::DeviceSession;
//!
//! # fn main() -> morph_drive::error::AppResult<()> {
//! let session = DeviceSession::builder(ServoTripod::default())
//!     .observation_space(ServoTripod::observation_space())
//!     .action_space(ServoTripod::action_space())
//!     .config(RigConfig::default())
//!     .build()?;
//!
//! session.run_scoped(|session| {
//!     for _ in 0..10 {
//!         session.apply_action(&[2, 1, 0]);
//!         println!("{:?}", session.get_observation());
//!     }
//!     Ok(())
//! })
//! # }
//! ```

pub mod observation;
pub mod protocol;
pub mod rig;
pub mod space;
pub mod state;

pub use observation::{parse_readings, Observation};
pub use rig::Rig;
pub use space::Space;
pub use state::SessionState;

use crate::config::RigConfig;
use crate::error::{AppResult, DriveError};
use crate::link::Link;
use protocol::{format_write_command, MAX_ACK_POLLS};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Auxiliary metadata returned alongside observations.
pub type Info = BTreeMap<String, serde_json::Value>;

/// Builder for [`DeviceSession`].
///
/// Both space descriptors are required; [`DeviceSessionBuilder::build`] fails without
/// them.
pub struct DeviceSessionBuilder<R: Rig> {
    name: String,
    rig: R,
    observation_space: Option<Space>,
    action_space: Option<Space>,
    config: RigConfig,
    link: Option<Link>,
}

impl<R: Rig> DeviceSessionBuilder<R> {
    /// Name used in log lines (default: "PhyRobot")
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Observation space descriptor
    pub fn observation_space(mut self, space: Space) -> Self {
        self.observation_space = Some(space);
        self
    }

    /// Action space descriptor
    pub fn action_space(mut self, space: Space) -> Self {
        self.action_space = Some(space);
        self
    }

    /// Port, retry, handshake and initial position settings
    pub fn config(mut self, config: RigConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this link instead of opening the configured serial port
    pub fn link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    /// Validate the arguments and build an unconnected session.
    pub fn build(self) -> AppResult<DeviceSession<R>> {
        let observation_space = self
            .observation_space
            .ok_or(DriveError::MissingObservationSpace)?;
        let action_space = self.action_space.ok_or(DriveError::MissingActionSpace)?;
        let arity = action_space
            .shape()
            .first()
            .copied()
            .ok_or(DriveError::InvalidActionSpace)?;

        let position = self.config.initial_position(arity)?;
        let handshake = Handshake {
            retries: self.config.connect.retries,
            delay: self.config.connect.delay()?,
            ready_signal: self.config.handshake.ready_signal.clone(),
            ready_timeout: self.config.handshake.timeout()?,
        };
        let link = match self.link {
            Some(link) => link,
            None => Link::new(self.config.port_settings()?),
        };

        if self.config.debug {
            debug!(rig = %self.name, ?position, "Debug mode enabled");
        }

        Ok(DeviceSession {
            name: self.name,
            link,
            rig: self.rig,
            observation_space,
            action_space,
            position,
            state: SessionState::Unconnected,
            handshake,
            rng: StdRng::from_entropy(),
            last_observation: Observation::ZERO,
        })
    }
}

#[derive(Debug, Clone)]
struct Handshake {
    retries: u32,
    delay: Duration,
    ready_signal: String,
    ready_timeout: Duration,
}

/// Control-loop adapter around one serial link and one rig.
///
/// The link is released by [`DeviceSession::close`], by [`DeviceSession::run_scoped`]
/// on every exit path, and on drop.
pub struct DeviceSession<R: Rig> {
    name: String,
    link: Link,
    rig: R,
    observation_space: Space,
    action_space: Space,
    position: Vec<i64>,
    state: SessionState,
    handshake: Handshake,
    rng: StdRng,
    last_observation: Observation,
}

impl<R: Rig> DeviceSession<R> {
    /// Start building a session around `rig`.
    pub fn builder(rig: R) -> DeviceSessionBuilder<R> {
        DeviceSessionBuilder {
            name: "PhyRobot".to_string(),
            rig,
            observation_space: None,
            action_space: None,
            config: RigConfig::default(),
            link: None,
        }
    }

    /// Session name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observation space descriptor
    pub fn get_observation_space(&self) -> &Space {
        &self.observation_space
    }

    /// Action space descriptor
    pub fn get_action_space(&self) -> &Space {
        &self.action_space
    }

    /// Last actuator position written by a reset
    pub fn position(&self) -> &[i64] {
        &self.position
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Observation returned by the most recent [`DeviceSession::get_observation`]
    pub fn last_observation(&self) -> Observation {
        self.last_observation
    }

    /// The rig collaborator
    pub fn rig(&self) -> &R {
        &self.rig
    }

    /// The underlying link
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Mutable access to the link, for rig-specific exchanges
    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }

    /// Connect, wait for the ready literal, then reset.
    ///
    /// Fails only if every connection attempt fails. A missing ready literal is logged
    /// and the session continues.
    pub fn enter(&mut self) -> AppResult<(Observation, Info)> {
        if self.state == SessionState::Closed {
            return Err(DriveError::SessionClosed);
        }

        self.state = SessionState::Connecting;
        if let Err(e) = self
            .link
            .connect(self.handshake.retries, self.handshake.delay)
        {
            self.state = SessionState::Failed;
            return Err(e);
        }

        let ready = self
            .link
            .handshake(&self.handshake.ready_signal, self.handshake.ready_timeout);
        self.state = if ready {
            SessionState::Ready
        } else {
            SessionState::ReadyWaitTimedOut
        };

        let reset = self.reset(None, None);
        self.state = SessionState::Active;
        Ok(reset)
    }

    /// Enter the session, run `body`, and close the link whatever happens.
    pub fn run_scoped<T, F>(mut self, body: F) -> AppResult<T>
    where
        F: FnOnce(&mut Self) -> AppResult<T>,
    {
        let result = self.enter().and_then(|_| body(&mut self));
        self.close();
        result
    }

    /// Command the actuators for `action` and wait out the device's acknowledgements.
    ///
    /// Never fails: a failed write is logged and not retried, and a device that keeps
    /// acknowledging is abandoned after [`MAX_ACK_POLLS`] reads with a warning.
    pub fn apply_action(&mut self, action: &R::Action) {
        let values = self.rig.set_action_values(action);
        let command = format_write_command(&values);

        if self.link.write_line(&command) {
            let drained = protocol::drain_acknowledgements(&mut self.link, MAX_ACK_POLLS);
            if drained >= MAX_ACK_POLLS {
                warn!(
                    rig = %self.name,
                    "Exceeded maximum attempts while waiting for response to {}",
                    command.trim_end()
                );
            }
        } else {
            error!(rig = %self.name, "Failed to write action command: {}", command.trim_end());
        }

        self.render();
    }

    /// Read the rig's sensors, substituting [`Observation::ZERO`] for anything unusable.
    pub fn get_observation(&mut self) -> Observation {
        let observation = match self.rig.get_sensor_readings(&mut self.link) {
            Ok(Some(readings)) => Observation::from_readings(&readings).unwrap_or_else(|| {
                warn!(
                    rig = %self.name,
                    len = readings.len(),
                    "Received malformed sensor readings {:?}. Defaulting observation.",
                    readings
                );
                Observation::ZERO
            }),
            Ok(None) => {
                warn!(rig = %self.name, "Received no sensor readings. Defaulting observation.");
                Observation::ZERO
            }
            Err(e) => {
                error!(
                    rig = %self.name,
                    "Error getting or parsing sensor readings: {:#}. Defaulting observation.",
                    e
                );
                Observation::ZERO
            }
        };

        self.last_observation = observation;
        observation
    }

    /// Drive the actuators to a baseline and return a fresh observation.
    ///
    /// `seed` reseeds the sampler used by the default baseline. No acknowledgements are
    /// drained here.
    pub fn reset(&mut self, seed: Option<u64>, options: Option<&Info>) -> (Observation, Info) {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        let values = self
            .rig
            .reset_action_values(&self.action_space, &mut self.rng, options);
        let command = format_write_command(&values);
        if !self.link.write_line(&command) {
            warn!(rig = %self.name, "Failed to write reset command: {}", command.trim_end());
        }

        if values.len() == self.position.len() {
            self.position = values;
        } else {
            warn!(
                rig = %self.name,
                expected = self.position.len(),
                actual = values.len(),
                "Reset values do not match the actuator count; position unchanged"
            );
        }

        (self.get_observation(), Info::new())
    }

    /// Read one line from the device, skipping a leading `OK`.
    pub fn acknowledged_read_line(&mut self) -> Option<String> {
        protocol::acknowledged_read_line(&mut self.link)
    }

    /// Log the rig's current actuator values.
    pub fn render(&self) {
        match self.rig.get_actuator_values() {
            Ok(values) => info!(rig = %self.name, "[{}] Actuator Values: {:?}", self.name, values),
            Err(e) => error!(rig = %self.name, "Error getting actuator values for rendering: {:#}", e),
        }
    }

    /// Release the link. Safe to call repeatedly and after a failed [`DeviceSession::enter`].
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.link.close();
        self.state = SessionState::Closed;
    }
}

impl<R: Rig> Drop for DeviceSession<R> {
    fn drop(&mut self) {
        self.close();
    }
}
