//! The rig capability a [`DeviceSession`](super::DeviceSession) drives.

use super::space::Space;
use super::Info;
use crate::link::Link;
use anyhow::Result;
use rand::rngs::StdRng;

/// Rig-specific actuator and sensor access.
///
/// A concrete rig decides how an action becomes actuator values and how sensor data is
/// requested and parsed. The session owns the protocol around it: write markers,
/// acknowledgement draining, and substituting a zero observation when the rig fails.
///
/// # Contract
/// - `set_action_values` returns the values to send for `action`, in actuator order
/// - `get_sensor_readings` may use the link freely; `Ok(None)` means no data arrived
/// - errors are logged by the session and never stop the control loop
pub trait Rig {
    /// Action type accepted by [`DeviceSession::apply_action`](super::DeviceSession::apply_action)
    type Action;

    /// Current actuator values, for display.
    fn get_actuator_values(&self) -> Result<Vec<i64>>;

    /// Actuator values to command for `action`.
    fn set_action_values(&mut self, action: &Self::Action) -> Vec<i64>;

    /// Request and parse one set of sensor readings.
    fn get_sensor_readings(&mut self, link: &mut Link) -> Result<Option<Vec<f64>>>;

    /// Baseline actuator values written on reset. Defaults to a sample of the action space.
    fn reset_action_values(
        &mut self,
        action_space: &Space,
        rng: &mut StdRng,
        _options: Option<&Info>,
    ) -> Vec<i64> {
        action_space.sample(rng)
    }
}
