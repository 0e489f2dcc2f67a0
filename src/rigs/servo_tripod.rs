//! Three-servo tripod with an orientation sensor.
//!
//! Each servo moves in fixed steps from a discrete action. The firmware answers the
//! `C2` request with `yaw,pitch,roll` in degrees.

use crate::link::Link;
use crate::session::{parse_readings, protocol, Info, Rig, Space};
use anyhow::Result;
use rand::rngs::StdRng;
use tracing::debug;

/// Number of servos on the tripod.
pub const SERVO_COUNT: usize = 3;

/// Degrees moved per unit of increment. Negative: action 0 raises the leg.
pub const SERVO_STEP: i64 = -3;

/// Lowest safe servo angle (degrees)
pub const MIN_ANGLE: i64 = 45;

/// Highest safe servo angle (degrees)
pub const MAX_ANGLE: i64 = 110;

/// Angles every servo returns to on reset
pub const RESET_ANGLES: [i64; SERVO_COUNT] = [65, 65, 65];

/// Request for one orientation reading
pub const SENSOR_COMMAND: &str = "C2\n";

/// Servo tripod rig.
///
/// Actions are `[u8; 3]`, one entry per servo: `0` moves by `-SERVO_STEP`, `1` holds
/// and `2` moves by `SERVO_STEP`. Larger entries are treated as `2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoTripod {
    angles: [i64; SERVO_COUNT],
}

impl Default for ServoTripod {
    fn default() -> Self {
        Self {
            angles: RESET_ANGLES,
        }
    }
}

impl ServoTripod {
    /// Tripod with every servo at its reset angle
    pub fn new() -> Self {
        Self::default()
    }

    /// Current commanded angles
    pub fn angles(&self) -> [i64; SERVO_COUNT] {
        self.angles
    }

    /// `MultiDiscrete [3, 3, 3]`
    pub fn action_space() -> Space {
        Space::MultiDiscrete {
            nvec: vec![3; SERVO_COUNT],
        }
    }

    /// Yaw, pitch and roll in `[-180, 180]` degrees
    pub fn observation_space() -> Space {
        Space::uniform(-180.0, 180.0, SERVO_COUNT)
    }
}

impl Rig for ServoTripod {
    type Action = [u8; SERVO_COUNT];

    fn get_actuator_values(&self) -> Result<Vec<i64>> {
        Ok(self.angles.to_vec())
    }

    fn set_action_values(&mut self, action: &Self::Action) -> Vec<i64> {
        for (angle, &choice) in self.angles.iter_mut().zip(action) {
            let increment = i64::from(choice.min(2)) - 1;
            *angle = (*angle + increment * SERVO_STEP).clamp(MIN_ANGLE, MAX_ANGLE);
        }
        self.angles.to_vec()
    }

    fn get_sensor_readings(&mut self, link: &mut Link) -> Result<Option<Vec<f64>>> {
        if !link.write_line(SENSOR_COMMAND) {
            debug!("Sensor request not sent");
            return Ok(None);
        }

        match protocol::acknowledged_read_line(link) {
            Some(line) if !line.is_empty() => parse_readings(&line).map(Some),
            _ => Ok(None),
        }
    }

    fn reset_action_values(
        &mut self,
        _action_space: &Space,
        _rng: &mut StdRng,
        _options: Option<&Info>,
    ) -> Vec<i64> {
        self.angles = RESET_ANGLES;
        self.angles.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mock::{MockDevice, MockOpener};
    use crate::link::{LinkTiming, PortSettings};
    use rand::SeedableRng;
    use std::time::Duration;

    fn connected(device: &MockDevice) -> Link {
        let mut link = Link::with_opener(PortSettings::new("mock", 115_200), MockOpener::new(device))
            .with_timing(LinkTiming {
                write_settle: Duration::ZERO,
                poll_interval: Duration::ZERO,
            });
        link.connect(1, Duration::ZERO).unwrap();
        link
    }

    #[test]
    fn actions_step_each_servo() {
        let mut tripod = ServoTripod::new();
        assert_eq!(tripod.set_action_values(&[0, 1, 2]), vec![68, 65, 62]);
        assert_eq!(tripod.set_action_values(&[0, 1, 2]), vec![71, 65, 59]);
        assert_eq!(tripod.get_actuator_values().unwrap(), vec![71, 65, 59]);
    }

    #[test]
    fn angles_are_clamped() {
        let mut tripod = ServoTripod::new();
        for _ in 0..50 {
            tripod.set_action_values(&[0, 2, 1]);
        }
        assert_eq!(tripod.angles(), [MAX_ANGLE, MIN_ANGLE, 65]);
    }

    #[test]
    fn out_of_range_choice_acts_like_two() {
        let mut tripod = ServoTripod::new();
        assert_eq!(tripod.set_action_values(&[9, 9, 9]), vec![62, 62, 62]);
    }

    #[test]
    fn reset_restores_home_angles() {
        let mut tripod = ServoTripod::new();
        tripod.set_action_values(&[0, 0, 0]);
        let mut rng = StdRng::seed_from_u64(0);

        let values = tripod.reset_action_values(&ServoTripod::action_space(), &mut rng, None);
        assert_eq!(values, RESET_ANGLES.to_vec());
        assert_eq!(tripod.angles(), RESET_ANGLES);
    }

    #[test]
    fn spaces_describe_three_servos() {
        assert_eq!(ServoTripod::action_space().shape(), vec![3]);
        assert_eq!(ServoTripod::observation_space().shape(), vec![3]);
        assert!(ServoTripod::observation_space().contains(&[-180.0, 0.0, 180.0]));
    }

    #[test]
    fn reads_orientation_after_ack() {
        let device = MockDevice::new();
        device.reply_to("C2", ["OK", "12.5,-3.0,0.25"]);
        let mut link = connected(&device);

        let readings = ServoTripod::new().get_sensor_readings(&mut link).unwrap();
        assert_eq!(readings, Some(vec![12.5, -3.0, 0.25]));
        assert_eq!(device.written(), vec!["C2\n"]);
    }

    #[test]
    fn silent_sensor_yields_none() {
        let device = MockDevice::new();
        let mut link = connected(&device);
        assert_eq!(ServoTripod::new().get_sensor_readings(&mut link).unwrap(), None);
    }

    #[test]
    fn garbled_sensor_line_is_an_error() {
        let device = MockDevice::new();
        device.reply_to("C2", ["yaw=12"]);
        let mut link = connected(&device);
        assert!(ServoTripod::new().get_sensor_readings(&mut link).is_err());
    }

    #[test]
    fn closed_link_yields_none() {
        let device = MockDevice::new();
        let mut link = Link::with_opener(PortSettings::new("mock", 115_200), MockOpener::new(&device));
        assert_eq!(ServoTripod::new().get_sensor_readings(&mut link).unwrap(), None);
    }
}
