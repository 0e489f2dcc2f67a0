//! Line-protocol conventions of the rig firmware.
//!
//! - Host → device: `W <v1> <v2> ... <vn>\n` sets actuator targets.
//! - Device → host: `OK` acknowledges a command and may precede a data line, or repeat
//!   while a motion is executing.

use crate::link::Link;
use std::fmt::Display;
use std::fmt::Write as _;
use std::thread;
use tracing::debug;

/// Acknowledgement token sent by the device.
pub const ACK: &str = "OK";

/// Prefix of an actuator write command.
pub const WRITE_MARKER: &str = "W";

/// Upper bound on acknowledgement reads drained after an actuator write.
pub const MAX_ACK_POLLS: u32 = 10;

/// Format actuator values as a write command line, e.g. `W 10 20 30\n`.
pub fn format_write_command<T: Display>(values: &[T]) -> String {
    let mut command = String::from(WRITE_MARKER);
    for value in values {
        // Writing into a String cannot fail.
        let _ = write!(command, " {value}");
    }
    command.push('\n');
    command
}

/// Read one line, treating a leading `OK` as a transparent acknowledgement.
///
/// If the first line is `OK` the following line is returned instead, so a device may
/// acknowledge immediately and send its data afterwards.
pub fn acknowledged_read_line(link: &mut Link) -> Option<String> {
    let mut reading = link.read_line();
    if reading.as_deref() == Some(ACK) {
        reading = link.read_line();
    }
    debug!(reading = ?reading, "Received");
    reading
}

/// Consume consecutive `OK` lines, at most `max_polls` of them, sleeping one poll
/// interval after each. Returns how many were consumed.
///
/// The first non-`OK` read ends the drain and is discarded.
pub fn drain_acknowledgements(link: &mut Link, max_polls: u32) -> u32 {
    let poll_interval = link.timing().poll_interval;
    let mut drained = 0;
    while drained < max_polls && link.read_line().as_deref() == Some(ACK) {
        thread::sleep(poll_interval);
        drained += 1;
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mock::{MockDevice, MockOpener};
    use crate::link::{LinkTiming, PortSettings};
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
    fn formats_write_commands() {
        assert_eq!(format_write_command(&[10, 20, 30]), "W 10 20 30\n");
        assert_eq!(format_write_command(&[-3_i64]), "W -3\n");
        assert_eq!(format_write_command::<i64>(&[]), "W\n");
    }

    #[test]
    fn ack_is_skipped() {
        let device = MockDevice::new();
        let mut link = connected(&device);
        device.push_line("OK");
        device.push_line("42.0 1.0 0.0");

        assert_eq!(acknowledged_read_line(&mut link).as_deref(), Some("42.0 1.0 0.0"));
    }

    #[test]
    fn data_without_ack_is_returned() {
        let device = MockDevice::new();
        let mut link = connected(&device);
        device.push_line("42.0 1.0 0.0");
        device.push_line("next");

        assert_eq!(acknowledged_read_line(&mut link).as_deref(), Some("42.0 1.0 0.0"));
        assert_eq!(device.pending(), 1);
    }

    #[test]
    fn only_one_ack_is_skipped() {
        let device = MockDevice::new();
        let mut link = connected(&device);
        device.push_line("OK");
        device.push_line("OK");

        assert_eq!(acknowledged_read_line(&mut link).as_deref(), Some("OK"));
    }

    #[test]
    fn drain_stops_at_first_non_ack() {
        let device = MockDevice::new();
        let mut link = connected(&device);
        for line in ["OK", "OK", "DONE", "OK"] {
            device.push_line(line);
        }

        assert_eq!(drain_acknowledgements(&mut link, MAX_ACK_POLLS), 2);
        assert_eq!(device.reads(), 3);
        assert_eq!(device.pending(), 1);
    }

    #[test]
    fn drain_is_capped() {
        let device = MockDevice::new();
        device.set_idle_line(Some(ACK));
        let mut link = connected(&device);

        assert_eq!(drain_acknowledgements(&mut link, MAX_ACK_POLLS), MAX_ACK_POLLS);
        assert_eq!(device.reads(), MAX_ACK_POLLS as usize);
    }
}
