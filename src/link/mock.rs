//! Mock serial device for testing
//!
//! Lets the link and session layers run against a scripted device without hardware:
//! - Queued device output and replies triggered by host writes
//! - An idle line repeated forever once the queue is empty (e.g. an endless `OK`)
//! - Controllable failure injection for opens, reads and writes
//! - Call and write logging for test verification
//!
//! # Example
//!
//! ```
//! use morph_drive::link::mock::{MockDevice, MockOpener};
//! use morph_drive::link::{Link, PortSettings};
//! use std::time::Duration;
//!
//! let device = MockDevice::new();
//! device.reply_to("W ", ["OK", "10 20 30"]);
//!
//! let mut link = Link::with_opener(PortSettings::new("mock", 115200), MockOpener::new(&device));
//! link.connect(1, Duration::ZERO).unwrap();
//! assert!(link.write_line("W 10 20 30\n"));
//! assert_eq!(device.written(), vec!["W 10 20 30\n"]);
//! ```

use super::port::{LinePort, PortOpener, PortSettings};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct DeviceState {
    incoming: VecDeque<Vec<u8>>,
    replies: Vec<(String, Vec<String>)>,
    announcements: Vec<String>,
    idle_line: Option<String>,
    written: Vec<String>,
    call_log: Vec<String>,
    reads: usize,
    open: bool,
    fail_reads: bool,
    fail_writes: bool,
    fail_clears: bool,
}

/// Test-side handle on a simulated rig.
///
/// Clones share the same device; hand one to [`MockOpener`] and keep one for assertions.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Create a silent device
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a line the device has already sent (a trailing `\n` is added).
    pub fn push_line(&self, line: &str) {
        self.push_bytes(format!("{line}\n").into_bytes());
    }

    /// Queue raw bytes, e.g. an invalid UTF-8 sequence.
    pub fn push_bytes(&self, bytes: Vec<u8>) {
        self.lock().incoming.push_back(bytes);
    }

    /// Queue `lines` every time the host writes a line starting with `prefix`.
    ///
    /// Replies are queued after the write, so the input flush that precedes each write
    /// does not discard them.
    pub fn reply_to<I, S>(&self, prefix: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        self.lock().replies.push((prefix.to_string(), lines));
    }

    /// Queue `lines` at the next input flush, the way a rig prints its banner and ready
    /// literal once the host has connected and cleared the port.
    pub fn announce_after_flush<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .announcements
            .extend(lines.into_iter().map(Into::into));
    }

    /// Line returned by every read once the queue is drained. `None` means reads time out.
    pub fn set_idle_line(&self, line: Option<&str>) {
        self.lock().idle_line = line.map(str::to_string);
    }

    /// Make every subsequent read fail with an I/O error
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make every subsequent write fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make every subsequent input flush fail with an I/O error
    pub fn fail_clears(&self, fail: bool) {
        self.lock().fail_clears = fail;
    }

    /// Simulate the device being unplugged while the port is held
    pub fn disconnect(&self) {
        self.lock().open = false;
    }

    /// Lines the host wrote, in order
    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    /// Number of read calls the host made
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    /// Number of lines still queued for the host
    pub fn pending(&self) -> usize {
        self.lock().incoming.len()
    }

    /// Whether a port onto this device is currently held open
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Get a copy of the call log for verification
    pub fn call_log(&self) -> Vec<String> {
        self.lock().call_log.clone()
    }

    /// Clear the call log
    pub fn clear_call_log(&self) {
        self.lock().call_log.clear();
    }
}

/// [`LinePort`] onto a [`MockDevice`].
pub struct MockPort {
    device: MockDevice,
}

impl LinePort for MockPort {
    fn read_line_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut state = self.device.lock();
        state.reads += 1;
        state.call_log.push("read".into());
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock read failure"));
        }
        if let Some(bytes) = state.incoming.pop_front() {
            return Ok(bytes);
        }
        Ok(state
            .idle_line
            .as_ref()
            .map(|line| format!("{line}\n").into_bytes())
            .unwrap_or_default())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.device.lock();
        state.call_log.push("write".into());
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        let text = String::from_utf8_lossy(bytes).into_owned();
        let queued: Vec<Vec<u8>> = state
            .replies
            .iter()
            .filter(|(prefix, _)| text.starts_with(prefix.as_str()))
            .flat_map(|(_, lines)| lines.iter().map(|l| format!("{l}\n").into_bytes()))
            .collect();
        state.incoming.extend(queued);
        state.written.push(text);
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = self.device.lock();
        state.call_log.push("clear".into());
        if state.fail_clears {
            return Err(io::Error::new(io::ErrorKind::Other, "mock clear failure"));
        }
        state.incoming.clear();
        let announced: Vec<Vec<u8>> = state
            .announcements
            .drain(..)
            .map(|line| format!("{line}\n").into_bytes())
            .collect();
        state.incoming.extend(announced);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.device.lock().open
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        let mut state = self.device.lock();
        state.open = false;
        state.call_log.push("close".into());
    }
}

/// [`PortOpener`] handing out [`MockPort`]s onto one device.
#[derive(Clone)]
pub struct MockOpener {
    device: MockDevice,
    failures_left: Arc<AtomicU32>,
    always_fail: Arc<AtomicBool>,
    report_closed: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
}

impl MockOpener {
    /// Create an opener that succeeds on the first attempt
    pub fn new(device: &MockDevice) -> Self {
        Self {
            device: device.clone(),
            failures_left: Arc::new(AtomicU32::new(0)),
            always_fail: Arc::new(AtomicBool::new(false)),
            report_closed: Arc::new(AtomicBool::new(false)),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the next `count` open attempts
    pub fn fail_times(self, count: u32) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every open attempt
    pub fn always_fail(self) -> Self {
        self.always_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Open successfully but hand back a port that reports itself closed
    pub fn report_closed(self) -> Self {
        self.report_closed.store(true, Ordering::SeqCst);
        self
    }

    /// Number of open attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PortOpener for MockOpener {
    fn open(&self, settings: &PortSettings) -> serialport::Result<Box<dyn LinePort>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.device.lock().call_log.push("open".into());

        let scheduled_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.always_fail.load(Ordering::SeqCst) || scheduled_failure {
            return Err(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                format!("mock open failure on {}", settings.port),
            ));
        }

        self.device.lock().open = !self.report_closed.load(Ordering::SeqCst);
        Ok(Box::new(MockPort {
            device: self.device.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(device: &MockDevice) -> Box<dyn LinePort> {
        MockOpener::new(device)
            .open(&PortSettings::new("mock", 9600))
            .unwrap()
    }

    #[test]
    fn replies_follow_matching_writes() {
        let device = MockDevice::new();
        device.reply_to("C2", ["OK", "1.0,2.0,3.0"]);
        let mut port = open(&device);

        port.write_all(b"W 1 2 3\n").unwrap();
        assert_eq!(device.pending(), 0);

        port.write_all(b"C2\n").unwrap();
        assert_eq!(port.read_line_bytes().unwrap(), b"OK\n");
        assert_eq!(port.read_line_bytes().unwrap(), b"1.0,2.0,3.0\n");
        assert!(port.read_line_bytes().unwrap().is_empty());
    }

    #[test]
    fn idle_line_repeats_forever() {
        let device = MockDevice::new();
        device.set_idle_line(Some("OK"));
        let mut port = open(&device);

        for _ in 0..25 {
            assert_eq!(port.read_line_bytes().unwrap(), b"OK\n");
        }
        assert_eq!(device.reads(), 25);
    }

    #[test]
    fn clear_discards_queued_input() {
        let device = MockDevice::new();
        device.push_line("stale");
        let mut port = open(&device);

        port.clear_input().unwrap();
        assert_eq!(device.pending(), 0);
    }

    #[test]
    fn announcements_survive_one_flush() {
        let device = MockDevice::new();
        device.announce_after_flush(["READY"]);
        let mut port = open(&device);

        port.clear_input().unwrap();
        assert_eq!(device.pending(), 1);
        port.clear_input().unwrap();
        assert_eq!(device.pending(), 0);
    }

    #[test]
    fn test_failure_is_scheduled() {
        let device = MockDevice::new();
        let opener = MockOpener::new(&device).fail_times(2);
        let settings = PortSettings::new("mock", 9600);

        assert!(opener.open(&settings).is_err());
        assert!(opener.open(&settings).is_err());
        assert!(opener.open(&settings).is_ok());
        assert_eq!(opener.attempts(), 3);
    }

    #[test]
    fn dropping_port_closes_device() {
        let device = MockDevice::new();
        let port = open(&device);
        assert!(device.is_open());

        drop(port);
        assert!(!device.is_open());
        assert_eq!(device.call_log(), vec!["open", "close"]);
    }
}
