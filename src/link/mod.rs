//! Link layer: one owned serial channel with line transport.
//!
//! The link knows nothing about actuators or sensors. It opens the port with retry,
//! moves newline-terminated ASCII lines in both directions and waits for a ready
//! literal. Every channel-level failure (unplugged device, undecodable bytes, a write
//! on a closed port) is logged here and turned into `false`/`None`; only running out
//! of connection attempts is reported as an error.

pub mod mock;
pub mod port;

pub use port::{LinePort, PortOpener, PortSettings, SerialLine, SystemPortOpener};

use crate::error::{AppResult, DriveError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default number of open attempts.
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;

/// Default backoff between open attempts.
pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_secs(2);

/// Fixed sleeps applied by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// Time given to the device to process a line after it is written
    pub write_settle: Duration,
    /// Sleep between unsuccessful polling reads
    pub poll_interval: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            write_settle: Duration::from_millis(100),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// An owned serial channel.
///
/// At most one physical port is held at a time; it is released by [`Link::close`] or
/// when the link is dropped.
pub struct Link {
    settings: PortSettings,
    opener: Box<dyn PortOpener>,
    port: Option<Box<dyn LinePort>>,
    timing: LinkTiming,
}

impl Link {
    /// Create an unconnected link onto a real serial port.
    pub fn new(settings: PortSettings) -> Self {
        Self::with_opener(settings, SystemPortOpener)
    }

    /// Create an unconnected link that opens its port through `opener`.
    pub fn with_opener(settings: PortSettings, opener: impl PortOpener + 'static) -> Self {
        Self {
            settings,
            opener: Box::new(opener),
            port: None,
            timing: LinkTiming::default(),
        }
    }

    /// Override the write-settle and polling sleeps.
    pub fn with_timing(mut self, timing: LinkTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Port name this link opens
    pub fn port_name(&self) -> &str {
        &self.settings.port
    }

    /// Baud rate this link opens the port at
    pub fn baud_rate(&self) -> u32 {
        self.settings.baud_rate
    }

    /// Sleeps applied by this link
    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    /// Open the port, trying up to `retries` times and sleeping `delay` between attempts.
    ///
    /// An attempt succeeds only when the open call succeeds *and* the port reports
    /// itself open. After the last failed attempt no port is held.
    pub fn connect(&mut self, retries: u32, delay: Duration) -> AppResult<()> {
        if self.is_open() {
            debug!(port = %self.settings.port, "Serial port already open");
            return Ok(());
        }

        for attempt in 1..=retries {
            match self.opener.open(&self.settings) {
                Ok(port) if port.is_open() => {
                    self.port = Some(port);
                    info!(
                        port = %self.settings.port,
                        baud_rate = self.settings.baud_rate,
                        "Connected to {} at {} baud.",
                        self.settings.port,
                        self.settings.baud_rate
                    );
                    return Ok(());
                }
                Ok(_) => {
                    warn!(
                        port = %self.settings.port,
                        baud_rate = self.settings.baud_rate,
                        attempt,
                        "Serial port opened but reports closed. Retrying..."
                    );
                }
                Err(e) => {
                    warn!(
                        port = %self.settings.port,
                        baud_rate = self.settings.baud_rate,
                        attempt,
                        "Connection failed. Retrying..."
                    );
                    debug!(error = %e, "Serial open error");
                }
            }

            if attempt < retries {
                thread::sleep(delay);
            }
        }

        Err(DriveError::ConnectionFailed {
            port: self.settings.port.clone(),
            attempts: retries,
        })
    }

    /// Write `text` verbatim after discarding stale input, then give the device time to
    /// process it. Returns `false` if the port is not open or the write fails.
    pub fn write_line(&mut self, text: &str) -> bool {
        if !self.is_open() {
            debug!(port = %self.settings.port, "Write skipped, serial port is not open");
            return false;
        }
        self.flush_input();

        let Some(port) = self.port.as_mut() else {
            return false;
        };
        match port.write_all(text.as_bytes()) {
            Ok(()) => {
                thread::sleep(self.timing.write_settle);
                debug!("<< {}", text.trim_end());
                true
            }
            Err(e) => {
                error!(port = %self.settings.port, error = %e, "Error while writing");
                false
            }
        }
    }

    /// Read one line, decoded and trimmed, with no acknowledgement handling.
    ///
    /// A read timeout yields `Some("")`. `None` means the port is closed, the read
    /// failed, or the bytes were not valid UTF-8.
    pub fn read_line(&mut self) -> Option<String> {
        let port = self.port.as_mut().filter(|port| port.is_open())?;

        match port.read_line_bytes() {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(line) => Some(line.trim().to_string()),
                Err(e) => {
                    error!(port = %self.settings.port, error = %e, "Unicode decode error on read");
                    None
                }
            },
            Err(e) => {
                error!(port = %self.settings.port, error = %e, "Read error");
                None
            }
        }
    }

    /// Discard any buffered unread input. No-op when the port is not open.
    pub fn flush_input(&mut self) {
        let Some(port) = self.port.as_mut().filter(|port| port.is_open()) else {
            return;
        };
        debug!("Flushing input buffer...");
        if let Err(e) = port.clear_input() {
            warn!(port = %self.settings.port, error = %e, "Failed to flush input buffer");
        }
    }

    /// Release the port. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            let was_open = port.is_open();
            drop(port);
            if was_open {
                info!(port = %self.settings.port, "Serial connection closed.");
            }
        }
    }

    /// Poll raw lines until one equals `signal` or `timeout` elapses.
    pub fn wait_for_ready(&mut self, signal: &str, timeout: Duration) -> bool {
        self.flush_input();
        if !self.is_open() {
            return false;
        }

        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.read_line().as_deref() == Some(signal) {
                info!(signal, "Device is READY.");
                self.flush_input();
                return true;
            }
            thread::sleep(self.timing.poll_interval);
        }

        warn!(signal, timeout_ms = timeout.as_millis() as u64, "Timeout waiting for '{}' signal.", signal);
        false
    }

    /// [`Link::wait_for_ready`] for the post-connect handshake; a silent device is
    /// reported as a warning and the caller carries on.
    pub fn handshake(&mut self, signal: &str, timeout: Duration) -> bool {
        let ready = self.wait_for_ready(signal, timeout);
        if !ready {
            warn!(port = %self.settings.port, "Robot did not signal ready after connect.");
        }
        ready
    }

    /// Whether a port is held and reports itself open.
    pub fn is_open(&self) -> bool {
        self.port.as_ref().is_some_and(|port| port.is_open())
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .field("timing", &self.timing)
            .finish()
    }
}
