//! Serial channel primitives for RS-232/USB-Serial rigs
//!
//! [`LinePort`] is the raw line transport a [`Link`](super::Link) owns, and [`PortOpener`]
//! is how the link obtains one. [`SystemPortOpener`] opens real hardware through the
//! `serialport` crate; the mock module provides a scripted stand-in for tests.

use serialport::{ClearBuffer, SerialPort};
use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;
use tracing::trace;

/// Settings used to open a serial port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSettings {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate (e.g., 9600, 115200)
    pub baud_rate: u32,
    /// Read timeout
    pub timeout: Duration,
}

impl PortSettings {
    /// Create settings with the default 1 s read timeout.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            timeout: Duration::from_secs(1),
        }
    }

    /// Set read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open, line-oriented serial channel.
///
/// Dropping the value releases the underlying OS handle.
pub trait LinePort: Send {
    /// Read bytes up to and including the next `\n`.
    ///
    /// A read timeout is not an error: whatever arrived before the timeout (possibly
    /// nothing) is returned.
    fn read_line_bytes(&mut self) -> io::Result<Vec<u8>>;

    /// Write all bytes and flush them to the device.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Discard any received but unread input.
    fn clear_input(&mut self) -> io::Result<()>;

    /// Whether the channel still reports itself open.
    fn is_open(&self) -> bool;
}

/// Opens [`LinePort`]s for a [`Link`](super::Link).
pub trait PortOpener: Send {
    /// Open the port described by `settings`.
    fn open(&self, settings: &PortSettings) -> serialport::Result<Box<dyn LinePort>>;
}

/// [`LinePort`] backed by an OS serial port.
pub struct SerialLine {
    reader: BufReader<Box<dyn SerialPort>>,
}

impl SerialLine {
    /// Wrap an already opened serial port.
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            reader: BufReader::new(port),
        }
    }
}

impl LinePort for SerialLine {
    fn read_line_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(_) => Ok(line),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                trace!(partial = line.len(), "Serial read timed out");
                Ok(line)
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(bytes)?;
        port.flush()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        // Bytes already pulled into the BufReader are as stale as the OS buffer.
        let buffered = self.reader.buffer().len();
        if buffered > 0 {
            trace!(buffered, "Discarding buffered serial input");
            self.reader.consume(buffered);
        }
        self.reader
            .get_ref()
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)
    }

    fn is_open(&self) -> bool {
        // The handle stays open until this value is dropped.
        true
    }
}

/// Opens real serial ports with the `serialport` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, settings: &PortSettings) -> serialport::Result<Box<dyn LinePort>> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.timeout)
            .open()?;
        Ok(Box::new(SerialLine::new(port)))
    }
}
