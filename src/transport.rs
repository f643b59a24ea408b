use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::SerialPort;

use crate::config::InputConfig;
use crate::error::{Error, Result};

const READ_CHUNK: usize = 4096;

/// Non-blocking source of inbound bytes
pub trait ByteSource {
    /// Next byte if one is available right now
    fn try_read_byte(&mut self) -> Result<Option<u8>>;
}

/// Destination for outbound bytes
pub trait ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Monotonic time plus the one way the loop is allowed to wait on it
pub trait Clock {
    fn now(&self) -> Duration;
    fn pause(&mut self, duration: Duration);
}

/// Wall-clock implementation, measured from construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Serial link to the host.
///
/// Reads are bounded by a short port timeout and pulled in chunks, then
/// handed out one byte at a time.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
}

impl SerialTransport {
    pub fn open(config: &InputConfig) -> Result<Self> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|source| Error::Serial {
                port: config.port.clone(),
                source,
            })?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            log::warn!("Failed to set DTR on {}: {}", config.port, e);
        }

        // Drop whatever the host sent before we were listening
        port.clear(serialport::ClearBuffer::Input).ok();

        log::info!("Opened {} @ {} baud", config.port, config.baud_rate);

        Ok(SerialTransport {
            port,
            name: config.port.clone(),
            buf: vec![0u8; READ_CHUNK],
            pos: 0,
            len: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteSource for SerialTransport {
    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        if self.pos == self.len {
            match self.port.read(&mut self.buf) {
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                }
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }

        if self.pos == self.len {
            return Ok(None);
        }

        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }
}

impl ByteSink for SerialTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

/// Describe the serial ports visible to this machine
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|source| Error::Serial {
        port: "*".to_string(),
        source,
    })?;

    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            serialport::SerialPortType::UsbPort(usb) => format!(
                "{} (USB {:04x}:{:04x} {})",
                p.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            _ => p.port_name,
        })
        .collect())
}
