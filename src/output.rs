use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serialport::SerialPort;

use crate::config::SerialOutputConfig;
use crate::error::{Error, Result};
use crate::pixel::{pack_rgb_slots, rgb_slot_count, Pixel, PixelFormat, CHANNELS};
use crate::protocol::{adalight, awa};

/// Receives the pixel buffer whenever the control loop wants it shown
pub trait PresentationSink {
    fn render(&mut self, pixels: &[Pixel], brightness: u8) -> Result<()>;
}

impl<T: PresentationSink + ?Sized> PresentationSink for Box<T> {
    fn render(&mut self, pixels: &[Pixel], brightness: u8) -> Result<()> {
        (**self).render(pixels, brightness)
    }
}

/// Framing used toward the downstream controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// RGBW stream packed into RGB triples, for drivers that only know RGB
    Adalight,
    /// Native 4-byte pixels with Fletcher trailer
    Awa,
}

impl Protocol {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "adalight" => Ok(Protocol::Adalight),
            "awa" => Ok(Protocol::Awa),
            other => Err(Error::UnknownProtocol(other.to_string())),
        }
    }

    /// Build a complete wire frame for `pixels` at `brightness`; `None` when
    /// there are no pixels to send
    pub fn encode(self, pixels: &[Pixel], format: PixelFormat, brightness: u8) -> Option<Vec<u8>> {
        match self {
            Protocol::Adalight => {
                let mut slots = vec![[0u8; 3]; rgb_slot_count(pixels.len())];
                pack_rgb_slots(pixels, format, brightness, &mut slots);
                adalight::encode_frame(&slots.concat(), 3)
            }
            Protocol::Awa => {
                let data = format.encode(pixels, brightness);
                awa::encode_frame(&data, CHANNELS)
            }
        }
    }
}

/// Pixels plus the brightness to show them at
type Frame = (Vec<Pixel>, u8);

/// Single-slot handoff to the worker; a newer render replaces an unsent one
#[derive(Default)]
struct Mailbox {
    slot: Mutex<Option<Frame>>,
    ready: Condvar,
}

impl Mailbox {
    /// Store `frame` for the worker. Returns true if it replaced an unsent frame.
    fn post(&self, frame: Frame) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let replaced = slot.replace(frame).is_some();
        self.ready.notify_one();
        replaced
    }

    /// Take the latest frame, waiting up to `timeout` for one to arrive
    fn take_timeout(&self, timeout: Duration) -> Option<Frame> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |slot| slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        slot.take()
    }
}

/// Downstream LED controller driven from a dedicated worker thread
pub struct SerialOutput {
    config: SerialOutputConfig,
    mailbox: Arc<Mailbox>,
    frames_sent: Arc<AtomicU64>,
    frames_skipped: u64,
    running: Arc<AtomicBool>,
    worker_handle: Option<thread::JoinHandle<()>>,
}

impl SerialOutput {
    pub fn new(config: SerialOutputConfig) -> Result<Self> {
        let protocol = Protocol::parse(&config.protocol)?;
        let port = open_port(&config)?;

        let mailbox = Arc::new(Mailbox::default());
        let frames_sent = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            port,
            mailbox: Arc::clone(&mailbox),
            name: config.port.clone(),
            protocol,
            format: config.pixel_format,
            frames_sent: Arc::clone(&frames_sent),
            running: Arc::clone(&running),
        };
        let worker_handle = thread::spawn(move || worker.run());

        log::info!(
            "Output {} ({:?} @ {} baud, {:?})",
            config.port,
            protocol,
            config.baud_rate,
            config.pixel_format
        );

        Ok(SerialOutput {
            config,
            mailbox,
            frames_sent,
            frames_skipped: 0,
            running,
            worker_handle: Some(worker_handle),
        })
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Stop the worker; it blanks the strip on its way out
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
            log::info!(
                "Output {} stopped: {} frames sent, {} superseded",
                self.config.port,
                self.frames_sent(),
                self.frames_skipped
            );
        }
    }
}

impl PresentationSink for SerialOutput {
    fn render(&mut self, pixels: &[Pixel], brightness: u8) -> Result<()> {
        let worker_alive = self
            .worker_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if !worker_alive {
            return Err(Error::Disconnected(self.config.port.clone()));
        }

        // Latest render wins: the worker always sends the newest state
        if self.mailbox.post((pixels.to_vec(), brightness)) {
            self.frames_skipped += 1;
        }
        Ok(())
    }
}

impl Drop for SerialOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_port(config: &SerialOutputConfig) -> Result<Box<dyn SerialPort>> {
    let mut port = serialport::new(&config.port, config.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(Duration::from_millis(1000))
        .open()
        .map_err(|source| Error::Serial {
            port: config.port.clone(),
            source,
        })?;

    if let Err(e) = port.write_data_terminal_ready(true) {
        log::warn!("Failed to set DTR on {}: {}", config.port, e);
    }

    // Allow device to initialize
    thread::sleep(Duration::from_millis(100));

    Ok(port)
}

struct Worker {
    port: Box<dyn SerialPort>,
    mailbox: Arc<Mailbox>,
    name: String,
    protocol: Protocol,
    format: PixelFormat,
    frames_sent: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) {
        let mut led_count = 0;

        while self.running.load(Ordering::Relaxed) {
            let Some((pixels, brightness)) = self.mailbox.take_timeout(Duration::from_millis(100))
            else {
                continue;
            };

            led_count = pixels.len();
            let Some(frame) = self.protocol.encode(&pixels, self.format, brightness) else {
                continue;
            };
            log::trace!("[{}] Sending {} bytes", self.name, frame.len());

            if let Err(e) = self.send(&frame) {
                log::error!("Serial error on {}: {}; output disconnected", self.name, e);
                return;
            }
            self.frames_sent.fetch_add(1, Ordering::Relaxed);
        }

        // Best effort: leave the strip dark. Nothing was ever shown if no
        // frame arrived, and an empty frame has no valid header.
        let blank = vec![Pixel::OFF; led_count];
        if let Some(frame) = self.protocol.encode(&blank, self.format, u8::MAX) {
            let _ = self.send(&frame);
        }
    }

    fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }
}

/// Sink that only logs what would be shown
#[derive(Debug, Default)]
pub struct LogOutput {
    renders: u64,
}

impl LogOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

impl PresentationSink for LogOutput {
    fn render(&mut self, pixels: &[Pixel], brightness: u8) -> Result<()> {
        self.renders += 1;
        if log::log_enabled!(log::Level::Debug) {
            let hex: String = pixels
                .iter()
                .take(8)
                .map(|p| format!("{:02x}{:02x}{:02x}{:02x}", p.r, p.g, p.b, p.w))
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!(
                "Render #{}: {} pixels @ brightness {}: {}",
                self.renders,
                pixels.len(),
                brightness,
                hex
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_names() {
        assert_eq!(Protocol::parse("adalight").unwrap(), Protocol::Adalight);
        assert_eq!(Protocol::parse("awa").unwrap(), Protocol::Awa);
        assert!(matches!(
            Protocol::parse("tpm2"),
            Err(Error::UnknownProtocol(name)) if name == "tpm2"
        ));
    }

    #[test]
    fn test_adalight_downstream_packs_rgb_slots() {
        let pixels = [Pixel::new(1, 2, 3, 4)];
        let frame = Protocol::Adalight.encode(&pixels, PixelFormat::Rgbw, 255).unwrap();

        // One RGBW pixel needs two RGB slots
        assert_eq!(&frame[..6], &adalight::header(2).unwrap());
        assert_eq!(&frame[6..], &[1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_awa_downstream_keeps_four_channels() {
        let pixels = [Pixel::new(1, 2, 3, 4), Pixel::new(5, 6, 7, 8)];
        let frame = Protocol::Awa.encode(&pixels, PixelFormat::Grbw, 255).unwrap();

        assert_eq!(&frame[3..6], &[0, 1, 1 ^ 0x55]);
        assert_eq!(&frame[6..14], &[2, 1, 3, 4, 6, 5, 7, 8]);
        assert_eq!(frame.len(), 6 + 8 + 3);
    }

    #[test]
    fn test_empty_render_has_no_frame() {
        assert_eq!(Protocol::Adalight.encode(&[], PixelFormat::Grbw, 255), None);
        assert_eq!(Protocol::Awa.encode(&[], PixelFormat::Grbw, 255), None);
    }

    #[test]
    fn test_mailbox_keeps_latest_render() {
        let mailbox = Mailbox::default();
        assert!(!mailbox.post((vec![Pixel::OFF], 2)));
        assert!(mailbox.post((vec![Pixel::OFF], 1)));
        assert!(mailbox.post((vec![Pixel::OFF], 0)));

        let (_, brightness) = mailbox.take_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(brightness, 0);
        assert_eq!(mailbox.take_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_mailbox_wakes_waiting_worker() {
        let mailbox = Arc::new(Mailbox::default());
        let waiter = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.take_timeout(Duration::from_secs(5)))
        };

        mailbox.post((vec![Pixel::new(1, 2, 3, 4)], 7));
        let (pixels, brightness) = waiter.join().unwrap().unwrap();
        assert_eq!(pixels, vec![Pixel::new(1, 2, 3, 4)]);
        assert_eq!(brightness, 7);
    }

    #[test]
    fn test_log_output_counts() {
        let mut sink = LogOutput::new();
        sink.render(&[Pixel::OFF; 3], 255).unwrap();
        sink.render(&[Pixel::OFF; 3], 10).unwrap();
        assert_eq!(sink.renders(), 2);
    }
}
