use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::controller::{Action, Controller, LED_COUNT};
use crate::error::Result;
use crate::output::PresentationSink;
use crate::pixel::Pixel;
use crate::protocol::{DecoderStats, READY_TOKEN};
use crate::transport::{ByteSink, ByteSource, Clock};

/// The receiving end of the host link: one transport in, one sink out.
///
/// All state is owned by the single control loop; the only thing shared is
/// the running flag so a signal handler can stop `run`.
pub struct LightNode<T, P, C, const N: usize = LED_COUNT> {
    transport: T,
    sink: P,
    clock: C,
    controller: Controller<N>,
    running: Arc<AtomicBool>,
    stats_interval: Option<Duration>,
    last_stats: Duration,
    last_reported: DecoderStats,
}

impl<T, P, C, const N: usize> LightNode<T, P, C, N>
where
    T: ByteSource + ByteSink,
    P: PresentationSink,
    C: Clock,
{
    pub fn new(transport: T, sink: P, clock: C) -> Self {
        let now = clock.now();
        LightNode {
            transport,
            sink,
            clock,
            controller: Controller::new(now),
            running: Arc::new(AtomicBool::new(true)),
            stats_interval: None,
            last_stats: now,
            last_reported: DecoderStats::default(),
        }
    }

    /// Log decoder statistics at this interval while running
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = Some(interval).filter(|d| !d.is_zero());
        self
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn controller(&self) -> &Controller<N> {
        &self.controller
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tell the host we are ready for frames
    pub fn announce(&mut self) -> Result<()> {
        self.transport.write_bytes(READY_TOKEN)?;
        log::info!("Ready, waiting for frames ({} pixels)", N);
        Ok(())
    }

    /// Run one loop iteration: decode a byte if one is waiting, otherwise
    /// let the idle policy act. Returns whether a byte was consumed.
    pub fn poll(&mut self) -> Result<bool> {
        let (action, consumed) = match self.transport.try_read_byte()? {
            Some(byte) => (self.controller.on_byte(byte, self.clock.now()), true),
            None => (self.controller.on_idle_poll(self.clock.now()), false),
        };

        match action {
            Action::None => {}
            Action::Render => self.render()?,
            Action::RenderThenPause(pause) => {
                self.render()?;
                self.clock.pause(pause);
            }
        }

        Ok(consumed)
    }

    /// Announce, then poll until the running flag is cleared
    pub fn run(&mut self) -> Result<()> {
        self.announce()?;

        while self.running.load(Ordering::Relaxed) {
            self.poll()?;
            self.report_stats();
        }

        Ok(())
    }

    /// Blank the output before exiting
    pub fn shutdown(&mut self) -> Result<()> {
        log::info!("Turning off LEDs...");
        let dark = [Pixel::OFF; N];
        self.sink.render(&dark, 0)
    }

    fn render(&mut self) -> Result<()> {
        self.sink
            .render(self.controller.pixels(), self.controller.brightness())
    }

    fn report_stats(&mut self) {
        let Some(interval) = self.stats_interval else {
            return;
        };
        let now = self.clock.now();
        if now.saturating_sub(self.last_stats) < interval {
            return;
        }

        let stats = self.controller.stats();
        let secs = now.saturating_sub(self.last_stats).as_secs_f64();
        let frames = stats.frames - self.last_reported.frames;
        log::info!(
            "[Stats] {:.1} fps, {} checksum errors, {} bytes discarded, {} clamped, state {}",
            frames as f64 / secs,
            stats.checksum_errors - self.last_reported.checksum_errors,
            stats.discarded_bytes - self.last_reported.discarded_bytes,
            stats.clamped_frames - self.last_reported.clamped_frames,
            self.controller.state(now)
        );

        self.last_stats = now;
        self.last_reported = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle::{AMBIENT_COLOR, FADE_STEP_DELAY, IDLE_TIMEOUT, MAX_BRIGHTNESS};
    use crate::protocol::adalight::encode_frame;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Script {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
    }

    impl ByteSource for Script {
        fn try_read_byte(&mut self) -> Result<Option<u8>> {
            Ok(self.inbound.pop_front())
        }
    }

    impl ByteSink for Script {
        fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
            self.outbound.extend_from_slice(bytes);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        renders: Vec<(Vec<Pixel>, u8)>,
    }

    impl PresentationSink for Recorder {
        fn render(&mut self, pixels: &[Pixel], brightness: u8) -> Result<()> {
            self.renders.push((pixels.to_vec(), brightness));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct ManualClock {
        now: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            self.now.get()
        }

        fn pause(&mut self, duration: Duration) {
            self.advance(duration);
        }
    }

    fn node(bytes: &[u8]) -> (LightNode<Script, Recorder, ManualClock, 4>, ManualClock) {
        let clock = ManualClock::default();
        let script = Script {
            inbound: bytes.iter().copied().collect(),
            outbound: Vec::new(),
        };
        (LightNode::new(script, Recorder::default(), clock.clone()), clock)
    }

    #[test]
    fn test_announce_writes_ready_token() {
        let (mut node, _) = node(&[]);
        node.announce().unwrap();
        assert_eq!(node.transport().outbound, b"Ada\n");
    }

    #[test]
    fn test_frame_renders_once_complete() {
        let frame = encode_frame(&[255, 0, 0, 0, 0, 255], 3).unwrap();
        let (mut node, _) = node(&frame);

        for _ in 0..frame.len() {
            assert!(node.poll().unwrap());
        }
        assert_eq!(node.sink().renders.len(), 1);

        let (pixels, brightness) = &node.sink().renders[0];
        assert_eq!(*brightness, MAX_BRIGHTNESS);
        assert_eq!(pixels[0], Pixel::new(255, 0, 0, 0));
        assert_eq!(pixels[1], Pixel::new(0, 0, 255, 0));
        assert_eq!(pixels[2], Pixel::OFF);

        // Drained: the next poll is an idle poll and stays quiet
        assert!(!node.poll().unwrap());
        assert_eq!(node.sink().renders.len(), 1);
    }

    #[test]
    fn test_idle_polls_show_ambient() {
        let (mut node, clock) = node(&[]);
        clock.advance(IDLE_TIMEOUT + Duration::from_millis(1));

        assert!(!node.poll().unwrap());
        assert!(!node.poll().unwrap());
        assert_eq!(node.sink().renders.len(), 2);
        assert!(node.sink().renders[1].0.iter().all(|p| *p == AMBIENT_COLOR));
    }

    #[test]
    fn test_fade_pauses_through_clock() {
        let (mut node, clock) = node(&[]);
        clock.advance(Duration::from_secs(601));

        let start = clock.now();
        node.poll().unwrap();
        node.poll().unwrap();
        assert_eq!(clock.now() - start, FADE_STEP_DELAY * 2);
        assert_eq!(node.sink().renders[1].1, MAX_BRIGHTNESS - 2);
    }

    #[test]
    fn test_run_stops_on_flag() {
        let (mut node, _) = node(&[]);
        node.get_running_flag().store(false, Ordering::Relaxed);
        node.run().unwrap();
        assert_eq!(node.transport().outbound, b"Ada\n");
    }

    #[test]
    fn test_shutdown_renders_dark() {
        let (mut node, _) = node(&[]);
        node.shutdown().unwrap();
        let (pixels, brightness) = &node.sink().renders[0];
        assert_eq!(*brightness, 0);
        assert!(pixels.iter().all(|p| *p == Pixel::OFF));
    }
}
