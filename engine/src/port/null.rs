//! Timing-simulated sink for outputs with no physical speaker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{self, FrameClock, Timestamp};
use crate::config::AudioConfig;
use crate::port::SinkPort;

/// Accepts writes without touching the bytes and models a device that
/// drains buffered frames at the configured sample rate. The reported
/// position never runs ahead of what has actually been written, and the
/// backlog keeps draining across queries even when no new writes arrive.
pub struct NullSink {
    clock: Arc<FrameClock>,
    sample_rate: u32,
    frame_size: usize,
    /// Frames written but not yet notionally presented.
    backlog: u64,
    last_drain: Instant,
}

impl NullSink {
    pub fn new(config: &AudioConfig, clock: Arc<FrameClock>) -> Self {
        Self {
            clock,
            sample_rate: config.sample_rate,
            frame_size: config.frame_size(),
            backlog: 0,
            last_drain: Instant::now(),
        }
    }

    fn drain(&mut self) {
        let now = Instant::now();
        let drainable = elapsed_frames(now - self.last_drain, self.sample_rate);
        if drainable == 0 {
            return;
        }
        if drainable <= self.backlog {
            self.backlog -= drainable;
            self.clock.advance(drainable);
            // Only consume the time those frames account for, keeping the
            // sub-frame remainder as credit.
            self.last_drain += frames_to_duration(drainable, self.sample_rate);
        } else {
            let take = self.backlog;
            self.backlog = 0;
            self.clock.advance(take);
            // Idle time beyond the backlog earns no credit.
            self.last_drain = now;
        }
    }
}

impl SinkPort for NullSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, String> {
        self.drain();
        self.backlog += (buf.len() / self.frame_size) as u64;
        Ok(buf.len())
    }

    fn position(&mut self) -> (u64, Timestamp) {
        self.drain();
        (self.clock.frames(), clock::now())
    }
}

fn frames_to_duration(frames: u64, rate: u32) -> Duration {
    Duration::from_nanos(frames * 1_000_000_000 / rate as u64)
}

// The nanosecond count stays in u128; the u64 product would wrap after a
// few days of uptime.
fn elapsed_frames(elapsed: Duration, rate: u32) -> u64 {
    (elapsed.as_nanos() * rate as u128 / 1_000_000_000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioConfig, CHANNEL_MASK_MONO, SampleFormat};
    use std::thread;

    fn sink_8k() -> NullSink {
        let config = AudioConfig {
            sample_rate: 8000,
            channel_mask: CHANNEL_MASK_MONO,
            format: SampleFormat::S16Le,
            frame_count: 400,
        };
        NullSink::new(&config, Arc::new(FrameClock::new()))
    }

    #[test]
    fn drain_never_exceeds_backlog() {
        let mut sink = sink_8k();
        // 80 frames = 10 ms of audio at 8 kHz.
        let buf = vec![0u8; 80 * 2];
        sink.write(&buf).expect("null write");
        thread::sleep(Duration::from_millis(50));
        let (frames, _) = sink.position();
        assert_eq!(frames, 80);
        // A later query with no new writes must not move further.
        let (frames, _) = sink.position();
        assert_eq!(frames, 80);
    }

    #[test]
    fn backlog_keeps_draining_without_new_writes() {
        let mut sink = sink_8k();
        // 800 frames = 100 ms of audio.
        let buf = vec![0u8; 800 * 2];
        sink.write(&buf).expect("null write");
        thread::sleep(Duration::from_millis(20));
        let (partial, _) = sink.position();
        assert!(partial > 0);
        assert!(partial < 800);
        thread::sleep(Duration::from_millis(120));
        let (all, _) = sink.position();
        assert_eq!(all, 800);
    }

    #[test]
    fn elapsed_frames_survives_days_of_uptime() {
        let five_days = Duration::from_secs(5 * 24 * 3600);
        assert_eq!(
            elapsed_frames(five_days, 48000),
            5 * 24 * 3600 * 48000
        );
    }

    #[test]
    fn idle_time_earns_no_credit() {
        let mut sink = sink_8k();
        thread::sleep(Duration::from_millis(50));
        let buf = vec![0u8; 400 * 2];
        sink.write(&buf).expect("null write");
        let (frames, _) = sink.position();
        // The 50 ms of idle time before the write must not count towards
        // draining the fresh backlog.
        assert!(frames < 40);
    }
}
