//! Synthetic tone sources for inputs with no physical microphone.
//!
//! Each source serves a precomputed 50 ms mono sample table through a
//! circular cursor, expanding to the configured channel count. Reads are
//! paced against the wall clock so a fast caller never runs more than half
//! a request ahead of real time.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use byteorder::{ByteOrder, LittleEndian};

use crate::clock::{self, FrameClock, Timestamp};
use crate::config::AudioConfig;
use crate::port::SourcePort;

/// Table length as a fraction of a second: 50 ms.
const TABLE_DIVISOR: u32 = 20;

/// Busy-signal cadence in 50 ms segments: 500 ms of tone, 500 ms of
/// silence.
const BUSY_ON_SEGMENTS: u64 = 10;
const BUSY_CYCLE_SEGMENTS: u64 = 20;

const BUSY_TONE_LOW_HZ: f64 = 480.0;
const BUSY_TONE_HIGH_HZ: f64 = 620.0;
const SINE_TONE_HZ: f64 = 1000.0;

/// 50 ms of the dual-frequency busy signal at `rate`.
pub fn busy_tone_table(rate: u32) -> Vec<i16> {
    let frames = (rate / TABLE_DIVISOR) as usize;
    (0..frames)
        .map(|i| {
            let t = i as f64 / rate as f64;
            let s = ((TAU * BUSY_TONE_LOW_HZ * t).sin() + (TAU * BUSY_TONE_HIGH_HZ * t).sin())
                * 0.25;
            (s * 32767.0).round() as i16
        })
        .collect()
}

/// 50 ms of a 1 kHz sine at `rate`. 1 kHz completes exactly 50 cycles in
/// 50 ms, so the table is continuous across the wraparound boundary.
pub fn sine_table(rate: u32) -> Vec<i16> {
    let frames = (rate / TABLE_DIVISOR) as usize;
    (0..frames)
        .map(|i| {
            let t = i as f64 / rate as f64;
            ((TAU * SINE_TONE_HZ * t).sin() * 0.5 * 32767.0).round() as i16
        })
        .collect()
}

pub struct ToneSource {
    clock: Arc<FrameClock>,
    table: Vec<i16>,
    /// Segments of tone per cadence cycle; silence fills the rest.
    on_segments: u64,
    cycle_segments: u64,
    channels: usize,
    sample_rate: u32,
    /// Absolute mono frame index into the cadence pattern.
    cursor: u64,
    started: Instant,
    delivered: u64,
}

impl ToneSource {
    /// Busy-signal generator for the telephony downlink.
    pub fn busy(config: &AudioConfig, clock: Arc<FrameClock>) -> Self {
        Self::with_table(
            busy_tone_table(config.sample_rate),
            BUSY_ON_SEGMENTS,
            BUSY_CYCLE_SEGMENTS,
            config,
            clock,
        )
    }

    /// Continuous sine generator for the tuner stand-in.
    pub fn sine(config: &AudioConfig, clock: Arc<FrameClock>) -> Self {
        Self::with_table(sine_table(config.sample_rate), 1, 1, config, clock)
    }

    fn with_table(
        table: Vec<i16>,
        on_segments: u64,
        cycle_segments: u64,
        config: &AudioConfig,
        clock: Arc<FrameClock>,
    ) -> Self {
        Self {
            clock,
            table,
            on_segments,
            cycle_segments,
            channels: config.channel_count(),
            sample_rate: config.sample_rate,
            cursor: 0,
            started: Instant::now(),
            delivered: 0,
        }
    }

    fn sample_at(&self, frame: u64) -> i16 {
        let table_len = self.table.len() as u64;
        let segment = (frame / table_len) % self.cycle_segments;
        if segment < self.on_segments {
            self.table[(frame % table_len) as usize]
        } else {
            0
        }
    }

    /// Sleep just long enough that after delivering `frames` more we stay
    /// within half a request of the wall clock. Never oversleeps past the
    /// point where the requested frames become available.
    fn pace(&self, frames: u64) {
        let produced = elapsed_frames(self.started.elapsed(), self.sample_rate);
        let target = self.delivered + frames;
        let allowed = produced + frames / 2;
        if target > allowed {
            let wait_frames = target - allowed;
            thread::sleep(frames_to_duration(wait_frames, self.sample_rate));
        }
    }
}

impl SourcePort for ToneSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, String> {
        let frame_size = 2 * self.channels;
        let frames = (buf.len() / frame_size) as u64;
        if frames == 0 {
            return Ok(0);
        }
        self.pace(frames);
        let mut off = 0;
        for i in 0..frames {
            let sample = self.sample_at(self.cursor + i);
            for _ in 0..self.channels {
                LittleEndian::write_i16(&mut buf[off..off + 2], sample);
                off += 2;
            }
        }
        self.cursor += frames;
        self.delivered += frames;
        self.clock.advance(frames);
        Ok(off)
    }

    fn position(&mut self) -> (u64, Timestamp) {
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

    fn mono_8k() -> AudioConfig {
        AudioConfig {
            sample_rate: 8000,
            channel_mask: CHANNEL_MASK_MONO,
            format: SampleFormat::S16Le,
            frame_count: 400,
        }
    }

    #[test]
    fn table_is_fifty_milliseconds() {
        assert_eq!(busy_tone_table(8000).len(), 400);
        assert_eq!(busy_tone_table(48000).len(), 2400);
        assert_eq!(sine_table(48000).len(), 2400);
    }

    #[test]
    fn first_read_reproduces_the_table_bitwise() {
        let config = mono_8k();
        let mut source = ToneSource::busy(&config, Arc::new(FrameClock::new()));
        let table = busy_tone_table(8000);
        let mut buf = vec![0u8; table.len() * 2];
        let n = source.read(&mut buf).expect("tone read");
        assert_eq!(n, buf.len());
        for (chunk, expected) in buf.chunks_exact(2).zip(&table) {
            assert_eq!(i16::from_le_bytes([chunk[0], chunk[1]]), *expected);
        }
    }

    #[test]
    fn cadence_goes_silent_after_ten_segments() {
        let config = mono_8k();
        let mut source = ToneSource::busy(&config, Arc::new(FrameClock::new()));
        // Skip the 500 ms on-phase.
        source.cursor = 400 * BUSY_ON_SEGMENTS;
        source.started = Instant::now() - Duration::from_secs(10);
        let mut buf = vec![0xffu8; 400 * 2];
        source.read(&mut buf).expect("tone read");
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn sine_is_continuous_across_wraparound() {
        let config = AudioConfig {
            sample_rate: 48000,
            ..mono_8k()
        };
        let mut source = ToneSource::sine(&config, Arc::new(FrameClock::new()));
        source.started = Instant::now() - Duration::from_secs(10);
        let table = sine_table(48000);
        let mut buf = vec![0u8; table.len() * 2];
        source.read(&mut buf).expect("first pass");
        source.read(&mut buf).expect("second pass");
        // Second full pass over the table must replay it exactly.
        for (chunk, expected) in buf.chunks_exact(2).zip(&table) {
            assert_eq!(i16::from_le_bytes([chunk[0], chunk[1]]), *expected);
        }
    }

    #[test]
    fn stereo_expands_mono_samples() {
        let config = AudioConfig {
            channel_mask: 0x3,
            ..mono_8k()
        };
        let mut source = ToneSource::busy(&config, Arc::new(FrameClock::new()));
        let mut buf = vec![0u8; 40];
        source.read(&mut buf).expect("tone read");
        for frame in buf.chunks_exact(4) {
            assert_eq!(frame[0..2], frame[2..4]);
        }
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
    fn pacing_bounds_over_delivery() {
        let config = mono_8k();
        let mut source = ToneSource::busy(&config, Arc::new(FrameClock::new()));
        let started = Instant::now();
        // 400 frames = 50 ms of audio requested immediately; pacing must
        // hold the call back to roughly half that.
        let mut buf = vec![0u8; 400 * 2];
        source.read(&mut buf).expect("tone read");
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
