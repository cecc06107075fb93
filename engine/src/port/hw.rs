//! Hardware-backed endpoints delegating to the PCM backend.

use std::sync::Arc;

use tracing::warn;

use crate::clock::{self, FrameClock, Timestamp};
use crate::config::AudioConfig;
use crate::error::EngineError;
use crate::port::pcm::{self, PcmDevice};
use crate::port::{SinkPort, SourcePort};

pub struct HwSource {
    dev: Box<dyn PcmDevice>,
    clock: Arc<FrameClock>,
    frame_size: usize,
}

impl HwSource {
    pub fn open(
        card: u32,
        device: u32,
        config: &AudioConfig,
        clock: Arc<FrameClock>,
    ) -> Result<Self, EngineError> {
        let dev = pcm::open(
            card,
            device,
            config.channel_count(),
            config.sample_rate,
            config.frame_count as usize,
            false,
        )
        .map_err(EngineError::Backend)?;
        Ok(Self {
            dev,
            clock,
            frame_size: config.frame_size(),
        })
    }
}

impl SourcePort for HwSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, String> {
        let requested = buf.len() / self.frame_size;
        let got = self.dev.read(buf)?;
        // A zero-length success would stall the frame clock; count the
        // requested frames instead and let the caller move on.
        let advanced = if got == 0 {
            warn!("PCM capture returned no frames, advancing clock by request");
            requested
        } else {
            got
        };
        self.clock.advance(advanced as u64);
        Ok(advanced * self.frame_size)
    }

    fn position(&mut self) -> (u64, Timestamp) {
        (self.clock.frames(), clock::now())
    }
}

pub struct HwSink {
    dev: Box<dyn PcmDevice>,
    clock: Arc<FrameClock>,
    frame_size: usize,
}

impl HwSink {
    pub fn open(
        card: u32,
        device: u32,
        config: &AudioConfig,
        clock: Arc<FrameClock>,
    ) -> Result<Self, EngineError> {
        let dev = pcm::open(
            card,
            device,
            config.channel_count(),
            config.sample_rate,
            config.frame_count as usize,
            true,
        )
        .map_err(EngineError::Backend)?;
        Ok(Self {
            dev,
            clock,
            frame_size: config.frame_size(),
        })
    }
}

impl SinkPort for HwSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, String> {
        let requested = buf.len() / self.frame_size;
        let got = self.dev.write(buf)?;
        let advanced = if got == 0 {
            warn!("PCM playback accepted no frames, advancing clock by request");
            requested
        } else {
            got
        };
        self.clock.advance(advanced as u64);
        Ok(advanced * self.frame_size)
    }

    fn position(&mut self) -> (u64, Timestamp) {
        (self.clock.frames(), clock::now())
    }
}
