//! Client-facing stream handles.
//!
//! A handle owns the immutable config, the device address, and (after
//! `prepare_for_io`) the worker thread servicing the data path. All raw
//! data movement happens through the channel descriptors the prepare call
//! hands back; the handle itself only does lifecycle and config queries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use tracing::debug;

use crate::channels::{InputChannels, OutputChannels};
use crate::clock::FrameClock;
use crate::config::{AudioConfig, SampleFormat};
use crate::device::Device;
use crate::error::EngineError;
use crate::port::PortAddress;
use crate::worker::{self, VOLUME_UNITY, WorkerHandle};

/// Upper bound on bytes per frame accepted by `prepare_for_io`.
pub const MAX_FRAME_SIZE: usize = 256;
/// Upper bound on the period frame count accepted by `prepare_for_io`.
pub const MAX_FRAME_COUNT: usize = 1 << 20;

fn check_io_bounds(frame_size: usize, frame_count: usize) -> Result<(), EngineError> {
    if frame_size == 0 || frame_size > MAX_FRAME_SIZE {
        return Err(EngineError::InvalidArguments(format!(
            "frame size {frame_size} out of bounds (1..={MAX_FRAME_SIZE})"
        )));
    }
    if frame_count == 0 || frame_count > MAX_FRAME_COUNT {
        return Err(EngineError::InvalidArguments(format!(
            "frame count {frame_count} out of bounds (1..={MAX_FRAME_COUNT})"
        )));
    }
    Ok(())
}

pub struct StreamOut {
    io_handle: i32,
    address: String,
    port: PortAddress,
    config: AudioConfig,
    device: Device,
    worker: Option<WorkerHandle>,
    volume: Arc<AtomicU16>,
    clock: Arc<FrameClock>,
    prepared: bool,
    closed: bool,
}

impl StreamOut {
    pub(crate) fn new(
        io_handle: i32,
        address: String,
        port: PortAddress,
        config: AudioConfig,
        device: Device,
    ) -> Self {
        Self {
            io_handle,
            address,
            port,
            config,
            device,
            worker: None,
            volume: Arc::new(AtomicU16::new(VOLUME_UNITY)),
            clock: Arc::new(FrameClock::new()),
            prepared: false,
            closed: false,
        }
    }

    /// Start the worker thread and hand back the channel descriptors the
    /// client drives the data path with. Callable exactly once per handle.
    pub fn prepare_for_io(
        &mut self,
        frame_size: usize,
        frame_count: usize,
    ) -> Result<OutputChannels, EngineError> {
        if self.closed {
            return Err(EngineError::InvalidState("stream is closed"));
        }
        if self.prepared {
            return Err(EngineError::InvalidState("stream already prepared"));
        }
        check_io_bounds(frame_size, frame_count)?;
        let (handle, channels) = worker::spawn_write(
            self.port,
            self.config,
            frame_size,
            frame_count,
            self.volume.clone(),
            self.clock.clone(),
        )?;
        debug!(
            io_handle = self.io_handle,
            address = %self.address,
            "output stream prepared"
        );
        self.worker = Some(handle);
        self.prepared = true;
        Ok(channels)
    }

    /// Ask the worker to release its endpoint. A stream with no worker is
    /// already in standby.
    pub fn standby(&self) -> Result<(), EngineError> {
        if let Some(worker) = &self.worker {
            worker.standby();
        }
        Ok(())
    }

    /// Tear down the worker and release the device reference. Idempotent;
    /// the destructor path closes silently.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        self.device.release_stream();
        self.closed = true;
        debug!(io_handle = self.io_handle, "output stream closed");
    }

    /// Store the averaged per-stream volume as a Q12 scalar for the
    /// worker's transfer step.
    pub fn set_volume(&self, left: f32, right: f32) -> Result<(), EngineError> {
        for value in [left, right] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidArguments(format!(
                    "volume {value} outside [0.0, 1.0]"
                )));
            }
        }
        let scalar = ((left + right) / 2.0 * VOLUME_UNITY as f32).round() as u16;
        self.volume.store(scalar, Ordering::Relaxed);
        Ok(())
    }

    /// Period latency in milliseconds; answered from config alone.
    pub fn latency_ms(&self) -> u32 {
        self.config.period_ms()
    }

    pub fn io_handle(&self) -> i32 {
        self.io_handle
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channel_mask(&self) -> u32 {
        self.config.channel_mask
    }

    pub fn format(&self) -> SampleFormat {
        self.config.format
    }

    pub fn frame_size(&self) -> usize {
        self.config.frame_size()
    }

    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size()
    }
}

impl Drop for StreamOut {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct StreamIn {
    io_handle: i32,
    address: String,
    port: PortAddress,
    config: AudioConfig,
    device: Device,
    worker: Option<WorkerHandle>,
    clock: Arc<FrameClock>,
    prepared: bool,
    closed: bool,
}

impl StreamIn {
    pub(crate) fn new(
        io_handle: i32,
        address: String,
        port: PortAddress,
        config: AudioConfig,
        device: Device,
    ) -> Self {
        Self {
            io_handle,
            address,
            port,
            config,
            device,
            worker: None,
            clock: Arc::new(FrameClock::new()),
            prepared: false,
            closed: false,
        }
    }

    pub fn prepare_for_io(
        &mut self,
        frame_size: usize,
        frame_count: usize,
    ) -> Result<InputChannels, EngineError> {
        if self.closed {
            return Err(EngineError::InvalidState("stream is closed"));
        }
        if self.prepared {
            return Err(EngineError::InvalidState("stream already prepared"));
        }
        check_io_bounds(frame_size, frame_count)?;
        let (handle, channels) = worker::spawn_read(
            self.port,
            self.config,
            frame_size,
            frame_count,
            self.clock.clone(),
        )?;
        debug!(
            io_handle = self.io_handle,
            address = %self.address,
            "input stream prepared"
        );
        self.worker = Some(handle);
        self.prepared = true;
        Ok(channels)
    }

    pub fn standby(&self) -> Result<(), EngineError> {
        if let Some(worker) = &self.worker {
            worker.standby();
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        self.device.release_stream();
        self.closed = true;
        debug!(io_handle = self.io_handle, "input stream closed");
    }

    pub fn io_handle(&self) -> i32 {
        self.io_handle
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channel_mask(&self) -> u32 {
        self.config.channel_mask
    }

    pub fn format(&self) -> SampleFormat {
        self.config.format
    }

    pub fn frame_size(&self) -> usize {
        self.config.frame_size()
    }

    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size()
    }
}

impl Drop for StreamIn {
    fn drop(&mut self) {
        self.close();
    }
}
