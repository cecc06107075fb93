//! Per-stream I/O worker threads.
//!
//! Each open stream owns exactly one worker thread which in turn owns the
//! command/data/status rings and (lazily) the port endpoint. The client
//! never blocks on the worker beyond enqueue/dequeue on the rings plus the
//! reply wait; the worker suspends only in its single `wait_any` call.

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, error};

use crate::channels::{InputChannels, OutputChannels};
use crate::clock::{self, FrameClock};
use crate::config::AudioConfig;
use crate::error::EngineError;
use crate::message::{Command, Status};
use crate::port::{self, PortAddress, SinkPort, SourcePort};
use crate::signal::{self, EventFlag};

/// Fixed-point denominator for the output volume scalar (Q12). Unity gain
/// is a bit-exact no-op under the shift.
pub const VOLUME_UNITY: u16 = 1 << 12;

/// Commands a client may have in flight; replies mirror this.
const COMMAND_SLOTS: usize = 16;

/// Scale interleaved 16-bit samples in place by a Q12 scalar.
pub(crate) fn scale_samples(buf: &mut [u8], scalar: u16) {
    if scalar == VOLUME_UNITY {
        return;
    }
    for chunk in buf.chunks_exact_mut(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        let scaled = ((sample as i32 * scalar as i32) >> 12) as i16;
        chunk.copy_from_slice(&scaled.to_le_bytes());
    }
}

/// Owner-side handle to a running worker thread.
pub(crate) struct WorkerHandle {
    wake: Arc<EventFlag>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn thread_id(&self) -> ThreadId {
        self.join.thread().id()
    }

    pub fn standby(&self) {
        self.wake.raise(signal::STANDBY);
    }

    /// Signal exit and join. A worker observes exit within one wake cycle.
    pub fn shutdown(self) {
        self.wake.raise(signal::EXIT);
        if self.join.join().is_err() {
            error!("stream worker thread panicked during shutdown");
        }
    }
}

fn channel_quantum(frame_size: usize, frame_count: usize) -> Result<usize, EngineError> {
    frame_size
        .checked_mul(frame_count)
        .filter(|bytes| *bytes > 0)
        .ok_or(EngineError::InvalidState("invalid channel sizing"))
}

pub(crate) fn spawn_write(
    address: PortAddress,
    config: AudioConfig,
    frame_size: usize,
    frame_count: usize,
    volume: Arc<AtomicU16>,
    clock: Arc<FrameClock>,
) -> Result<(WorkerHandle, OutputChannels), EngineError> {
    let quantum = channel_quantum(frame_size, frame_count)?;
    let (command_tx, command_rx) = RingBuffer::<Command>::new(COMMAND_SLOTS);
    let (data_tx, data_rx) = RingBuffer::<u8>::new(quantum);
    let (status_tx, status_rx) = RingBuffer::<Status>::new(COMMAND_SLOTS);
    let wake = Arc::new(EventFlag::new());
    let reply = Arc::new(EventFlag::new());

    let worker = WriteWorker {
        address,
        config,
        commands: command_rx,
        data: data_rx,
        status: status_tx,
        wake: wake.clone(),
        reply: reply.clone(),
        volume,
        clock,
        sink: None,
        scratch: Vec::new(),
        quantum,
    };
    let join = thread::Builder::new()
        .name("stream-out".to_string())
        .spawn(move || worker.run())
        .map_err(|e| EngineError::Backend(format!("failed to start write worker: {e}")))?;
    let handle = WorkerHandle { wake: wake.clone(), join };
    let channels = OutputChannels::new(
        command_tx,
        data_tx,
        status_rx,
        wake,
        reply,
        handle.thread_id(),
    );
    Ok((handle, channels))
}

pub(crate) fn spawn_read(
    address: PortAddress,
    config: AudioConfig,
    frame_size: usize,
    frame_count: usize,
    clock: Arc<FrameClock>,
) -> Result<(WorkerHandle, InputChannels), EngineError> {
    let quantum = channel_quantum(frame_size, frame_count)?;
    let (command_tx, command_rx) = RingBuffer::<Command>::new(COMMAND_SLOTS);
    let (data_tx, data_rx) = RingBuffer::<u8>::new(quantum);
    let (status_tx, status_rx) = RingBuffer::<Status>::new(COMMAND_SLOTS);
    let wake = Arc::new(EventFlag::new());
    let reply = Arc::new(EventFlag::new());

    let worker = ReadWorker {
        address,
        config,
        commands: command_rx,
        data: data_tx,
        status: status_tx,
        wake: wake.clone(),
        reply: reply.clone(),
        clock,
        source: None,
        scratch: Vec::new(),
        quantum,
    };
    let join = thread::Builder::new()
        .name("stream-in".to_string())
        .spawn(move || worker.run())
        .map_err(|e| EngineError::Backend(format!("failed to start read worker: {e}")))?;
    let handle = WorkerHandle { wake: wake.clone(), join };
    let channels = InputChannels::new(
        command_tx,
        data_rx,
        status_rx,
        wake,
        reply,
        handle.thread_id(),
    );
    Ok((handle, channels))
}

struct WriteWorker {
    address: PortAddress,
    config: AudioConfig,
    commands: Consumer<Command>,
    data: Consumer<u8>,
    status: Producer<Status>,
    wake: Arc<EventFlag>,
    reply: Arc<EventFlag>,
    volume: Arc<AtomicU16>,
    clock: Arc<FrameClock>,
    sink: Option<Box<dyn SinkPort>>,
    scratch: Vec<u8>,
    quantum: usize,
}

impl WriteWorker {
    fn run(mut self) {
        loop {
            let bits = self
                .wake
                .wait_any(signal::DATA | signal::STANDBY | signal::EXIT, signal::EXIT);
            if bits & signal::EXIT != 0 {
                debug!("write worker exiting");
                return;
            }
            if bits & signal::STANDBY != 0 {
                self.enter_standby();
            }
            if bits & signal::DATA != 0 {
                self.service();
            }
        }
    }

    fn enter_standby(&mut self) {
        if self.sink.take().is_some() {
            debug!("write worker entering standby");
        }
        self.scratch = Vec::new();
    }

    fn ensure_endpoint(&mut self) {
        if self.sink.is_some() {
            return;
        }
        self.scratch = vec![0; self.quantum];
        match port::open_sink(self.address, &self.config, self.clock.clone()) {
            Ok(sink) => self.sink = Some(sink),
            Err(e) => {
                // Admission accepted an address the port layer cannot
                // serve; that contract is broken beyond repair here.
                error!("sink endpoint construction failed after admission: {e}");
                process::abort();
            }
        }
    }

    fn service(&mut self) {
        let Ok(command) = self.commands.pop() else {
            // Spurious wake.
            return;
        };
        let status = self.dispatch(command);
        if self.status.push(status).is_err() {
            error!("status channel full, dropping reply");
        }
        self.reply.raise(signal::REPLY);
        if !self.commands.is_empty() {
            // One command per wake; re-arm for the one already queued.
            self.wake.raise(signal::DATA);
        }
    }

    fn dispatch(&mut self, command: Command) -> Status {
        match command {
            Command::Write { bytes } => {
                self.ensure_endpoint();
                let sink = self.sink.as_mut().expect("sink endpoint present");
                let take = bytes.min(self.data.slots()).min(self.scratch.len());
                if take > 0 {
                    let chunk = self.data.read_chunk(take).expect("data channel read");
                    let (head, tail) = chunk.as_slices();
                    self.scratch[..head.len()].copy_from_slice(head);
                    self.scratch[head.len()..head.len() + tail.len()].copy_from_slice(tail);
                    chunk.commit_all();
                    scale_samples(
                        &mut self.scratch[..take],
                        self.volume.load(Ordering::Relaxed),
                    );
                    if let Err(e) = sink.write(&self.scratch[..take]) {
                        // Shrinking or failing the write would ripple an
                        // audible underrun back into the mixer; report the
                        // bytes as written and keep pacing intact.
                        error!("sink write failed, reporting {take} bytes written: {e}");
                    }
                }
                Status::Written { bytes: take }
            }
            // During standby the position is the frozen frame clock; the
            // query must not rebuild the endpoint.
            Command::GetPosition => match self.sink.as_mut() {
                Some(sink) => {
                    let (frames, ts) = sink.position();
                    Status::Position { frames, ts }
                }
                None => Status::Position {
                    frames: self.clock.frames(),
                    ts: clock::now(),
                },
            },
            Command::GetLatency => Status::Latency {
                millis: self.config.period_ms(),
            },
            Command::Read { .. } | Command::Unknown(_) => Status::NotSupported,
        }
    }
}

struct ReadWorker {
    address: PortAddress,
    config: AudioConfig,
    commands: Consumer<Command>,
    data: Producer<u8>,
    status: Producer<Status>,
    wake: Arc<EventFlag>,
    reply: Arc<EventFlag>,
    clock: Arc<FrameClock>,
    source: Option<Box<dyn SourcePort>>,
    scratch: Vec<u8>,
    quantum: usize,
}

impl ReadWorker {
    fn run(mut self) {
        loop {
            let bits = self
                .wake
                .wait_any(signal::DATA | signal::STANDBY | signal::EXIT, signal::EXIT);
            if bits & signal::EXIT != 0 {
                debug!("read worker exiting");
                return;
            }
            if bits & signal::STANDBY != 0 {
                self.enter_standby();
            }
            if bits & signal::DATA != 0 {
                self.service();
            }
        }
    }

    fn enter_standby(&mut self) {
        if self.source.take().is_some() {
            debug!("read worker entering standby");
        }
        self.scratch = Vec::new();
    }

    fn ensure_endpoint(&mut self) {
        if self.source.is_some() {
            return;
        }
        self.scratch = vec![0; self.quantum];
        match port::open_source(self.address, &self.config, self.clock.clone()) {
            Ok(source) => self.source = Some(source),
            Err(e) => {
                error!("source endpoint construction failed after admission: {e}");
                process::abort();
            }
        }
    }

    fn service(&mut self) {
        let Ok(command) = self.commands.pop() else {
            return;
        };
        let status = self.dispatch(command);
        if self.status.push(status).is_err() {
            error!("status channel full, dropping reply");
        }
        self.reply.raise(signal::REPLY);
        if !self.commands.is_empty() {
            self.wake.raise(signal::DATA);
        }
    }

    fn dispatch(&mut self, command: Command) -> Status {
        match command {
            Command::Read { bytes } => {
                self.ensure_endpoint();
                let source = self.source.as_mut().expect("source endpoint present");
                let take = bytes.min(self.data.slots()).min(self.scratch.len());
                if take > 0 {
                    match source.read(&mut self.scratch[..take]) {
                        Ok(got) if got < take => {
                            // A short read must not surface as one;
                            // silence fills the gap.
                            self.scratch[got..take].fill(0);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("source read failed, substituting silence: {e}");
                            self.scratch[..take].fill(0);
                        }
                    }
                    let chunk = self
                        .data
                        .write_chunk_uninit(take)
                        .expect("data channel write");
                    chunk.fill_from_iter(self.scratch[..take].iter().copied());
                }
                Status::Read { bytes: take }
            }
            Command::GetPosition => match self.source.as_mut() {
                Some(source) => {
                    let (frames, ts) = source.position();
                    Status::Position { frames, ts }
                }
                None => Status::Position {
                    frames: self.clock.frames(),
                    ts: clock::now(),
                },
            },
            // Latency is an output-stream query.
            Command::GetLatency | Command::Write { .. } | Command::Unknown(_) => {
                Status::NotSupported
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_volume_is_a_bitwise_noop() {
        let original: Vec<u8> = (0..64).collect();
        let mut buf = original.clone();
        scale_samples(&mut buf, VOLUME_UNITY);
        assert_eq!(buf, original);
    }

    #[test]
    fn zero_volume_zeroes_all_samples() {
        let mut buf: Vec<u8> = (1..65).collect();
        scale_samples(&mut buf, 0);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn half_volume_halves_samples() {
        let mut buf = Vec::new();
        for sample in [1000_i16, -1000, 32000, -32000] {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
        scale_samples(&mut buf, VOLUME_UNITY / 2);
        let halved: Vec<i16> = buf
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(halved, vec![500, -500, 16000, -16000]);
    }
}
