//! Client-side channel descriptors returned by `prepare_for_io`.
//!
//! These are the only artifacts a client needs to run the data path: it
//! enqueues a command, raises the worker's wake signal, and waits on the
//! reply signal for the matching status. The wait is bounded; a healthy
//! worker answers within one wake cycle.

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use rtrb::{Consumer, Producer};

use crate::clock::Timestamp;
use crate::error::EngineError;
use crate::message::{Command, Status};
use crate::signal::{self, EventFlag};

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Command, data, and status descriptors for an output stream, plus the
/// worker's thread id.
pub struct OutputChannels {
    commands: Producer<Command>,
    data: Producer<u8>,
    status: Consumer<Status>,
    wake: Arc<EventFlag>,
    reply: Arc<EventFlag>,
    worker_thread: ThreadId,
}

impl OutputChannels {
    pub(crate) fn new(
        commands: Producer<Command>,
        data: Producer<u8>,
        status: Consumer<Status>,
        wake: Arc<EventFlag>,
        reply: Arc<EventFlag>,
        worker_thread: ThreadId,
    ) -> Self {
        Self {
            commands,
            data,
            status,
            wake,
            reply,
            worker_thread,
        }
    }

    pub fn worker_thread(&self) -> ThreadId {
        self.worker_thread
    }

    /// Enqueue as much of `bytes` as fits in the data channel and ask the
    /// worker to move it to the sink. Returns the bytes the worker
    /// consumed.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, EngineError> {
        let want = bytes.len().min(self.data.slots());
        if want > 0 {
            let chunk = self
                .data
                .write_chunk_uninit(want)
                .map_err(|e| EngineError::Backend(format!("data channel write: {e}")))?;
            chunk.fill_from_iter(bytes[..want].iter().copied());
        }
        self.request(Command::Write { bytes: bytes.len() })?;
        match self.wait_reply()? {
            Status::Written { bytes } => Ok(bytes),
            Status::NotSupported => Err(EngineError::NotSupported("write".to_string())),
            other => Err(EngineError::Backend(format!("unexpected status {other:?}"))),
        }
    }

    pub fn position(&mut self) -> Result<(u64, Timestamp), EngineError> {
        self.request(Command::GetPosition)?;
        match self.wait_reply()? {
            Status::Position { frames, ts } => Ok((frames, ts)),
            Status::NotSupported => Err(EngineError::NotSupported("position".to_string())),
            other => Err(EngineError::Backend(format!("unexpected status {other:?}"))),
        }
    }

    pub fn latency_ms(&mut self) -> Result<u32, EngineError> {
        self.request(Command::GetLatency)?;
        match self.wait_reply()? {
            Status::Latency { millis } => Ok(millis),
            Status::NotSupported => Err(EngineError::NotSupported("latency".to_string())),
            other => Err(EngineError::Backend(format!("unexpected status {other:?}"))),
        }
    }

    fn request(&mut self, command: Command) -> Result<(), EngineError> {
        self.commands
            .push(command)
            .map_err(|_| EngineError::Backend("command channel full".to_string()))?;
        self.wake.raise(signal::DATA);
        Ok(())
    }

    fn wait_reply(&mut self) -> Result<Status, EngineError> {
        loop {
            if let Ok(status) = self.status.pop() {
                return Ok(status);
            }
            if self
                .reply
                .wait_any_timeout(signal::REPLY, 0, REPLY_TIMEOUT)
                == 0
            {
                return Err(EngineError::Backend(
                    "timed out waiting for status reply".to_string(),
                ));
            }
        }
    }
}

/// Command, data, and status descriptors for an input stream.
pub struct InputChannels {
    commands: Producer<Command>,
    data: Consumer<u8>,
    status: Consumer<Status>,
    wake: Arc<EventFlag>,
    reply: Arc<EventFlag>,
    worker_thread: ThreadId,
}

impl InputChannels {
    pub(crate) fn new(
        commands: Producer<Command>,
        data: Consumer<u8>,
        status: Consumer<Status>,
        wake: Arc<EventFlag>,
        reply: Arc<EventFlag>,
        worker_thread: ThreadId,
    ) -> Self {
        Self {
            commands,
            data,
            status,
            wake,
            reply,
            worker_thread,
        }
    }

    pub fn worker_thread(&self) -> ThreadId {
        self.worker_thread
    }

    /// Ask the worker for up to `buf.len()` bytes of capture data and drain
    /// them from the data channel. Returns the bytes delivered.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        self.request(Command::Read { bytes: buf.len() })?;
        let got = match self.wait_reply()? {
            Status::Read { bytes } => bytes,
            Status::NotSupported => return Err(EngineError::NotSupported("read".to_string())),
            other => {
                return Err(EngineError::Backend(format!("unexpected status {other:?}")));
            }
        };
        if got == 0 {
            return Ok(0);
        }
        let take = got.min(self.data.slots());
        let chunk = self
            .data
            .read_chunk(take)
            .map_err(|e| EngineError::Backend(format!("data channel read: {e}")))?;
        let (head, tail) = chunk.as_slices();
        buf[..head.len()].copy_from_slice(head);
        buf[head.len()..head.len() + tail.len()].copy_from_slice(tail);
        chunk.commit_all();
        Ok(take)
    }

    pub fn position(&mut self) -> Result<(u64, Timestamp), EngineError> {
        self.request(Command::GetPosition)?;
        match self.wait_reply()? {
            Status::Position { frames, ts } => Ok((frames, ts)),
            Status::NotSupported => Err(EngineError::NotSupported("position".to_string())),
            other => Err(EngineError::Backend(format!("unexpected status {other:?}"))),
        }
    }

    fn request(&mut self, command: Command) -> Result<(), EngineError> {
        self.commands
            .push(command)
            .map_err(|_| EngineError::Backend("command channel full".to_string()))?;
        self.wake.raise(signal::DATA);
        Ok(())
    }

    fn wait_reply(&mut self) -> Result<Status, EngineError> {
        loop {
            if let Ok(status) = self.status.pop() {
                return Ok(status);
            }
            if self
                .reply
                .wait_any_timeout(signal::REPLY, 0, REPLY_TIMEOUT)
                == 0
            {
                return Err(EngineError::Backend(
                    "timed out waiting for status reply".to_string(),
                ));
            }
        }
    }
}
