use crate::clock::Timestamp;

/// Requests the client enqueues on a stream's command channel. One command
/// per wake; the worker answers each with exactly one `Status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Move up to `bytes` from the data channel into the sink (output
    /// streams).
    Write { bytes: usize },
    /// Move up to `bytes` from the source into the data channel (input
    /// streams).
    Read { bytes: usize },
    /// Capture/presentation position of the endpoint.
    GetPosition,
    /// Period latency in milliseconds. Output streams only; needs no
    /// endpoint to answer.
    GetLatency,
    /// Placeholder for command codes this engine does not understand.
    Unknown(u32),
}

/// Reply on the status channel, tagged by the command it answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Written { bytes: usize },
    Read { bytes: usize },
    Position { frames: u64, ts: Timestamp },
    Latency { millis: u32 },
    NotSupported,
}
