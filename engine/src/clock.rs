use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic frame counter shared between a stream's status path and the
/// endpoint currently owned by its worker.
///
/// The counter survives standby cycles: endpoints come and go, the clock
/// only ever moves forward for the lifetime of the stream handle.
#[derive(Debug, Default)]
pub struct FrameClock {
    frames: AtomicU64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn advance(&self, frames: u64) -> u64 {
        self.frames.fetch_add(frames, Ordering::Relaxed) + frames
    }
}

/// Monotonic wall-clock timestamp attached to position replies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: i64,
}

#[cfg(unix)]
pub fn now() -> Timestamp {
    use nix::time::{ClockId, clock_gettime};

    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => Timestamp {
            secs: ts.tv_sec() as i64,
            nanos: ts.tv_nsec() as i64,
        },
        Err(_) => Timestamp::default(),
    }
}

#[cfg(not(unix))]
pub fn now() -> Timestamp {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let elapsed = EPOCH.get_or_init(Instant::now).elapsed();
    Timestamp {
        secs: elapsed.as_secs() as i64,
        nanos: elapsed.subsec_nanos() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = FrameClock::new();
        assert_eq!(clock.frames(), 0);
        assert_eq!(clock.advance(240), 240);
        assert_eq!(clock.advance(0), 240);
        assert_eq!(clock.advance(10), 250);
        assert_eq!(clock.frames(), 250);
    }

    #[test]
    fn timestamps_do_not_go_backwards() {
        let a = now();
        let b = now();
        assert!((b.secs, b.nanos) >= (a.secs, a.nanos));
    }
}
