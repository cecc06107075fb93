use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Data is available in (or wanted from) the data channel.
pub const DATA: u32 = 1 << 0;
/// Release the endpoint and park until the next transfer request.
pub const STANDBY: u32 = 1 << 1;
/// Leave the worker loop. Sticky: never cleared once raised, so it cannot
/// be missed by a wait that races with it.
pub const EXIT: u32 = 1 << 2;
/// A status reply is ready for the client.
pub const REPLY: u32 = 1 << 3;

/// Condvar-backed event word. The worker thread blocks on a single
/// `wait_any` call between iterations; the client raises bits from its own
/// thread. No lock is held while either side is suspended.
#[derive(Debug, Default)]
pub struct EventFlag {
    bits: Mutex<u32>,
    cvar: Condvar,
}

impl EventFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, bits: u32) {
        let mut word = self.bits.lock().expect("event flag mutex poisoned");
        *word |= bits;
        self.cvar.notify_all();
    }

    /// Block until at least one bit of `mask` is raised. Raised bits are
    /// consumed, except for those in `sticky`, and the raised subset is
    /// returned.
    pub fn wait_any(&self, mask: u32, sticky: u32) -> u32 {
        let mut word = self.bits.lock().expect("event flag mutex poisoned");
        loop {
            let hit = *word & mask;
            if hit != 0 {
                *word &= !(hit & !sticky);
                return hit;
            }
            word = self.cvar.wait(word).expect("event flag condvar failed");
        }
    }

    /// Like `wait_any`, but gives up after `timeout` and returns 0.
    pub fn wait_any_timeout(&self, mask: u32, sticky: u32, timeout: Duration) -> u32 {
        let deadline = Instant::now() + timeout;
        let mut word = self.bits.lock().expect("event flag mutex poisoned");
        loop {
            let hit = *word & mask;
            if hit != 0 {
                *word &= !(hit & !sticky);
                return hit;
            }
            let now = Instant::now();
            if now >= deadline {
                return 0;
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(word, deadline - now)
                .expect("event flag condvar failed");
            word = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn raised_bits_are_consumed_except_sticky() {
        let flag = EventFlag::new();
        flag.raise(DATA | EXIT);
        assert_eq!(flag.wait_any(DATA | STANDBY | EXIT, EXIT), DATA | EXIT);
        // EXIT stays raised, DATA was consumed.
        assert_eq!(flag.wait_any(DATA | STANDBY | EXIT, EXIT), EXIT);
    }

    #[test]
    fn wait_wakes_on_raise_from_other_thread() {
        let flag = Arc::new(EventFlag::new());
        let raiser = {
            let flag = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                flag.raise(STANDBY);
            })
        };
        assert_eq!(flag.wait_any(STANDBY, 0), STANDBY);
        raiser.join().expect("raiser thread panicked");
    }

    #[test]
    fn wait_timeout_returns_zero_when_nothing_raised() {
        let flag = EventFlag::new();
        assert_eq!(
            flag.wait_any_timeout(DATA, 0, Duration::from_millis(5)),
            0
        );
    }
}
