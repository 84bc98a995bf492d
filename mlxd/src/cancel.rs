// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a sleeping [`CancellationToken`] checks whether it has been cancelled.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A flag shared between the signal handler and everything that might block for a while.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if cancelled.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Sleep for one polling interval. Used by code waiting on something other than a timer.
    pub fn pause(&self) -> bool {
        self.sleep(POLL_INTERVAL)
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::CancellationToken;

    #[test]
    fn sleep_completes() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_wakes_sleep() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(token.is_cancelled());
        handle.join().unwrap();
    }

    #[test]
    fn already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!token.sleep(Duration::from_secs(30)));
        assert!(!token.pause());
    }
}
