//! Rate limiter guarding the OSC link
//!
//! Faders and encoders emit a burst of CC messages per physical movement.
//! The limiter samples that burst in two places:
//!
//! - **Intake**: a whole MIDI event is dropped if it arrives less than
//!   `min_interval` after the last accepted instant.
//! - **Send**: each outbound message is forwarded only if `min_interval` has
//!   passed since the gate instant. A successful send pushes the gate to
//!   `now + cooldown`, so nothing else gets through until the cooldown and
//!   another `min_interval` have elapsed.
//!
//! Both checks read the same instant. Intermediate positions are lost during
//! fast movement. That is intended.

use anyhow::Result;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::config::LimiterConfig;

/// Default minimum spacing between accepted events and sends
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Default hold-off after a successful send
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(500);

/// Two-tier gate shared by every MIDI source
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    cooldown: Duration,
    /// Last accepted instant; lies in the future while a cooldown runs
    gate: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a limiter whose clock starts now
    pub fn new(min_interval: Duration, cooldown: Duration) -> Self {
        Self::starting_at(Instant::now(), min_interval, cooldown)
    }

    /// Create a limiter whose clock starts at `start`
    pub fn starting_at(start: Instant, min_interval: Duration, cooldown: Duration) -> Self {
        Self {
            min_interval,
            cooldown,
            gate: Mutex::new(start),
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_interval_ms),
            Duration::from_millis(config.cooldown_ms),
        )
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Intake check for a raw MIDI event
    pub fn admit(&self, now: Instant) -> bool {
        self.is_open(*self.gate.lock(), now)
    }

    /// Send check for one outbound message
    pub fn admit_send(&self, now: Instant) -> bool {
        self.admit(now)
    }

    /// Record a successful send at `now` and start the cooldown
    pub fn mark_sent(&self, now: Instant) {
        *self.gate.lock() = now + self.cooldown;
    }

    /// Run `send` if the send check passes, marking it sent on success
    ///
    /// The slot is reserved under the lock and the lock is released before
    /// `send` runs, so a blocking transport never stalls other sources and
    /// two sources cannot both slip through. Returns `Ok(false)` when
    /// throttled. A failed send gives the slot back and starts no cooldown.
    pub fn send_gated<F>(&self, now: Instant, send: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let reserved = now + self.cooldown;
        let previous = {
            let mut gate = self.gate.lock();
            if !self.is_open(*gate, now) {
                return Ok(false);
            }
            std::mem::replace(&mut *gate, reserved)
        };

        if let Err(e) = send() {
            let mut gate = self.gate.lock();
            // Leave a newer reservation alone
            if *gate == reserved {
                *gate = previous;
            }
            return Err(e);
        }
        Ok(true)
    }

    fn is_open(&self, gate: Instant, now: Instant) -> bool {
        now.saturating_duration_since(gate) >= self.min_interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL, DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_intake_waits_for_min_interval_after_start() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(start, ms(50), ms(500));

        assert!(!limiter.admit(start));
        assert!(!limiter.admit(start + ms(49)));
        assert!(limiter.admit(start + ms(50)));
    }

    #[test]
    fn test_intake_does_not_move_the_gate() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(start, ms(50), ms(500));

        assert!(limiter.admit(start + ms(60)));
        assert!(limiter.admit(start + ms(61)));
    }

    #[test]
    fn test_send_gating_with_cooldown() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(start, ms(50), ms(500));

        let first = start + ms(60);
        assert!(limiter.admit_send(first));
        limiter.mark_sent(first);

        // Too close to the first send
        assert!(!limiter.admit_send(first + ms(10)));
        assert!(!limiter.admit(first + ms(10)));

        // Still inside the cooldown
        assert!(!limiter.admit_send(first + ms(520)));

        let third = first + ms(500) + ms(50);
        assert!(limiter.admit_send(third));
        assert!(limiter.admit(third));
    }

    #[test]
    fn test_send_gated_forwards_once_per_window() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(start, ms(50), ms(500));
        let sent = AtomicUsize::new(0);
        let send = || {
            sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };

        assert!(limiter.send_gated(start + ms(60), send).unwrap());
        assert!(!limiter.send_gated(start + ms(80), send).unwrap());
        assert!(limiter.send_gated(start + ms(610), send).unwrap());
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_send_does_not_start_cooldown() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(start, ms(50), ms(500));

        let result = limiter.send_gated(start + ms(60), || Err(anyhow!("network down")));
        assert!(result.is_err());
        assert!(limiter.admit_send(start + ms(61)));
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(start, Duration::ZERO, Duration::ZERO);

        assert!(limiter.admit(start));
        limiter.mark_sent(start);
        assert!(limiter.admit_send(start));
    }

    #[test]
    fn test_concurrent_sources_share_one_window() {
        let start = Instant::now();
        let limiter = Arc::new(RateLimiter::starting_at(start, ms(50), ms(500)));
        let sent = Arc::new(AtomicUsize::new(0));
        let now = start + ms(100);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let sent = sent.clone();
                thread::spawn(move || {
                    limiter
                        .send_gated(now, || {
                            sent.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocking_send_does_not_stall_other_sources() {
        let start = Instant::now();
        let limiter = Arc::new(RateLimiter::starting_at(start, ms(50), ms(500)));
        let (entered_tx, entered_rx) = mpsc::channel();

        let sender = {
            let limiter = limiter.clone();
            thread::spawn(move || {
                limiter
                    .send_gated(start + ms(60), || {
                        entered_tx.send(()).unwrap();
                        thread::sleep(ms(300));
                        Ok(())
                    })
                    .unwrap()
            })
        };

        entered_rx.recv().unwrap();
        let before = Instant::now();
        // The slot is already reserved, so the other source is refused
        assert!(!limiter.admit(start + ms(70)));
        assert!(!limiter
            .send_gated(start + ms(70), || panic!("must not send"))
            .unwrap());
        assert!(before.elapsed() < ms(150));

        assert!(sender.join().unwrap());
    }

    #[test]
    fn test_failed_send_gives_the_slot_back() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(start, ms(50), ms(500));

        let result = limiter.send_gated(start + ms(60), || Err(anyhow!("network down")));
        assert!(result.is_err());
        assert!(limiter.admit(start + ms(61)));
        assert!(limiter.send_gated(start + ms(61), || Ok(())).unwrap());
        assert!(!limiter.admit(start + ms(62)));
    }
}
