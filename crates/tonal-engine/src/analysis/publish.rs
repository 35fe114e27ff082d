//! Single-writer publication of the auto-correction matrix.
//!
//! The analysis engine is the only writer; compilers and renderers hold
//! [`watch::Receiver`]s. Values are immutable snapshots, deduplicated by
//! [`ColorMatrix::cache_key`] and throttled.

use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::trace;

use crate::matrix::ColorMatrix;
use crate::metrics;

/// A published auto-matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMatrix {
    pub matrix: ColorMatrix,
    /// Increments with every publication
    pub generation: u64,
    pub updated_at: Instant,
}

impl AutoMatrix {
    pub fn identity(at: Instant) -> Self {
        Self {
            matrix: ColorMatrix::IDENTITY,
            generation: 0,
            updated_at: at,
        }
    }
}

#[derive(Debug)]
pub struct AutoMatrixPublisher {
    tx: watch::Sender<AutoMatrix>,
    throttle: Duration,
    last_key: String,
    last_emit: Option<Instant>,
    generation: u64,
}

impl AutoMatrixPublisher {
    pub fn new(throttle: Duration) -> Self {
        let (tx, _rx) = watch::channel(AutoMatrix::identity(Instant::now()));
        Self {
            tx,
            throttle,
            last_key: ColorMatrix::IDENTITY.cache_key(),
            last_emit: None,
            generation: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AutoMatrix> {
        self.tx.subscribe()
    }

    /// Latest published value.
    pub fn current(&self) -> AutoMatrix {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Publish `matrix` unless it equals the last publication or the
    /// throttle window is still open. Returns whether it was published.
    ///
    /// A suppressed value is not queued; the caller offers again next tick.
    pub fn offer(&mut self, matrix: ColorMatrix, now: Instant) -> bool {
        let key = matrix.cache_key();
        if key == self.last_key {
            return false;
        }
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.throttle {
                trace!("Auto-matrix emission throttled");
                return false;
            }
        }
        self.emit(matrix, key, now);
        true
    }

    /// Publish regardless of throttle; still deduplicated.
    pub fn force(&mut self, matrix: ColorMatrix, now: Instant) -> bool {
        let key = matrix.cache_key();
        if key == self.last_key {
            return false;
        }
        self.emit(matrix, key, now);
        true
    }

    fn emit(&mut self, matrix: ColorMatrix, key: String, now: Instant) {
        self.generation += 1;
        self.last_key = key;
        self.last_emit = Some(now);
        self.tx.send_replace(AutoMatrix {
            matrix,
            generation: self.generation,
            updated_at: now,
        });
        metrics::record_emission();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[test]
    fn test_dedupe_and_throttle() {
        let t0 = Instant::now();
        let mut publisher = AutoMatrixPublisher::new(Duration::from_millis(150));
        let rx = publisher.subscribe();

        assert!(!publisher.offer(ColorMatrix::IDENTITY, t0));

        let a = ColorMatrix::saturation(1.1);
        assert!(publisher.offer(a, t0));
        assert!(!publisher.offer(a, t0 + Duration::from_millis(500)));

        let b = ColorMatrix::saturation(1.2);
        assert!(!publisher.offer(b, t0 + Duration::from_millis(100)));
        assert!(publisher.offer(b, t0 + Duration::from_millis(150)));

        let seen = rx.borrow().clone();
        assert_eq!(seen.matrix, b);
        assert_eq!(seen.generation, 2);
    }

    #[test]
    fn test_force_skips_throttle() {
        let t0 = Instant::now();
        let mut publisher = AutoMatrixPublisher::new(Duration::from_millis(150));
        assert!(publisher.offer(ColorMatrix::saturation(1.3), t0));
        assert!(publisher.force(ColorMatrix::IDENTITY, t0 + Duration::from_millis(1)));
        assert_eq!(publisher.current().matrix, ColorMatrix::IDENTITY);
    }

    #[test]
    fn test_suppressed_offer_does_not_wake_readers() {
        let t0 = Instant::now();
        let mut publisher = AutoMatrixPublisher::new(Duration::from_millis(150));
        let mut rx = publisher.subscribe();

        assert!(publisher.offer(ColorMatrix::saturation(1.1), t0));
        let mut changed = task::spawn(rx.changed());
        assert_ready_ok!(changed.poll());
        drop(changed);
        rx.borrow_and_update();

        assert!(!publisher.offer(ColorMatrix::saturation(1.2), t0 + Duration::from_millis(50)));
        let mut changed = task::spawn(rx.changed());
        assert_pending!(changed.poll());
    }

    #[tokio::test]
    async fn test_receiver_sees_change() {
        let mut publisher = AutoMatrixPublisher::new(Duration::ZERO);
        let mut rx = publisher.subscribe();
        publisher.offer(ColorMatrix::hue_rotate(5.0), Instant::now());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().generation, 1);
    }
}
