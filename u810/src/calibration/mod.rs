use std::sync::atomic::{AtomicU32, Ordering};

use serde_derive::{Deserialize, Serialize};

/// Field value meaning "no sample seen yet".
const UNSET: u32 = 0;

/// Raw range observed while calibrating.
///
/// A zero field has not been written yet; the helper treats an all-zero
/// snapshot as "nothing touched".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl CalibrationSnapshot {
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

/// Process-wide running min/max of raw samples.
///
/// Shared by every session in the process through an `Arc`. Each field is
/// updated with a single atomic read-modify-write, so concurrent sessions
/// never lose an extreme; a snapshot taken while samples are arriving may mix
/// fields from adjacent samples.
#[derive(Debug, Default)]
pub struct CalibrationTracker {
    min_x: AtomicU32,
    min_y: AtomicU32,
    max_x: AtomicU32,
    max_y: AtomicU32,
}

fn lower_min(field: &AtomicU32, value: u32) {
    let _ = field.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        (current == UNSET || value < current).then_some(value)
    });
}

impl CalibrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, x: u32, y: u32) {
        lower_min(&self.min_x, x);
        lower_min(&self.min_y, y);
        self.max_x.fetch_max(x, Ordering::Relaxed);
        self.max_y.fetch_max(y, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for field in [&self.min_x, &self.min_y, &self.max_x, &self.max_y] {
            field.store(UNSET, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CalibrationSnapshot {
        CalibrationSnapshot {
            min_x: self.min_x.load(Ordering::Relaxed),
            min_y: self.min_y.load(Ordering::Relaxed),
            max_x: self.max_x.load(Ordering::Relaxed),
            max_y: self.max_y.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn tracks_extremes_of_all_samples() {
        let tracker = CalibrationTracker::new();
        for (x, y) in [(100, 200), (50, 300), (150, 250)] {
            tracker.observe(x, y);
        }
        assert_eq!(
            tracker.snapshot(),
            CalibrationSnapshot {
                min_x: 50,
                min_y: 200,
                max_x: 150,
                max_y: 300
            }
        );
    }

    #[test]
    fn reset_then_one_sample_is_that_sample() {
        let tracker = CalibrationTracker::new();
        tracker.observe(4000, 4000);
        tracker.observe(10, 10);
        tracker.reset();
        assert!(tracker.snapshot().is_unset());

        tracker.observe(812, 1907);
        assert_eq!(
            tracker.snapshot(),
            CalibrationSnapshot {
                min_x: 812,
                min_y: 1907,
                max_x: 812,
                max_y: 1907
            }
        );
    }

    #[test]
    fn reset_is_idempotent() {
        let tracker = CalibrationTracker::new();
        tracker.observe(3, 4);
        tracker.reset();
        tracker.reset();
        assert_eq!(tracker.snapshot(), CalibrationSnapshot::default());
    }

    #[test]
    fn zero_sample_does_not_pin_the_minimum() {
        // zero doubles as "unset", so the next sample still lowers from scratch
        let tracker = CalibrationTracker::new();
        tracker.observe(0, 0);
        tracker.observe(700, 900);
        let snap = tracker.snapshot();
        assert_eq!((snap.min_x, snap.min_y), (700, 900));
        assert_eq!((snap.max_x, snap.max_y), (700, 900));
    }

    #[test]
    fn concurrent_sessions_lose_no_extremes() {
        let tracker = Arc::new(CalibrationTracker::new());
        let workers: Vec<_> = (0..4u32)
            .map(|worker| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 1..=1000u32 {
                        tracker.observe(worker * 1000 + i, 5000 - (worker * 1000 + i));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(
            tracker.snapshot(),
            CalibrationSnapshot {
                min_x: 1,
                min_y: 1000,
                max_x: 4000,
                max_y: 4999
            }
        );
    }
}
