//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a running
//! conversion, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for detailed progress snapshots.
//!
//! The transcoder reports either a frame counter or an encoded timestamp.
//! When the container records how many frames the main video stream has,
//! progress is measured in frames; otherwise it is measured in seconds of
//! output against the container duration.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tomp4::{ProgressCallback, ProgressInfo, TranscodeOptions};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% complete ({:.2}x)", info.speed.unwrap_or(0.0));
//!         }
//!     }
//! }
//!
//! let options = TranscodeOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::catalog::ContainerInfo;

/// What a progress counter measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    /// Encoded video frames.
    Frames,
    /// Seconds of encoded output.
    Seconds,
}

/// The expected end of a conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTotal {
    pub unit: ProgressUnit,
    /// Total in `unit`, if known.
    pub total: Option<f64>,
}

impl ProgressTotal {
    /// Frames when the container knows the frame count, seconds otherwise.
    pub fn for_container(container: &ContainerInfo) -> Self {
        match container.frame_count {
            Some(frames) => Self {
                unit: ProgressUnit::Frames,
                total: Some(frames as f64),
            },
            None => Self {
                unit: ProgressUnit::Seconds,
                total: Some(container.duration.as_secs_f64()).filter(|&seconds| seconds > 0.0),
            },
        }
    }
}

/// A snapshot of conversion progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Unit of `current` and `total`.
    pub unit: ProgressUnit,
    /// Frames or seconds processed so far. Never decreases.
    pub current: f64,
    /// Total expected, if known ahead of time.
    pub total: Option<f64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Encoding speed relative to real time, as printed by the transcoder.
    pub speed: Option<f64>,
    /// Wall-clock time elapsed since the transcoder started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
}

/// Trait for receiving progress updates during a conversion.
///
/// Implementations must be [`Send`] and [`Sync`] so the same callback can
/// be shared by conversions running on several threads.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called for every progress line of the transcoder.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call [`cancel`](CancellationToken::cancel)
/// from any thread (or a signal handler) to stop the associated conversion.
///
/// # Example
///
/// ```
/// use tomp4::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that keeps the counter monotonic and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    unit: ProgressUnit,
    total: Option<f64>,
    current: f64,
    speed: Option<f64>,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: ProgressTotal) -> Self {
        Self {
            callback,
            unit: total.unit,
            total: total.total,
            current: 0.0,
            speed: None,
            start_time: Instant::now(),
        }
    }

    /// Record a reported position and fire the callback.
    ///
    /// Positions behind the current one (the transcoder sometimes repeats
    /// or rewinds its timestamp) leave the counter unchanged.
    pub(crate) fn update(&mut self, position: f64, speed: Option<f64>) {
        if position.is_finite() && position > self.current {
            self.current = position;
        }
        if speed.is_some() {
            self.speed = speed;
        }
        self.callback.on_progress(&self.snapshot());
    }

    pub(crate) fn snapshot(&self) -> ProgressInfo {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&total| total > 0.0)
            .map(|total| ((self.current / total) * 100.0).min(100.0) as f32);

        let estimated_remaining = if self.current > 0.0 {
            self.total.map(|total| {
                let remaining = (total - self.current).max(0.0);
                elapsed.mul_f64(remaining / self.current)
            })
        } else {
            None
        };

        ProgressInfo {
            unit: self.unit,
            current: self.current,
            total: self.total,
            percentage,
            speed: self.speed,
            elapsed,
            estimated_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<f64>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0.lock().unwrap().push(info.current);
        }
    }

    #[test]
    fn counter_never_decreases() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker = ProgressTracker::new(
            recorder.clone(),
            ProgressTotal {
                unit: ProgressUnit::Frames,
                total: Some(100.0),
            },
        );
        tracker.update(10.0, Some(1.5));
        tracker.update(8.0, None);
        tracker.update(50.0, None);

        assert_eq!(*recorder.0.lock().unwrap(), vec![10.0, 10.0, 50.0]);
        let info = tracker.snapshot();
        assert_eq!(info.percentage, Some(50.0));
        assert_eq!(info.speed, Some(1.5));
    }

    #[test]
    fn total_prefers_frames() {
        let mut container = ContainerInfo {
            path: PathBuf::from("movie.mkv"),
            duration: Duration::from_secs(90),
            frame_count: Some(2160),
        };
        assert_eq!(
            ProgressTotal::for_container(&container),
            ProgressTotal {
                unit: ProgressUnit::Frames,
                total: Some(2160.0)
            }
        );

        container.frame_count = None;
        assert_eq!(
            ProgressTotal::for_container(&container),
            ProgressTotal {
                unit: ProgressUnit::Seconds,
                total: Some(90.0)
            }
        );
    }
}
