// Host metrics module
//
// Lightweight counters for what the overlay host did during its lifetime

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Host counters
///
/// Uses atomic operations so the host task, the tap workers and readers
/// can touch them without locks. Logged on host shutdown.
#[derive(Debug)]
pub struct HostMetrics {
    /// Overlay sessions started (surfaces created)
    pub sessions_started: AtomicU64,

    /// Short switch activations received while the overlay was up
    pub activations: AtomicU64,

    /// Sessions that ended with both bars frozen
    pub crossings: AtomicU64,

    /// Crossings a cross listener handled itself
    pub crossings_handled: AtomicU64,

    /// Taps injected successfully
    pub taps_injected: AtomicU64,

    /// Taps that failed (permission denied, backend missing)
    pub injection_failures: AtomicU64,

    /// Long activations that aborted scanning
    pub aborts: AtomicU64,

    /// Frames presented on the indicator surface
    pub frames_rendered: AtomicU64,

    /// Frames the backend refused
    pub frame_errors: AtomicU64,

    start_time: Instant,
}

impl HostMetrics {
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            crossings: AtomicU64::new(0),
            crossings_handled: AtomicU64::new(0),
            taps_injected: AtomicU64::new(0),
            injection_failures: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            frame_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_session(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a crossing
    ///
    /// # Arguments
    /// * `handled` - true if a cross listener consumed it, false if a tap follows
    pub fn record_crossing(&self, handled: bool) {
        self.crossings.fetch_add(1, Ordering::Relaxed);
        if handled {
            self.crossings_handled.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_tap(&self, succeeded: bool) {
        if succeeded {
            self.taps_injected.fetch_add(1, Ordering::Relaxed);
        } else {
            self.injection_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self, succeeded: bool) {
        if succeeded {
            self.frames_rendered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frame_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average activations per completed session; a perfect user needs exactly two.
    pub fn activations_per_crossing(&self) -> f64 {
        let crossings = self.crossings.load(Ordering::Relaxed);
        if crossings > 0 {
            self.activations.load(Ordering::Relaxed) as f64 / crossings as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Overlay Host Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Sessions: {} started, {} crossed ({} handled by listener), {} aborted",
            self.sessions_started.load(Ordering::Relaxed),
            self.crossings.load(Ordering::Relaxed),
            self.crossings_handled.load(Ordering::Relaxed),
            self.aborts.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Activations: {} ({:.2} per crossing)",
            self.activations.load(Ordering::Relaxed),
            self.activations_per_crossing()
        );
        tracing::info!(
            "Taps: {} injected, {} failed",
            self.taps_injected.load(Ordering::Relaxed),
            self.injection_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Frames: {} rendered, {} errors",
            self.frames_rendered.load(Ordering::Relaxed),
            self.frame_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for HostMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = HostMetrics::new();
        assert_eq!(metrics.sessions_started.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.crossings.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_crossings() {
        let metrics = HostMetrics::new();

        metrics.record_crossing(true);
        metrics.record_crossing(false);

        assert_eq!(metrics.crossings.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.crossings_handled.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_record_taps_and_frames() {
        let metrics = HostMetrics::new();

        metrics.record_tap(true);
        metrics.record_tap(false);
        metrics.record_tap(false);
        metrics.record_frame(true);
        metrics.record_frame(false);

        assert_eq!(metrics.taps_injected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.injection_failures.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.frames_rendered.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.frame_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_activations_per_crossing() {
        let metrics = HostMetrics::new();
        assert_eq!(metrics.activations_per_crossing(), 0.0);

        for _ in 0..5 {
            metrics.record_activation();
        }
        metrics.record_crossing(false);
        metrics.record_crossing(false);

        assert_eq!(metrics.activations_per_crossing(), 2.5);
    }

    #[test]
    fn test_uptime() {
        let metrics = HostMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
