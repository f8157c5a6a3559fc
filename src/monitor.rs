//! Request performance recording.
//!
//! Every outbound attempt (including retries) is recorded as a
//! [`PerformanceSample`]. The recorder keeps the newest
//! [`MAX_SAMPLES`] samples and can mirror them to a [`CacheStore`] so the
//! history survives restarts.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheOptions, CacheStore, Storage};
use crate::cache::entry::now_millis;

/// Samples kept in the rolling window.
pub const MAX_SAMPLES: usize = 100;

/// Failed samples reported in [`PerformanceStats::recent_errors`].
pub const RECENT_ERRORS: usize = 10;

/// Cache key of the persisted sample history.
pub const PERFORMANCE_KEY: &str = "api_performance";

/// Lifetime of the persisted sample history.
pub const PERFORMANCE_TTL: Duration = Duration::from_secs(60 * 60);

/// One outbound request attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub url: String,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl PerformanceSample {
    pub fn success(url: impl Into<String>, duration: Duration) -> Self {
        Self {
            url: url.into(),
            duration_ms: duration_ms(duration),
            success: true,
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn failure(url: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            duration_ms: duration_ms(duration),
            success: false,
            error: Some(error.into()),
            timestamp: now_millis(),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Aggregate view of the recorded samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub total_requests: usize,
    /// Successful samples as a percentage of all samples, 0 when empty.
    pub success_rate: f64,
    /// Mean duration of successful samples, rounded to the nearest ms.
    pub average_response_time_ms: u64,
    /// Up to the last ten failed samples, oldest first.
    pub recent_errors: Vec<PerformanceSample>,
}

impl PerformanceStats {
    fn compute<'a>(samples: impl Iterator<Item = &'a PerformanceSample>) -> Self {
        let mut total = 0usize;
        let mut successes = 0u64;
        let mut success_ms = 0u128;
        let mut errors = VecDeque::with_capacity(RECENT_ERRORS);

        for sample in samples {
            total += 1;
            if sample.success {
                successes += 1;
                success_ms += u128::from(sample.duration_ms);
            } else {
                if errors.len() == RECENT_ERRORS {
                    errors.pop_front();
                }
                errors.push_back(sample.clone());
            }
        }

        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64 * 100.0
        };
        let average_response_time_ms = if successes == 0 {
            0
        } else {
            (success_ms as f64 / successes as f64).round() as u64
        };

        Self {
            total_requests: total,
            success_rate,
            average_response_time_ms,
            recent_errors: errors.into(),
        }
    }
}

impl fmt::Display for PerformanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests:      {}", self.total_requests)?;
        writeln!(f, "success rate:  {:.1}%", self.success_rate)?;
        write!(f, "avg latency:   {} ms", self.average_response_time_ms)?;
        for sample in &self.recent_errors {
            write!(
                f,
                "\n  error: {} ({} ms) {}",
                sample.url,
                sample.duration_ms,
                sample.error.as_deref().unwrap_or("unknown")
            )?;
        }
        Ok(())
    }
}

/// Rolling window of request samples.
pub struct PerformanceRecorder {
    samples: Mutex<VecDeque<PerformanceSample>>,
    store: Option<Arc<CacheStore>>,
}

impl PerformanceRecorder {
    /// A recorder that keeps samples in memory only.
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(MAX_SAMPLES)),
            store: None,
        }
    }

    /// A recorder mirrored to `store`.
    ///
    /// Any history already persisted in the store (and not expired) is
    /// loaded, keeping the newest [`MAX_SAMPLES`].
    pub fn with_store(store: Arc<CacheStore>) -> Self {
        let mut loaded: VecDeque<PerformanceSample> = store
            .get::<Vec<PerformanceSample>>(PERFORMANCE_KEY, Storage::Persistent)
            .unwrap_or_default()
            .into();
        while loaded.len() > MAX_SAMPLES {
            loaded.pop_front();
        }
        if !loaded.is_empty() {
            debug!(samples = loaded.len(), "loaded performance history");
        }
        Self {
            samples: Mutex::new(loaded),
            store: Some(store),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PerformanceSample>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a sample, dropping the oldest once the window is full.
    pub fn record(&self, sample: PerformanceSample) {
        let snapshot = {
            let mut samples = self.lock();
            if samples.len() == MAX_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(sample);
            self.store.as_ref().map(|_| samples.iter().cloned().collect::<Vec<_>>())
        };
        if let (Some(store), Some(snapshot)) = (&self.store, snapshot) {
            store.set(
                PERFORMANCE_KEY,
                &snapshot,
                CacheOptions::new()
                    .ttl(PERFORMANCE_TTL)
                    .storage(Storage::Persistent),
            );
        }
    }

    pub fn stats(&self) -> PerformanceStats {
        PerformanceStats::compute(self.lock().iter())
    }

    /// Copy of the current window, oldest first.
    pub fn samples(&self) -> Vec<PerformanceSample> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether samples are mirrored to a cache store.
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Forget every sample, including the persisted copy.
    pub fn clear(&self) {
        self.lock().clear();
        if let Some(store) = &self.store {
            store.delete(PERFORMANCE_KEY, Storage::Persistent);
        }
    }
}

impl Default for PerformanceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PerformanceRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceRecorder")
            .field("samples", &self.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileBackend;

    const URL: &str = "https://openrouter.ai/api/v1/chat/completions";

    fn ok(ms: u64) -> PerformanceSample {
        PerformanceSample::success(URL, Duration::from_millis(ms))
    }

    fn failed(ms: u64, error: &str) -> PerformanceSample {
        PerformanceSample::failure(URL, Duration::from_millis(ms), error)
    }

    #[test]
    fn stats_over_mixed_samples() {
        let recorder = PerformanceRecorder::new();
        recorder.record(ok(100));
        recorder.record(ok(200));
        recorder.record(ok(300));
        recorder.record(failed(50, "timeout"));

        let stats = recorder.stats();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.success_rate, 75.0);
        assert_eq!(stats.average_response_time_ms, 200);
        assert_eq!(stats.recent_errors.len(), 1);
        assert_eq!(stats.recent_errors[0].error.as_deref(), Some("timeout"));
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = PerformanceRecorder::new().stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_response_time_ms, 0);
        assert!(stats.recent_errors.is_empty());
    }

    #[test]
    fn average_rounds_to_nearest() {
        let recorder = PerformanceRecorder::new();
        recorder.record(ok(1));
        recorder.record(ok(2));
        assert_eq!(recorder.stats().average_response_time_ms, 2);
    }

    #[test]
    fn window_keeps_newest_hundred() {
        let recorder = PerformanceRecorder::new();
        for i in 0..150 {
            recorder.record(ok(i));
        }
        let samples = recorder.samples();
        assert_eq!(samples.len(), MAX_SAMPLES);
        assert_eq!(samples[0].duration_ms, 50);
        assert_eq!(samples[MAX_SAMPLES - 1].duration_ms, 149);
    }

    #[test]
    fn recent_errors_capped_at_ten() {
        let recorder = PerformanceRecorder::new();
        for i in 0..15 {
            recorder.record(failed(i, &format!("error {i}")));
        }
        let stats = recorder.stats();
        assert_eq!(stats.recent_errors.len(), RECENT_ERRORS);
        assert_eq!(stats.recent_errors[0].error.as_deref(), Some("error 5"));
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn history_persists_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            CacheStore::in_memory(10).with_persistent_backend(FileBackend::open(dir.path()).unwrap()),
        );

        let recorder = PerformanceRecorder::with_store(Arc::clone(&store));
        recorder.record(ok(120));
        recorder.record(failed(30, "server error"));

        let reloaded = PerformanceRecorder::with_store(store);
        assert_eq!(reloaded.samples(), recorder.samples());

        reloaded.clear();
        assert!(reloaded.is_empty());
        let fresh = PerformanceRecorder::with_store(Arc::new(
            CacheStore::in_memory(10).with_persistent_backend(FileBackend::open(dir.path()).unwrap()),
        ));
        assert!(fresh.is_empty());
    }

    #[test]
    fn display_lists_errors() {
        let recorder = PerformanceRecorder::new();
        recorder.record(ok(10));
        recorder.record(failed(5, "authentication failed"));
        let text = recorder.stats().to_string();
        assert!(text.contains("50.0%"));
        assert!(text.contains("authentication failed"));
    }
}
