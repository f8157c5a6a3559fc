//! Builder for configuring visualizer instances

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::Visualizer;
use super::visualizer::spawn_sweeper;
use crate::cache::{CacheConfig, CacheStore};
use crate::monitor::PerformanceRecorder;
use crate::providers::{CompletionProvider, OpenRouterClient, RetryConfig};
use crate::types::DEFAULT_MAX_PROMPT_CHARS;
use crate::{Result, VizgenError};

/// Base per-attempt timeout before model and format scaling.
pub const DEFAULT_BASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifetime of cached visualization results.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Interval of the expired-entry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Upper bound on distinct keys being fetched at once.
const MAX_INFLIGHT: u64 = 1_000;

/// Lifetime of a settled in-flight value. The leader removes it as soon as
/// it completes; this only bounds values orphaned by a cancelled leader.
const INFLIGHT_TTL: Duration = Duration::from_secs(5);

/// Builder for [`Visualizer`].
///
/// ```rust,no_run
/// # use vizgen::{Visualizer, CacheConfig};
/// # fn main() -> vizgen::Result<()> {
/// let visualizer = Visualizer::builder()
///     .openrouter("sk-or-...")
///     .cache_config(CacheConfig::new().persistent_dir("/tmp/vizgen-cache"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct VisualizerBuilder {
    openrouter_key: Option<String>,
    base_url: Option<String>,
    app_url: Option<String>,
    app_title: Option<String>,
    provider: Option<Arc<dyn CompletionProvider>>,
    cache: Option<Arc<CacheStore>>,
    cache_config: CacheConfig,
    recorder: Option<Arc<PerformanceRecorder>>,
    retry: RetryConfig,
    base_timeout: Duration,
    max_prompt_chars: usize,
    result_ttl: Duration,
    sweep_interval: Duration,
    pub(super) inflight_ttl: Duration,
}

impl VisualizerBuilder {
    pub fn new() -> Self {
        Self {
            openrouter_key: None,
            base_url: None,
            app_url: None,
            app_title: None,
            provider: None,
            cache: None,
            cache_config: CacheConfig::default(),
            recorder: None,
            retry: RetryConfig::default(),
            base_timeout: DEFAULT_BASE_TIMEOUT,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            result_ttl: DEFAULT_RESULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            inflight_ttl: INFLIGHT_TTL,
        }
    }

    /// Use OpenRouter with the given API key.
    pub fn openrouter(mut self, api_key: impl Into<String>) -> Self {
        self.openrouter_key = Some(api_key.into());
        self
    }

    /// Override the OpenRouter base URL (default `https://openrouter.ai/api/v1`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// `HTTP-Referer` sent to OpenRouter.
    pub fn app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = Some(url.into());
        self
    }

    /// `X-Title` sent to OpenRouter.
    pub fn app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = Some(title.into());
        self
    }

    /// Use a custom provider instead of OpenRouter.
    ///
    /// Takes precedence over [`openrouter`](Self::openrouter).
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Share an existing cache store.
    ///
    /// Takes precedence over [`cache_config`](Self::cache_config).
    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Share an existing performance recorder.
    ///
    /// Without one, the visualizer creates its own, mirrored to the cache's
    /// persistent backend when there is one.
    pub fn recorder(mut self, recorder: Arc<PerformanceRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Base per-attempt timeout, scaled by model tier and output format.
    pub fn base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    pub fn max_prompt_chars(mut self, max: usize) -> Self {
        self.max_prompt_chars = max;
        self
    }

    /// Lifetime of cached results (default 24 hours).
    pub fn result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    /// Interval of the expired-entry sweep. Zero disables it.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Build the visualizer.
    ///
    /// The periodic sweep is started when called inside a tokio runtime.
    pub fn build(self) -> Result<Visualizer> {
        let provider: Arc<dyn CompletionProvider> = match (self.provider, self.openrouter_key) {
            (Some(provider), _) => provider,
            (None, Some(key)) => {
                let mut client = match self.base_url {
                    Some(url) => OpenRouterClient::with_base_url(key, url)?,
                    None => OpenRouterClient::new(key)?,
                };
                if let Some(url) = self.app_url {
                    client = client.app_url(url);
                }
                if let Some(title) = self.app_title {
                    client = client.app_title(title);
                }
                Arc::new(client)
            }
            (None, None) => return Err(VizgenError::MissingApiKey),
        };

        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(CacheStore::new(&self.cache_config)?),
        };

        let recorder = match self.recorder {
            Some(recorder) => recorder,
            None if cache.has_persistent() => {
                Arc::new(PerformanceRecorder::with_store(Arc::clone(&cache)))
            }
            None => Arc::new(PerformanceRecorder::new()),
        };

        let sweeper = spawn_sweeper(Arc::clone(&cache), self.sweep_interval);

        Ok(Visualizer {
            provider,
            cache,
            recorder,
            retry: self.retry,
            base_timeout: self.base_timeout,
            max_prompt_chars: self.max_prompt_chars,
            result_ttl: self.result_ttl,
            inflight: moka::future::Cache::builder()
                .max_capacity(MAX_INFLIGHT)
                .time_to_live(self.inflight_ttl)
                .build(),
            sweeper: Mutex::new(sweeper),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Default for VisualizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_an_error() {
        let err = Visualizer::builder().build().unwrap_err();
        assert!(matches!(err, VizgenError::MissingApiKey));
    }

    #[test]
    fn builds_outside_a_runtime_without_sweeper() {
        let viz = Visualizer::builder()
            .openrouter("sk-test")
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        assert!(viz.sweeper.lock().unwrap().is_none());
        assert_eq!(viz.provider.endpoint(), "http://127.0.0.1:9/chat/completions");
        assert_eq!(viz.result_ttl, DEFAULT_RESULT_TTL);
    }

    #[test]
    fn persistent_cache_gets_a_persistent_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let viz = Visualizer::builder()
            .openrouter("sk-test")
            .cache_config(CacheConfig::new().persistent_dir(dir.path()))
            .build()
            .unwrap();
        assert!(viz.cache().has_persistent());

        viz.recorder().record(crate::monitor::PerformanceSample::success(
            "u",
            Duration::from_millis(10),
        ));
        let reloaded = PerformanceRecorder::with_store(Arc::clone(viz.cache()));
        assert_eq!(reloaded.len(), 1);
    }
}
