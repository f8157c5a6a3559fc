//! Visualizer - cache-backed, retrying orchestration of visualization requests

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::VisualizerBuilder;
use crate::cache::{CacheOptions, CacheStore, Storage, result_key};
use crate::extract::extract;
use crate::monitor::{PerformanceRecorder, PerformanceSample, PerformanceStats};
use crate::providers::CompletionProvider;
use crate::providers::retry::{RetryConfig, with_retry};
use crate::telemetry;
use crate::types::{ChatRequest, ModelConfig, OutputFormat, VisualizationRequest};
use crate::{Result, VizgenError};

/// Turns text into SVG or HTML visualization code.
///
/// Results are cached per (prompt, model, format); concurrent identical
/// requests share one upstream call. Build with [`Visualizer::builder`].
///
/// Reads and writes that touch a persistent cache directory run on tokio's
/// blocking pool, so they never stall the async worker threads.
pub struct Visualizer {
    pub(super) provider: Arc<dyn CompletionProvider>,
    pub(super) cache: Arc<CacheStore>,
    pub(super) recorder: Arc<PerformanceRecorder>,
    pub(super) retry: RetryConfig,
    pub(super) base_timeout: Duration,
    pub(super) max_prompt_chars: usize,
    pub(super) result_ttl: Duration,
    pub(super) inflight: moka::future::Cache<String, String>,
    pub(super) sweeper: Mutex<Option<JoinHandle<()>>>,
    pub(super) shut_down: AtomicBool,
}

impl Visualizer {
    pub fn builder() -> VisualizerBuilder {
        VisualizerBuilder::new()
    }

    /// Generate visualization code for `request`.
    ///
    /// Returns the cached result when one exists. Otherwise calls the
    /// provider (retrying transient failures), extracts the code block from
    /// the response, and caches it.
    #[instrument(skip_all, fields(model = %request.model, format = %request.format))]
    pub async fn generate(&self, request: &VisualizationRequest) -> Result<String> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(VizgenError::ShutDown);
        }
        request.validate(self.max_prompt_chars)?;

        let key = result_key(&request.prompt, &request.model, request.format);
        let cached = {
            let cache = Arc::clone(&self.cache);
            let key = key.clone();
            storage_io(self.cache.has_persistent(), move || {
                cache.get::<String>(&key, Storage::All)
            })
            .await
            .flatten()
        };
        if let Some(code) = cached {
            debug!(key = %key, "serving visualization from cache");
            return Ok(code);
        }

        let leader = AtomicBool::new(false);
        let result = self
            .inflight
            .try_get_with(key.clone(), async {
                leader.store(true, Ordering::Relaxed);
                self.fetch(request, &key).await
            })
            .await;

        if leader.load(Ordering::Relaxed) {
            self.inflight.invalidate(&key).await;
        } else {
            metrics::counter!(telemetry::COALESCED_TOTAL).increment(1);
            debug!(key = %key, "joined in-flight request");
        }

        result.map_err(|e| (*e).clone())
    }

    /// Shorthand for [`generate`](Self::generate).
    pub async fn generate_visualization(
        &self,
        prompt: &str,
        model: &str,
        format: OutputFormat,
    ) -> Result<String> {
        self.generate(&VisualizationRequest::new(prompt, model, format))
            .await
    }

    async fn fetch(&self, request: &VisualizationRequest, key: &str) -> Result<String> {
        let config = ModelConfig::for_model(&request.model);
        let chat = ChatRequest::for_visualization(&config, &request.prompt, request.format);
        let timeout = config.timeout(self.base_timeout, request.format);
        let started = Instant::now();

        let content = with_retry(&self.retry, self.provider.name(), "complete", || {
            self.attempt(&chat, timeout, request.format)
        })
        .await?;

        let extracted = extract(&content, request.format);
        if !extracted.fenced {
            metrics::counter!(telemetry::EXTRACTION_FALLBACK_TOTAL,
                "format" => request.format.as_str(),
            )
            .increment(1);
            debug!("no fenced code block in response, using full text");
        }
        let code = extracted.code.to_string();

        {
            let cache = Arc::clone(&self.cache);
            let key = key.to_owned();
            let code = code.clone();
            let options = CacheOptions::new()
                .ttl(self.result_ttl)
                .storage(Storage::All);
            storage_io(self.cache.has_persistent(), move || {
                cache.set(&key, &code, options)
            })
            .await;
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = code.len(),
            "visualization generated"
        );
        Ok(code)
    }

    /// One upstream call under the per-attempt deadline, recorded and
    /// counted whatever the outcome.
    async fn attempt(
        &self,
        chat: &ChatRequest,
        timeout: Duration,
        format: OutputFormat,
    ) -> Result<String> {
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, self.provider.complete(chat)).await {
            Ok(result) => result,
            Err(_) => Err(VizgenError::Timeout),
        };
        let elapsed = start.elapsed();

        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => self.provider.name().to_owned(),
            "format" => format.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => self.provider.name().to_owned(),
            "format" => format.as_str(),
        )
        .record(elapsed.as_secs_f64());

        let sample = match &result {
            Ok(_) => PerformanceSample::success(self.provider.endpoint(), elapsed),
            Err(e) => {
                if let VizgenError::Network { detail } = e {
                    debug!(detail = %detail, "network failure detail");
                }
                PerformanceSample::failure(self.provider.endpoint(), elapsed, e.to_string())
            }
        };
        let recorder = Arc::clone(&self.recorder);
        storage_io(self.recorder.is_persistent(), move || recorder.record(sample)).await;

        result
    }

    /// The cache store backing this visualizer.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn recorder(&self) -> &Arc<PerformanceRecorder> {
        &self.recorder
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        self.recorder.stats()
    }

    /// Stop the periodic sweep and refuse further requests.
    ///
    /// Requests already running are not interrupted.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.take_sweeper() {
            handle.abort();
        }
        debug!("visualizer shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn take_sweeper(&self) -> Option<JoinHandle<()>> {
        self.sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        if let Some(handle) = self.take_sweeper() {
            handle.abort();
        }
    }
}

impl fmt::Debug for Visualizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visualizer")
            .field("provider", &self.provider.name())
            .field("retry", &self.retry)
            .field("base_timeout", &self.base_timeout)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Run a cache or recorder operation, moving it to the blocking pool when it
/// touches the persistent backend. `None` only if the blocking task panicked.
async fn storage_io<T, F>(persistent: bool, op: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    if !persistent {
        return Some(op());
    }
    match tokio::task::spawn_blocking(op).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "storage task failed");
            None
        }
    }
}

/// Spawn the periodic expired-entry sweep on the current runtime.
///
/// Returns `None` when `interval` is zero or no runtime is running.
pub(super) fn spawn_sweeper(cache: Arc<CacheStore>, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("no tokio runtime, periodic cache sweep disabled");
        return None;
    };
    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.sweep_expired();
            debug!(removed, "periodic cache sweep");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Provider answering from a script, one entry per call.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<String>>>,
        calls: AtomicU32,
        delay: Duration,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn endpoint(&self) -> &str {
            "mock://chat/completions"
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("```svg\n<svg/>\n```".to_string()))
        }
    }

    fn visualizer(provider: Arc<ScriptedProvider>) -> Visualizer {
        Visualizer::builder()
            .provider(provider)
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_backoff() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(VizgenError::Server { status: 502 }),
            Err(VizgenError::Timeout),
            Ok("```svg\n<svg id=\"third\"/>\n```".into()),
        ]));
        let viz = visualizer(Arc::clone(&provider));

        let start = Instant::now();
        let code = viz
            .generate_visualization("q3 revenue", "x-ai/grok-4", OutputFormat::Svg)
            .await
            .unwrap();

        assert_eq!(code, "<svg id=\"third\"/>");
        assert_eq!(provider.calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(3000));

        let stats = viz.performance_stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.recent_errors.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(VizgenError::Timeout),
            Err(VizgenError::Timeout),
            Err(VizgenError::Server { status: 500 }),
            Ok("never reached".into()),
        ]));
        let viz = visualizer(Arc::clone(&provider));

        let err = viz
            .generate_visualization("text", "m", OutputFormat::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, VizgenError::Server { status: 500 }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_is_not_retried_or_cached() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            VizgenError::Authentication,
        )]));
        let viz = visualizer(Arc::clone(&provider));

        let err = viz
            .generate_visualization("text", "m", OutputFormat::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, VizgenError::Authentication));
        assert_eq!(provider.calls(), 1);

        // The failure was not cached: the next call goes upstream again.
        let code = viz
            .generate_visualization("text", "m", OutputFormat::Svg)
            .await
            .unwrap();
        assert_eq!(code, "<svg/>");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_per_model_tier() {
        // Fast tier and svg: 30s deadline, provider takes 40s.
        let provider = Arc::new(
            ScriptedProvider::new(vec![]).delayed(Duration::from_secs(40)),
        );
        let viz = Visualizer::builder()
            .provider(Arc::clone(&provider) as Arc<dyn CompletionProvider>)
            .retry(RetryConfig::disabled())
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap();

        let err = viz
            .generate_visualization("text", "deepseek/deepseek-chat-v3-0324", OutputFormat::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, VizgenError::Timeout));

        // Reasoning tier and html: 90s deadline, so the same provider succeeds.
        let code = viz
            .generate_visualization("text", "x-ai/grok-4", OutputFormat::Html)
            .await
            .unwrap();
        assert_eq!(code, "```svg\n<svg/>\n```");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_requests_share_one_call() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![]).delayed(Duration::from_millis(500)),
        );
        let viz = visualizer(Arc::clone(&provider));

        let request = VisualizationRequest::new("same text", "x-ai/grok-4", OutputFormat::Svg);
        let (a, b, c) = tokio::join!(
            viz.generate(&request),
            viz.generate(&request),
            viz.generate(&request)
        );

        assert_eq!(a.unwrap(), "<svg/>");
        assert_eq!(b.unwrap(), "<svg/>");
        assert_eq!(c.unwrap(), "<svg/>");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_provider() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let viz = Visualizer::builder()
            .provider(Arc::clone(&provider) as Arc<dyn CompletionProvider>)
            .max_prompt_chars(10)
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap();

        let err = viz
            .generate_visualization("   ", "m", OutputFormat::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, VizgenError::EmptyPrompt));

        let err = viz
            .generate_visualization("this is far too long", "m", OutputFormat::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, VizgenError::InputTooLong { len: 20, max: 10 }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_requests() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let viz = Visualizer::builder()
            .provider(Arc::clone(&provider) as Arc<dyn CompletionProvider>)
            .build()
            .unwrap();
        assert!(viz.sweeper.lock().unwrap().is_some());

        viz.shutdown();
        viz.shutdown();

        assert!(viz.is_shut_down());
        assert!(viz.sweeper.lock().unwrap().is_none());
        let err = viz
            .generate_visualization("text", "m", OutputFormat::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, VizgenError::ShutDown));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sweep_removes_expired_entries() {
        let cache = Arc::new(CacheStore::in_memory(10));
        cache.set(
            "stale",
            "x",
            CacheOptions::new().ttl(Duration::from_millis(1)),
        );
        let handle = spawn_sweeper(Arc::clone(&cache), Duration::from_secs(60)).unwrap();

        // Entry timestamps use the wall clock, so let it move past the TTL.
        std::thread::sleep(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert_eq!(cache.stats().memory_entries, 0);
        handle.abort();
    }

    #[tokio::test]
    async fn huge_base_timeout_still_generates() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let viz = Visualizer::builder()
            .provider(Arc::clone(&provider) as Arc<dyn CompletionProvider>)
            .base_timeout(Duration::from_secs(u64::MAX / 2))
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap();

        let code = viz
            .generate_visualization("text", "x-ai/grok-4", OutputFormat::Html)
            .await
            .unwrap();
        // The fence is tagged svg, so an html request gets the full text.
        assert_eq!(code, "```svg\n<svg/>\n```");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn orphaned_inflight_value_expires() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut builder = Visualizer::builder()
            .provider(Arc::clone(&provider) as Arc<dyn CompletionProvider>)
            .sweep_interval(Duration::ZERO);
        builder.inflight_ttl = Duration::from_millis(50);
        let viz = builder.build().unwrap();

        // A leader cancelled between settling and invalidating leaves its
        // value behind.
        let key = result_key("text", "x-ai/grok-4", OutputFormat::Svg);
        viz.inflight
            .insert(key, "<svg id=\"stale\"/>".to_string())
            .await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        let code = viz
            .generate_visualization("text", "x-ai/grok-4", OutputFormat::Svg)
            .await
            .unwrap();
        assert_eq!(code, "<svg/>");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn persistent_writes_complete_before_generate_returns() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let viz = Visualizer::builder()
            .provider(Arc::clone(&provider) as Arc<dyn CompletionProvider>)
            .cache_config(crate::cache::CacheConfig::new().persistent_dir(dir.path()))
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap();
        assert!(viz.recorder().is_persistent());

        viz.generate_visualization("text", "x-ai/grok-4", OutputFormat::Svg)
            .await
            .unwrap();

        let reopened = CacheStore::new(
            &crate::cache::CacheConfig::new().persistent_dir(dir.path()),
        )
        .unwrap();
        let key = result_key("text", "x-ai/grok-4", OutputFormat::Svg);
        assert_eq!(
            reopened.get::<String>(&key, Storage::Persistent).as_deref(),
            Some("<svg/>")
        );
        let recorder = PerformanceRecorder::with_store(Arc::new(reopened));
        assert_eq!(recorder.len(), 1);

        // Served from the persistent cache through the blocking pool.
        viz.generate_visualization("text", "x-ai/grok-4", OutputFormat::Svg)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn no_runtime_means_no_sweeper() {
        let cache = Arc::new(CacheStore::in_memory(10));
        assert!(spawn_sweeper(cache, Duration::from_secs(60)).is_none());
    }
}
