//! Cache-fronted translation coordinator.
//!
//! [`CachedTranslator`] answers from the [`TranslationCache`] where it can and
//! sends only cache misses to the provider. Identical misses that are already
//! being requested are joined rather than requested again. Provider failures
//! never reach the caller: the original text comes back instead, tagged with a
//! [`TranslationStatus`] for callers that care.
//!
//! Provider requests run on spawned tokio tasks, so the coordinator must be
//! used from within a tokio runtime.

use crate::cache::TranslationCache;
use crate::config::Config;
use crate::error::{Result, TranscacheError};
use crate::language::normalize_language;
use crate::provider::{GoogleTranslateClient, TranslationProvider};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type SharedResult<T> = std::result::Result<T, Arc<TranscacheError>>;

/// Pending provider result that any number of callers can await.
type PendingTranslation = Shared<BoxFuture<'static, SharedResult<String>>>;

type PendingBatch = Shared<BoxFuture<'static, SharedResult<Arc<Vec<String>>>>>;

/// How a piece of text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    /// Fetched from the provider by this call (or a request it joined).
    Translated,
    /// Served entirely from the cache.
    Cached,
    /// Nothing to translate: empty text or target equals source language.
    PassThrough,
    /// Translation failed; the original text is returned.
    FallbackOriginal,
    /// No API key configured; the original text is returned.
    ConfigMissing,
}

impl TranslationStatus {
    /// True for the two statuses that return the original text after a failure.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            TranslationStatus::FallbackOriginal | TranslationStatus::ConfigMissing
        )
    }

    fn from_error(error: &TranscacheError) -> Self {
        if error.is_missing_credential() {
            TranslationStatus::ConfigMissing
        } else {
            TranslationStatus::FallbackOriginal
        }
    }
}

impl fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationStatus::Translated => write!(f, "translated"),
            TranslationStatus::Cached => write!(f, "cached"),
            TranslationStatus::PassThrough => write!(f, "pass-through"),
            TranslationStatus::FallbackOriginal => write!(f, "fallback"),
            TranslationStatus::ConfigMissing => write!(f, "config-missing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub status: TranslationStatus,
}

impl Translation {
    fn new(text: impl Into<String>, status: TranslationStatus) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }
}

/// Result of a batch call. `status` describes the batch as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTranslation {
    pub texts: Vec<String>,
    pub status: TranslationStatus,
}

/// Translation cache and request coordinator.
pub struct CachedTranslator {
    provider: Arc<dyn TranslationProvider>,
    cache: Arc<TranslationCache>,
    in_flight: Arc<Mutex<HashMap<String, PendingTranslation>>>,
    source_language: String,
}

impl CachedTranslator {
    /// Create a coordinator with English as the source language.
    pub fn new(provider: Arc<dyn TranslationProvider>, cache: Arc<TranslationCache>) -> Self {
        Self {
            provider,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            source_language: "en".to_string(),
        }
    }

    /// Build a Google-backed coordinator with a fresh cache from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = GoogleTranslateClient::from_config(config)?;
        if !provider.has_api_key() {
            warn!("No translation API key configured; texts will be returned untranslated");
        }
        let cache = TranslationCache::from_config(config)?;

        Self::new(Arc::new(provider), Arc::new(cache)).with_source_language(&config.source_language)
    }

    /// Set the language texts are written in. Targets equal to it pass through.
    pub fn with_source_language(mut self, language: &str) -> Result<Self> {
        self.source_language = normalize_language(language)?;
        Ok(self)
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Number of provider results currently awaited.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Translate one text, returning the original on any failure.
    pub async fn translate_text(&self, text: &str, target_lang: &str) -> String {
        self.translate_text_detailed(text, target_lang).await.text
    }

    /// Translate a list of texts, preserving order. Any failure returns the
    /// input list unchanged.
    pub async fn translate_batch(&self, texts: &[String], target_lang: &str) -> Vec<String> {
        self.translate_batch_detailed(texts, target_lang).await.texts
    }

    pub async fn translate_text_detailed(&self, text: &str, target_lang: &str) -> Translation {
        if text.is_empty() {
            return Translation::new(text, TranslationStatus::PassThrough);
        }

        let target = match normalize_language(target_lang) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping translation: {}", e);
                return Translation::new(text, TranslationStatus::FallbackOriginal);
            }
        };

        if target == self.source_language {
            return Translation::new(text, TranslationStatus::PassThrough);
        }

        let key = TranslationCache::compute_key(text, &target);
        if let Some(cached) = self.cache.get(&key) {
            debug!("Cache hit for {} ({} chars)", target, text.len());
            return Translation::new(cached, TranslationStatus::Cached);
        }

        let pending = self.pending_single(key, text, &target);
        match pending.await {
            Ok(translated) => Translation::new(translated, TranslationStatus::Translated),
            Err(e) => {
                warn!("Translation to {} failed, keeping original: {}", target, e);
                Translation::new(text, TranslationStatus::from_error(&e))
            }
        }
    }

    pub async fn translate_batch_detailed(
        &self,
        texts: &[String],
        target_lang: &str,
    ) -> BatchTranslation {
        let original = |status: TranslationStatus| BatchTranslation {
            texts: texts.to_vec(),
            status,
        };

        if texts.is_empty() {
            return original(TranslationStatus::PassThrough);
        }

        let target = match normalize_language(target_lang) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping batch translation: {}", e);
                return original(TranslationStatus::FallbackOriginal);
            }
        };

        if target == self.source_language {
            return original(TranslationStatus::PassThrough);
        }

        let mut output: Vec<Option<String>> = vec![None; texts.len()];
        let mut hits = 0usize;

        // Misses in first-seen order, each with every index that holds it
        let mut misses: Vec<Miss> = Vec::new();
        let mut miss_lookup: HashMap<&str, usize> = HashMap::new();

        for (index, text) in texts.iter().enumerate() {
            if text.is_empty() {
                output[index] = Some(String::new());
                continue;
            }

            let key = TranslationCache::compute_key(text, &target);
            if let Some(cached) = self.cache.get(&key) {
                output[index] = Some(cached);
                hits += 1;
                continue;
            }

            match miss_lookup.get(text.as_str()) {
                Some(&m) => misses[m].indices.push(index),
                None => {
                    miss_lookup.insert(text.as_str(), misses.len());
                    misses.push(Miss {
                        key,
                        text: text.clone(),
                        indices: vec![index],
                    });
                }
            }
        }

        debug!(
            "Batch of {} to {}: {} cached, {} to resolve",
            texts.len(),
            target,
            hits,
            misses.len()
        );

        if misses.is_empty() {
            let status = if hits > 0 {
                TranslationStatus::Cached
            } else {
                TranslationStatus::PassThrough
            };
            return BatchTranslation {
                texts: fill(output, texts),
                status,
            };
        }

        let (joined, requested, batch) = self.pending_batch(misses, &target);

        let batch_result = async {
            match batch {
                Some(batch) => batch.await.map(Some),
                None => Ok(None),
            }
        };
        let joined_results = future::join_all(joined.iter().map(|(_, pending)| pending.clone()));
        let (batch_result, joined_results) = future::join(batch_result, joined_results).await;

        let translations = match batch_result {
            Ok(translations) => translations,
            Err(e) => {
                warn!(
                    "Batch translation of {} text(s) to {} failed, keeping originals: {}",
                    texts.len(),
                    target,
                    e
                );
                return original(TranslationStatus::from_error(&e));
            }
        };

        if let Some(translations) = translations {
            for (miss, translated) in requested.iter().zip(translations.iter()) {
                place(&mut output, miss, translated);
            }
        }

        // A joined request failing belongs to another caller; ask again ourselves
        let mut retry = Vec::new();
        for ((miss, _), result) in joined.into_iter().zip(joined_results) {
            match result {
                Ok(translated) => place(&mut output, &miss, &translated),
                Err(e) => {
                    debug!("Joined translation to {} failed, requesting again: {}", target, e);
                    retry.push(miss);
                }
            }
        }

        if !retry.is_empty() {
            let retry_batch = {
                let mut in_flight = self.in_flight.lock();
                self.spawn_batch(&mut in_flight, &retry, &target)
            };
            match retry_batch.await {
                Ok(translations) => {
                    for (miss, translated) in retry.iter().zip(translations.iter()) {
                        place(&mut output, miss, translated);
                    }
                }
                Err(e) => {
                    warn!(
                        "Batch translation of {} text(s) to {} failed, keeping originals: {}",
                        texts.len(),
                        target,
                        e
                    );
                    return original(TranslationStatus::from_error(&e));
                }
            }
        }

        BatchTranslation {
            texts: fill(output, texts),
            status: TranslationStatus::Translated,
        }
    }

    /// Join the request already in flight for `key`, or start one.
    ///
    /// The request runs on its own task, so it completes, fills the cache and
    /// leaves the in-flight map even if every caller stops waiting.
    fn pending_single(&self, key: String, text: &str, target: &str) -> PendingTranslation {
        let mut in_flight = self.in_flight.lock();
        if let Some(pending) = in_flight.get(&key) {
            debug!("Joining in-flight translation to {}", target);
            return pending.clone();
        }

        let provider = self.provider.clone();
        let cache = self.cache.clone();
        let registry = self.in_flight.clone();
        let text = text.to_string();
        let target = target.to_string();
        let request_key = key.clone();

        // Spawned under the map lock: the task's removal waits for our insert
        let task = tokio::spawn(async move {
            let result = provider.translate(&text, &target).await;
            if let Ok(ref translated) = result {
                cache.insert(request_key.clone(), translated.clone());
            }
            registry.lock().remove(&request_key);
            result.map_err(Arc::new)
        });

        let pending = settle(task, self.in_flight.clone(), vec![key.clone()])
            .boxed()
            .shared();

        in_flight.insert(key, pending.clone());
        pending
    }

    /// Split misses into those already in flight and those to request, and
    /// start one batch request for the latter.
    fn pending_batch(
        &self,
        misses: Vec<Miss>,
        target: &str,
    ) -> (Vec<(Miss, PendingTranslation)>, Vec<Miss>, Option<PendingBatch>) {
        let mut in_flight = self.in_flight.lock();

        let mut joined = Vec::new();
        let mut requested = Vec::new();
        for miss in misses {
            match in_flight.get(&miss.key) {
                Some(pending) => {
                    let pending = pending.clone();
                    joined.push((miss, pending));
                }
                None => requested.push(miss),
            }
        }

        if requested.is_empty() {
            return (joined, requested, None);
        }

        let batch = self.spawn_batch(&mut in_flight, &requested, target);
        (joined, requested, Some(batch))
    }

    /// Start one batch request for `misses` on its own task.
    ///
    /// Keys not already in flight are registered so concurrent callers join
    /// this request; the task removes exactly those keys when it settles.
    fn spawn_batch(
        &self,
        in_flight: &mut HashMap<String, PendingTranslation>,
        misses: &[Miss],
        target: &str,
    ) -> PendingBatch {
        let provider = self.provider.clone();
        let cache = self.cache.clone();
        let registry = self.in_flight.clone();
        let request_texts: Vec<String> = misses.iter().map(|m| m.text.clone()).collect();
        let request_keys: Vec<String> = misses.iter().map(|m| m.key.clone()).collect();
        let owned: Vec<(usize, String)> = misses
            .iter()
            .enumerate()
            .filter(|(_, m)| !in_flight.contains_key(&m.key))
            .map(|(position, m)| (position, m.key.clone()))
            .collect();
        let owned_keys: Vec<String> = owned.iter().map(|(_, key)| key.clone()).collect();
        let task_keys = owned_keys.clone();
        let target = target.to_string();

        let task = tokio::spawn(async move {
            let result = provider
                .translate_batch(&request_texts, &target)
                .await
                .and_then(|translations| {
                    if translations.len() == request_texts.len() {
                        Ok(translations)
                    } else {
                        Err(TranscacheError::MalformedResponse(format!(
                            "{} returned {} translations for {} texts",
                            provider.name(),
                            translations.len(),
                            request_texts.len()
                        )))
                    }
                });

            if let Ok(ref translations) = result {
                for (key, translated) in request_keys.iter().zip(translations) {
                    cache.insert(key.clone(), translated.clone());
                }
            }

            {
                let mut registry = registry.lock();
                for key in &task_keys {
                    registry.remove(key);
                }
            }

            result.map(Arc::new).map_err(Arc::new)
        });

        let batch: PendingBatch = settle(task, self.in_flight.clone(), owned_keys)
            .boxed()
            .shared();

        for (position, key) in owned {
            let item = batch
                .clone()
                .map(move |result| {
                    result.and_then(|translations| {
                        translations.get(position).cloned().ok_or_else(|| {
                            Arc::new(TranscacheError::MalformedResponse(
                                "translation missing from batch".to_string(),
                            ))
                        })
                    })
                })
                .boxed()
                .shared();
            in_flight.insert(key, item);
        }

        batch
    }
}

/// Await a spawned request. If the task died without settling, drop its
/// in-flight keys so later callers start afresh.
async fn settle<T>(
    task: JoinHandle<SharedResult<T>>,
    registry: Arc<Mutex<HashMap<String, PendingTranslation>>>,
    keys: Vec<String>,
) -> SharedResult<T> {
    match task.await {
        Ok(result) => result,
        Err(e) => {
            let mut registry = registry.lock();
            for key in &keys {
                registry.remove(key);
            }
            Err(Arc::new(TranscacheError::Task(e.to_string())))
        }
    }
}

fn place(output: &mut [Option<String>], miss: &Miss, translated: &str) {
    for &index in &miss.indices {
        output[index] = Some(translated.to_string());
    }
}

/// One distinct uncached text within a batch.
struct Miss {
    key: String,
    text: String,
    indices: Vec<usize>,
}

fn fill(output: Vec<Option<String>>, originals: &[String]) -> Vec<String> {
    output
        .into_iter()
        .zip(originals)
        .map(|(translated, original)| translated.unwrap_or_else(|| original.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Copy, PartialEq)]
    enum Failure {
        None,
        Api,
        MissingKey,
        ShortBatch,
        SingleOnly,
        Text(&'static str),
    }

    /// Mock provider for testing.
    struct MockProvider {
        single_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        batches: Mutex<Vec<Vec<String>>>,
        failure: Failure,
        delay: Duration,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                single_calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
                failure: Failure::None,
                delay: Duration::from_millis(0),
            }
        }

        fn failing(failure: Failure) -> Self {
            Self {
                failure,
                ..Self::new()
            }
        }

        fn slow() -> Self {
            Self {
                delay: Duration::from_millis(30),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.single_calls.load(Ordering::SeqCst) + self.batch_calls.load(Ordering::SeqCst)
        }

        fn render(text: &str, target: &str) -> String {
            format!("{}:{}", target, text)
        }

        fn check(&self) -> Result<()> {
            match self.failure {
                Failure::Api => Err(TranscacheError::Api("Mock error".to_string())),
                Failure::MissingKey => Err(TranscacheError::MissingApiKey),
                _ => Ok(()),
            }
        }

        fn check_text(&self, text: &str) -> Result<()> {
            match self.failure {
                Failure::Text(bad) if text == bad => {
                    Err(TranscacheError::Api(format!("Mock error for {}", bad)))
                }
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TranslationProvider for MockProvider {
        async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.check()?;
            self.check_text(text)?;
            if self.failure == Failure::SingleOnly {
                return Err(TranscacheError::Api("Mock single error".to_string()));
            }
            Ok(Self::render(text, target_lang))
        }

        async fn translate_batch(&self, texts: &[String], target_lang: &str) -> Result<Vec<String>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().push(texts.to_vec());
            tokio::time::sleep(self.delay).await;
            self.check()?;
            for text in texts {
                self.check_text(text)?;
            }
            let mut out: Vec<String> = texts.iter().map(|t| Self::render(t, target_lang)).collect();
            if self.failure == Failure::ShortBatch {
                out.pop();
            }
            Ok(out)
        }

        fn name(&self) -> &'static str {
            "Mock"
        }
    }

    fn setup(provider: MockProvider) -> (CachedTranslator, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let cache = Arc::new(TranslationCache::new(64, None).unwrap());
        (CachedTranslator::new(provider.clone(), cache), provider)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_identity_for_source_language() {
        let (translator, provider) = setup(MockProvider::new());

        let result = translator.translate_text_detailed("Hello", "en").await;
        assert_eq!(result.text, "Hello");
        assert_eq!(result.status, TranslationStatus::PassThrough);

        let texts = strings(&["Hello", "World"]);
        assert_eq!(translator.translate_batch(&texts, "EN").await, texts);

        assert_eq!(provider.calls(), 0);
        assert!(translator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_custom_source_language() {
        let (translator, provider) = setup(MockProvider::new());
        let translator = translator.with_source_language("FR").unwrap();
        assert_eq!(translator.source_language(), "fr");

        assert_eq!(translator.translate_text("Bonjour", "fr").await, "Bonjour");
        assert_eq!(translator.translate_text("Bonjour", "en").await, "en:Bonjour");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_passes_through() {
        let (translator, provider) = setup(MockProvider::new());
        let result = translator.translate_text_detailed("", "ar").await;
        assert_eq!(result.text, "");
        assert_eq!(result.status, TranslationStatus::PassThrough);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let (translator, provider) = setup(MockProvider::new());

        let first = translator.translate_text_detailed("Hello", "es").await;
        let second = translator.translate_text_detailed("Hello", "es").await;

        assert_eq!(first.text, "es:Hello");
        assert_eq!(first.status, TranslationStatus::Translated);
        assert_eq!(second.text, "es:Hello");
        assert_eq!(second.status, TranslationStatus::Cached);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 1);
        assert_eq!(translator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_single_failure_returns_original() {
        let (translator, _provider) = setup(MockProvider::failing(Failure::Api));

        let result = translator.translate_text_detailed("Hello", "ar").await;
        assert_eq!(result.text, "Hello");
        assert_eq!(result.status, TranslationStatus::FallbackOriginal);
        assert!(result.status.is_degraded());
        assert!(translator.cache().is_empty());
        assert_eq!(translator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_reports_config_missing() {
        let (translator, _provider) = setup(MockProvider::failing(Failure::MissingKey));

        let single = translator.translate_text_detailed("Hello", "ar").await;
        assert_eq!(single.status, TranslationStatus::ConfigMissing);

        let texts = strings(&["a", "b"]);
        let batch = translator.translate_batch_detailed(&texts, "ar").await;
        assert_eq!(batch.texts, texts);
        assert_eq!(batch.status, TranslationStatus::ConfigMissing);
    }

    #[tokio::test]
    async fn test_invalid_target_falls_back_without_call() {
        let (translator, provider) = setup(MockProvider::new());

        let result = translator.translate_text_detailed("Hello", "a r").await;
        assert_eq!(result.text, "Hello");
        assert_eq!(result.status, TranslationStatus::FallbackOriginal);

        let texts = strings(&["Hello"]);
        let batch = translator.translate_batch_detailed(&texts, "").await;
        assert_eq!(batch.texts, texts);
        assert_eq!(batch.status, TranslationStatus::FallbackOriginal);

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_with_mixed_hits() {
        let (translator, provider) = setup(MockProvider::new());
        translator.translate_text("two", "de").await;
        translator.translate_text("four", "de").await;

        let texts = strings(&["one", "two", "three", "four", "five"]);
        let result = translator.translate_batch(&texts, "de").await;

        assert_eq!(result.len(), texts.len());
        for (translated, original) in result.iter().zip(&texts) {
            assert_eq!(translated, &format!("de:{}", original));
        }
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            provider.batches.lock()[0],
            strings(&["one", "three", "five"])
        );
    }

    #[tokio::test]
    async fn test_partial_cache_warm_requests_only_misses() {
        let (translator, provider) = setup(MockProvider::new());
        let cache = translator.cache().clone();
        cache.insert(TranslationCache::compute_key("A", "ja"), "cached-A".to_string());
        cache.insert(TranslationCache::compute_key("C", "ja"), "cached-C".to_string());

        let result = translator
            .translate_batch_detailed(&strings(&["A", "B", "C"]), "ja")
            .await;

        assert_eq!(result.texts, strings(&["cached-A", "ja:B", "cached-C"]));
        assert_eq!(result.status, TranslationStatus::Translated);
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.batches.lock()[0], strings(&["B"]));
        assert_eq!(
            cache.get(&TranslationCache::compute_key("B", "ja")),
            Some("ja:B".to_string())
        );
    }

    #[tokio::test]
    async fn test_fully_cached_batch_makes_no_call() {
        let (translator, provider) = setup(MockProvider::new());
        let texts = strings(&["x", "y"]);
        translator.translate_batch(&texts, "it").await;

        let again = translator.translate_batch_detailed(&texts, "it").await;
        assert_eq!(again.texts, strings(&["it:x", "it:y"]));
        assert_eq!(again.status, TranslationStatus::Cached);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_failure_returns_input_unchanged() {
        let (translator, _provider) = setup(MockProvider::failing(Failure::Api));
        translator
            .cache()
            .insert(TranslationCache::compute_key("A", "ko"), "cached-A".to_string());

        let texts = strings(&["A", "B", "C"]);
        let result = translator.translate_batch_detailed(&texts, "ko").await;

        assert_eq!(result.texts, texts);
        assert_eq!(result.status, TranslationStatus::FallbackOriginal);
        assert_eq!(translator.cache().len(), 1);
        assert_eq!(translator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_length_mismatch_is_failure() {
        let (translator, _provider) = setup(MockProvider::failing(Failure::ShortBatch));

        let texts = strings(&["A", "B"]);
        let result = translator.translate_batch_detailed(&texts, "pt").await;

        assert_eq!(result.texts, texts);
        assert_eq!(result.status, TranslationStatus::FallbackOriginal);
        assert!(translator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_batch_dedupes_and_keeps_empty_strings() {
        let (translator, provider) = setup(MockProvider::new());

        let texts = strings(&["A", "", "B", "A"]);
        let result = translator.translate_batch(&texts, "nl").await;

        assert_eq!(result, strings(&["nl:A", "", "nl:B", "nl:A"]));
        assert_eq!(provider.batches.lock()[0], strings(&["A", "B"]));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (translator, provider) = setup(MockProvider::new());
        let result = translator.translate_batch_detailed(&[], "ar").await;
        assert!(result.texts.is_empty());
        assert_eq!(result.status, TranslationStatus::PassThrough);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_coalesce() {
        let (translator, provider) = setup(MockProvider::slow());

        let (a, b, c) = tokio::join!(
            translator.translate_text("Hello", "fr"),
            translator.translate_text("Hello", "fr"),
            translator.translate_text("Hello", "FR"),
        );

        assert_eq!(a, "fr:Hello");
        assert_eq!(b, "fr:Hello");
        assert_eq!(c, "fr:Hello");
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 1);
        assert_eq!(translator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_single_joins_in_flight_batch() {
        let (translator, provider) = setup(MockProvider::slow());
        let texts = strings(&["A", "B"]);

        let (batch, single) = tokio::join!(
            translator.translate_batch(&texts, "sv"),
            translator.translate_text_detailed("B", "sv"),
        );

        assert_eq!(batch, strings(&["sv:A", "sv:B"]));
        assert_eq!(single.text, "sv:B");
        assert_eq!(single.status, TranslationStatus::Translated);
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_joins_in_flight_single() {
        let (translator, provider) = setup(MockProvider::slow());
        let texts = strings(&["A", "B"]);

        let (single, batch) = tokio::join!(
            translator.translate_text("A", "pl"),
            translator.translate_batch(&texts, "pl"),
        );

        assert_eq!(single, "pl:A");
        assert_eq!(batch, strings(&["pl:A", "pl:B"]));
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.batches.lock()[0], strings(&["B"]));
    }

    #[tokio::test]
    async fn test_batch_falls_back_when_own_request_fails() {
        let (translator, provider) = setup(MockProvider {
            delay: Duration::from_millis(30),
            failure: Failure::Api,
            ..MockProvider::new()
        });
        let texts = strings(&["A", "B"]);

        let (single, batch) = tokio::join!(
            translator.translate_text("A", "tr"),
            translator.translate_batch_detailed(&texts, "tr"),
        );

        assert_eq!(single, "A");
        assert_eq!(batch.texts, texts);
        assert_eq!(batch.status, TranslationStatus::FallbackOriginal);
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(translator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_falls_back_when_retry_fails() {
        let (translator, provider) = setup(MockProvider {
            delay: Duration::from_millis(30),
            failure: Failure::Text("FAIL"),
            ..MockProvider::new()
        });
        let texts = strings(&["FAIL", "B"]);

        let (single, batch) = tokio::join!(
            translator.translate_text("FAIL", "tr"),
            translator.translate_batch_detailed(&texts, "tr"),
        );

        assert_eq!(single, "FAIL");
        assert_eq!(batch.texts, texts);
        assert_eq!(batch.status, TranslationStatus::FallbackOriginal);

        let batches = provider.batches.lock().clone();
        assert_eq!(batches, vec![strings(&["B"]), strings(&["FAIL"])]);
        assert_eq!(translator.in_flight_count(), 0);
        // The successful part of the batch is still cached
        assert_eq!(translator.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_joined_request_is_retried_by_batch() {
        let (translator, provider) = setup(MockProvider {
            delay: Duration::from_millis(30),
            failure: Failure::SingleOnly,
            ..MockProvider::new()
        });
        let texts = strings(&["A", "B"]);

        let (single, batch) = tokio::join!(
            translator.translate_text_detailed("A", "tr"),
            translator.translate_batch_detailed(&texts, "tr"),
        );

        assert_eq!(single.text, "A");
        assert_eq!(single.status, TranslationStatus::FallbackOriginal);
        assert_eq!(batch.texts, strings(&["tr:A", "tr:B"]));
        assert_eq!(batch.status, TranslationStatus::Translated);

        let batches = provider.batches.lock().clone();
        assert_eq!(batches, vec![strings(&["B"]), strings(&["A"])]);
        assert_eq!(translator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_single_request_still_completes() {
        let (translator, provider) = setup(MockProvider::slow());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            translator.translate_text("Hello", "fr"),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(translator.in_flight_count(), 0);
        assert_eq!(translator.cache().len(), 1);

        let again = translator.translate_text_detailed("Hello", "fr").await;
        assert_eq!(again.text, "fr:Hello");
        assert_eq!(again.status, TranslationStatus::Cached);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_batch_request_still_completes() {
        let (translator, provider) = setup(MockProvider::slow());
        let texts = strings(&["A", "B"]);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            translator.translate_batch(&texts, "de"),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(translator.in_flight_count(), 0);
        assert_eq!(translator.cache().len(), 2);

        let again = translator.translate_batch_detailed(&texts, "de").await;
        assert_eq!(again.texts, strings(&["de:A", "de:B"]));
        assert_eq!(again.status, TranslationStatus::Cached);
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TranslationStatus::Translated.to_string(), "translated");
        assert_eq!(TranslationStatus::ConfigMissing.to_string(), "config-missing");
        assert!(!TranslationStatus::Cached.is_degraded());
    }
}
