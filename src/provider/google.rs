//! Google Cloud Translation (v2) client.

use crate::config::{Config, DEFAULT_ENDPOINT};
use crate::error::{Result, TranscacheError};
use crate::provider::TranslationProvider;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Path of the translate method relative to the endpoint.
const TRANSLATE_PATH: &str = "/language/translate/v2";

/// Longest slice of an error body kept in logs and error messages.
const MAX_ERROR_BODY: usize = 512;

/// Translator backed by the Google Translate v2 REST API.
pub struct GoogleTranslateClient {
    client: Client,
    api_key: RwLock<Option<String>>,
    endpoint: String,
}

impl GoogleTranslateClient {
    /// Create a client with the given key and request timeout.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: RwLock::new(sanitize_key(api_key)),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.api_key.clone(), config.timeout())?.with_endpoint(&config.endpoint))
    }

    /// Point the client at a different base URL (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace or remove the credential at runtime.
    pub fn set_api_key(&self, api_key: Option<String>) {
        *self.api_key.write() = sanitize_key(api_key);
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.read().is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request<Q: Serialize + Sync>(
        &self,
        query: Q,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        let api_key = self
            .api_key
            .read()
            .clone()
            .ok_or(TranscacheError::MissingApiKey)?;

        let request = TranslateRequest {
            q: query,
            target: target_lang,
            format: "text",
        };

        let url = format!("{}{}", self.endpoint, TRANSLATE_PATH);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| TranscacheError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscacheError::Http(e.without_url()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TranslateResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or_else(|| truncate(&body, MAX_ERROR_BODY).to_string());
            warn!("Translation API returned {}: {}", status, message);
            return Err(TranscacheError::Api(format!(
                "Translation API error ({}): {}",
                status, message
            )));
        }

        let parsed: TranslateResponse = serde_json::from_str(&body).map_err(|e| {
            TranscacheError::MalformedResponse(format!("Failed to parse translation response: {}", e))
        })?;

        if let Some(error) = parsed.error {
            return Err(TranscacheError::Api(error.message));
        }

        let translations = parsed
            .data
            .ok_or_else(|| TranscacheError::MalformedResponse("missing data field".to_string()))?
            .translations;

        Ok(translations.into_iter().map(|t| t.translated_text).collect())
    }
}

fn sanitize_key(api_key: Option<String>) -> Option<String> {
    api_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Serialize)]
struct TranslateRequest<'a, Q> {
    q: Q,
    target: &'a str,
    format: &'static str,
}

#[derive(Deserialize, Debug)]
struct TranslateResponse {
    data: Option<TranslationsData>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct TranslationsData {
    translations: Vec<TranslationItem>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TranslationItem {
    translated_text: String,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[async_trait]
impl TranslationProvider for GoogleTranslateClient {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        debug!("Translating 1 text to {}", target_lang);

        let mut translations = self.request(text, target_lang).await?;
        if translations.len() != 1 {
            return Err(TranscacheError::MalformedResponse(format!(
                "expected 1 translation, got {}",
                translations.len()
            )));
        }
        Ok(translations.remove(0))
    }

    async fn translate_batch(&self, texts: &[String], target_lang: &str) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Translating {} text(s) to {}", texts.len(), target_lang);

        let translations = self.request(texts, target_lang).await?;
        if translations.len() != texts.len() {
            return Err(TranscacheError::MalformedResponse(format!(
                "expected {} translations, got {}",
                texts.len(),
                translations.len()
            )));
        }
        Ok(translations)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}
