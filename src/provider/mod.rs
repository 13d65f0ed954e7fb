pub mod google;

pub use google::GoogleTranslateClient;

use crate::error::Result;
use async_trait::async_trait;

/// A remote translation backend.
///
/// Implementations return translations in the same order and of the same
/// length as their input. Errors are reported as-is; degrading to the
/// original text is the coordinator's job.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
    async fn translate_batch(&self, texts: &[String], target_lang: &str) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}
