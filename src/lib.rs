pub mod cache;
pub mod config;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod provider;
pub mod translator;

pub use cache::{CacheStats, TranslationCache};
pub use config::Config;
pub use error::{Result, TranscacheError};
pub use pipeline::{translate_file, translate_lines, PipelineConfig, PipelineResult, PipelineStats};
pub use provider::{GoogleTranslateClient, TranslationProvider};
pub use translator::{BatchTranslation, CachedTranslator, Translation, TranslationStatus};
