//! Language code helpers shared by the coordinator and the CLI.

use crate::error::{Result, TranscacheError};

/// Longest code accepted, enough for tags like `zh-hant-tw`.
const MAX_CODE_LEN: usize = 16;

/// Normalize a language code for comparison and cache keys.
///
/// Codes are trimmed and lowercased. Empty codes, overly long codes and
/// codes with characters outside ASCII alphanumerics, `-` and `_` are
/// rejected.
pub fn normalize_language(code: &str) -> Result<String> {
    let code = code.trim();
    if code.is_empty() {
        return Err(TranscacheError::InvalidInput(
            "language code is empty".to_string(),
        ));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(TranscacheError::InvalidInput(format!(
            "language code too long: {}",
            code
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TranscacheError::InvalidInput(format!(
            "invalid language code: {}",
            code
        )));
    }
    Ok(code.to_ascii_lowercase())
}

/// Human-readable name for a language code, used in log and CLI output.
pub fn language_name(code: &str) -> &'static str {
    let lowercase = code.trim().to_lowercase();
    match lowercase.as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" | "zh-cn" => "Chinese",
        "zh-tw" => "Chinese (Traditional)",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "uk" => "Ukrainian",
        "sv" => "Swedish",
        "el" => "Greek",
        "he" | "iw" => "Hebrew",
        "fa" => "Persian",
        _ => "the target language",
    }
}
