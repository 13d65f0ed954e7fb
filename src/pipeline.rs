use crate::config::Config;
use crate::error::{Result, TranscacheError};
use crate::translator::{BatchTranslation, CachedTranslator, TranslationStatus};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Configuration for translating many lines.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Lines per provider batch.
    pub batch_size: usize,
    /// Number of batches in flight at once.
    pub concurrency: usize,
    /// Show a progress bar.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 4,
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            ..Self::default()
        }
    }
}

/// Statistics from a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_lines: usize,
    pub total_chunks: usize,
    /// Chunks that needed at least one provider result.
    pub translated_chunks: usize,
    /// Chunks answered entirely from the cache.
    pub cached_chunks: usize,
    /// Chunks with nothing to translate.
    pub pass_through_chunks: usize,
    /// Chunks that fell back to the original text.
    pub fallback_chunks: usize,
    pub total_time: Duration,
}

impl PipelineStats {
    pub fn all_degraded(&self) -> bool {
        self.total_chunks > 0 && self.fallback_chunks == self.total_chunks
    }
}

#[derive(Debug)]
pub struct PipelineResult {
    pub lines: Vec<String>,
    pub stats: PipelineStats,
}

/// Result of translating one chunk.
struct ChunkResult {
    index: usize,
    batch: BatchTranslation,
}

/// Translate `lines` in chunks, several chunks at a time, keeping line order.
///
/// A chunk whose provider call fails keeps its original lines; other chunks
/// are unaffected.
pub async fn translate_lines(
    translator: &CachedTranslator,
    lines: Vec<String>,
    target_lang: &str,
    config: &PipelineConfig,
) -> Result<PipelineResult> {
    if config.batch_size == 0 || config.concurrency == 0 {
        return Err(TranscacheError::Config(
            "batch_size and concurrency must be greater than 0".to_string(),
        ));
    }

    let start_time = Instant::now();
    let total_lines = lines.len();

    if lines.is_empty() {
        return Ok(PipelineResult {
            lines,
            stats: PipelineStats::default(),
        });
    }

    let chunks: Vec<Vec<String>> = lines
        .chunks(config.batch_size)
        .map(|chunk| chunk.to_vec())
        .collect();
    let total_chunks = chunks.len();

    info!(
        "Translating {} lines to {} in {} chunks ({} concurrent) via {}",
        total_lines,
        target_lang,
        total_chunks,
        config.concurrency,
        translator.provider_name()
    );

    let progress_bar = if config.show_progress {
        let pb = ProgressBar::new(total_lines as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let mut futures = FuturesUnordered::new();

    for (index, chunk) in chunks.into_iter().enumerate() {
        let sem = semaphore.clone();
        let pb = progress_bar.clone();

        futures.push(async move {
            // Never closed
            let _permit = sem.acquire().await.ok();

            debug!("Starting chunk {} ({} lines)", index, chunk.len());
            let batch = translator.translate_batch_detailed(&chunk, target_lang).await;

            if let Some(ref pb) = pb {
                pb.inc(chunk.len() as u64);
            }
            if batch.status.is_degraded() {
                warn!("Chunk {} kept original text ({})", index, batch.status);
            }

            ChunkResult { index, batch }
        });
    }

    let mut results: Vec<ChunkResult> = Vec::with_capacity(total_chunks);
    while let Some(result) = futures.next().await {
        results.push(result);
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Translation complete");
    }

    results.sort_by_key(|r| r.index);

    let mut stats = PipelineStats {
        total_lines,
        total_chunks,
        ..PipelineStats::default()
    };
    let mut output = Vec::with_capacity(total_lines);

    for result in results {
        match result.batch.status {
            TranslationStatus::Translated => stats.translated_chunks += 1,
            TranslationStatus::Cached => stats.cached_chunks += 1,
            TranslationStatus::PassThrough => stats.pass_through_chunks += 1,
            TranslationStatus::FallbackOriginal | TranslationStatus::ConfigMissing => {
                stats.fallback_chunks += 1
            }
        }
        output.extend(result.batch.texts);
    }

    stats.total_time = start_time.elapsed();

    info!(
        "Translation complete: {} chunks translated, {} cached, {} fell back in {:.2}s",
        stats.translated_chunks,
        stats.cached_chunks,
        stats.fallback_chunks,
        stats.total_time.as_secs_f64()
    );

    Ok(PipelineResult {
        lines: output,
        stats,
    })
}

/// Split `contents` into lines, keeping each line's terminator.
///
/// The terminator is `"\r\n"`, `"\n"`, or empty for a last line without one.
pub fn split_lines(contents: &str) -> (Vec<String>, Vec<&str>) {
    contents
        .split_inclusive('\n')
        .map(|line| {
            if let Some(body) = line.strip_suffix("\r\n") {
                (body.to_string(), "\r\n")
            } else if let Some(body) = line.strip_suffix('\n') {
                (body.to_string(), "\n")
            } else {
                (line.to_string(), "")
            }
        })
        .unzip()
}

/// Rejoin lines with the terminators returned by [`split_lines`].
pub fn join_lines(lines: &[String], endings: &[&str]) -> String {
    let mut rendered = String::new();
    for (line, ending) in lines.iter().zip(endings) {
        rendered.push_str(line);
        rendered.push_str(ending);
    }
    rendered
}

/// Translate a UTF-8 text file line by line and write the result.
///
/// Line terminators are written back as they were read.
pub async fn translate_file(
    translator: &CachedTranslator,
    input: &Path,
    output: &Path,
    target_lang: &str,
    config: &PipelineConfig,
) -> Result<PipelineResult> {
    if !input.exists() {
        return Err(TranscacheError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file not found: {}", input.display()),
        )));
    }

    let contents = tokio::fs::read_to_string(input).await?;
    let (lines, endings) = split_lines(&contents);

    let result = translate_lines(translator, lines, target_lang, config).await?;

    tokio::fs::write(output, join_lines(&result.lines, &endings)).await?;

    info!("Wrote {} lines to {}", result.lines.len(), output.display());

    Ok(result)
}

/// Print a summary of a pipeline run.
pub fn print_summary(stats: &PipelineStats) {
    println!();
    println!("Translation summary");
    println!("  Lines:       {}", stats.total_lines);
    println!("  Chunks:      {}", stats.total_chunks);
    println!("  Translated:  {}", stats.translated_chunks);
    println!("  Cached:      {}", stats.cached_chunks);
    println!("  Unchanged:   {}", stats.pass_through_chunks);
    println!("  Fell back:   {}", stats.fallback_chunks);
    println!("  Time:        {:.2}s", stats.total_time.as_secs_f64());
}
