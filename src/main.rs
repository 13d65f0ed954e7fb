use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use transcache::language::language_name;
use transcache::pipeline::{self, PipelineConfig};
use transcache::{CachedTranslator, Config};

#[derive(Parser, Debug)]
#[command(name = "transcache")]
#[command(version, about = "Translate text through a caching, batching client")]
#[command(long_about = "Translate text with Google Translate. Repeated texts are served from an in-memory cache, and failures fall back to the original text.")]
struct Cli {
    /// Texts to translate, sent as one batch
    texts: Vec<String>,

    /// Target language code (e.g., ar, fr, ja)
    #[arg(short, long)]
    to: String,

    /// Source language code; overrides the configured one
    #[arg(short, long)]
    from: Option<String>,

    /// Translate a text file line by line
    #[arg(long)]
    file: Option<PathBuf>,

    /// Output file for --file (defaults to stdout)
    #[arg(short, long, requires = "file")]
    output: Option<PathBuf>,

    /// Lines per provider request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Number of concurrent provider requests
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Prefix each line with the status of the whole batch
    #[arg(short, long, conflicts_with = "file")]
    detailed: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref from) = cli.from {
        config.source_language = from.clone();
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli);
    config
        .validate()
        .context("Configuration validation failed")?;

    let translator =
        CachedTranslator::from_config(&config).context("Failed to create translator")?;

    info!("Source:   {}", translator.source_language());
    info!("Target:   {} ({})", cli.to, language_name(&cli.to));

    if let Some(ref input) = cli.file {
        if !cli.texts.is_empty() {
            anyhow::bail!("Pass either TEXT arguments or --file, not both");
        }

        let pipeline_config = PipelineConfig {
            show_progress: !cli.no_progress,
            ..PipelineConfig::from_config(&config)
        };

        match cli.output {
            Some(ref output) => {
                let result =
                    pipeline::translate_file(&translator, input, output, &cli.to, &pipeline_config)
                        .await
                        .with_context(|| format!("Failed to translate {}", input.display()))?;
                pipeline::print_summary(&result.stats);
            }
            None => {
                let contents = tokio::fs::read_to_string(input)
                    .await
                    .with_context(|| format!("Failed to read {}", input.display()))?;
                let (lines, endings) = pipeline::split_lines(&contents);
                let result =
                    pipeline::translate_lines(&translator, lines, &cli.to, &pipeline_config)
                        .await?;
                print!("{}", pipeline::join_lines(&result.lines, &endings));
            }
        }

        return Ok(());
    }

    if cli.texts.is_empty() {
        anyhow::bail!("Nothing to translate: pass TEXT arguments or --file");
    }

    let batch = translator.translate_batch_detailed(&cli.texts, &cli.to).await;
    for text in &batch.texts {
        if cli.detailed {
            println!("[{}] {}", batch.status, text);
        } else {
            println!("{}", text);
        }
    }

    let stats = translator.cache().stats();
    info!(
        "Cache: {} entries, {} hits, {} misses",
        translator.cache().len(),
        stats.hits,
        stats.misses
    );

    Ok(())
}
