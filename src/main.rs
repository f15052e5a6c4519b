//! CLI entry point for `receiptbox`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use receiptbox::compose::{ComposedDocument, DocumentComposer};
use receiptbox::config::Config;
use receiptbox::export::{self, WrittenFiles};
use receiptbox::extract::metadata::MetadataExtractor;
use receiptbox::parser::eml;
use receiptbox::preview::http::HttpPreviewService;
use receiptbox::preview::{ThumbnailFetcher, ThumbnailProvider};
use receiptbox::{dedup, render};

#[derive(Parser)]
#[command(
    name = "receiptbox",
    version,
    about = "Turn forwarded invoice emails into named archive documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose and save archive documents for one or more .eml files
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory (default: config output.directory, then ".")
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show the derived code, sender, date and file name without rendering
    Inspect {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = receiptbox::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Process {
            files,
            output,
            json,
        } => cmd_process(&config, &files, output, json),
        Commands::Inspect { path, json } => cmd_inspect(&config, &path, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = receiptbox::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "receiptbox.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "receiptbox", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Compose every input message in turn, continuing past failures.
fn cmd_process(
    config: &Config,
    files: &[PathBuf],
    output: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    config.validate()?;

    let output_dir = output
        .or_else(|| config.output.directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let extractor = MetadataExtractor::from_config(&config.codes);
    let renderer = render::from_config(&config.render.command);

    let fetcher = if config.preview.enabled {
        let service = HttpPreviewService::from_config(&config.preview)?;
        Some(
            ThumbnailFetcher::new(service, config.preview.thumbnail_size)
                .with_backoff(config.preview.backoff()),
        )
    } else {
        None
    };

    let mut composer = DocumentComposer::new(&extractor, renderer.as_ref())
        .save_attachments(config.output.save_attachments);
    if let Some(ref f) = fetcher {
        composer = composer.with_thumbnails(f as &dyn ThumbnailProvider);
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Composing [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut results: Vec<(PathBuf, Result<(ComposedDocument, WrittenFiles), String>)> =
        Vec::with_capacity(files.len());

    for path in files {
        pb.set_message(path.display().to_string());
        let outcome = process_one(&composer, path, &output_dir);
        if let Err(ref e) = outcome {
            tracing::warn!(path = %path.display(), error = %e, "Failed to process message");
        }
        results.push((path.clone(), outcome.map_err(|e| format!("{e:#}"))));
        pb.inc(1);
    }
    pb.finish_and_clear();

    if json {
        print_process_json(&results)?;
    } else {
        print_process_table(&results, &output_dir);
    }

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} message(s) failed", results.len());
    }
    Ok(())
}

fn process_one(
    composer: &DocumentComposer<'_>,
    path: &Path,
    output_dir: &Path,
) -> anyhow::Result<(ComposedDocument, WrittenFiles)> {
    let message = eml::load_eml(path)?;
    let composed = composer.compose(&message)?;
    let written = export::write_composed(&composed, output_dir)?;
    Ok((composed, written))
}

/// Print what would be produced for one message.
fn cmd_inspect(config: &Config, path: &Path, json: bool) -> anyhow::Result<()> {
    let message = eml::load_eml(path)?;
    let extractor = MetadataExtractor::from_config(&config.codes);
    let renderer = render::HtmlRenderer;
    let identity = DocumentComposer::new(&extractor, &renderer).identify(&message);

    let (images, others): (Vec<_>, Vec<_>) =
        message.attachments.iter().partition(|a| a.is_image());
    let unique_images = dedup::dedupe(images.iter().copied()).len();
    let unique_files = dedup::dedupe(others.iter().copied()).len();

    if json {
        let out = serde_json::json!({
            "file": path.to_string_lossy(),
            "subject": message.subject,
            "business_code": identity.meta.business_code,
            "sender_name": identity.meta.sender_name,
            "meta_source": identity.meta_source,
            "date": identity.date.stamp(),
            "transaction_date": identity.date,
            "date_source": identity.date_source,
            "stem": identity.stem,
            "attachments": {
                "images": images.len(),
                "unique_images": unique_images,
                "files": others.len(),
                "unique_files": unique_files,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "Subject", message.subject);
    println!(
        "  {:<20} {}  ({})",
        "Business code", identity.meta.business_code, identity.meta_source
    );
    println!("  {:<20} {}", "Sender", identity.meta.sender_name);
    println!(
        "  {:<20} {}  ({})",
        "Date",
        identity.date.stamp(),
        identity.date_source
    );
    println!("  {:<20} {}", "File name", identity.stem);
    println!(
        "  {:<20} {} image(s), {} unique",
        "Inline images",
        images.len(),
        unique_images
    );
    println!(
        "  {:<20} {} file(s), {} unique",
        "Attachments",
        others.len(),
        unique_files
    );
    println!();
    Ok(())
}

type ProcessResults = [(PathBuf, Result<(ComposedDocument, WrittenFiles), String>)];

/// Print the per-message outcome as a human-readable table.
fn print_process_table(results: &ProcessResults, output_dir: &Path) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<32} {:<50} {:>10}", "Input", "Document", "Size");
    println!("  {}", "-".repeat(94));
    for (path, outcome) in results {
        let input: String = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
            .chars()
            .take(31)
            .collect();
        match outcome {
            Ok((_, written)) => {
                let doc: String = written
                    .document
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
                    .chars()
                    .take(49)
                    .collect();
                println!(
                    "  {:<32} {:<50} {:>10}",
                    input,
                    doc,
                    format_size(written.bytes_written, BINARY)
                );
                for att in &written.attachments {
                    println!("  {:<32} + {}", "", att.display());
                }
            }
            Err(e) => println!("  {:<32} FAILED: {}", input, e),
        }
    }
    println!();
    println!("  Output directory: {}", output_dir.display());
    println!();
}

/// Print the per-message outcome as JSON.
fn print_process_json(results: &ProcessResults) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = results
        .iter()
        .map(|(path, outcome)| match outcome {
            Ok((composed, written)) => serde_json::json!({
                "input": path.to_string_lossy(),
                "ok": true,
                "business_code": composed.identity.meta.business_code,
                "sender_name": composed.identity.meta.sender_name,
                "date": composed.identity.date.stamp(),
                "transaction_date": composed.identity.date,
                "stem": composed.identity.stem,
                "duplicates_dropped": composed.duplicates_dropped,
                "written": written,
            }),
            Err(e) => serde_json::json!({
                "input": path.to_string_lossy(),
                "ok": false,
                "error": e,
            }),
        })
        .collect();

    let output = serde_json::json!({
        "processed": results.len(),
        "failed": results.iter().filter(|(_, r)| r.is_err()).count(),
        "results": items,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
