//! Main entry point for the tarpick CLI application.
//!
//! `rip` streams archives from a remote host (or a local mirror) and extracts
//! the members named by metadata files; `filter` prepares those metadata
//! files from larger CSV dumps.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tarpick::cli::{Command, FilterArgs, RipArgs};
use tarpick::{ArchiveSource, Cli, HttpArchiveSource, LocalArchiveSource, PhraseFilter, Ripper, RunSummary};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match &cli.command {
        Command::Rip(args) => rip(args, &cli),
        Command::Filter(args) => filter(args, &cli),
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` is honoured; `-v` adds `tarpick=debug`, `-q` drops progress
/// lines and `-qq` keeps errors only.
fn init_logging(cli: &Cli) -> Result<()> {
    let directive = if cli.verbose {
        "tarpick=debug"
    } else if cli.is_very_quiet() {
        "tarpick=error"
    } else if cli.is_quiet() {
        "tarpick=warn"
    } else {
        "tarpick=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn rip(args: &RipArgs, cli: &Cli) -> Result<()> {
    let config = args.config();

    if let Some(root) = &args.archive_root {
        let ripper = Ripper::new(config, LocalArchiveSource::new(root));
        let summary = run(&ripper)?;
        print_summary(&summary, &ripper.config().output_dir, cli);
        return Ok(());
    }

    // clap guarantees one of the two transports
    let base_url = args
        .base_url
        .clone()
        .context("either --base-url or --archive-root is required")?;
    let source = HttpArchiveSource::new(base_url, args.token.clone())
        .context("remote mode needs a token (--token or HF_TOKEN)")?;

    let ripper = Ripper::new(config, source);
    let summary = run(&ripper)?;
    print_summary(&summary, &ripper.config().output_dir, cli);

    // Display network transfer statistics for HTTP sources
    if !cli.is_quiet() {
        let transferred = ripper.source().transferred_bytes();
        eprintln!("Total bytes transferred: {}", format_size(transferred));
    }

    Ok(())
}

fn run<S: ArchiveSource>(ripper: &Ripper<S>) -> Result<RunSummary> {
    ripper.run().with_context(|| {
        format!(
            "run over {} aborted",
            ripper.config().metadata_dir.display()
        )
    })
}

fn print_summary(summary: &RunSummary, output_dir: &std::path::Path, cli: &Cli) {
    if cli.is_very_quiet() {
        return;
    }
    println!("\nProcessing complete!");
    println!("{summary}");
    println!("Written bytes: {}", format_size(summary.bytes_written));
    println!("Downloaded files saved in: {}", output_dir.display());
}

fn filter(args: &FilterArgs, cli: &Cli) -> Result<()> {
    let config = args.config();
    let output_dir = config.output_dir.clone();
    let summary = PhraseFilter::new(config)
        .run()
        .with_context(|| format!("cannot filter {}", args.input_dir.display()))?;

    if !cli.is_very_quiet() {
        println!("\nProcessing complete!");
        println!("Total files processed: {}", summary.files_processed);
        println!("Total files failed: {}", summary.files_failed);
        println!("Total matching lines found: {}", summary.matching_lines);
        println!("Filtered files saved in: {}", output_dir.display());
    }
    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
