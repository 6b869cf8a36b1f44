//! epubdown - EPUB to Markdown converter

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use epubdown::pipeline::{self, Conversion};

#[derive(Parser)]
#[command(name = "epubdown")]
#[command(version, about = "Convert EPUB ebooks to Markdown", long_about = None)]
#[command(after_help = "EXAMPLES:
    epubdown book.epub                  Convert into the current directory
    epubdown book.epub -o out/          Convert into out/
    epubdown *.epub --bundle books.zip  Convert many books into one archive")]
struct Cli {
    /// Input EPUB files
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Directory to write Markdown files to (created if absent)
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    output_dir: PathBuf,

    /// Bundle all outputs into a single ZIP archive instead
    #[arg(long, value_name = "FILE")]
    bundle: Option<PathBuf>,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let mut conversions: Vec<Conversion> = Vec::new();
    let mut failures = 0usize;

    for input in &cli.inputs {
        if !cli.quiet {
            println!("Processing: {}", input.display());
        }
        match pipeline::generate_markdown(input) {
            Ok(conversion) => conversions.push(conversion),
            Err(e) => {
                eprintln!("error: {}: {e}", input.display());
                failures += 1;
            }
        }
    }

    let written = match cli.bundle {
        Some(bundle_path) => write_bundle(&conversions, &bundle_path, cli.quiet),
        None => write_files(&conversions, &cli.output_dir, cli.quiet),
    };

    if let Err(e) = written {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn write_files(
    conversions: &[Conversion],
    output_dir: &Path,
    quiet: bool,
) -> epubdown::Result<()> {
    for conversion in conversions {
        let path = pipeline::write_markdown(conversion, output_dir)?;
        if !quiet {
            println!("Successfully converted to: {}", path.display());
        }
    }
    Ok(())
}

fn write_bundle(
    conversions: &[Conversion],
    bundle_path: &Path,
    quiet: bool,
) -> epubdown::Result<()> {
    if conversions.is_empty() {
        return Ok(());
    }
    if let Some(parent) = bundle_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(bundle_path)?;
    pipeline::bundle_zip(conversions, file)?;
    if !quiet {
        println!(
            "Bundled {} document(s) into: {}",
            conversions.len(),
            bundle_path.display()
        );
    }
    Ok(())
}
