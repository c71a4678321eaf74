//! CLI tool for populating a PowerPoint template from slide records.

use anyhow::{Context, Result};
use clap::Parser;
use deck_core::{DocMeta, SlideRecord};
use deck_pptx::{Composer, TemplateShell};
use std::fs;
use std::path::{Path, PathBuf};

/// Compose a presentation by filling a template with slide records.
#[derive(Parser, Debug)]
#[command(name = "deck-compose")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with an array of slide records ({"title", "content"})
    records: PathBuf,

    /// Template presentation (.pptx) to populate
    #[arg(short, long)]
    template: PathBuf,

    /// Output file (default: records file name with .pptx extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Document title for the title slide
    #[arg(long)]
    title: Option<String>,

    /// Document summary shown as the title-slide subtitle
    #[arg(long)]
    summary: Option<String>,

    /// Logo image stamped on every slide
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let records = read_records(&args.records)?;
    if args.verbose {
        eprintln!("Loaded {} slide records", records.len());
    }

    let shell = TemplateShell::load(&args.template)
        .with_context(|| format!("Failed to load template {}", args.template.display()))?;
    log::debug!("Template loaded with {} layouts", shell.layout_count());

    let meta = DocMeta {
        title: args.title.clone(),
        summary: args.summary.clone(),
    };

    let mut composer = Composer::new(shell)
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .with_meta(meta);

    if let Some(logo_path) = &args.logo {
        let bytes = fs::read(logo_path)
            .with_context(|| format!("Failed to read logo {}", logo_path.display()))?;
        composer = composer.with_logo(bytes);
    }

    let output_path = get_output_path(&args.records, args.output.as_ref())?;
    composer
        .compose_to_path(&records, &output_path)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if args.verbose {
        eprintln!("Written to: {}", output_path.display());
    }

    Ok(())
}

/// Parse the slide record array from a JSON file.
fn read_records(path: &Path) -> Result<Vec<SlideRecord>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let records: Vec<SlideRecord> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid slide records in {}", path.display()))?;
    Ok(records)
}

/// Determine the output path for the composed presentation.
fn get_output_path(records_path: &Path, output: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        return Ok(path.clone());
    }

    let stem = records_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let output_filename = format!("{}.pptx", stem);

    let output_path = match records_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(output_filename),
        _ => PathBuf::from(output_filename),
    };

    Ok(output_path)
}
