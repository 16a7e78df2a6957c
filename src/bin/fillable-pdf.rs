//! Fillable PDF CLI tool
//!
//! A command-line tool for merging a base PDF with a form-field overlay.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fillable_pdf::pdf::{extract_metadata, merge_overlay_files, OverlayMergeOptions, OverlayOptions};

/// Fillable PDF - Merge static PDFs with interactive form-field overlays
#[derive(Parser)]
#[command(name = "fillable-pdf")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Merge a rendered form with its field overlay
    fillable-pdf merge --base form.pdf --overlay fields.pdf -o fillable_form.pdf

    # Ask viewers to regenerate widget appearances
    fillable-pdf merge --base form.pdf --overlay fields.pdf -o out.pdf --need-appearances

    # List the form fields of a PDF
    fillable-pdf info fillable_form.pdf")]
struct Cli {
    /// Log progress (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a base PDF with a form-field overlay
    Merge {
        /// Static base PDF
        #[arg(long)]
        base: PathBuf,

        /// Overlay PDF carrying the form widgets and AcroForm
        #[arg(long)]
        overlay: PathBuf,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        /// Write streams uncompressed
        #[arg(long)]
        no_compress: bool,

        /// Set NeedAppearances on the output form
        #[arg(long)]
        need_appearances: bool,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Show pages and form fields of a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Merge { base, overlay, output, no_compress, need_appearances, open } => {
            cmd_merge(base, overlay, output, no_compress, need_appearances, open)
        }
        Commands::Info { input } => {
            cmd_info(input)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Open a file with the system default application
fn open_file(path: &PathBuf) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Merge a base PDF with its form-field overlay
fn cmd_merge(
    base: PathBuf,
    overlay: PathBuf,
    output: PathBuf,
    no_compress: bool,
    need_appearances: bool,
    open: bool,
) -> Result<()> {
    for path in [&base, &overlay] {
        if !path.exists() {
            bail!("Input file not found: {}", path.display());
        }
    }

    info!("Merging {} with overlay {}", base.display(), overlay.display());

    let options = OverlayMergeOptions {
        base_path: base,
        overlay_path: overlay,
        output_path: output.clone(),
        options: OverlayOptions {
            compress: !no_compress,
            need_appearances: need_appearances.then_some(true),
        },
    };

    merge_overlay_files(&options).context("merge failed")?;

    eprintln!("Fillable PDF: {}", output.display());

    if open {
        open_file(&output)?;
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let metadata = extract_metadata(&input)
        .with_context(|| format!("could not read {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }

    if !metadata.has_acroform {
        println!("Form: none");
        return Ok(());
    }

    println!("Form fields: {}", metadata.fields.len());
    for field in &metadata.fields {
        let pages: Vec<String> = field.pages.iter().map(|p| p.to_string()).collect();
        println!(
            "  {} [{}] widgets={} pages={}",
            field.name,
            field.field_type.as_deref().unwrap_or("?"),
            field.widget_count,
            pages.join(",")
        );
    }

    Ok(())
}
