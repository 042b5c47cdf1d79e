// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanlayer command line.
//
// Reads a scanned PDF and its OCR block graph from disk, composes the
// searchable PDF, and writes it only when every page succeeded.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use scanlayer_core::error::Result;
use scanlayer_core::human_errors::humanize_error;
use scanlayer_core::{CompositorConfig, Granularity, ImageEncoding, OverlayFont};
use scanlayer_document::ComposedDocument;

#[derive(Parser)]
#[command(name = "scanlayer")]
#[command(version)]
#[command(about = "Add an invisible, aligned text layer to an image-only PDF", long_about = None)]
struct Cli {
    /// Scanned source PDF
    #[arg(value_name = "INPUT_PDF")]
    input: PathBuf,

    /// OCR block graph (JSON)
    #[arg(value_name = "BLOCKS_JSON")]
    blocks: PathBuf,

    /// Where to write the searchable PDF
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(long, value_name = "FILE", env = "SCANLAYER_CONFIG")]
    config: Option<PathBuf>,

    /// Rasterization resolution
    #[arg(long)]
    dpi: Option<u32>,

    /// Store page images losslessly (Flate) instead of as JPEG
    #[arg(long)]
    lossless: bool,

    /// Overlay font face (courier, courier-bold, courier-oblique, courier-bold-oblique)
    #[arg(long, value_parser = parse_font)]
    font: Option<OverlayFont>,

    /// Place one text draw per OCR word instead of per line
    #[arg(long)]
    word_level: bool,

    /// Compose pages in parallel
    #[arg(long)]
    parallel: bool,

    /// Draw the overlay text in red instead of invisibly
    #[arg(long)]
    show_text: bool,

    /// Outline every overlay box in red
    #[arg(long)]
    draw_boxes: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Page renderer
    #[cfg(feature = "pdfium")]
    #[arg(long, value_enum, default_value = "pdfium")]
    renderer: Renderer,
}

#[cfg(feature = "pdfium")]
#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Renderer {
    /// Composite the page's scanned images; refuses pages with other content
    Embedded,
    /// Full rendering through the pdfium library
    Pdfium,
}

fn parse_font(name: &str) -> std::result::Result<OverlayFont, String> {
    OverlayFont::from_name(name).ok_or_else(|| format!("unknown font `{name}`"))
}

impl Cli {
    /// The configuration file (or defaults) with command-line flags on top.
    fn compositor_config(&self) -> Result<CompositorConfig> {
        let mut config = match &self.config {
            Some(path) => CompositorConfig::from_json_file(path)?,
            None => CompositorConfig::default(),
        };
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if self.lossless {
            config.image_encoding = ImageEncoding::Lossless;
        }
        if let Some(font) = self.font {
            config.font = font;
        }
        if self.word_level {
            config.granularity = Granularity::Word;
        }
        config.parallel |= self.parallel;
        config.debug.visible_text |= self.show_text;
        config.debug.draw_boxes |= self.draw_boxes;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(composed) => {
            println!(
                "{}: {} pages, {} text draws, {} skipped lines",
                cli.output.display(),
                composed.stats.pages,
                composed.stats.text_draws,
                composed.stats.skipped_lines
            );
            if composed.stats.replaced_chars > 0 {
                println!(
                    "warning: {} characters have no WinAnsi code and were written as `?`",
                    composed.stats.replaced_chars
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!(error = ?err, "conversion failed");
            let human = humanize_error(&err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ComposedDocument> {
    let config = cli.compositor_config()?;
    let pdf = std::fs::read(&cli.input)?;
    let blocks = std::fs::read(&cli.blocks)?;
    tracing::info!(input = %cli.input.display(), blocks = %cli.blocks.display(), dpi = config.dpi, "Scanlayer starting");

    let composed = compose(cli, pdf, &blocks, &config)?;
    std::fs::write(&cli.output, &composed.bytes)?;
    Ok(composed)
}

#[cfg(not(feature = "pdfium"))]
fn compose(_cli: &Cli, pdf: Vec<u8>, blocks: &[u8], config: &CompositorConfig) -> Result<ComposedDocument> {
    scanlayer_document::make_searchable(&pdf, blocks, config)
}

#[cfg(feature = "pdfium")]
fn compose(cli: &Cli, pdf: Vec<u8>, blocks: &[u8], config: &CompositorConfig) -> Result<ComposedDocument> {
    use scanlayer_document::{BlockResolver, Compositor, PdfiumRasterizer};

    match cli.renderer {
        Renderer::Embedded => scanlayer_document::make_searchable(&pdf, blocks, config),
        Renderer::Pdfium => {
            let resolver = BlockResolver::from_json_bytes(blocks)?;
            let rasterizer = PdfiumRasterizer::from_bytes(pdf)?;
            Compositor::new(&rasterizer, &resolver, config)?.compose()
        }
    }
}
