use anyhow::{Context, Result};
use clap::Parser;
use std::fs;

use pdf_squeeze::cli::Args;
use pdf_squeeze::config::Settings;
use pdf_squeeze::engine::{Compressor, OutputSource};
use pdf_squeeze::renderer_for_mode;
use pdf_squeeze::request::{self, CompressForm};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let settings = Settings::from_args(&args)
        .validate()
        .with_context(|| "Invalid compression settings")?;

    // Read input file
    let pdf_bytes = fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    log::info!("Read {} bytes from {}", pdf_bytes.len(), args.input.display());

    // Pdfium is only needed when quality may be traded for size
    let renderer = renderer_for_mode(args.mode);

    let compressor = Compressor::with_default_backends(settings, renderer);

    let form = CompressForm {
        file_name: args.input_file_name(),
        content_type: String::new(),
        file_bytes: pdf_bytes,
        target_size_value: args.target.clone(),
        target_size_unit: Some(args.unit.clone()),
        // Mode comes from settings
        compression_mode: None,
    };

    let response = request::handle(form, &compressor)
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    for (name, value) in response.headers() {
        log::debug!("{}: {}", name, value);
    }

    let outcome = &response.outcome;
    let source = match outcome.source {
        OutputSource::Lossless { profile } => format!("lossless, {} profile", profile),
        OutputSource::Lossy => "rasterized".to_string(),
        OutputSource::Original => "unchanged".to_string(),
    };
    let summary = format!(
        "{} -> {} bytes ({:.1}% smaller, {})",
        outcome.original_size,
        outcome.compressed_size,
        outcome.savings_ratio() * 100.0,
        source
    );

    if outcome.requested_target_bytes > 0 && !outcome.target_achieved {
        log::warn!(
            "Target of {} bytes not reached{}",
            outcome.requested_target_bytes,
            if outcome.lossy_attempt_failed {
                " (rasterizing fallback failed)"
            } else {
                ""
            }
        );
    }

    // Write output
    let output_path = args.output_path();
    fs::write(&output_path, response.into_body())
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    println!("Successfully wrote PDF to {}: {}", output_path.display(), summary);

    Ok(())
}
