use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::defaults::{DEFAULT_MAX_TARGET_PERCENT, DEFAULT_MIN_TARGET_PERCENT};

#[derive(Parser, Debug)]
#[command(name = "pdf-squeeze")]
#[command(
    author,
    version,
    about = "Shrink a PDF toward a target size with lossless recompression and an optional rasterizing fallback"
)]
pub struct Args {
    /// Input PDF file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output PDF file path (defaults to <input>-compressed.pdf)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target output size (e.g. "2.5"); empty or 0 minimizes without a target
    #[arg(short = 't', long)]
    pub target: Option<String>,

    /// Target size unit: "kb" or "mb" (anything else is read as mb)
    #[arg(short = 'u', long, default_value = "mb")]
    pub unit: String,

    /// Compression mode
    #[arg(short = 'm', long, value_enum, default_value = "aggressive")]
    pub mode: CompressionMode,

    /// Smallest accepted target as a percent of the input size
    #[arg(long, default_value_t = DEFAULT_MIN_TARGET_PERCENT, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub min_percent: u32,

    /// Largest accepted target as a percent of the input size
    #[arg(long, default_value_t = DEFAULT_MAX_TARGET_PERCENT, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub max_percent: u32,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// How far the compressor may go to reach a target
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum CompressionMode {
    /// Lossless recompression only
    Standard,
    /// Lossless first, then rasterize every page if the target is still missed
    #[default]
    Aggressive,
}

impl CompressionMode {
    /// Form token for this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMode::Standard => "standard",
            CompressionMode::Aggressive => "aggressive",
        }
    }

    /// Read a form token, falling back to `fallback` when it is missing or unknown
    pub fn from_token(token: Option<&str>, fallback: Self) -> Self {
        match token.map(str::trim) {
            Some("standard") => CompressionMode::Standard,
            Some("aggressive") => CompressionMode::Aggressive,
            _ => fallback,
        }
    }
}

impl Args {
    /// Get the output path, defaulting to the input name with a -compressed suffix
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            self.input.with_file_name(format!("{}-compressed.pdf", stem))
        })
    }

    /// File name reported to the request validator
    pub fn input_file_name(&self) -> String {
        self.input
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(input: &str) -> Args {
        Args {
            input: PathBuf::from(input),
            output: None,
            target: None,
            unit: "mb".to_string(),
            mode: CompressionMode::Aggressive,
            min_percent: DEFAULT_MIN_TARGET_PERCENT,
            max_percent: DEFAULT_MAX_TARGET_PERCENT,
            verbose: 0,
        }
    }

    #[test]
    fn test_default_output_path() {
        let args = args_for("docs/report.pdf");
        assert_eq!(args.output_path(), PathBuf::from("docs/report-compressed.pdf"));
    }

    #[test]
    fn test_explicit_output_path() {
        let mut args = args_for("report.pdf");
        args.output = Some(PathBuf::from("small.pdf"));
        assert_eq!(args.output_path(), PathBuf::from("small.pdf"));
    }

    #[test]
    fn test_mode_tokens() {
        let fallback = CompressionMode::default();
        assert_eq!(CompressionMode::from_token(Some("standard"), fallback), CompressionMode::Standard);
        assert_eq!(CompressionMode::from_token(Some("aggressive"), fallback), CompressionMode::Aggressive);
        assert_eq!(CompressionMode::from_token(Some("turbo"), fallback), CompressionMode::Aggressive);
        assert_eq!(CompressionMode::from_token(None, fallback), CompressionMode::Aggressive);
        assert_eq!(
            CompressionMode::from_token(Some("turbo"), CompressionMode::Standard),
            CompressionMode::Standard
        );
    }

    #[test]
    fn test_parse_cli() {
        let args = Args::try_parse_from([
            "pdf-squeeze",
            "in.pdf",
            "-t",
            "500",
            "-u",
            "kb",
            "--mode",
            "standard",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.target.as_deref(), Some("500"));
        assert_eq!(args.unit, "kb");
        assert_eq!(args.mode, CompressionMode::Standard);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.min_percent, 20);
    }
}
