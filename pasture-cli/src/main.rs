#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::doc_markdown,
    clippy::uninlined_format_args,
    clippy::needless_pass_by_value
)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use serde::Serialize;

use pasture::decoder::mime_for_extension;
use pasture::{AnalysisConfig, AnalysisError, AnalysisRequest, Analyzer, CaptureMetadata};

/// PastureAI command-line tools
#[derive(Parser)]
#[command(name = "pasture")]
#[command(about = "PastureAI - offline pasture photo analysis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more pasture photos
    Analyze {
        /// Input image files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Declared MIME type (inferred from the extension when absent)
        #[arg(long)]
        mime: Option<String>,
        /// Capture metadata JSON file, echoed into the result
        #[arg(long)]
        capture: Option<PathBuf>,
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
        /// Pretty print output
        #[arg(short, long)]
        pretty: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print only the feature vector of an image
    Features {
        /// Input image file
        input: PathBuf,
        /// Declared MIME type (inferred from the extension when absent)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Dump the calibration constants
    Calibration {
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Yaml,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.quiet {
        log::LevelFilter::Error
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .init();

    if let Err(e) = run(args) {
        error!("Command failed: {:#}", e);
        process::exit(exit_code(&e));
    }
}

/// 1 for problems with what the caller gave us, 2 for everything else
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AnalysisError>() {
        Some(e) if e.is_client_error() => 1,
        Some(AnalysisError::IoError(_)) => 1,
        Some(_) => 2,
        None if err.downcast_ref::<std::io::Error>().is_some() => 1,
        None => 2,
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    let analyzer = Analyzer::new(config)?;

    match args.command {
        Commands::Analyze {
            inputs,
            mime,
            capture,
            format,
            pretty,
            output,
        } => cmd_analyze(&analyzer, &inputs, mime.as_deref(), capture, format, pretty, output),
        Commands::Features { input, mime } => cmd_features(&analyzer, &input, mime.as_deref()),
        Commands::Calibration { format } => {
            let text = render(&pasture::calibration::surface(), format, true)?;
            println!("{}", text);
            Ok(())
        }
    }
}

fn cmd_analyze(
    analyzer: &Analyzer,
    inputs: &[PathBuf],
    mime: Option<&str>,
    capture: Option<PathBuf>,
    format: OutputFormat,
    pretty: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let capture = capture.map(|path| read_capture(&path)).transpose()?;

    let progress = if inputs.len() > 1 {
        Some(create_progress_bar(inputs.len() as u64)?)
    } else {
        None
    };

    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        if let Some(pb) = &progress {
            pb.set_message(input.display().to_string());
        }

        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let mut request = AnalysisRequest::new(&bytes, resolve_mime(input, mime));
        if let Some(capture) = &capture {
            request = request.with_capture(capture);
        }

        let result = analyzer
            .analyze(request)
            .with_context(|| format!("analyzing {}", input.display()))?;
        for warning in &result.metadata.warnings {
            warn!("{}: {}", input.display(), warning);
        }
        results.push(result);

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    let text = if results.len() == 1 {
        render(&results[0], format, pretty)?
    } else {
        render(&results, format, pretty)?
    };
    write_output(&text, output.as_deref())
}

fn cmd_features(analyzer: &Analyzer, input: &Path, mime: Option<&str>) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let result = analyzer.analyze(AnalysisRequest::new(&bytes, resolve_mime(input, mime)))?;
    println!("{}", serde_json::to_string_pretty(&result.feature_vector)?);
    Ok(())
}

/// Declared MIME type, else one inferred from the extension, else empty (sniff)
fn resolve_mime<'a>(path: &Path, declared: Option<&'a str>) -> &'a str {
    declared
        .or_else(|| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .and_then(mime_for_extension)
        })
        .unwrap_or("")
}

fn read_capture(path: &Path) -> Result<CaptureMetadata> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading capture {}", path.display()))?;
    Ok(CaptureMetadata::from_json_str(&text)?)
}

fn render<T: Serialize>(value: &T, format: OutputFormat, pretty: bool) -> Result<String> {
    Ok(match format {
        OutputFormat::Json if pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let mut file =
                fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
            writeln!(file, "{}", text)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn create_progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.green/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    Ok(pb)
}
