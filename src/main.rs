//! Span cache CLI
//!
//! Entry point for the `span-cache` command-line tool.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use exo_span_cache::{scan_directory, ScanConfig, ScanReport, Span, SpanCodec, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "span-cache")]
#[command(about = "Inspect and maintain a filename-encoded media span cache", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the span index of a cache directory from its file names
    Scan {
        /// Cache directory (overrides `cache_dir` from the config file)
        dir: Option<PathBuf>,

        /// Path to config file (default: ./span-cache.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Leave legacy file names as they are
        #[arg(long)]
        no_upgrade: bool,

        /// Delete files that are not cache entries
        #[arg(long)]
        remove_invalid: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the file name for a cached span
    Name {
        /// Cache key
        #[arg(long, short = 'k')]
        key: String,

        /// Byte offset of the span in the stream
        #[arg(long, short = 'p')]
        position: u64,

        /// Last access time in milliseconds (default: now)
        #[arg(long, short = 't')]
        timestamp: Option<u64>,

        /// Mark the span as reaching end of stream
        #[arg(long)]
        eos: bool,
    },

    /// Decode a cache file name
    Decode {
        /// Cache file
        file: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Refresh the last access time of a cached span
    Touch {
        /// Cache file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let codec = SpanCodec::new();

    match cli.command {
        Commands::Scan {
            dir,
            config,
            no_upgrade,
            remove_invalid,
            json,
        } => {
            run_scan(&codec, dir, config, no_upgrade, remove_invalid, json);
        }
        Commands::Name {
            key,
            position,
            timestamp,
            eos,
        } => {
            let timestamp = timestamp.unwrap_or_else(|| codec.clock().now_millis());
            if key.is_empty() {
                eprintln!("Error: cache key must not be empty");
                process::exit(2);
            }
            println!("{}", codec.file_name(&key, position, timestamp, eos));
        }
        Commands::Decode { file, json } => {
            run_decode(&codec, &file, json);
        }
        Commands::Touch { file } => {
            run_touch(&codec, &file);
        }
    }
}

fn run_scan(
    codec: &SpanCodec,
    dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    no_upgrade: bool,
    remove_invalid: bool,
    json_output: bool,
) {
    let mut config = match load_scan_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    // CLI flags take precedence over the config file
    if let Some(dir) = dir {
        config.cache_dir = dir;
    }
    if no_upgrade {
        config.upgrade_legacy = false;
    }
    if remove_invalid {
        config.remove_invalid = true;
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    let report = match scan_directory(&config, codec) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error scanning {}: {}", config.cache_dir.display(), e);
            process::exit(1);
        }
    };

    if json_output {
        match serde_json::to_string_pretty(&report.summary()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                process::exit(1);
            }
        }
    } else {
        print_report(&report);
    }
}

fn load_scan_config(config_path: Option<PathBuf>) -> Result<ScanConfig, String> {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if path.exists() {
        ScanConfig::from_file(&path).map_err(|e| e.to_string())
    } else {
        // Use default config if no file exists
        Ok(ScanConfig::default())
    }
}

fn print_report(report: &ScanReport) {
    for key in report.keys() {
        println!("{}", key);
        for span in report.spans_for(key).into_iter().flatten() {
            println!("  {}", describe(span));
        }
    }

    println!();
    println!(
        "{} file(s) scanned, {} span(s), {} bytes",
        report.scanned,
        report.span_count(),
        report.total_bytes()
    );
    if report.upgraded > 0 {
        println!("{} legacy name(s) upgraded", report.upgraded);
    }
    if !report.invalid.is_empty() {
        println!(
            "{} invalid file(s), {} removed",
            report.invalid.len(),
            report.removed
        );
    }
    for path in &report.duplicates {
        println!("duplicate: {}", path.display());
    }
    for error in &report.errors {
        eprintln!("Warning: {}", error);
    }
}

fn describe(span: &Span) -> String {
    let end = span
        .end()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "?".to_string());
    let accessed = span
        .last_access_timestamp()
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "[{}, {}){} accessed {}",
        span.position(),
        end,
        if span.is_eos() { " EOS" } else { "" },
        accessed
    )
}

fn format_timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn run_decode(codec: &SpanCodec, file: &Path, json_output: bool) {
    let Some(span) = codec.decode_entry(file) else {
        eprintln!("Not a cache entry: {}", file.display());
        process::exit(1);
    };

    if json_output {
        match serde_json::to_string_pretty(&span.cache_entry()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing span: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("key:      {}", span.key());
        println!("{}", describe(&span));
    }
}

fn run_touch(codec: &SpanCodec, file: &Path) {
    let Some(span) = codec.decode_entry(file) else {
        eprintln!("Not a cache entry: {}", file.display());
        process::exit(1);
    };

    match span.touch(codec) {
        Ok(touched) => {
            if let Some(path) = touched.file() {
                println!("{}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Touch failed: {}", e);
            process::exit(1);
        }
    }
}
