use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::PossibleValuesParser;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use seqpack::io::cloud::CloudCredentials;
use seqpack::{IngestConfig, Packer, StaticCredentials, Transports, codec_by_name};

const CODECS: [&str; 6] = ["default", "gzip", "bz2", "bzip2", "snappy", "lz4"];

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Pack files and objects into sequence files",
    long_about = "Pack files and objects into sequence files.\n\n\
        The single-dash spellings -in, -out, -codec, -config and -lines are accepted as well."
)]
struct Args {
    /// Source URI or wildcard pattern (file://, hdfs://, s3://, s3n://, http(s)://)
    #[arg(long = "in")]
    input: String,

    /// Destination container URI, or a directory URI when the input is a pattern
    #[arg(long = "out")]
    output: String,

    /// Record codec
    #[arg(long, value_parser = PossibleValuesParser::new(CODECS))]
    codec: String,

    /// JSON file with transport settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write one record per input line, keyed by line index
    #[arg(long)]
    lines: bool,
}

/// Rewrite the single-dash flag spellings (`-in`, `-codec=gzip`) to their long form.
fn normalize_flag(arg: String) -> String {
    const LONG_FLAGS: [&str; 5] = ["in", "out", "codec", "config", "lines"];
    let Some(flag) = arg.strip_prefix('-').filter(|rest| !rest.starts_with('-')) else {
        return arg;
    };
    let name = flag.split_once('=').map_or(flag, |(name, _)| name);
    if LONG_FLAGS.contains(&name) {
        format!("-{arg}")
    } else {
        arg
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => IngestConfig::from_json_file(path)?,
        None => IngestConfig::default(),
    };
    let credentials = StaticCredentials::from_env()
        .map(|creds| Arc::new(creds) as Arc<dyn CloudCredentials>);
    if credentials.is_none() {
        info!("no AWS credentials in the environment; object store requests are anonymous");
    }

    let transports =
        Transports::connect(config, credentials).context("Failed to set up transports")?;
    let codec = codec_by_name(&args.codec)?;
    let packer = Packer::new(transports);
    let summary = if args.lines {
        packer.pack_lines(&args.input, &args.output, codec.as_ref())
    } else {
        packer.pack(&args.input, &args.output, codec.as_ref())
    };
    let summary = summary.with_context(|| format!("Failed to pack {}", args.input))?;

    for entry in &summary.entries {
        println!(
            "{} -> {} ({} bytes, {} record(s))",
            entry.source, entry.destination, entry.payload_bytes, entry.records
        );
    }
    info!(
        "packed {} source(s), {} payload bytes",
        summary.entries.len(),
        summary.total_payload_bytes()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse_from(std::env::args().map(normalize_flag));

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(argv.iter().map(|a| normalize_flag((*a).to_string())))
    }

    #[test]
    fn single_dash_flags_are_accepted() {
        let args = parse(&[
            "seqpack",
            "-in",
            "file:///etc/passwd",
            "-out",
            "file:///tmp/p.seq",
            "-codec=bz2",
        ])
        .unwrap();
        assert_eq!(args.input, "file:///etc/passwd");
        assert_eq!(args.output, "file:///tmp/p.seq");
        assert_eq!(args.codec, "bz2");

        assert!(!args.lines);

        let args =
            parse(&["seqpack", "--in", "a", "--out", "b", "--codec", "lz4", "-lines"]).unwrap();
        assert_eq!(args.codec, "lz4");
        assert!(args.lines);
    }

    #[test]
    fn unknown_codec_and_missing_flags_are_usage_errors() {
        let err = parse(&["seqpack", "-in", "a", "-out", "b", "-codec", "brotli"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = parse(&["seqpack", "-in", "a"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn other_arguments_are_left_alone() {
        assert_eq!(normalize_flag("-h".into()), "-h");
        assert_eq!(normalize_flag("--in".into()), "--in");
        assert_eq!(normalize_flag("-input".into()), "-input");
        assert_eq!(normalize_flag("s3://bkt/-in".into()), "s3://bkt/-in");
    }
}
