use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use seqpack::io::cloud::CloudCredentials;
use seqpack::{ContainerReader, IngestConfig, StaticCredentials, Transports};

#[derive(Parser, Debug)]
#[command(author, version, about = "List the records of a sequence file", long_about = None)]
struct Args {
    /// Container URI
    uri: String,

    /// Print each value's decoded length next to its key
    #[arg(long)]
    values: bool,

    /// JSON file with transport settings
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => IngestConfig::from_json_file(path)?,
        None => IngestConfig::default(),
    };
    let credentials = StaticCredentials::from_env()
        .map(|creds| Arc::new(creds) as Arc<dyn CloudCredentials>);
    let transports =
        Transports::connect(config, credentials).context("Failed to set up transports")?;
    let mut reader = ContainerReader::new(transports)
        .open(&args.uri)
        .with_context(|| format!("Failed to open {}", args.uri))?;

    let header = reader.header();
    eprintln!(
        "# version {} codec {}",
        header.version,
        header.codec_class.as_deref().unwrap_or("none")
    );

    if args.values {
        while let Some(record) = reader.next_record()? {
            println!("{}\t{}", record.key, record.value.len());
        }
    } else {
        while let Some(key) = reader.next_key()? {
            println!("{key}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
