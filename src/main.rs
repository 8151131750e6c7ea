mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, DownloadArgs};
use clipstash::classifier;
use clipstash::config::Config;
use clipstash::downloader::{DownloadProgress, VideoDownloader};
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clipstash=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => clipstash::api::run(args.address).await?,
        Commands::Download(args) => download(args).await?,
        Commands::Info(args) => {
            let downloader = VideoDownloader::from_config(&Config::load()?.downloader);
            let metadata = downloader.get_metadata(&args.url).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Commands::Classify(args) => {
            let result = classifier::classify(&args.url);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

async fn download(args: DownloadArgs) -> Result<(), AnyError> {
    let downloader = VideoDownloader::from_config(&Config::load()?.downloader);

    let mut options = downloader.default_options();
    if let Some(quality) = args.quality {
        options.quality = quality;
    }
    if let Some(format) = args.format {
        options.format = format;
    }
    if let Some(retries) = args.retries {
        options.max_retries = retries.max(1);
    }
    if let Some(dir) = args.output_dir {
        options.output_dir = Some(dir);
    }
    options.progress = Some(Arc::new(|progress: DownloadProgress| {
        eprintln!(
            "{:>5.1}%  {}/s  ETA {}",
            progress.percent,
            clipstash::humanize::format_bytes(progress.bytes_per_second),
            clipstash::humanize::format_duration(progress.eta_seconds),
        );
    }));

    let result = downloader.download(&args.url, options).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
