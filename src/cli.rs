use clap::{Parser, Subcommand};
use clipstash::downloader::{Format, Quality};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clipstash")]
#[command(about = "Short-form video library", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
    /// Download one video into a local directory
    Download(DownloadArgs),
    /// Print metadata for a video URL as JSON
    Info(UrlArgs),
    /// Show which platform a URL belongs to
    Classify(UrlArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to, overriding `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    pub url: String,
    /// best, high, medium or low
    #[arg(long)]
    pub quality: Option<Quality>,
    /// mp4, webm or best
    #[arg(long)]
    pub format: Option<Format>,
    /// Directory for the downloaded file, defaults to `downloader.staging_dir`
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[arg(long)]
    pub retries: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct UrlArgs {
    pub url: String,
}
