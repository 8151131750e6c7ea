pub mod api;
pub mod classifier;
pub mod config;
pub mod downloader;
pub mod humanize;
pub mod library;
pub mod observability;
pub mod pipeline;
pub mod storage;
