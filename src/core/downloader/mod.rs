mod client;

pub use client::{
    AssetFetcher, DownloadOutcome, DownloadProgress, Downloader, ProgressFn, PROGRESS_INTERVAL,
};
