pub mod batch;
pub mod downloader;
pub mod traits;
