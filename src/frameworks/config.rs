use std::{env, path::PathBuf, time::Duration};

use crate::use_cases::{DEFAULT_PAGE_SIZE, PAGE_SIZES};

// Runtime settings, read from the environment after `.env` is loaded.

pub const DEFAULT_API_URL: &str = "http://localhost:5234/api";

pub fn api_url() -> String {
    env::var("CATALOG_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

pub fn storage_path() -> PathBuf {
    if let Some(path) = env::var_os("CATALOG_STORAGE_PATH").filter(|path| !path.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("book-catalog"))
        .unwrap_or_else(|| PathBuf::from(".book-catalog"))
        .join("storage.toml")
}

// Falls back to the default when the value is not an offered size.
pub fn page_size() -> usize {
    env::var("CATALOG_PAGE_SIZE")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|size| PAGE_SIZES.contains(size))
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

pub fn storage_poll_interval() -> Duration {
    let millis = env::var("CATALOG_STORAGE_POLL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .unwrap_or(500);
    Duration::from_millis(millis)
}
