//! Harvests the fiction of a web magazine in three resumable stages:
//! issue links from the paginated issue listing, story links from every issue,
//! and finally the stories themselves. Every stage checkpoints after each item.

pub mod checkpoint;
mod error;
pub mod limiter;
mod macros;
pub mod parse;
pub mod process;
pub mod request;

use std::path::PathBuf;
use std::time::Duration;

pub use error::{Error, Result};

pub const BASE_URL: &str = "http://www.lightspeedmagazine.com/category/issues/page";
pub const CHECKPOINT_DIR: &str = ".";
/// Minimum time between two requests.
pub const DELAY_SECS: u64 = 5;
/// Issue categories that count as stories.
pub const FICTION_GENRES: &[&str] = &["Science Fiction", "Fantasy"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Paginated issue listing, see `request::PageTemplate`.
    pub base_url: String,
    pub genres: Vec<String>,
    pub delay: Duration,
    pub checkpoint_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            genres: FICTION_GENRES.iter().map(|genre| genre.to_string()).collect(),
            delay: Duration::from_secs(DELAY_SECS),
            checkpoint_dir: PathBuf::from(CHECKPOINT_DIR),
        }
    }
}
