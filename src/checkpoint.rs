use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::parse::StoryRecord;
use crate::Result;

/// Issue page URLs found in the paginated issue listing.
pub const ISSUE_LINKS: &str = "issue_links";
/// Story URLs found on the issue pages.
pub const STORY_LINKS: &str = "story_links";
/// Extracted stories keyed by `"<title>-<author>"`, see `StoryBook`.
pub const STORIES: &str = "stories";
/// Story URLs whose extraction failed.
pub const FAILED_STORY_URLS: &str = "failed_story_urls";

/// Named blobs, every save overwrites the whole value.
pub trait BlobStore: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn save(&self, name: &str, blob: &[u8]) -> Result<()>;

    fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.load(name)? {
            Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
            None => Ok(None),
        }
    }

    fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.save(name, &serde_json::to_vec_pretty(value)?)
    }
}

/// Keeps every blob as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BlobStore for FsStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(name)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, blob: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        // Written aside and renamed so an interrupted save never leaves half a blob.
        let path = self.path(name);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, blob)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(name).cloned())
    }

    fn save(&self, name: &str, blob: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(name.to_string(), blob.to_vec());
        Ok(())
    }
}

/// Accumulated result of a link discovery stage: the inputs already handled
/// and, in discovery order, the links they produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkLedger {
    pub processed: Vec<String>,
    pub links: Vec<String>,
}

impl LinkLedger {
    pub fn is_processed(&self, input: &str) -> bool {
        self.processed.iter().any(|done| done == input)
    }

    /// Marks `input` as processed and appends its links. An input seen on an
    /// earlier run is not listed twice.
    pub fn record(&mut self, input: &str, links: Vec<String>) {
        if !self.is_processed(input) {
            self.processed.push(input.to_string());
        }
        self.links.extend(links);
    }
}

/// Extracted stories keyed by `"<title>-<author>"`, plus the URLs of stories
/// that were replaced by a later one under the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryBook {
    stories: BTreeMap<String, StoryRecord>,
    #[serde(default)]
    superseded: Vec<String>,
}

impl StoryBook {
    /// Whether the story at `story_url` was already harvested, kept or replaced.
    pub fn contains_url(&self, story_url: &str) -> bool {
        self.stories.values().any(|story| story.story_url == story_url)
            || self.superseded.iter().any(|url| url == story_url)
    }

    /// Stores the story under its key, handing back whatever was there before.
    /// A replaced story from another URL is remembered as superseded.
    pub fn insert(&mut self, story: StoryRecord) -> Option<StoryRecord> {
        let previous = self.stories.insert(story.key(), story);
        if let Some(previous) = &previous {
            if !self.contains_url(&previous.story_url) {
                self.superseded.push(previous.story_url.clone());
            }
        }
        previous
    }

    /// Reverts an `insert` of the story stored under `key`.
    pub fn undo_insert(&mut self, key: &str, previous: Option<StoryRecord>) {
        match previous {
            Some(previous) => {
                if self.superseded.last() == Some(&previous.story_url) {
                    self.superseded.pop();
                }
                self.stories.insert(key.to_string(), previous);
            }
            None => {
                self.stories.remove(key);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&StoryRecord> {
        self.stories.get(key)
    }

    pub fn superseded(&self) -> &[String] {
        &self.superseded
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}

/// Story URLs that failed extraction, oldest first. Only an audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureList(Vec<String>);

impl FailureList {
    /// Returns `false` if the URL was already listed.
    pub fn push(&mut self, story_url: &str) -> bool {
        if self.0.iter().any(|failed| failed == story_url) {
            return false;
        }
        self.0.push(story_url.to_string());
        true
    }

    pub fn urls(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
