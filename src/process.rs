use std::collections::HashSet;
use std::fmt;

use chrono::Local;
use tokio::task::spawn_blocking;

use crate::checkpoint::{
    BlobStore, FailureList, LinkLedger, StoryBook, FAILED_STORY_URLS, ISSUE_LINKS, STORIES,
    STORY_LINKS,
};
use crate::parse::{find_issue_links, find_story, find_story_links};
use crate::request::{Fetcher, PageTemplate, Paginator};
use crate::{info_time, warn_time, Config, Error, Result};

/// What a single stage run did with its work list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    /// Inputs handed to the stage, skipped ones included.
    pub total: usize,
    pub processed: usize,
    /// Inputs already covered by the checkpoint.
    pub skipped: usize,
    pub failed: usize,
}

impl StageReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} inputs, {} processed, {} skipped, {} failed",
            self.stage, self.total, self.processed, self.skipped, self.failed
        )
    }
}

/// Runs an extractor on `spawn_blocking`, the parsed document never leaves that thread.
async fn extract<T, E>(html: String, extractor: E) -> Result<T>
where
    T: Send + 'static,
    E: FnOnce(&str) -> Result<T> + Send + 'static,
{
    spawn_blocking(move || extractor(&html)).await?
}

/// Drives the three harvesting stages. Each stage loads its checkpoint once
/// and saves after every item, so any stage can be stopped at any point and
/// simply run again without duplicating what it already collected.
pub struct Harvester<F, S> {
    fetcher: F,
    store: S,
    config: Config,
}

impl<F: Fetcher, S: BlobStore> Harvester<F, S> {
    pub fn new(fetcher: F, store: S, config: Config) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stage 1: walks the paginated issue listing and collects issue URLs.
    /// The listing is newest first, so every run walks it from page 1 and only
    /// adds links that no earlier run recorded.
    pub async fn harvest_issue_links(&self) -> Result<StageReport> {
        let start_time = Local::now();
        let mut report = StageReport::new("issue links");
        let mut ledger: LinkLedger = self.store.load_json(ISSUE_LINKS)?.unwrap_or_default();
        let known: HashSet<String> = ledger.links.iter().cloned().collect();
        info_time!(
            "Getting all issue list pages, {} issue links already known",
            known.len()
        );

        let template = PageTemplate::new(self.config.base_url.as_str());
        let mut paginator = Paginator::new(&self.fetcher, template);

        while let Some(page) = paginator.next_page().await? {
            report.total += 1;
            let url = page.url;
            let found = extract(page.html, find_issue_links).await?;
            let found_count = found.len();
            // Repeats within this run are kept, only earlier runs' links are dropped.
            let links: Vec<String> = found
                .into_iter()
                .filter(|link| !known.contains(link))
                .collect();
            info_time!(
                "Found {found_count} issue links on {url}, {} new",
                links.len()
            );

            ledger.record(&url, links);
            info_time!(
                "Dumping {} links to checkpoint {ISSUE_LINKS}",
                ledger.links.len()
            );
            self.store.save_json(ISSUE_LINKS, &ledger)?;
            report.processed += 1;
        }

        info_time!(start_time, "Finished stage {report}");
        Ok(report)
    }

    /// Stage 2: collects the story links of every issue found by stage 1.
    /// Any error aborts the stage; the checkpoint keeps what was done so far.
    pub async fn harvest_story_links(&self) -> Result<StageReport> {
        let start_time = Local::now();
        let mut report = StageReport::new("story links");
        let issues: LinkLedger = self
            .store
            .load_json(ISSUE_LINKS)?
            .ok_or(Error::MissingCheckpoint(ISSUE_LINKS))?;
        let mut ledger: LinkLedger = self.store.load_json(STORY_LINKS)?.unwrap_or_default();
        report.total = issues.links.len();
        info_time!(
            "Getting all story links from {} issues, {} story links so far",
            issues.links.len(),
            ledger.links.len()
        );

        for issue_link in &issues.links {
            if ledger.is_processed(issue_link) {
                report.skipped += 1;
                continue;
            }

            let page = self.fetcher.fetch(issue_link).await?.found(issue_link)?;
            let genres = self.config.genres.clone();
            let links = extract(page.html, move |html| find_story_links(html, &genres)).await?;
            info_time!("Found {} story links in issue {issue_link}", links.len());

            ledger.record(issue_link, links);
            info_time!(
                "Dumping {} links to checkpoint {STORY_LINKS}",
                ledger.links.len()
            );
            self.store.save_json(STORY_LINKS, &ledger)?;
            report.processed += 1;
        }

        info_time!(start_time, "Finished stage {report}");
        Ok(report)
    }

    /// Stage 3: extracts every story found by stage 2.
    /// A story that can't be fetched or parsed is added to the failure list and
    /// the stage moves on. Stories already in the checkpoint, including ones
    /// replaced by a later story with the same title and author, are never refetched.
    pub async fn harvest_stories(&self) -> Result<StageReport> {
        let start_time = Local::now();
        let mut report = StageReport::new("stories");
        let story_links: LinkLedger = self
            .store
            .load_json(STORY_LINKS)?
            .ok_or(Error::MissingCheckpoint(STORY_LINKS))?;
        let mut book: StoryBook = self.store.load_json(STORIES)?.unwrap_or_default();
        let mut failures: FailureList =
            self.store.load_json(FAILED_STORY_URLS)?.unwrap_or_default();
        report.total = story_links.links.len();
        info_time!(
            "Getting all stories from {} story links, {} stories so far",
            story_links.links.len(),
            book.len()
        );

        for story_link in &story_links.links {
            if book.contains_url(story_link) {
                info_time!("Found story in checkpoint, skipping story {story_link}");
                report.skipped += 1;
                continue;
            }

            match self.harvest_story(story_link, &mut book).await {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    warn_time!("Failed to retrieve and process story {story_link}: {e}");
                    report.failed += 1;
                    if failures.push(story_link) {
                        self.store.save_json(FAILED_STORY_URLS, &failures)?;
                    }
                }
            }
        }

        info_time!(start_time, "Finished stage {report}");
        Ok(report)
    }

    async fn harvest_story(&self, story_link: &str, book: &mut StoryBook) -> Result<()> {
        let page = self.fetcher.fetch(story_link).await?.found(story_link)?;
        let story_url = story_link.to_string();
        let story = extract(page.html, move |html| find_story(html, &story_url)).await?;

        let key = story.key();
        let previous = book.insert(story);
        if let Some(previous) = &previous {
            if previous.story_url != story_link {
                warn_time!(
                    "Story `{key}` from {story_link} replaces the one from {}",
                    previous.story_url
                );
            }
        }

        info_time!("Dumping {} stories to checkpoint {STORIES}", book.len());
        if let Err(e) = self.store.save_json(STORIES, book) {
            // Keep memory in step with what is on disk.
            book.undo_insert(&key, previous);
            return Err(e);
        }
        Ok(())
    }

    /// Runs all three stages in order.
    pub async fn run_all(&self) -> Result<Vec<StageReport>> {
        Ok(vec![
            self.harvest_issue_links().await?,
            self.harvest_story_links().await?,
            self.harvest_stories().await?,
        ])
    }
}
