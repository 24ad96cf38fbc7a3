use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use harvest::checkpoint::{
    BlobStore, FailureList, FsStore, LinkLedger, StoryBook, FAILED_STORY_URLS, ISSUE_LINKS,
    STORIES, STORY_LINKS,
};
use harvest::limiter::Throttled;
use harvest::process::Harvester;
use harvest::request::HttpFetcher;
use harvest::{info_time, Config, Result, BASE_URL, CHECKPOINT_DIR, DELAY_SECS, FICTION_GENRES};

#[derive(Parser)]
#[command(name = "harvest", about = "Resumable magazine story harvester")]
struct Cli {
    /// Directory holding the checkpoint files
    #[arg(long, global = true, default_value = CHECKPOINT_DIR)]
    checkpoint_dir: PathBuf,
    /// Minimum seconds between two requests
    #[arg(long, global = true, default_value_t = DELAY_SECS)]
    delay_secs: u64,
    /// Paginated issue listing, `/<page>` is appended unless it contains `{page}`
    #[arg(long, global = true, default_value = BASE_URL)]
    base_url: String,
    /// Issue category to harvest, repeat for several (default: Science Fiction, Fantasy)
    #[arg(long = "genre", global = true)]
    genres: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect issue links from the paginated issue listing
    Issues,
    /// Collect story links from every collected issue
    StoryLinks,
    /// Extract every collected story
    Stories,
    /// Run all three stages in order
    Run,
    /// Print the story URLs that failed extraction
    Failures,
    /// Show how far each stage got
    Status,
}

impl Cli {
    fn config(&self) -> Config {
        let genres = if self.genres.is_empty() {
            FICTION_GENRES.iter().map(|genre| genre.to_string()).collect()
        } else {
            self.genres.clone()
        };
        Config {
            base_url: self.base_url.clone(),
            genres,
            delay: Duration::from_secs(self.delay_secs),
            checkpoint_dir: self.checkpoint_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let cli = Cli::parse();
    let config = cli.config();
    let store = FsStore::new(&config.checkpoint_dir);

    match cli.command {
        Commands::Failures => {
            let failures: FailureList = store.load_json(FAILED_STORY_URLS)?.unwrap_or_default();
            for url in failures.urls() {
                println!("{url}");
            }
            return Ok(());
        }
        Commands::Status => {
            print_status(&store)?;
            return Ok(());
        }
        _ => {}
    }

    let fetcher = Throttled::new(HttpFetcher::default(), config.delay);
    let harvester = Harvester::new(fetcher, store, config);
    let reports = match cli.command {
        Commands::Issues => vec![harvester.harvest_issue_links().await?],
        Commands::StoryLinks => vec![harvester.harvest_story_links().await?],
        Commands::Stories => vec![harvester.harvest_stories().await?],
        _ => harvester.run_all().await?,
    };
    for report in reports {
        info_time!("{report}");
    }
    info_time!(start_time, "Full program time:");

    Ok(())
}

fn print_status(store: &FsStore) -> Result<()> {
    let issues: Option<LinkLedger> = store.load_json(ISSUE_LINKS)?;
    let story_links: Option<LinkLedger> = store.load_json(STORY_LINKS)?;
    let stories: Option<StoryBook> = store.load_json(STORIES)?;
    let failures: Option<FailureList> = store.load_json(FAILED_STORY_URLS)?;

    println!("Checkpoints in {}", store.dir().display());
    match issues {
        Some(l) => println!("{ISSUE_LINKS:<20} {} pages, {} links", l.processed.len(), l.links.len()),
        None => println!("{ISSUE_LINKS:<20} not started"),
    }
    match story_links {
        Some(l) => println!("{STORY_LINKS:<20} {} issues, {} links", l.processed.len(), l.links.len()),
        None => println!("{STORY_LINKS:<20} not started"),
    }
    match stories {
        Some(book) => println!(
            "{STORIES:<20} {} stories, {} superseded",
            book.len(),
            book.superseded().len()
        ),
        None => println!("{STORIES:<20} not started"),
    }
    println!(
        "{FAILED_STORY_URLS:<20} {} failed",
        failures.map(|f| f.len()).unwrap_or(0)
    );
    Ok(())
}
