use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("Page structure changed, couldn't find: {step}")]
    StructureMismatch { step: &'static str },
    #[error("Malformed story at {url}, missing: {}", .missing.join(", "))]
    MalformedStory {
        url: String,
        missing: Vec<&'static str>,
    },

    #[error("Transport error while fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Checkpoint `{0}` doesn't exist, run the previous stage first.")]
    MissingCheckpoint(&'static str),

    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checkpoint (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn transport(
        url: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            url: url.to_string(),
            source: source.into(),
        }
    }
}
