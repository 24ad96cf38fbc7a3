use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::request::{Fetched, Fetcher};
use crate::Result;

/// Keeps consecutive fetches at least `interval` apart.
/// The first call never waits.
#[derive(Debug)]
pub struct MinInterval {
    interval: Duration,
    last: Option<Instant>,
}

impl MinInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// How long the next caller would have to wait right now.
    pub fn remaining(&self) -> Duration {
        match self.last {
            Some(last) => (last + self.interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Waits out the rest of the interval and marks a new slot as taken.
    pub async fn ready(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}

/// A `Fetcher` that paces every request through one shared `MinInterval`.
pub struct Throttled<F> {
    inner: F,
    limiter: Mutex<MinInterval>,
}

impl<F: Fetcher> Throttled<F> {
    pub fn new(inner: F, interval: Duration) -> Self {
        Self {
            inner,
            limiter: Mutex::new(MinInterval::new(interval)),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for Throttled<F> {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        // Held across the fetch so a request never overlaps the next slot.
        let mut limiter = self.limiter.lock().await;
        limiter.ready().await;
        self.inner.fetch(url).await
    }
}
