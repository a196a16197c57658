use crate::config::{Config, RetryConfig};
use crate::dedup::SeenIds;
use crate::feeds::TimelineSource;
use crate::notify::Notifier;
use crate::parser::parse_feed;
use crate::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Parsing,
    Emitting,
    Sleeping,
    Stopped,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Emitting => "emitting",
            Self::Sleeping => "sleeping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetch_failed: bool,
    pub fetched: usize,
    pub parsed: usize,
    pub new: usize,
    pub printed: usize,
    pub logged: usize,
    pub critical: usize,
    pub alerted: bool,
}

/// Drives fetch → parse → dedup → emit → sleep until told to stop.
pub struct Poller {
    source: Box<dyn TimelineSource>,
    notifier: Notifier,
    seen: SeenIds,
    limit: u32,
    interval: Duration,
    retry: RetryConfig,
    state: PollState,
}

impl Poller {
    pub fn new(source: Box<dyn TimelineSource>, notifier: Notifier, config: &Config) -> Self {
        Self {
            source,
            notifier,
            // Never smaller than one page, whatever the config says.
            seen: SeenIds::new(config.seen_capacity.max(config.limit as usize)),
            limit: config.limit,
            interval: config.interval(),
            retry: config.retry.clone(),
            state: PollState::Idle,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    fn set_state(&mut self, state: PollState) {
        debug!(from = %self.state, to = %state, "poll state");
        self.state = state;
    }

    /// One full cycle without the trailing sleep.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        self.set_state(PollState::Fetching);
        match self.fetch().await {
            Some(items) => self.process(&items, now).await,
            None => Ok(CycleReport {
                fetch_failed: true,
                ..CycleReport::default()
            }),
        }
    }

    /// Poll until `shutdown` resolves. The signal is honoured while
    /// fetching, printing and sleeping; on the way out the terminal is reset.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.set_state(PollState::Fetching);
            let fetched = tokio::select! {
                () = &mut shutdown => break,
                items = self.fetch() => items,
            };

            if let Some(items) = fetched {
                tokio::select! {
                    () = &mut shutdown => break,
                    result = self.process(&items, Utc::now()) => match result {
                        Ok(report) => debug!(?report, "cycle done"),
                        Err(e) => warn!("failed to print posts: {}", e),
                    },
                }
            }

            self.set_state(PollState::Sleeping);
            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        self.set_state(PollState::Stopped);
        self.notifier.reset_terminal()
    }

    /// Fetch with the configured retry policy. `None` means this cycle
    /// has nothing to show.
    async fn fetch(&self) -> Option<Vec<serde_json::Value>> {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.source.fetch_timeline(self.limit).await {
                Ok(items) => return Some(items),
                Err(e) => {
                    debug!(attempt, attempts, "timeline fetch failed: {}", e);
                    if attempt < attempts && self.retry.backoff_ms > 0 {
                        let backoff = self.retry.backoff_ms * u64::from(attempt);
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }
        None
    }

    async fn process(
        &mut self,
        items: &[serde_json::Value],
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        self.set_state(PollState::Parsing);
        let candidates = parse_feed(items);
        let parsed = candidates.len();
        let fresh = self.seen.filter_new(candidates);

        self.set_state(PollState::Emitting);
        let emitted = self.notifier.emit(&fresh, now).await?;

        Ok(CycleReport {
            fetch_failed: false,
            fetched: items.len(),
            parsed,
            new: fresh.len(),
            printed: emitted.printed,
            logged: emitted.logged,
            critical: emitted.critical,
            alerted: emitted.alerted,
        })
    }
}
