//! Feed poller: refreshes the message buffer on a fixed period.
//!
//! Arming spawns one task that fetches immediately and then on every tick.
//! Polls run sequentially inside that task, so snapshot N+1 is never
//! published before snapshot N. Fetch failures keep the previous messages
//! and never stop the timer; only [`FeedPoller::disarm`] does.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::POLL_INTERVAL_SECS;
use crate::error::ErrorKind;
use crate::gateway::{GatewayConfig, RelayClient};
use crate::models::ChatMessage;
use crate::Error;

pub const POLL_PERIOD: Duration = Duration::from_secs(POLL_INTERVAL_SECS);
/// Shortest accepted period; `tokio::time::interval` rejects zero.
pub const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct FeedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for FeedError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Latest view of the upstream message window.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Increments on every completed poll.
    pub sequence: u64,
    pub messages: Vec<ChatMessage>,
    pub last_error: Option<FeedError>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl FeedSnapshot {
    pub fn is_online(&self) -> bool {
        self.sequence > 0 && self.last_error.is_none()
    }
}

#[derive(Debug)]
struct PollHandle {
    task: JoinHandle<()>,
    channel_id: String,
}

#[derive(Debug)]
enum PollerState {
    Disarmed,
    Armed(PollHandle),
}

#[derive(Debug)]
pub struct FeedPoller {
    relay: RelayClient,
    period: Duration,
    state: PollerState,
    feed: Arc<watch::Sender<FeedSnapshot>>,
}

impl FeedPoller {
    /// `period` is raised to [`MIN_POLL_PERIOD`] if shorter.
    pub fn new(relay: RelayClient, period: Duration) -> Self {
        let (feed, _) = watch::channel(FeedSnapshot::default());
        Self {
            relay,
            period: period.max(MIN_POLL_PERIOD),
            state: PollerState::Disarmed,
            feed: Arc::new(feed),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.feed.subscribe()
    }

    pub fn latest(&self) -> FeedSnapshot {
        self.feed.borrow().clone()
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, PollerState::Armed(_))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start polling `config`, replacing any running timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, config: GatewayConfig) {
        self.disarm();

        let relay = self.relay.clone();
        let feed = Arc::clone(&self.feed);
        let period = self.period;
        let channel_id = config.channel_id.clone();

        info!(channel = %channel_id, period_secs = period.as_secs_f64(), "Feed poller armed");
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                poll_once(&relay, &config, &feed).await;
            }
        });

        self.state = PollerState::Armed(PollHandle { task, channel_id });
    }

    /// Cancel the timer. An in-flight fetch is dropped with the task.
    pub fn disarm(&mut self) {
        if let PollerState::Armed(handle) = std::mem::replace(&mut self.state, PollerState::Disarmed)
        {
            handle.task.abort();
            info!(channel = %handle.channel_id, "Feed poller disarmed");
        }
    }
}

impl Drop for FeedPoller {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn poll_once(relay: &RelayClient, config: &GatewayConfig, feed: &watch::Sender<FeedSnapshot>) {
    match relay.fetch_messages(config).await {
        Ok(messages) => {
            info!(count = messages.len(), channel = %config.channel_id, "Feed refreshed");
            feed.send_modify(|snapshot| {
                snapshot.sequence += 1;
                snapshot.messages = messages;
                snapshot.last_error = None;
                snapshot.fetched_at = Some(Utc::now());
            });
        }
        Err(e) => {
            warn!(error = %e, kind = e.kind().as_str(), channel = %config.channel_id, "Feed poll failed");
            let error = FeedError::from(&e);
            feed.send_modify(|snapshot| {
                snapshot.sequence += 1;
                snapshot.last_error = Some(error);
            });
        }
    }
}
