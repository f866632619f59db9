use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    error::AppResult,
    models::{ChangeEvent, PLAYBACK_SESSIONS_TABLE, USER_RATINGS_TABLE},
    repositories::PlaybackRepository,
    services::dispatcher::EventDispatcher,
};

/// Notification channels the push path subscribes to, with the table each one reports on
const CHANNEL_TABLES: [(&str, &str); 2] = [
    ("playback_sessions_change", PLAYBACK_SESSIONS_TABLE),
    ("user_ratings_change", USER_RATINGS_TABLE),
];

pub const MONITORED_CHANNELS: [&str; 2] = [CHANNEL_TABLES[0].0, CHANNEL_TABLES[1].0];

/// Rows fetched per polling scan
const POLL_BATCH: usize = 100;

pub fn table_for_channel(channel: &str) -> Option<&'static str> {
    CHANNEL_TABLES
        .iter()
        .find(|(name, _)| *name == channel)
        .map(|(_, table)| *table)
}

/// Blocking source of `(channel, payload)` store notifications
#[async_trait]
pub trait NotificationListener: Send {
    async fn recv(&mut self) -> AppResult<(String, String)>;
}

#[async_trait]
impl NotificationListener for PgListener {
    async fn recv(&mut self) -> AppResult<(String, String)> {
        let notification = PgListener::recv(self).await?;
        Ok((
            notification.channel().to_string(),
            notification.payload().to_string(),
        ))
    }
}

/// Detects new listening activity and feeds it to the dispatcher.
///
/// Two paths run side by side: a push listener on a dedicated connection and a
/// polling scan over the shared pool that catches whatever the push path
/// misses. Both can report the same change, so handlers must be idempotent.
pub struct ChangeCaptureSource {
    playback: Arc<dyn PlaybackRepository>,
    dispatcher: Arc<EventDispatcher>,
    poll_interval: Duration,
    retry_delay: Duration,
}

impl ChangeCaptureSource {
    pub fn new(
        playback: Arc<dyn PlaybackRepository>,
        dispatcher: Arc<EventDispatcher>,
        poll_interval: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            playback,
            dispatcher,
            // A zero period would spin the ticker
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            retry_delay,
        }
    }

    /// Spawns the poller and, when a listener is available, the push path.
    ///
    /// Without a listener detection relies on polling alone.
    pub fn start<L>(
        self: &Arc<Self>,
        listener: Option<L>,
        cancel: CancellationToken,
    ) -> JoinSet<()>
    where
        L: NotificationListener + 'static,
    {
        let mut tasks = JoinSet::new();

        match listener {
            Some(listener) => {
                let source = Arc::clone(self);
                let token = cancel.clone();
                tasks.spawn(async move { source.run_listener(listener, token).await });
            }
            None => tracing::warn!("No change listener, relying on polling only"),
        }

        let source = Arc::clone(self);
        tasks.spawn(async move { source.run_poller(cancel).await });

        tasks
    }

    /// Push path. Runs until `cancel` fires, then drops `listener`, closing its connection.
    ///
    /// Notifications on unknown channels are ignored. A failed wait is logged and
    /// retried after the configured delay.
    pub async fn run_listener<L: NotificationListener>(
        &self,
        mut listener: L,
        cancel: CancellationToken,
    ) {
        tracing::info!(channels = ?MONITORED_CHANNELS, "Change listener started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = listener.recv() => match received {
                    Ok((channel, payload)) => match table_for_channel(&channel) {
                        Some(table) => {
                            tracing::debug!(channel = %channel, table, "Received change notification");
                            self.dispatcher
                                .dispatch(ChangeEvent::from_notification(table, &payload));
                        }
                        None => tracing::trace!(channel = %channel, "Ignoring unmonitored channel"),
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "Notification wait failed, retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.retry_delay) => {}
                        }
                    }
                },
            }
        }

        drop(listener);
        tracing::info!("Change listener stopped");
    }

    /// Poll path. Scans for new playback sessions every interval until `cancel` fires.
    ///
    /// The cursor starts one interval in the past and moves to wall-clock now
    /// after every scan, whatever the scan returned.
    pub async fn run_poller(&self, cancel: CancellationToken) {
        let mut last_checked = Utc::now()
            - chrono::Duration::from_std(self.poll_interval).unwrap_or_else(|_| chrono::Duration::zero());
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.poll_interval, "Change poller started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let found = self.poll_once(last_checked).await;
                    if found > 0 {
                        tracing::debug!(found, since = %last_checked, "Polling scan found new sessions");
                    }
                    last_checked = Utc::now();
                }
            }
        }

        tracing::info!("Change poller stopped");
    }

    /// Dispatches one insert event per session created after `since` and
    /// returns how many were found. A failed scan finds nothing.
    pub async fn poll_once(&self, since: DateTime<Utc>) -> usize {
        match self.playback.get_sessions_since(since, POLL_BATCH).await {
            Ok(sessions) => {
                let found = sessions.len();
                for session in sessions {
                    self.dispatcher.dispatch(ChangeEvent::from(session));
                }
                found
            }
            Err(e) => {
                tracing::warn!(error = %e, "Polling scan failed");
                0
            }
        }
    }
}
