use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::error::PulseResult;

pub const DASHBOARD_REFRESH: Duration = Duration::from_secs(30);
pub const ANALYTICS_REFRESH: Duration = Duration::from_secs(60);

/// A successful response and the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub token: Uuid,
    pub fetched_at: DateTime<Utc>,
}

/// Last successful response for one resource. Only the response to the most
/// recently issued request token is kept; anything older is dropped.
pub struct Snapshot<T> {
    latest_token: Arc<Mutex<Option<Uuid>>>,
    value: Arc<watch::Sender<Option<Stamped<T>>>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            latest_token: Arc::clone(&self.latest_token),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            latest_token: Arc::new(Mutex::new(None)),
            value: Arc::new(watch::channel(None).0),
        }
    }
}

impl<T: Clone> Snapshot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new request as the latest and returns its token.
    pub fn issue(&self) -> Uuid {
        let token = Uuid::new_v4();
        *self.token_slot() = Some(token);
        token
    }

    /// No outstanding request may update the slot after this.
    pub fn invalidate(&self) {
        *self.token_slot() = None;
    }

    /// Stores `value` if `token` is still the latest issued. Returns whether it was kept.
    pub fn accept(&self, token: Uuid, value: T) -> bool {
        let latest = self.token_slot();
        if *latest != Some(token) {
            return false;
        }
        self.value.send_replace(Some(Stamped {
            value,
            token,
            fetched_at: Utc::now(),
        }));
        true
    }

    pub fn latest(&self) -> Option<Stamped<T>> {
        self.value.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Stamped<T>>> {
        self.value.subscribe()
    }

    fn token_slot(&self) -> std::sync::MutexGuard<'_, Option<Uuid>> {
        self.latest_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running refetch loop. Dropping it cancels the loop.
pub struct PollTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Runs `fetch` every `period`, starting immediately. Ticks do not wait for
    /// earlier requests; each request carries its own token into `snapshot`.
    pub fn spawn<T, F, Fut>(
        name: &'static str,
        period: Duration,
        snapshot: Snapshot<T>,
        fetch: F,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PulseResult<T>> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let request_shutdown = shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let token = snapshot.issue();
                        tracing::debug!(poll = name, %token, "issuing request");
                        let request = fetch();
                        let snapshot = snapshot.clone();
                        let cancelled = request_shutdown.clone();
                        tokio::spawn(async move {
                            let result = request.await;
                            if *cancelled.borrow() {
                                tracing::debug!(poll = name, %token, "dropping response after cancel");
                                return;
                            }
                            match result {
                                Ok(value) => {
                                    if !snapshot.accept(token, value) {
                                        tracing::debug!(poll = name, %token, "discarding stale response");
                                    }
                                }
                                Err(err) => {
                                    tracing::warn!(poll = name, %token, %err, "poll request failed");
                                }
                            }
                        });
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(poll = name, "poll loop stopped");
        });

        Self { shutdown, handle }
    }

    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One periodically refreshed resource whose loop can be restarted, e.g. when
/// the request parameters change.
pub struct Poller<T> {
    name: &'static str,
    period: Duration,
    snapshot: Snapshot<T>,
    task: Option<PollTask>,
}

impl<T: Clone + Send + Sync + 'static> Poller<T> {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            snapshot: Snapshot::new(),
            task: None,
        }
    }

    pub fn snapshot(&self) -> &Snapshot<T> {
        &self.snapshot
    }

    /// Cancels the running loop, if any, then starts a new one.
    pub fn restart<F, Fut>(&mut self, fetch: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PulseResult<T>> + Send + 'static,
    {
        self.stop();
        tracing::info!(poll = self.name, period_secs = self.period.as_secs(), "starting poll loop");
        self.task = Some(PollTask::spawn(
            self.name,
            self.period,
            self.snapshot.clone(),
            fetch,
        ));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
            self.snapshot.invalidate();
        }
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}
