//! Client side of the worker protocol.
//!
//! At most one search is outstanding. A new request supersedes the previous
//! one, responses are matched strictly by request id, and every request
//! settles by itself after its time budget plus a grace period.

use crate::worker::{Inbound, Outbound, SearchPayload, WorkerLink};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default wait past the budget before a request is abandoned.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(1000);

/// How a search request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Best move text as reported by the engine, not yet validated.
    Resolved(String),
    TimedOut,
    /// Replaced by a newer request before an answer arrived.
    Superseded,
    Cancelled,
    /// The worker reported an error or is gone.
    Failed(String),
}

impl SearchOutcome {
    pub fn best_move(&self) -> Option<&str> {
        match self {
            SearchOutcome::Resolved(mv) => Some(mv),
            _ => None,
        }
    }
}

struct PendingSearch {
    id: String,
    reply: oneshot::Sender<SearchOutcome>,
}

type PendingSlot = Arc<Mutex<Option<PendingSearch>>>;

fn lock(slot: &PendingSlot) -> std::sync::MutexGuard<'_, Option<PendingSearch>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Inner {
    requests: mpsc::UnboundedSender<Inbound>,
    pending: PendingSlot,
    counter: AtomicU64,
    grace: Duration,
    pump: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pending) = lock(&self.pending).take() {
            let _ = self.requests.send(Inbound::Cancel {
                id: Some(pending.id),
            });
        }
        self.pump.abort();
    }
}

/// Cheap to clone; all clones share the single pending slot.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

impl SearchOrchestrator {
    /// Take over a worker link and ask it to bring its engine up.
    pub fn new(link: WorkerLink, grace: Duration) -> Self {
        let WorkerLink {
            requests,
            responses,
        } = link;
        let pending: PendingSlot = Arc::new(Mutex::new(None));
        let pump = tokio::spawn(pump(responses, pending.clone()));
        if requests.send(Inbound::Init).is_err() {
            warn!("worker closed before init");
        }
        Self {
            inner: Arc::new(Inner {
                requests,
                pending,
                counter: AtomicU64::new(0),
                grace,
                pump,
            }),
        }
    }

    fn next_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let n = self.inner.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{millis}-{n}")
    }

    pub fn pending_id(&self) -> Option<String> {
        lock(&self.inner.pending).as_ref().map(|p| p.id.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.pending_id().is_some()
    }

    /// Send a search for `position` and return a future for its outcome.
    /// The request is registered before this returns, so a later call
    /// supersedes it even if the returned future was never polled.
    pub fn search(
        &self,
        position: &str,
        time_budget_ms: u64,
    ) -> impl Future<Output = SearchOutcome> + Send + 'static {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();

        let previous = lock(&self.inner.pending).replace(PendingSearch {
            id: id.clone(),
            reply: tx,
        });
        if let Some(previous) = previous {
            debug!(id = %previous.id, by = %id, "search superseded");
            let _ = self.inner.requests.send(Inbound::Cancel {
                id: Some(previous.id),
            });
            let _ = previous.reply.send(SearchOutcome::Superseded);
        }

        let sent = self.inner.requests.send(Inbound::Search {
            id: Some(id.clone()),
            payload: Some(SearchPayload::new(position, time_budget_ms)),
        });
        if sent.is_err() {
            warn!(%id, "worker gone, search not sent");
            if let Some(p) = take_if(&self.inner.pending, &id) {
                let _ = p.reply.send(SearchOutcome::Failed("worker closed".to_string()));
            }
        } else {
            debug!(%id, time_budget_ms, "search requested");
        }

        // fires whether or not the returned future is ever polled
        let limit = Duration::from_millis(time_budget_ms) + self.inner.grace;
        let requests = self.inner.requests.downgrade();
        let pending = Arc::downgrade(&self.inner.pending);
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            let Some(pending) = pending.upgrade() else {
                return;
            };
            if let Some(p) = take_if(&pending, &id) {
                if let Some(requests) = requests.upgrade() {
                    let _ = requests.send(Inbound::Cancel {
                        id: Some(id.clone()),
                    });
                }
                info!(id = %id, "search timed out");
                let _ = p.reply.send(SearchOutcome::TimedOut);
            }
        });

        async move { rx.await.unwrap_or(SearchOutcome::Cancelled) }
    }

    /// Abandon the pending search, if any. Its future settles as cancelled.
    pub fn cancel(&self) {
        if let Some(pending) = lock(&self.inner.pending).take() {
            debug!(id = %pending.id, "search cancelled");
            let _ = self.inner.requests.send(Inbound::Cancel {
                id: Some(pending.id),
            });
        }
    }
}

fn take_if(slot: &PendingSlot, id: &str) -> Option<PendingSearch> {
    let mut guard = lock(slot);
    if guard.as_ref().is_some_and(|p| p.id == id) {
        guard.take()
    } else {
        None
    }
}

fn settle(slot: &PendingSlot, id: &str, outcome: SearchOutcome) {
    match take_if(slot, id) {
        Some(pending) => {
            debug!(%id, ?outcome, "search settled");
            let _ = pending.reply.send(outcome);
        }
        None => debug!(%id, "stale response ignored"),
    }
}

async fn pump(mut responses: mpsc::UnboundedReceiver<Outbound>, pending: PendingSlot) {
    while let Some(msg) = responses.recv().await {
        match msg {
            Outbound::Ready => info!("search worker ready"),
            Outbound::BestMove {
                id: Some(id),
                bestmove,
                ..
            } => settle(&pending, &id, SearchOutcome::Resolved(bestmove)),
            Outbound::BestMove { id: None, raw, .. } => {
                debug!(%raw, "untagged best move ignored")
            }
            Outbound::EngineMsg { text } => debug!(target: "engine", "{text}"),
            Outbound::Error {
                message,
                id: Some(id),
            } => {
                warn!(%id, %message, "worker error");
                settle(&pending, &id, SearchOutcome::Failed(message));
            }
            Outbound::Error { message, id: None } => warn!(%message, "worker error"),
        }
    }
    debug!("worker response stream closed");
}
