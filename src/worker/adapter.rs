//! Worker-side protocol handler: owns the engine, serves INIT / SEARCH /
//! CANCEL and turns engine output into BESTMOVE messages.

use super::engine::{EngineHandle, EngineRegistry};
use super::protocol::{Inbound, Outbound, SearchPayload};
use super::uci::{parse_engine_line, EngineCommand, EngineLine};
use crate::error::EngineError;
use crate::time::{TimeManager, DEFAULT_TIME_BUDGET_MS};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, info, warn};

/// Delay before the single deferred bring-up retry.
pub const INIT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSearch {
    id: Option<String>,
    started_at: Instant,
}

pub struct WorkerAdapter {
    registry: EngineRegistry,
    engine: Option<Box<dyn EngineHandle>>,
    pending: Option<PendingSearch>,
    /// `bestmove` lines still owed by searches that were stopped and dropped.
    stale_results: usize,
    retry_requested: bool,
    retry_scheduled: bool,
    forward_engine_log: bool,
    out: mpsc::UnboundedSender<Outbound>,
    lines_tx: mpsc::UnboundedSender<String>,
    lines_rx: Option<mpsc::UnboundedReceiver<String>>,
    backstop_tx: mpsc::UnboundedSender<Option<String>>,
    backstop_rx: Option<mpsc::UnboundedReceiver<Option<String>>>,
}

impl WorkerAdapter {
    pub fn new(registry: EngineRegistry, out: mpsc::UnboundedSender<Outbound>) -> Self {
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let (backstop_tx, backstop_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            engine: None,
            pending: None,
            stale_results: 0,
            retry_requested: false,
            retry_scheduled: false,
            forward_engine_log: false,
            out,
            lines_tx,
            lines_rx: Some(lines_rx),
            backstop_tx,
            backstop_rx: Some(backstop_rx),
        }
    }

    pub fn forward_engine_log(mut self, enabled: bool) -> Self {
        self.forward_engine_log = enabled;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// Serve requests until the inbound channel closes.
    pub async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
        let (Some(mut lines), Some(mut backstops)) = (self.lines_rx.take(), self.backstop_rx.take())
        else {
            return;
        };
        let mut retry: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => break,
                },
                Some(line) = lines.recv() => self.on_engine_line(&line),
                Some(id) = backstops.recv() => self.on_backstop(id),
                _ = async { if let Some(s) = retry.as_mut() { s.await } }, if retry.is_some() => {
                    retry = None;
                    self.retry_scheduled = false;
                    if !self.is_ready() {
                        debug!("deferred engine bring-up retry");
                        self.bring_up().await;
                    }
                }
            }
            if self.retry_requested {
                self.retry_requested = false;
                if retry.is_none() {
                    self.retry_scheduled = true;
                    retry = Some(Box::pin(sleep(INIT_RETRY_DELAY)));
                }
            }
        }

        if let Some(engine) = self.engine.as_mut() {
            let _ = engine.send_command(&EngineCommand::Quit.to_string());
        }
        debug!("worker adapter stopped");
    }

    pub async fn handle(&mut self, msg: Inbound) {
        match msg {
            Inbound::Init => {
                // never reports failure; only a later SEARCH does
                self.ensure_engine().await;
            }
            Inbound::Cancel { id } => self.cancel_pending(id.as_deref()),
            Inbound::Search { id, payload } => self.search(id, payload).await,
        }
    }

    async fn ensure_engine(&mut self) -> bool {
        if self.is_ready() {
            return true;
        }
        let ready = self.bring_up().await;
        if !ready && !self.retry_scheduled {
            self.retry_requested = true;
        }
        ready
    }

    async fn bring_up(&mut self) -> bool {
        match self.registry.bring_up(self.lines_tx.clone()).await {
            Ok((slot, mut engine)) => {
                info!(slot = slot.name(), "engine ready");
                if let Err(err) = engine.send_command(&EngineCommand::Uci.to_string()) {
                    warn!(%err, "engine rejected uci handshake");
                }
                self.engine = Some(engine);
                self.post(Outbound::Ready);
                true
            }
            Err(err) => {
                debug!(%err, "engine bring-up exhausted");
                false
            }
        }
    }

    async fn search(&mut self, id: Option<String>, payload: Option<SearchPayload>) {
        let Some(payload) = payload else {
            self.post(Outbound::error("SEARCH missing payload", id));
            return;
        };
        if !self.ensure_engine().await {
            self.post(Outbound::error("Engine not initialized", id));
            return;
        }

        // one search at a time
        self.cancel_pending(None);

        let budget = payload.time_budget_ms.unwrap_or(DEFAULT_TIME_BUDGET_MS);
        let explicit = payload.move_time_ms.filter(|&ms| ms > 0);
        let movetime = TimeManager::engine_movetime(budget, explicit);
        self.pending = Some(PendingSearch {
            id: id.clone(),
            started_at: Instant::now(),
        });

        let commands = [
            EngineCommand::position(&payload.position),
            EngineCommand::Go { movetime },
        ];
        for command in commands {
            if let Err(err) = self.send(&command) {
                self.post(Outbound::error(format!("Failed to send go command: {err}"), id));
                self.pending = None;
                return;
            }
        }
        debug!(id = ?id, movetime, "search started");

        let cap = TimeManager::backstop(budget);
        let backstops = self.backstop_tx.clone();
        tokio::spawn(async move {
            sleep(cap).await;
            let _ = backstops.send(id);
        });
    }

    fn send(&mut self, command: &EngineCommand) -> Result<(), EngineError> {
        match self.engine.as_mut() {
            Some(engine) => engine.send_command(&command.to_string()),
            None => Err(EngineError::Closed),
        }
    }

    /// Stop the engine and forget the pending search when `id` matches it or
    /// no id is given.
    fn cancel_pending(&mut self, id: Option<&str>) {
        if self.pending.is_none() {
            return;
        }
        if let Err(err) = self.send(&EngineCommand::Stop) {
            debug!(%err, "stop not delivered");
        }
        let matches = id.is_none()
            || self
                .pending
                .as_ref()
                .is_some_and(|p| p.id.as_deref() == id);
        if matches {
            if let Some(pending) = self.pending.take() {
                debug!(id = ?pending.id, "search cancelled");
            }
            self.stale_results += 1;
        }
    }

    fn on_backstop(&mut self, id: Option<String>) {
        if self.pending.as_ref().is_some_and(|p| p.id == id) {
            warn!(id = ?id, "search overran its budget, forcing stop");
            if let Err(err) = self.send(&EngineCommand::Stop) {
                debug!(%err, "stop not delivered");
            }
        }
    }

    fn on_engine_line(&mut self, line: &str) {
        match parse_engine_line(line) {
            EngineLine::BestMove(bestmove) => {
                if self.stale_results > 0 {
                    self.stale_results -= 1;
                    debug!(%bestmove, "result of a stopped search dropped");
                    return;
                }
                let pending = self.pending.take();
                if let Some(p) = &pending {
                    debug!(id = ?p.id, %bestmove, elapsed_ms = p.started_at.elapsed().as_millis() as u64, "search finished");
                }
                self.post(Outbound::BestMove {
                    id: pending.and_then(|p| p.id),
                    bestmove,
                    raw: line.trim().to_string(),
                });
            }
            _ if self.forward_engine_log => self.post(Outbound::EngineMsg {
                text: line.to_string(),
            }),
            _ => {}
        }
    }

    fn post(&self, msg: Outbound) {
        if self.out.send(msg).is_err() {
            debug!("outbound channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::engine::{EngineLines, Slot};
    use std::sync::{Arc, Mutex};

    /// Records commands and answers `go` with a fixed best move.
    struct Scripted {
        sent: Arc<Mutex<Vec<String>>>,
        lines: EngineLines,
        reply: &'static str,
    }

    impl EngineHandle for Scripted {
        fn send_command(&mut self, command: &str) -> Result<(), EngineError> {
            self.sent.lock().unwrap().push(command.to_string());
            if command.starts_with("go") {
                let _ = self.lines.send("info depth 1".to_string());
                let _ = self.lines.send(format!("bestmove {} ponder e7e5", self.reply));
            }
            Ok(())
        }
    }

    fn scripted(sent: Arc<Mutex<Vec<String>>>) -> EngineRegistry {
        let mut registry = EngineRegistry::new();
        registry.register(Slot::Direct, move |lines| {
            Ok(Box::new(Scripted {
                sent: sent.clone(),
                lines,
                reply: "e2e4",
            }) as Box<dyn EngineHandle>)
        });
        registry
    }

    #[tokio::test]
    async fn search_without_payload_is_an_error() {
        let (out, mut rx) = mpsc::unbounded_channel();
        let mut adapter = WorkerAdapter::new(EngineRegistry::new(), out);
        adapter
            .handle(Inbound::Search {
                id: Some("a".into()),
                payload: None,
            })
            .await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::error("SEARCH missing payload", Some("a".into()))
        );
    }

    #[tokio::test]
    async fn init_is_silent_without_engine_but_search_reports() {
        let (out, mut rx) = mpsc::unbounded_channel();
        let mut adapter = WorkerAdapter::new(EngineRegistry::new(), out);
        adapter.handle(Inbound::Init).await;
        assert!(rx.try_recv().is_err());
        adapter
            .handle(Inbound::Search {
                id: Some("b".into()),
                payload: Some(SearchPayload::new("startpos", 500)),
            })
            .await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::error("Engine not initialized", Some("b".into()))
        );
    }

    #[tokio::test]
    async fn search_sends_position_and_clamped_go() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (out, mut rx) = mpsc::unbounded_channel();
        let mut adapter = WorkerAdapter::new(scripted(sent.clone()), out);
        adapter.handle(Inbound::Init).await;
        assert_eq!(rx.try_recv().unwrap(), Outbound::Ready);

        adapter
            .handle(Inbound::Search {
                id: Some("c".into()),
                payload: Some(SearchPayload::new("", 20_000)),
            })
            .await;
        let sent = sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["uci", "position startpos", "go movetime 8000"]);
    }

    #[tokio::test]
    async fn bestmove_line_is_tagged_with_pending_id() {
        let (out, mut rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut adapter = WorkerAdapter::new(scripted(sent), out).forward_engine_log(true);
        adapter.handle(Inbound::Init).await;
        adapter
            .handle(Inbound::Search {
                id: Some("d".into()),
                payload: Some(SearchPayload::new("startpos", 300)),
            })
            .await;
        adapter.on_engine_line("info depth 1");
        adapter.on_engine_line("bestmove e2e4 ponder e7e5");

        assert_eq!(rx.try_recv().unwrap(), Outbound::Ready);
        assert!(matches!(rx.try_recv().unwrap(), Outbound::EngineMsg { .. }));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::BestMove {
                id: Some("d".into()),
                bestmove: "e2e4".into(),
                raw: "bestmove e2e4 ponder e7e5".into(),
            }
        );
        assert!(adapter.pending.is_none());
    }

    #[tokio::test]
    async fn cancel_only_clears_matching_id() {
        let (out, _rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut adapter = WorkerAdapter::new(scripted(sent.clone()), out);
        adapter.handle(Inbound::Init).await;
        adapter
            .handle(Inbound::Search {
                id: Some("e".into()),
                payload: Some(SearchPayload::new("startpos", 300)),
            })
            .await;

        adapter.handle(Inbound::Cancel { id: Some("zzz".into()) }).await;
        assert!(adapter.pending.is_some());
        adapter.handle(Inbound::Cancel { id: Some("e".into()) }).await;
        assert!(adapter.pending.is_none());
        assert_eq!(sent.lock().unwrap().iter().filter(|c| *c == "stop").count(), 2);
    }
}
