//! Engine instantiation strategies and the capability they produce.
//!
//! Strategies are tried in a fixed order and the first one that yields an
//! engine wins: a direct factory, an alternate factory name, a namespaced
//! module factory, an asynchronous module factory, and finally a nested UCI
//! engine process.

use crate::error::EngineError;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Where an engine delivers its output, one text line per message.
pub type EngineLines = mpsc::UnboundedSender<String>;

/// A running engine that accepts UCI commands. Output flows through the
/// [`EngineLines`] sender it was built with.
pub trait EngineHandle: Send {
    fn send_command(&mut self, command: &str) -> Result<(), EngineError>;
}

pub type EngineFactory =
    Box<dyn Fn(EngineLines) -> Result<Box<dyn EngineHandle>, EngineError> + Send + Sync>;

pub type EngineFuture =
    Pin<Box<dyn Future<Output = Result<Box<dyn EngineHandle>, EngineError>> + Send>>;

pub type AsyncEngineFactory = Box<dyn Fn(EngineLines) -> EngineFuture + Send + Sync>;

/// Bring-up slots in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Slot {
    Direct,
    AlternateFactory,
    ModuleFactory,
    AsyncModule,
    NestedProcess,
}

impl Slot {
    pub fn name(self) -> &'static str {
        match self {
            Slot::Direct => "stockfish",
            Slot::AlternateFactory => "create_stockfish",
            Slot::ModuleFactory => "module::stockfish",
            Slot::AsyncModule => "create_module",
            Slot::NestedProcess => "process",
        }
    }
}

/// Command line of an external UCI engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Default)]
pub struct EngineRegistry {
    direct: Option<EngineFactory>,
    alternate: Option<EngineFactory>,
    module: Option<EngineFactory>,
    async_module: Option<AsyncEngineFactory>,
    process: Option<ProcessSpec>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with only the nested-process strategy, if a path is given.
    pub fn with_process(program: Option<PathBuf>, args: Vec<String>) -> Self {
        Self {
            process: program.map(|program| ProcessSpec { program, args }),
            ..Self::default()
        }
    }

    /// Register a synchronous factory in one of the three factory slots.
    pub fn register<F>(&mut self, slot: Slot, factory: F) -> &mut Self
    where
        F: Fn(EngineLines) -> Result<Box<dyn EngineHandle>, EngineError> + Send + Sync + 'static,
    {
        let boxed: EngineFactory = Box::new(factory);
        match slot {
            Slot::Direct => self.direct = Some(boxed),
            Slot::AlternateFactory => self.alternate = Some(boxed),
            Slot::ModuleFactory => self.module = Some(boxed),
            Slot::AsyncModule | Slot::NestedProcess => {
                warn!(slot = slot.name(), "slot does not take a synchronous factory");
            }
        }
        self
    }

    pub fn register_async<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(EngineLines) -> EngineFuture + Send + Sync + 'static,
    {
        self.async_module = Some(Box::new(factory));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_none()
            && self.alternate.is_none()
            && self.module.is_none()
            && self.async_module.is_none()
            && self.process.is_none()
    }

    /// Try every registered strategy in slot order; the first success wins.
    pub async fn bring_up(&self, lines: EngineLines) -> Result<(Slot, Box<dyn EngineHandle>), EngineError> {
        let factories = [
            (Slot::Direct, &self.direct),
            (Slot::AlternateFactory, &self.alternate),
            (Slot::ModuleFactory, &self.module),
        ];
        for (slot, factory) in factories {
            let Some(factory) = factory else { continue };
            debug!(slot = slot.name(), "engine bring-up attempt");
            match factory(lines.clone()) {
                Ok(engine) => return Ok((slot, engine)),
                Err(err) => debug!(slot = slot.name(), %err, "engine bring-up failed"),
            }
        }

        if let Some(factory) = &self.async_module {
            debug!(slot = Slot::AsyncModule.name(), "engine bring-up attempt");
            match factory(lines.clone()).await {
                Ok(engine) => return Ok((Slot::AsyncModule, engine)),
                Err(err) => debug!(slot = Slot::AsyncModule.name(), %err, "engine bring-up failed"),
            }
        }

        if let Some(spec) = &self.process {
            debug!(slot = Slot::NestedProcess.name(), program = %spec.program.display(), "engine bring-up attempt");
            match ProcessEngine::spawn(spec, lines) {
                Ok(engine) => return Ok((Slot::NestedProcess, Box::new(engine))),
                Err(err) => debug!(slot = Slot::NestedProcess.name(), %err, "engine bring-up failed"),
            }
        }

        Err(EngineError::Unavailable)
    }
}

/// UCI engine running as a child process. A reader task forwards stdout
/// lines; a writer task feeds stdin so commands never block the caller.
pub struct ProcessEngine {
    commands: mpsc::UnboundedSender<String>,
}

impl ProcessEngine {
    pub fn spawn(spec: &ProcessSpec, lines: EngineLines) -> Result<Self, EngineError> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or(EngineError::Closed)?;
        let mut stdin = child.stdin.take().ok_or(EngineError::Closed)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            loop {
                match reader.next_line().await {
                    Ok(Some(line)) => {
                        if lines.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "engine stdout read failed");
                        break;
                    }
                }
            }
            debug!("engine output closed");
        });

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                let line = format!("{command}\n");
                if let Err(err) = stdin.write_all(line.as_bytes()).await {
                    warn!(%err, "engine stdin write failed");
                    break;
                }
                if let Err(err) = stdin.flush().await {
                    warn!(%err, "engine stdin flush failed");
                    break;
                }
            }
            // child is killed when the last handle goes away
            let _ = child.start_kill();
        });

        info!(program = %spec.program.display(), "engine process started");
        Ok(Self { commands: tx })
    }
}

impl EngineHandle for ProcessEngine {
    fn send_command(&mut self, command: &str) -> Result<(), EngineError> {
        self.commands
            .send(command.to_string())
            .map_err(|_| EngineError::Send(command.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Silent;

    impl EngineHandle for Silent {
        fn send_command(&mut self, _command: &str) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_registry_is_unavailable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let registry = EngineRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(registry.bring_up(tx).await, Err(EngineError::Unavailable)));
    }

    #[tokio::test]
    async fn first_working_slot_wins() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = later_calls.clone();

        let mut registry = EngineRegistry::new();
        registry
            .register(Slot::Direct, |_| Err(EngineError::Unavailable))
            .register(Slot::ModuleFactory, |_| Ok(Box::new(Silent) as Box<dyn EngineHandle>))
            .register_async(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(Box::new(Silent) as Box<dyn EngineHandle>) })
            });

        let (slot, _engine) = registry.bring_up(tx).await.unwrap();
        assert_eq!(slot, Slot::ModuleFactory);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn async_factory_runs_after_sync_failures() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry = EngineRegistry::new();
        registry
            .register(Slot::Direct, |_| Err(EngineError::Unavailable))
            .register_async(|_| Box::pin(async { Ok(Box::new(Silent) as Box<dyn EngineHandle>) }));
        let (slot, _engine) = registry.bring_up(tx).await.unwrap();
        assert_eq!(slot, Slot::AsyncModule);
    }

    #[tokio::test]
    async fn missing_engine_binary_falls_through() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let registry = EngineRegistry::with_process(
            Some(PathBuf::from("/nonexistent/definitely-not-an-engine")),
            Vec::new(),
        );
        assert!(matches!(registry.bring_up(tx).await, Err(EngineError::Unavailable)));
    }
}
