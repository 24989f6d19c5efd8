//! Transports between the search orchestrator and a worker adapter.

use super::adapter::WorkerAdapter;
use super::engine::EngineRegistry;
use super::protocol::{Inbound, Outbound};
use crate::error::EngineError;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Client end of a worker: requests go in, responses come out.
pub struct WorkerLink {
    pub requests: mpsc::UnboundedSender<Inbound>,
    pub responses: mpsc::UnboundedReceiver<Outbound>,
}

impl WorkerLink {
    /// Run the adapter as a task in the current runtime.
    pub fn in_process(registry: EngineRegistry, forward_engine_log: bool) -> Self {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        let adapter = WorkerAdapter::new(registry, resp_tx).forward_engine_log(forward_engine_log);
        tokio::spawn(adapter.run(req_rx));
        Self {
            requests: req_tx,
            responses: resp_rx,
        }
    }

    /// Start a worker executable speaking JSON lines on stdin/stdout.
    pub fn child_process(program: &Path, args: &[String]) -> Result<Self, EngineError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child.stdout.take().ok_or(EngineError::Closed)?;
        let mut stdin = child.stdin.take().ok_or(EngineError::Closed)?;

        let (req_tx, mut req_rx) = mpsc::unbounded_channel::<Inbound>();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = req_rx.recv().await {
                let line = match serde_json::to_string(&msg) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(%err, "request not encodable");
                        continue;
                    }
                };
                if stdin.write_all(format!("{line}\n").as_bytes()).await.is_err()
                    || stdin.flush().await.is_err()
                {
                    warn!("worker process stdin closed");
                    break;
                }
            }
            let _ = child.start_kill();
        });

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                match serde_json::from_str::<Outbound>(&line) {
                    Ok(msg) => {
                        if resp_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(err) => debug!(%err, %line, "ignoring malformed worker output"),
                }
            }
            debug!("worker process output closed");
        });

        Ok(Self {
            requests: req_tx,
            responses: resp_rx,
        })
    }
}

/// Serve a worker over a JSON-lines stream pair until the reader closes.
/// Lines that do not decode into a request are skipped.
pub async fn serve_json_lines<R, W>(
    reader: R,
    mut writer: W,
    registry: EngineRegistry,
    forward_engine_log: bool,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let adapter = WorkerAdapter::new(registry, out_tx).forward_engine_log(forward_engine_log);
    tokio::spawn(adapter.run(req_rx));

    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<Inbound>(&line) {
                    Ok(msg) => {
                        if req_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%err, %line, "ignoring malformed request"),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "request stream failed");
                    break;
                }
            }
        }
    });

    // ends once the adapter stops and drops its sender
    while let Some(msg) = out_rx.recv().await {
        let mut line = serde_json::to_string(&msg)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn json_lines_worker_reports_errors_and_skips_garbage() {
        let (mut client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let serve = tokio::spawn(serve_json_lines(
            BufReader::new(server_read),
            server_write,
            EngineRegistry::new(),
            false,
        ));

        client
            .write_all(b"not json\n{\"type\":\"INIT\"}\n{\"type\":\"SEARCH\",\"id\":\"q\"}\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        let mut text = String::new();
        client.read_to_string(&mut text).await.unwrap();
        serve.await.unwrap().unwrap();

        let replies: Vec<Outbound> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies, vec![Outbound::error("SEARCH missing payload", Some("q".into()))]);
    }
}
