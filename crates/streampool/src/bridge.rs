//! Line-delimited JSON control bridge.
//!
//! Reads one `ControlRequest` per line from the input and writes one JSON
//! object per line to the output: every session status transition, plus a
//! reply for each `pool_status` request.
//!
//! Input is read on a plain OS thread and forwarded over a channel. A blocking
//! read can't be cancelled, so the thread is left behind on shutdown instead
//! of holding the runtime open until the next line arrives.

use std::io::{self, BufRead, BufReader, Read};
use std::thread;

use anyhow::{Context, Result};
use poolproto::{ControlRequest, SessionEvent};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::PoolSnapshot;
use crate::pool::PoolHandle;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeOutput<'a> {
    SessionStatus(&'a SessionEvent),
    PoolStatus(&'a PoolSnapshot),
}

async fn write_line<W>(output: &mut W, item: &BridgeOutput<'_>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(item).context("failed to serialize output")?;
    line.push(b'\n');
    output.write_all(&line).await.context("failed to write output")?;
    output.flush().await.context("failed to flush output")?;
    Ok(())
}

/// Lines read from a blocking source, in order. The channel closes at EOF or
/// after the first read error.
pub type InputLines = mpsc::Receiver<io::Result<String>>;

/// Read `input` line by line on a detached thread.
///
/// The thread exits once the receiver is dropped and the next read returns.
pub fn spawn_line_reader<R>(input: R, buffer: usize) -> io::Result<InputLines>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));
    thread::Builder::new()
        .name("control-input".to_string())
        .spawn(move || {
            for line in BufReader::new(input).lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("control input reader exiting");
        })?;
    Ok(rx)
}

/// Run until the input ends, the pool goes away, or `shutdown` fires.
pub async fn run<W>(
    handle: PoolHandle,
    mut lines: InputLines,
    mut output: W,
    shutdown: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut events = handle.subscribe();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("bridge cancelled");
                break;
            }

            line = lines.recv() => {
                let Some(line) = line else {
                    info!("control input closed");
                    break;
                };
                let line = line.context("failed to read control input")?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let request: ControlRequest = match serde_json::from_str(line) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(error = %e, "skipping malformed control line");
                        continue;
                    }
                };

                if let Some(snapshot) = handle.request(request).await? {
                    write_line(&mut output, &BridgeOutput::PoolStatus(&snapshot)).await?;
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        write_line(&mut output, &BridgeOutput::SessionStatus(&event)).await?;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "bridge fell behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}
