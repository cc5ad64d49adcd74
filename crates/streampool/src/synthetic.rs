//! Synthetic stream workload.
//!
//! Stands in for the real decode/decrypt pipeline: each session runs a
//! periodic task that folds a frame-sized buffer, which costs CPU on the
//! worker thread the way a decoder would.
//!
//! Recognized payload parameters:
//! - `frame_ms`: frame interval (default 20)
//! - `frame_bytes`: bytes folded per frame (default 4096)
//! - `fail_after_frames`: report a failure after this many frames

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use poolproto::{SessionKey, StreamPayload};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::worker::{SessionReporter, StreamWorkload};

const DEFAULT_FRAME_MS: u64 = 20;
const DEFAULT_FRAME_BYTES: u64 = 4096;
const MAX_FRAME_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FramePlan {
    interval: Duration,
    frame_bytes: usize,
    fail_after: Option<u64>,
}

impl FramePlan {
    fn from_payload(payload: &StreamPayload) -> anyhow::Result<Self> {
        let frame_ms = payload.u64_param("frame_ms").unwrap_or(DEFAULT_FRAME_MS);
        if frame_ms == 0 {
            anyhow::bail!("frame_ms must be positive");
        }
        let frame_bytes = payload.u64_param("frame_bytes").unwrap_or(DEFAULT_FRAME_BYTES);
        if frame_bytes > MAX_FRAME_BYTES {
            anyhow::bail!("frame_bytes {frame_bytes} exceeds {MAX_FRAME_BYTES}");
        }
        Ok(Self {
            interval: Duration::from_millis(frame_ms),
            frame_bytes: usize::try_from(frame_bytes).context("frame_bytes out of range")?,
            fail_after: payload.u64_param("fail_after_frames"),
        })
    }
}

/// One frame of "decoding": fold the buffer into a running checksum.
fn fold_frame(buffer: &mut [u8], seed: u64) -> u64 {
    let mut acc = seed;
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = byte.wrapping_add((acc as u8) ^ (i as u8));
        acc = acc.rotate_left(5) ^ u64::from(*byte);
    }
    acc
}

struct RunningStream {
    id: Uuid,
    token: CancellationToken,
}

#[derive(Default)]
pub struct SyntheticWorkload {
    sessions: Arc<DashMap<SessionKey, RunningStream>>,
}

impl SyntheticWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl StreamWorkload for SyntheticWorkload {
    async fn start(
        &self,
        key: &SessionKey,
        payload: &StreamPayload,
        reporter: SessionReporter,
    ) -> anyhow::Result<String> {
        let plan = FramePlan::from_payload(payload)
            .with_context(|| format!("invalid stream parameters for {key}"))?;

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let running = RunningStream {
            id,
            token: token.clone(),
        };
        if let Some(previous) = self.sessions.insert(key.clone(), running) {
            previous.token.cancel();
        }

        let task_token = token;
        let task_key = reporter.session_key().clone();
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(plan.interval);
            let mut buffer = vec![0u8; plan.frame_bytes];
            let mut checksum = 0u64;
            let mut frames = 0u64;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        checksum = fold_frame(&mut buffer, checksum);
                        frames += 1;
                        trace!(session.key = %task_key, frames, checksum, "frame");

                        if plan.fail_after.is_some_and(|limit| frames >= limit) {
                            sessions.remove_if(&task_key, |_, s| s.id == id);
                            reporter.fail(format!("stream dropped after {frames} frames"));
                            break;
                        }
                    }
                }
            }
            debug!(session.key = %task_key, frames, "synthetic stream ended");
        });

        Ok(id.to_string())
    }

    async fn stop(&self, key: &SessionKey, _payload: &StreamPayload) -> anyhow::Result<()> {
        if let Some((_, running)) = self.sessions.remove(key) {
            running.token.cancel();
        }
        Ok(())
    }
}
