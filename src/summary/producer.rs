//! Summary task producer.
//!
//! `End` hands the drained session log here; the task is published to the
//! durable `summary_task` queue with a capped exponential backoff. Only
//! after the broker accepts the publish does the session move from
//! `processing_summary` to `finished` — a crash in between leaves the
//! session discoverable by the recovery sweep, which republishes it.

use super::{build_task, TaskSummary, SUMMARY_QUEUE};
use crate::error::AppError;
use crate::metrics::DaemonMetrics;
use crate::model::SessionRecord;
use crate::AppContext;
use anyhow::anyhow;
use fe2o3_amqp::connection::ConnectionHandle;
use fe2o3_amqp::session::SessionHandle;
use fe2o3_amqp::{Connection, Sender, Session};
use fe2o3_amqp_types::messaging::Outcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const MAX_PUBLISH_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const RECOVERY_INTERVAL: Duration = Duration::from_secs(60);

struct ProducerLink {
    // Handles are kept alive for the duration of the link; dropping them
    // tears the AMQP connection down.
    _connection: ConnectionHandle<()>,
    _session: SessionHandle<()>,
    sender: Sender,
}

impl ProducerLink {
    async fn connect(amqp_url: &str) -> anyhow::Result<Self> {
        let mut connection = Connection::open("thesisd-producer", amqp_url).await?;
        let mut session = Session::begin(&mut connection).await?;
        let sender = Sender::attach(&mut session, "summary-producer", SUMMARY_QUEUE).await?;
        Ok(Self {
            _connection: connection,
            _session: session,
            sender,
        })
    }
}

pub struct SummaryProducer {
    amqp_url: String,
    link: Mutex<Option<ProducerLink>>,
    metrics: Arc<DaemonMetrics>,
}

impl SummaryProducer {
    /// The broker is dialed lazily on first publish, so `serve` starts even
    /// while the broker is down.
    pub fn new(amqp_url: String, metrics: Arc<DaemonMetrics>) -> Self {
        Self {
            amqp_url,
            link: Mutex::new(None),
            metrics,
        }
    }

    async fn try_publish(&self, payload: &str) -> anyhow::Result<()> {
        let mut guard = self.link.lock().await;
        if guard.is_none() {
            *guard = Some(ProducerLink::connect(&self.amqp_url).await?);
        }
        let link = guard.as_mut().expect("link populated above");

        let result = link.sender.send(payload.to_string()).await;
        match result {
            Ok(Outcome::Accepted(_)) => Ok(()),
            Ok(other) => {
                // The broker took the frame but refused the message.
                *guard = None;
                Err(anyhow!("publish not accepted: {other:?}"))
            }
            Err(e) => {
                // Connection-level failure — drop the link so the next
                // attempt redials.
                *guard = None;
                Err(e.into())
            }
        }
    }

    /// Publish with bounded retries. Every failed attempt is counted in
    /// `summary_publish_failures_total`.
    pub async fn publish(&self, task: &TaskSummary) -> Result<(), AppError> {
        let payload = serde_json::to_string(task)?;
        let mut backoff = INITIAL_BACKOFF;
        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            match self.try_publish(&payload).await {
                Ok(()) => {
                    info!(
                        session_id = %task.session_id,
                        messages = task.messages.len(),
                        "summary task published"
                    );
                    return Ok(());
                }
                Err(e) => {
                    self.metrics.inc_summary_publish_failures();
                    warn!(
                        session_id = %task.session_id,
                        attempt,
                        err = %e,
                        "summary publish failed"
                    );
                    if attempt == MAX_PUBLISH_ATTEMPTS {
                        return Err(AppError::Broker(e.to_string()));
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
        unreachable!("loop returns on the last attempt")
    }
}

/// Drain the session's live log, publish its summary task, and finish the
/// session once the broker has it. Used by `End` and by the recovery sweep;
/// both paths are safe to repeat because the worker's persist is idempotent.
pub async fn finalize_session(ctx: &AppContext, session: &SessionRecord) -> Result<(), AppError> {
    let messages = ctx.buffer.drain(session.id).await?;
    let task = build_task(&ctx.storage, session, messages).await?;
    ctx.producer.publish(&task).await?;

    if ctx.storage.mark_session_finished(session.id).await? {
        info!(session_id = %session.id, "session finished");
        // The task now owns the log; reclaim the buffer key ahead of its TTL.
        if let Err(e) = ctx.buffer.forget(session.id).await {
            warn!(session_id = %session.id, err = %e, "failed to drop live buffer key");
        }
    }
    Ok(())
}

/// Periodic sweep for sessions stuck in `processing_summary` (crash between
/// the status flip and the broker ack). Runs for the lifetime of `serve`.
pub async fn run_recovery_sweep(ctx: Arc<AppContext>) {
    loop {
        tokio::time::sleep(RECOVERY_INTERVAL).await;
        let stuck = match ctx.storage.sessions_processing_summary().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(err = %e, "recovery sweep query failed");
                continue;
            }
        };
        for session in stuck {
            // A session that flipped moments ago may still be inside its
            // End call's own retry loop — give it one sweep of grace.
            let just_flipped = session
                .end_time
                .is_some_and(|t| chrono::Utc::now() - t < chrono::Duration::seconds(45));
            if just_flipped {
                continue;
            }
            info!(session_id = %session.id, "re-enqueueing stuck summary task");
            if let Err(e) = finalize_session(&ctx, &session).await {
                warn!(session_id = %session.id, err = %e, "recovery republish failed");
            }
        }
    }
}
