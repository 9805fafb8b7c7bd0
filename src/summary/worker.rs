//! Summary worker: durable queue consumer.
//!
//! Per task: decode (poison messages are logged and discarded), call the
//! summarizer RPC with a timeout (failure never blocks persistence),
//! batch-upsert the message history in one transaction, then ack. The
//! upsert is idempotent on message id, so broker redelivery after a crash
//! inserts nothing twice.

use super::{to_proto, TaskSummary, SUMMARY_QUEUE};
use crate::config::DaemonConfig;
use crate::metrics::DaemonMetrics;
use crate::storage::Storage;
use crate::summarizer::SummaryClient;
use anyhow::{Context, Result};
use fe2o3_amqp::{Connection, Delivery, Receiver, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const RPC_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn run(
    config: Arc<DaemonConfig>,
    storage: Arc<Storage>,
    metrics: Arc<DaemonMetrics>,
) -> Result<()> {
    let mut connection = Connection::open("thesisd-worker", config.amqp_url.as_str())
        .await
        .context("connecting to broker")?;
    let mut session = Session::begin(&mut connection).await?;
    let receiver = Receiver::attach(&mut session, "summary-worker", SUMMARY_QUEUE)
        .await
        .context("attaching to summary_task queue")?;
    let receiver = Arc::new(Mutex::new(receiver));

    let channel =
        SummaryClient::channel(&config.summarizer_addr).context("building summarizer channel")?;

    info!(
        queue = SUMMARY_QUEUE,
        handlers = config.worker_concurrency,
        "worker listening for summary tasks"
    );

    // K stateless handlers share one receiving link; recv/ack are serialized
    // by the mutex, processing runs concurrently.
    let mut handlers = tokio::task::JoinSet::new();
    for handler_id in 0..config.worker_concurrency {
        let receiver = receiver.clone();
        let storage = storage.clone();
        let metrics = metrics.clone();
        let channel = channel.clone();
        handlers.spawn(async move {
            loop {
                let delivery: Delivery<String> = {
                    let mut rx = receiver.lock().await;
                    match rx.recv::<String>().await {
                        Ok(d) => d,
                        Err(e) => {
                            error!(handler_id, err = %e, "receive failed — stopping handler");
                            break;
                        }
                    }
                };

                let persisted = handle_delivery(&delivery, &storage, &metrics, &channel).await;

                let rx = receiver.lock().await;
                let disposition = if persisted {
                    rx.accept(&delivery).await
                } else {
                    // Transient persistence failure: hand the task back for
                    // redelivery.
                    rx.release(&delivery).await
                };
                if let Err(e) = disposition {
                    warn!(handler_id, err = %e, "failed to settle delivery");
                }
            }
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received — draining summary handlers");
        }
        _ = handlers.join_next() => {
            warn!("a summary handler stopped unexpectedly");
        }
    }
    handlers.shutdown().await;

    let receiver = Arc::try_unwrap(receiver)
        .map_err(|_| anyhow::anyhow!("receiver still shared at shutdown"))?
        .into_inner();
    receiver.close().await.ok();
    session.end().await.ok();
    connection.close().await.ok();
    info!("worker stopped");
    Ok(())
}

/// Returns true when the task's messages are safely persisted (or the
/// message is poison and must be discarded); false requests redelivery.
async fn handle_delivery(
    delivery: &Delivery<String>,
    storage: &Storage,
    metrics: &DaemonMetrics,
    channel: &tonic::transport::Channel,
) -> bool {
    let Some(body) = delivery_text(delivery) else {
        warn!("summary task with non-text body — discarding");
        return true;
    };

    let task: TaskSummary = match serde_json::from_str(&body) {
        Ok(task) => task,
        Err(e) => {
            // Poison message: nothing downstream can ever decode it.
            error!(err = %e, "undecodable summary task — discarding");
            return true;
        }
    };

    info!(
        session_id = %task.session_id,
        message_count = task.messages.len(),
        "received summary task"
    );

    let mut client = SummaryClient::new(channel.clone());
    match tokio::time::timeout(RPC_TIMEOUT, client.generate_summary(to_proto(&task))).await {
        Ok(Ok(_)) => info!(session_id = %task.session_id, "summary generated"),
        Ok(Err(status)) => {
            warn!(session_id = %task.session_id, status = %status, "summarizer RPC failed — persisting history anyway")
        }
        Err(_) => {
            warn!(session_id = %task.session_id, "summarizer RPC timed out — persisting history anyway")
        }
    }

    match storage.insert_messages(task.session_id, &task.messages).await {
        Ok(inserted) => {
            metrics.inc_summary_tasks_processed();
            info!(
                session_id = %task.session_id,
                inserted,
                skipped = task.messages.len() as u64 - inserted,
                "message history persisted"
            );
            true
        }
        Err(e) => {
            error!(session_id = %task.session_id, err = %e, "failed to persist messages — releasing for redelivery");
            false
        }
    }
}

fn delivery_text(delivery: &Delivery<String>) -> Option<String> {
    Some(delivery.body().clone())
}
