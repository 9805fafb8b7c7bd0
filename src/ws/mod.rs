// SPDX-License-Identifier: MIT
//! Delivery router: the one abstraction the services use to "tell user U
//! about event E".
//!
//! A process-local registry maps each user id to its set of open sockets (a
//! user may run several clients). Presence has a single source of truth: a
//! user is online iff that set is non-empty. Delivery is best-effort push;
//! when every socket is gone the router persists a notification instead.
//!
//! Each socket gets its own writer task fed by an unbounded channel, which
//! keeps per-socket writes serialized and FIFO.

use crate::AppContext;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ─── Registry ────────────────────────────────────────────────────────────────

struct Socket {
    id: u64,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// At least one live socket took the frame.
    Delivered,
    /// No socket registered, or every registered socket was dead.
    NotConnected,
}

#[derive(Default)]
pub struct ClientRegistry {
    next_socket_id: AtomicU64,
    sockets: RwLock<HashMap<Uuid, Vec<Socket>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket for `user_id`; other sockets of the same user stay
    /// attached. Returns the handle used to detach this one.
    pub async fn attach(&self, user_id: Uuid, tx: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.next_socket_id.fetch_add(1, Ordering::Relaxed);
        let mut sockets = self.sockets.write().await;
        sockets.entry(user_id).or_default().push(Socket { id, tx });
        id
    }

    /// Remove one socket; the user goes offline when the last one is gone.
    pub async fn detach(&self, user_id: Uuid, socket_id: u64) {
        let mut sockets = self.sockets.write().await;
        if let Some(list) = sockets.get_mut(&user_id) {
            list.retain(|s| s.id != socket_id);
            if list.is_empty() {
                sockets.remove(&user_id);
            }
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.sockets.read().await.contains_key(&user_id)
    }

    pub async fn online_users(&self) -> u64 {
        self.sockets.read().await.len() as u64
    }

    /// Write `text` to every socket of `user_id`. Dead sockets are pruned;
    /// the send counts as delivered if any socket survives.
    pub async fn send(&self, user_id: Uuid, text: &str) -> SendOutcome {
        let targets: Vec<(u64, mpsc::UnboundedSender<Message>)> = {
            let sockets = self.sockets.read().await;
            match sockets.get(&user_id) {
                None => return SendOutcome::NotConnected,
                Some(list) => list.iter().map(|s| (s.id, s.tx.clone())).collect(),
            }
        };

        let mut dead = Vec::new();
        let mut delivered = false;
        for (id, tx) in &targets {
            if tx.send(Message::Text(text.to_string())).is_ok() {
                delivered = true;
            } else {
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let mut sockets = self.sockets.write().await;
            if let Some(list) = sockets.get_mut(&user_id) {
                list.retain(|s| !dead.contains(&s.id));
                if list.is_empty() {
                    sockets.remove(&user_id);
                }
            }
        }

        if delivered {
            SendOutcome::Delivered
        } else {
            SendOutcome::NotConnected
        }
    }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Title + body of the notification persisted when the receiver is offline.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Notified,
    /// Both the push and the notification insert failed.
    Failed,
}

pub struct DeliveryRouter {
    pub registry: ClientRegistry,
    storage: Arc<crate::storage::Storage>,
    metrics: Arc<crate::metrics::DaemonMetrics>,
}

impl DeliveryRouter {
    pub fn new(
        storage: Arc<crate::storage::Storage>,
        metrics: Arc<crate::metrics::DaemonMetrics>,
    ) -> Self {
        Self {
            registry: ClientRegistry::new(),
            storage,
            metrics,
        }
    }

    /// Best-effort push with durable fallback. Never returns an error to the
    /// caller's transition — a fan-out problem must not fail a Start/Join/
    /// Leave/End.
    pub async fn deliver_or_notify(
        &self,
        user_id: Uuid,
        payload: &str,
        template: &NotificationTemplate,
    ) -> DeliveryOutcome {
        if self.registry.send(user_id, payload).await == SendOutcome::Delivered {
            self.metrics.inc_events_delivered();
            return DeliveryOutcome::Delivered;
        }

        match self
            .storage
            .create_notification(user_id, &template.title, &template.message)
            .await
        {
            Ok(_) => {
                self.metrics.inc_notifications_created();
                DeliveryOutcome::Notified
            }
            Err(e) => {
                warn!(user_id = %user_id, err = %e, "offline fallback notification failed");
                DeliveryOutcome::Failed
            }
        }
    }

    /// Push without a durable fallback, for events that are only meaningful
    /// live (chat frames — the buffer is the source of truth for replay).
    pub async fn deliver_or_drop(&self, user_id: Uuid, payload: &str) -> SendOutcome {
        let outcome = self.registry.send(user_id, payload).await;
        if outcome == SendOutcome::Delivered {
            self.metrics.inc_events_delivered();
        } else {
            debug!(user_id = %user_id, "receiver offline — message event dropped");
        }
        outcome
    }
}

// ─── WebSocket server ────────────────────────────────────────────────────────

/// Accept loop for `GET /ws?token=<jwt>`. Runs until `serve`'s shutdown
/// future resolves (handled by the caller via task abort).
pub async fn run(ctx: Arc<AppContext>) -> Result<()> {
    let addr = format!("0.0.0.0:{}", ctx.config.ws_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "WebSocket server listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(c) => c,
            Err(e) => {
                warn!(err = %e, "accept error");
                continue;
            }
        };
        debug!(peer = %peer, "new connection");
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, ctx).await {
                debug!(peer = %peer, err = %e, "connection closed with error");
            }
        });
    }
}

fn token_from_query(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
}

async fn handle_connection(stream: tokio::net::TcpStream, ctx: Arc<AppContext>) -> Result<()> {
    // Authenticate during the handshake: the upgrade is refused outright on
    // a bad path or token, before any WS frame is exchanged.
    let mut user_id: Option<Uuid> = None;
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let reject = |status: u16, msg: &str| {
            use tokio_tungstenite::tungstenite::http::StatusCode;
            let mut resp = ErrorResponse::new(Some(msg.to_string()));
            *resp.status_mut() =
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
            resp
        };
        if req.uri().path() != "/ws" {
            return Err(reject(404, "not found"));
        }
        let Some(token) = token_from_query(req.uri().query()) else {
            return Err(reject(400, "missing token"));
        };
        match ctx.jwt.verify_access(token) {
            Ok(claims) => {
                user_id = Some(claims.user_id);
                Ok(response)
            }
            Err(_) => Err(reject(401, "invalid token")),
        }
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let user_id = user_id.ok_or_else(|| anyhow::anyhow!("handshake accepted without identity"))?;
    ctx.metrics.inc_ws_connections();

    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let socket_id = ctx.router.registry.attach(user_id, tx).await;
    info!(user_id = %user_id, socket_id, "user connected via WebSocket");

    // Writer task: drains the channel into the sink. On a failed write the
    // socket is detached so later sends fall back to notifications.
    let writer_ctx = ctx.clone();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                writer_ctx
                    .router
                    .registry
                    .detach(user_id, socket_id)
                    .await;
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Inbound frames have no protocol semantics — chat flows over HTTP.
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                debug!(user_id = %user_id, len = text.len(), "inbound WS frame ignored")
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    ctx.router.registry.detach(user_id, socket_id).await;
    writer.abort();
    info!(user_id = %user_id, socket_id, "user disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attach_send_detach_round_trip() {
        let registry = ClientRegistry::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(!registry.is_online(user).await);
        let socket_id = registry.attach(user, tx).await;
        assert!(registry.is_online(user).await);

        assert_eq!(registry.send(user, "hello").await, SendOutcome::Delivered);
        match rx.recv().await {
            Some(Message::Text(t)) => assert_eq!(t, "hello"),
            other => panic!("unexpected frame: {other:?}"),
        }

        registry.detach(user, socket_id).await;
        assert!(!registry.is_online(user).await);
        assert_eq!(
            registry.send(user, "late").await,
            SendOutcome::NotConnected
        );
    }

    #[tokio::test]
    async fn multiple_sockets_all_receive() {
        let registry = ClientRegistry::new();
        let user = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.attach(user, tx1).await;
        registry.attach(user, tx2).await;

        assert_eq!(registry.send(user, "fan").await, SendOutcome::Delivered);
        assert!(matches!(rx1.recv().await, Some(Message::Text(_))));
        assert!(matches!(rx2.recv().await, Some(Message::Text(_))));
    }

    #[tokio::test]
    async fn dead_socket_is_pruned_and_survivor_delivers() {
        let registry = ClientRegistry::new();
        let user = Uuid::new_v4();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        registry.attach(user, tx_dead).await;
        registry.attach(user, tx_live).await;
        drop(rx_dead);

        assert_eq!(registry.send(user, "x").await, SendOutcome::Delivered);
        assert!(matches!(rx_live.recv().await, Some(Message::Text(_))));
        // The dead socket is gone; the user stays online via the survivor.
        assert!(registry.is_online(user).await);
        assert_eq!(registry.sockets.read().await.get(&user).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_sockets_dead_means_not_connected_and_offline() {
        let registry = ClientRegistry::new();
        let user = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.attach(user, tx).await;
        drop(rx);

        assert_eq!(registry.send(user, "x").await, SendOutcome::NotConnected);
        assert!(!registry.is_online(user).await);
    }

    #[test]
    fn token_is_extracted_from_query() {
        assert_eq!(token_from_query(Some("token=abc")), Some("abc"));
        assert_eq!(token_from_query(Some("a=1&token=abc&b=2")), Some("abc"));
        assert_eq!(token_from_query(Some("token=")), None);
        assert_eq!(token_from_query(Some("other=1")), None);
        assert_eq!(token_from_query(None), None);
    }
}
