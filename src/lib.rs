pub mod auth;
pub mod buffer;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod model;
pub mod notification;
pub mod pagination;
pub mod rest;
pub mod session;
pub mod storage;
pub mod summarizer;
pub mod summary;
pub mod ws;

use std::sync::Arc;

use auth::JwtKeys;
use buffer::LiveBuffer;
use config::DaemonConfig;
use metrics::DaemonMetrics;
use storage::Storage;
use summary::producer::SummaryProducer;
use ws::DeliveryRouter;

/// Shared application state handed to every HTTP handler, the WebSocket
/// server, and the background loops of the `serve` role.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub storage: Arc<Storage>,
    /// Live chat buffer (per-session ordered log in Redis).
    pub buffer: Arc<LiveBuffer>,
    /// Delivery router: socket registry + offline notification fallback.
    pub router: Arc<DeliveryRouter>,
    /// Producer side of the summary hand-off queue.
    pub producer: Arc<SummaryProducer>,
    pub jwt: Arc<JwtKeys>,
    pub metrics: Arc<DaemonMetrics>,
}
