// SPDX-License-Identifier: MIT
//! Live message buffer.
//!
//! During `ongoing`, each session's chat lives in a Redis sorted set keyed
//! `session:{id}:messages`. Members are JSON message events, scores are
//! nanosecond timestamps promoted to stay strictly monotonic. The set
//! carries a 24 h TTL refreshed on every append; the summary worker is
//! expected to consume the log long before that.

use crate::error::AppError;
use crate::events::MessageEvent;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const TTL_SECS: i64 = 24 * 60 * 60;

fn key(session_id: Uuid) -> String {
    format!("session:{session_id}:messages")
}

/// Promote a proposed score so appends are strictly ordered even when two
/// writers observe the same clock reading. Redis scores are IEEE doubles, so
/// at nanosecond magnitudes `max + 1` can be absorbed by rounding — fall
/// back to the next representable double in that case.
pub fn promote_score(proposed: f64, current_max: Option<f64>) -> f64 {
    match current_max {
        Some(max) if proposed <= max => {
            let bumped = max + 1.0;
            if bumped > max {
                bumped
            } else {
                f64::from_bits(max.to_bits() + 1)
            }
        }
        _ => proposed,
    }
}

pub struct LiveBuffer {
    conn: ConnectionManager,
    /// Serializes appends per session so the read-max/insert pair is atomic
    /// from this process's point of view.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LiveBuffer {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            locks: Mutex::new(HashMap::new()),
        })
    }

    async fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(session_id).or_default().clone()
    }

    /// Append one event with a monotonic score and refresh the TTL.
    pub async fn append(&self, session_id: Uuid, event: &MessageEvent) -> Result<(), AppError> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let key = key(session_id);
        let mut conn = self.conn.clone();

        let top: Vec<(String, f64)> = conn.zrevrange_withscores(&key, 0, 0).await?;
        let current_max = top.first().map(|(_, score)| *score);

        let proposed = event.timestamp.timestamp_nanos_opt().unwrap_or(0) as f64;
        let score = promote_score(proposed, current_max);

        let member = serde_json::to_string(event)?;
        let _: () = conn.zadd(&key, member, score).await?;
        let _: () = conn.expire(&key, TTL_SECS).await?;
        Ok(())
    }

    /// Newest-first page plus the total count. Out-of-range pages return an
    /// empty slice with correct metadata.
    pub async fn read_page(
        &self,
        session_id: Uuid,
        page: crate::pagination::PageRequest,
    ) -> Result<(Vec<MessageEvent>, u64), AppError> {
        let key = key(session_id);
        let mut conn = self.conn.clone();

        let total: u64 = conn.zcard(&key).await?;

        let norm = page.normalize();
        let start = page.offset() as isize;
        let stop = start + norm.per_page as isize - 1;
        let raw: Vec<String> = conn.zrevrange(&key, start, stop).await?;

        let events = decode_members(&raw);
        Ok((events, total))
    }

    /// The full log, oldest first. The data is left in place — the key is
    /// reclaimed by its TTL once the summary worker has persisted it.
    pub async fn drain(&self, session_id: Uuid) -> Result<Vec<MessageEvent>, AppError> {
        let key = key(session_id);
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.zrange(&key, 0, -1).await?;
        Ok(decode_members(&raw))
    }

    /// Used by session teardown once the log is no longer needed early
    /// (reaped waiting sessions never have one, this is a no-op there).
    pub async fn forget(&self, session_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key(session_id)).await?;
        self.locks.lock().await.remove(&session_id);
        Ok(())
    }
}

/// Skip members that fail to decode — a malformed entry must not make the
/// whole log unreadable.
fn decode_members(raw: &[String]) -> Vec<MessageEvent> {
    raw.iter()
        .filter_map(|m| match serde_json::from_str::<MessageEvent>(m) {
            Ok(ev) => Some(ev),
            Err(e) => {
                tracing::warn!(err = %e, "undecodable member in live buffer — skipping");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_score_passes_through() {
        assert_eq!(promote_score(100.0, None), 100.0);
        assert_eq!(promote_score(100.0, Some(50.0)), 100.0);
    }

    #[test]
    fn stale_score_is_promoted_past_max() {
        assert_eq!(promote_score(50.0, Some(100.0)), 101.0);
        assert_eq!(promote_score(100.0, Some(100.0)), 101.0);
    }

    #[test]
    fn promotion_is_strict_even_at_nanosecond_magnitudes() {
        // ~2026 in nanoseconds: +1.0 is absorbed by f64 rounding.
        let max = 1.77e18_f64;
        let promoted = promote_score(max, Some(max));
        assert!(promoted > max);
    }

    #[test]
    fn repeated_promotion_stays_monotonic() {
        let mut max = 1.77e18_f64;
        for _ in 0..100 {
            let next = promote_score(max, Some(max));
            assert!(next > max);
            max = next;
        }
    }
}
