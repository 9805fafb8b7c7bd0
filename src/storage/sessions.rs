//! Session rows: creation, conditional status transitions, listing, and the
//! recovery/reaper scans.
//!
//! Status changes are conditional updates (`WHERE status = <prev>`); a
//! concurrent loser observes zero affected rows and fails its operation
//! instead of regressing the state machine.

use super::{with_timeout, Storage};
use crate::error::AppError;
use crate::model::{Person, SessionRecord, SessionStatus, UserRecord};
use crate::pagination::PageRequest;
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Latest,
    Oldest,
}

/// Filters for the session listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub sort: SortOrder,
    pub status: Option<SessionStatus>,
    /// Calendar month (1..=12) of `created_at`.
    pub month: Option<u32>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    thesis_id: Uuid,
    owner_user_id: Uuid,
    status: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_record(self) -> Result<SessionRecord, AppError> {
        Ok(SessionRecord {
            id: self.id,
            thesis_id: self.thesis_id,
            owner_user_id: self.owner_user_id,
            status: self
                .status
                .parse::<SessionStatus>()
                .map_err(AppError::Validation)?,
            start_time: self.start_time,
            end_time: self.end_time,
            created_at: self.created_at,
        })
    }
}

const SESSION_COLUMNS: &str =
    "id, thesis_id, owner_user_id, status, start_time, end_time, created_at";

impl Storage {
    /// Insert a new `waiting` session. The partial unique index on live
    /// sessions turns a concurrent double-start into `already_started`.
    pub async fn create_session(
        &self,
        thesis_id: Uuid,
        owner_user_id: Uuid,
    ) -> Result<SessionRecord, AppError> {
        let id = Uuid::new_v4();
        let result = sqlx::query(
            "INSERT INTO sessions (id, thesis_id, owner_user_id, status) VALUES ($1, $2, $3, 'waiting')",
        )
        .bind(id)
        .bind(thesis_id)
        .bind(owner_user_id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return Err(AppError::AlreadyStarted);
                }
            }
            return Err(e.into());
        }

        self.session_by_id(id)
            .await?
            .ok_or(AppError::NotFound("session"))
    }

    pub async fn session_by_id(&self, id: Uuid) -> Result<Option<SessionRecord>, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SessionRow::into_record).transpose()
    }

    /// The (at most one) non-finished session of a thesis.
    pub async fn live_session_by_thesis(
        &self,
        thesis_id: Uuid,
    ) -> Result<Option<SessionRecord>, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE thesis_id = $1 AND status <> 'finished'"
        ))
        .bind(thesis_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SessionRow::into_record).transpose()
    }

    /// `waiting → ongoing`, stamping `start_time`. Returns false if the
    /// session was not in `waiting` (someone else won the transition).
    pub async fn mark_session_ongoing(
        &self,
        id: Uuid,
        start_time: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'ongoing', start_time = $2, updated_at = now()
             WHERE id = $1 AND status = 'waiting'",
        )
        .bind(id)
        .bind(start_time)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `ongoing → processing_summary`, stamping `end_time`. Concurrent `End`
    /// calls see one winner; losers get false.
    pub async fn mark_session_processing(
        &self,
        id: Uuid,
        end_time: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'processing_summary', end_time = $2, updated_at = now()
             WHERE id = $1 AND status = 'ongoing'",
        )
        .bind(id)
        .bind(end_time)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `processing_summary → finished`, once the summary task is on the queue.
    pub async fn mark_session_finished(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'finished', updated_at = now()
             WHERE id = $1 AND status = 'processing_summary'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Sessions whose summary hand-off did not complete (crash between the
    /// status flip and the broker ack). Recovery republishes these.
    pub async fn sessions_processing_summary(&self) -> Result<Vec<SessionRecord>, AppError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = 'processing_summary' ORDER BY updated_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SessionRow::into_record).collect()
    }

    /// Finish `waiting` sessions that nobody ever joined. Returns how many
    /// were reaped.
    pub async fn reap_waiting_sessions(&self, older_than_minutes: u32) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'finished', updated_at = now()
             WHERE status = 'waiting' AND created_at < now() - ($1 * interval '1 minute')",
        )
        .bind(i64::from(older_than_minutes))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Sessions visible to `user` (their thesis as student, or any thesis
    /// they supervise), filtered and optionally paginated. Returns the page
    /// and the total count before paging.
    pub async fn list_sessions_for_user(
        &self,
        user: &UserRecord,
        filter: &SessionFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<SessionRecord>, u64), AppError> {
        with_timeout(async {
            let count: i64 = Self::sessions_query(user, filter, "SELECT COUNT(*)", None, false)
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await?;

            let select = format!("SELECT s.{}", SESSION_COLUMNS.replace(", ", ", s."));
            let rows: Vec<SessionRow> = Self::sessions_query(user, filter, &select, page, true)
                .build_query_as()
                .fetch_all(&self.pool)
                .await?;

            let records = rows
                .into_iter()
                .map(SessionRow::into_record)
                .collect::<Result<Vec<_>, _>>()?;
            Ok((records, count as u64))
        })
        .await
    }

    fn sessions_query<'a>(
        user: &'a UserRecord,
        filter: &'a SessionFilter,
        select: &str,
        page: Option<PageRequest>,
        ordered: bool,
    ) -> QueryBuilder<'a, sqlx::Postgres> {
        let mut qb = QueryBuilder::new(select);
        qb.push(" FROM sessions s JOIN theses t ON t.id = s.thesis_id WHERE ");
        match &user.person {
            Person::Student(s) => {
                qb.push("t.student_id = ").push_bind(s.id);
            }
            Person::Lecturer(l) => {
                qb.push(
                    "EXISTS (SELECT 1 FROM thesis_supervisors ts \
                     WHERE ts.thesis_id = t.id AND ts.lecturer_id = ",
                )
                .push_bind(l.id)
                .push(")");
            }
        }
        if let Some(status) = filter.status {
            qb.push(" AND s.status = ").push_bind(status.as_str());
        }
        if let Some(month) = filter.month {
            qb.push(" AND EXTRACT(MONTH FROM s.created_at) = ")
                .push_bind(i32::try_from(month).unwrap_or(0));
        }
        if ordered {
            match filter.sort {
                SortOrder::Latest => qb.push(" ORDER BY s.created_at DESC"),
                SortOrder::Oldest => qb.push(" ORDER BY s.created_at ASC"),
            };
        }
        if let Some(page) = page {
            let norm = page.normalize();
            qb.push(" LIMIT ")
                .push_bind(norm.per_page as i64)
                .push(" OFFSET ")
                .push_bind(page.offset() as i64);
        }
        qb
    }
}
