// SPDX-License-Identifier: MIT
//! PostgreSQL repositories: the identity/thesis directory (read-only for the
//! core), session rows, canonical message history, and notifications.
//!
//! All queries go through one pooled [`Storage`]. Directory reads come in
//! focused shapes — [`Storage::participant_set`] returns exactly what
//! fan-out needs instead of materializing the entity graph.

mod history;
mod notifications;
mod seed;
mod sessions;

pub use notifications::NotificationRecord;
pub use sessions::{SessionFilter, SortOrder};

use crate::error::AppError;
use crate::model::{
    LecturerProfile, Participant, ParticipantKind, ParticipantSet, Person, Role, StudentProfile,
    StudyProgram, SupervisorRole, ThesisInfo, UserRecord,
};
use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::warn;
use uuid::Uuid;

/// Default timeout for individual queries. Prevents hung queries from
/// blocking the API indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(
    fut: impl std::future::Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Database(sqlx::Error::PoolTimedOut)),
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

/// Login credentials row for the auth check.
pub struct Credentials {
    pub user_id: Uuid,
    pub role: Role,
    pub password_hash: String,
}

impl Storage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub async fn migrate(&self) -> Result<()> {
        for sql in [include_str!("migrations/001_init.sql")] {
            for stmt in sql.split(';') {
                let stmt = stmt.trim();
                if !stmt.is_empty() {
                    sqlx::query(stmt).execute(&self.pool).await?;
                }
            }
        }
        Ok(())
    }

    // ─── Users ──────────────────────────────────────────────────────────────

    pub async fn credentials_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Credentials>, AppError> {
        let row: Option<(Uuid, String, String)> = sqlx::query_as(
            "SELECT id, role, password_hash FROM users WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some((user_id, role, password_hash)) => {
                let role = role
                    .parse::<Role>()
                    .map_err(AppError::Validation)?;
                Ok(Some(Credentials {
                    user_id,
                    role,
                    password_hash,
                }))
            }
        }
    }

    /// Load a user with its resolved student/lecturer profile.
    pub async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let row: Option<UserJoinRow> = sqlx::query_as(
            r#"
            SELECT u.id, u.identifier, u.role,
                   s.id   AS student_id,  s.nim, s.name AS student_name,  s.email AS student_email,
                   l.id   AS lecturer_id, l.nip, l.name AS lecturer_name, l.email AS lecturer_email,
                   sp.id  AS program_id,  sp.name AS program_name, sp.degree,
                   f.id   AS faculty_id,  f.name AS faculty_name
            FROM users u
            LEFT JOIN students s  ON s.id = u.student_id
            LEFT JOIN lecturers l ON l.id = u.lecturer_id
            LEFT JOIN study_programs sp ON sp.id = COALESCE(s.study_program_id, l.study_program_id)
            LEFT JOIN faculties f ON f.id = sp.faculty_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::ResolveFailed)?;

        row.map(UserJoinRow::into_record).transpose()
    }

    // ─── Theses ─────────────────────────────────────────────────────────────

    /// The focused fan-out read: thesis core fields plus every participant
    /// resolved to an addressable user id. Profiles without a login account
    /// are skipped (they cannot receive events).
    pub async fn participant_set(
        &self,
        thesis_id: Uuid,
    ) -> Result<Option<ParticipantSet>, AppError> {
        let thesis: Option<(Uuid, String, String, String, Uuid, String, String, Option<Uuid>)> =
            sqlx::query_as(
                r#"
                SELECT t.id, t.title, t.description, t.progress,
                       s.id AS student_id, s.nim, s.name, u.id AS user_id
                FROM theses t
                JOIN students s ON s.id = t.student_id
                LEFT JOIN users u ON u.student_id = s.id
                WHERE t.id = $1
                "#,
            )
            .bind(thesis_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::ResolveFailed)?;

        let Some((id, title, description, progress, student_id, nim, student_name, student_user)) =
            thesis
        else {
            return Ok(None);
        };

        let mut participants = Vec::new();
        match student_user {
            Some(user_id) => participants.push(Participant {
                user_id,
                person_id: student_id,
                name: student_name,
                identifier: nim,
                kind: ParticipantKind::Student,
            }),
            None => warn!(thesis_id = %id, student_id = %student_id, "thesis student has no user account"),
        }

        let supervisors: Vec<(String, Uuid, String, String, Option<Uuid>)> = sqlx::query_as(
            r#"
            SELECT ts.role, l.id AS lecturer_id, l.nip, l.name, u.id AS user_id
            FROM thesis_supervisors ts
            JOIN lecturers l ON l.id = ts.lecturer_id
            LEFT JOIN users u ON u.lecturer_id = l.id
            WHERE ts.thesis_id = $1
            ORDER BY ts.role
            "#,
        )
        .bind(thesis_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::ResolveFailed)?;

        for (role, lecturer_id, nip, name, user_id) in supervisors {
            let role = role
                .parse::<SupervisorRole>()
                .map_err(AppError::Validation)?;
            match user_id {
                Some(user_id) => participants.push(Participant {
                    user_id,
                    person_id: lecturer_id,
                    name,
                    identifier: nip,
                    kind: ParticipantKind::Supervisor(role),
                }),
                None => {
                    warn!(thesis_id = %id, lecturer_id = %lecturer_id, "supervisor has no user account")
                }
            }
        }

        Ok(Some(ParticipantSet {
            thesis: ThesisInfo {
                id,
                title,
                description,
                progress,
            },
            participants,
        }))
    }

    /// Full student profile of a thesis, for the summary task payload.
    pub async fn student_profile_by_thesis(
        &self,
        thesis_id: Uuid,
    ) -> Result<Option<StudentProfile>, AppError> {
        let row: Option<ProfileJoinRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.nim AS identifier, s.name, s.email,
                   sp.id AS program_id, sp.name AS program_name, sp.degree,
                   f.id AS faculty_id, f.name AS faculty_name
            FROM theses t
            JOIN students s ON s.id = t.student_id
            JOIN study_programs sp ON sp.id = s.study_program_id
            JOIN faculties f ON f.id = sp.faculty_id
            WHERE t.id = $1
            "#,
        )
        .bind(thesis_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::ResolveFailed)?;

        Ok(row.map(|r| {
            let study_program = r.program();
            StudentProfile {
                id: r.id,
                nim: r.identifier,
                name: r.name,
                email: r.email,
                study_program,
            }
        }))
    }

    /// Full supervisor profiles of a thesis, for the summary task payload.
    pub async fn supervisor_profiles_by_thesis(
        &self,
        thesis_id: Uuid,
    ) -> Result<Vec<LecturerProfile>, AppError> {
        let rows: Vec<ProfileJoinRow> = sqlx::query_as(
            r#"
            SELECT l.id, l.nip AS identifier, l.name, l.email,
                   sp.id AS program_id, sp.name AS program_name, sp.degree,
                   f.id AS faculty_id, f.name AS faculty_name
            FROM thesis_supervisors ts
            JOIN lecturers l ON l.id = ts.lecturer_id
            JOIN study_programs sp ON sp.id = l.study_program_id
            JOIN faculties f ON f.id = sp.faculty_id
            WHERE ts.thesis_id = $1
            ORDER BY ts.role
            "#,
        )
        .bind(thesis_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::ResolveFailed)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let study_program = r.program();
                LecturerProfile {
                    id: r.id,
                    nip: r.identifier,
                    name: r.name,
                    email: r.email,
                    study_program,
                }
            })
            .collect())
    }
}

// ─── Join rows ───────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct UserJoinRow {
    id: Uuid,
    identifier: String,
    role: String,
    student_id: Option<Uuid>,
    nim: Option<String>,
    student_name: Option<String>,
    student_email: Option<String>,
    lecturer_id: Option<Uuid>,
    nip: Option<String>,
    lecturer_name: Option<String>,
    lecturer_email: Option<String>,
    program_id: Option<Uuid>,
    program_name: Option<String>,
    degree: Option<String>,
    faculty_id: Option<Uuid>,
    faculty_name: Option<String>,
}

impl UserJoinRow {
    fn program(&self) -> Result<StudyProgram, AppError> {
        match (
            self.program_id,
            self.program_name.clone(),
            self.degree.clone(),
            self.faculty_id,
            self.faculty_name.clone(),
        ) {
            (Some(id), Some(name), Some(degree), Some(faculty_id), Some(faculty_name)) => {
                Ok(StudyProgram {
                    id,
                    name,
                    degree,
                    faculty_id,
                    faculty_name,
                })
            }
            _ => Err(AppError::Validation(format!(
                "user {} has no study program attached",
                self.id
            ))),
        }
    }

    fn into_record(self) -> Result<UserRecord, AppError> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(AppError::Validation)?;
        let person = match (role, self.student_id, self.lecturer_id) {
            (Role::Student, Some(id), None) => Person::Student(StudentProfile {
                id,
                nim: self.nim.clone().unwrap_or_default(),
                name: self.student_name.clone().unwrap_or_default(),
                email: self.student_email.clone().unwrap_or_default(),
                study_program: self.program()?,
            }),
            (Role::Lecturer, None, Some(id)) => Person::Lecturer(LecturerProfile {
                id,
                nip: self.nip.clone().unwrap_or_default(),
                name: self.lecturer_name.clone().unwrap_or_default(),
                email: self.lecturer_email.clone().unwrap_or_default(),
                study_program: self.program()?,
            }),
            _ => {
                return Err(AppError::Validation(format!(
                    "user {} role does not match its profile link",
                    self.id
                )))
            }
        };
        Ok(UserRecord {
            id: self.id,
            identifier: self.identifier,
            person,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProfileJoinRow {
    id: Uuid,
    identifier: String,
    name: String,
    email: String,
    program_id: Uuid,
    program_name: String,
    degree: String,
    faculty_id: Uuid,
    faculty_name: String,
}

impl ProfileJoinRow {
    fn program(&self) -> StudyProgram {
        StudyProgram {
            id: self.program_id,
            name: self.program_name.clone(),
            degree: self.degree.clone(),
            faculty_id: self.faculty_id,
            faculty_name: self.faculty_name.clone(),
        }
    }
}
