// SPDX-License-Identifier: MIT
//! Domain types shared across services.
//!
//! The directory distinguishes two principals: students and lecturers. A
//! `User` login row links to exactly one of the two profiles; the link is
//! collapsed into [`Person`] so every consumer matches exhaustively instead
//! of testing a pair of nullable foreign keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Roles ───────────────────────────────────────────────────────────────────

/// Login role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Lecturer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Lecturer => "lecturer",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "lecturer" => Ok(Role::Lecturer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Supervisory sub-role of a lecturer on one thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorRole {
    PrimaryLecturer,
    SecondaryLecturer,
}

impl SupervisorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorRole::PrimaryLecturer => "primary_lecturer",
            SupervisorRole::SecondaryLecturer => "secondary_lecturer",
        }
    }
}

impl std::str::FromStr for SupervisorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary_lecturer" => Ok(SupervisorRole::PrimaryLecturer),
            "secondary_lecturer" => Ok(SupervisorRole::SecondaryLecturer),
            other => Err(format!("unknown supervisor role: {other}")),
        }
    }
}

// ─── Session status ──────────────────────────────────────────────────────────

/// Lifecycle of a supervision session. Transitions are monotone:
/// `waiting → ongoing → processing_summary → finished`, no regressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Ongoing,
    ProcessingSummary,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::ProcessingSummary => "processing_summary",
            SessionStatus::Finished => "finished",
        }
    }

    /// Whether the session still counts against the one-live-session-per-thesis
    /// rule.
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionStatus::Finished)
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(SessionStatus::Waiting),
            "ongoing" => Ok(SessionStatus::Ongoing),
            "processing_summary" => Ok(SessionStatus::ProcessingSummary),
            "finished" => Ok(SessionStatus::Finished),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

// ─── Users and profiles ──────────────────────────────────────────────────────

/// Faculty/program context carried on directory profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyProgram {
    pub id: Uuid,
    pub name: String,
    pub degree: String,
    pub faculty_id: Uuid,
    pub faculty_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: Uuid,
    pub nim: String,
    pub name: String,
    pub email: String,
    pub study_program: StudyProgram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LecturerProfile {
    pub id: Uuid,
    pub nip: String,
    pub name: String,
    pub email: String,
    pub study_program: StudyProgram,
}

/// The profile side of a user account. Exactly one variant exists per user;
/// the discriminant doubles as the login [`Role`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Person {
    Student(StudentProfile),
    Lecturer(LecturerProfile),
}

impl Person {
    pub fn role(&self) -> Role {
        match self {
            Person::Student(_) => Role::Student,
            Person::Lecturer(_) => Role::Lecturer,
        }
    }

    /// Directory id of the underlying student/lecturer row.
    pub fn person_id(&self) -> Uuid {
        match self {
            Person::Student(s) => s.id,
            Person::Lecturer(l) => l.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Person::Student(s) => &s.name,
            Person::Lecturer(l) => &l.name,
        }
    }

    /// NIM for students, NIP for lecturers.
    pub fn identifier(&self) -> &str {
        match self {
            Person::Student(s) => &s.nim,
            Person::Lecturer(l) => &l.nip,
        }
    }
}

/// Authenticated principal with its resolved profile.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub identifier: String,
    pub person: Person,
}

impl UserRecord {
    pub fn role(&self) -> Role {
        self.person.role()
    }
}

// ─── Participant set ─────────────────────────────────────────────────────────

/// How a user participates in a thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantKind {
    Student,
    Supervisor(SupervisorRole),
}

/// Thesis core fields carried along with the participant set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisInfo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub progress: String,
}

/// One addressable participant: the directory person plus the user account
/// events are routed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: Uuid,
    pub person_id: Uuid,
    pub name: String,
    pub identifier: String,
    pub kind: ParticipantKind,
}

/// Exactly the slice of the directory graph fan-out needs: the thesis, its
/// student, and its supervisors, each already resolved to a user id.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSet {
    pub thesis: ThesisInfo,
    pub participants: Vec<Participant>,
}

impl ParticipantSet {
    /// How `user_id` participates in this thesis, if at all.
    pub fn kind_of(&self, user_id: Uuid) -> Option<ParticipantKind> {
        self.participants
            .iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.kind)
    }

    pub fn get(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn student(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.kind == ParticipantKind::Student)
    }

    pub fn supervisors(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(|p| matches!(p.kind, ParticipantKind::Supervisor(_)))
    }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// One session row as stored. `start_time` is set on the first non-owner
/// join, `end_time` when the owner ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub thesis_id: Uuid,
    pub owner_user_id: Uuid,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Student, Role::Lecturer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn status_ordering_matches_lifecycle() {
        assert!(SessionStatus::Waiting < SessionStatus::Ongoing);
        assert!(SessionStatus::Ongoing < SessionStatus::ProcessingSummary);
        assert!(SessionStatus::ProcessingSummary < SessionStatus::Finished);
    }

    #[test]
    fn finished_is_not_live() {
        assert!(SessionStatus::Waiting.is_live());
        assert!(SessionStatus::Ongoing.is_live());
        assert!(SessionStatus::ProcessingSummary.is_live());
        assert!(!SessionStatus::Finished.is_live());
    }

    #[test]
    fn person_exposes_role_and_identifier() {
        let program = StudyProgram {
            id: Uuid::new_v4(),
            name: "Informatics".into(),
            degree: "S1".into(),
            faculty_id: Uuid::new_v4(),
            faculty_name: "Engineering".into(),
        };
        let person = Person::Student(StudentProfile {
            id: Uuid::new_v4(),
            nim: "5025211001".into(),
            name: "Alya".into(),
            email: "alya@example.edu".into(),
            study_program: program,
        });
        assert_eq!(person.role(), Role::Student);
        assert_eq!(person.identifier(), "5025211001");
    }
}
