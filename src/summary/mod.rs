// SPDX-License-Identifier: MIT
//! Summary hand-off: the wire task a finished session produces, its
//! producer (publish + recovery) and the worker that consumes it.

pub mod producer;
pub mod worker;

use crate::error::AppError;
use crate::events::MessageEvent;
use crate::model::{LecturerProfile, SessionRecord, StudentProfile, StudyProgram, ThesisInfo};
use crate::storage::Storage;
use crate::summarizer::pb;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the durable broker queue. Provisioned durable / non-auto-delete
/// on the broker; both ends only attach to it.
pub const SUMMARY_QUEUE: &str = "summary_task";

/// Owner snapshot carried on the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOwner {
    pub id: Uuid,
    pub name: String,
    pub identifier: String,
    pub role: String,
}

/// The terminal payload a finished session produces: session metadata, the
/// people involved, the thesis, and the drained message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub session_id: Uuid,
    pub session_status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub owner: TaskOwner,
    pub student: StudentProfile,
    pub supervisors: Vec<LecturerProfile>,
    pub thesis_info: ThesisInfo,
    pub messages: Vec<MessageEvent>,
}

/// Assemble the task for a session that just moved to `processing_summary`.
/// `messages` is the drained live log, oldest first.
pub async fn build_task(
    storage: &Storage,
    session: &SessionRecord,
    messages: Vec<MessageEvent>,
) -> Result<TaskSummary, AppError> {
    let owner = storage
        .user_by_id(session.owner_user_id)
        .await?
        .ok_or(AppError::NotFound("session owner"))?;
    let set = storage
        .participant_set(session.thesis_id)
        .await?
        .ok_or(AppError::NotFound("thesis"))?;
    let student = storage
        .student_profile_by_thesis(session.thesis_id)
        .await?
        .ok_or(AppError::NotFound("thesis student"))?;
    let supervisors = storage.supervisor_profiles_by_thesis(session.thesis_id).await?;

    Ok(TaskSummary {
        session_id: session.id,
        session_status: session.status.as_str().to_string(),
        started_at: session.start_time,
        ended_at: session.end_time,
        created_at: session.created_at,
        owner: TaskOwner {
            id: owner.id,
            name: owner.person.name().to_string(),
            identifier: owner.person.identifier().to_string(),
            role: owner.role().as_str().to_string(),
        },
        student,
        supervisors,
        thesis_info: set.thesis,
        messages,
    })
}

// ─── Protobuf mapping ────────────────────────────────────────────────────────

fn proto_program(p: &StudyProgram) -> pb::StudyProgram {
    pb::StudyProgram {
        id: p.id.to_string(),
        name: p.name.clone(),
        degree: p.degree.clone(),
        faculty: Some(pb::Faculty {
            id: p.faculty_id.to_string(),
            name: p.faculty_name.clone(),
        }),
    }
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_default()
}

/// Re-encode the broker task into the summarizer's protobuf request.
pub fn to_proto(task: &TaskSummary) -> pb::SummaryRequest {
    pb::SummaryRequest {
        task: Some(pb::TaskSummary {
            session_id: task.session_id.to_string(),
            session_status: task.session_status.clone(),
            started_at: format_time(task.started_at),
            ended_at: format_time(task.ended_at),
            created_at: task.created_at.to_rfc3339(),
            owner: Some(pb::CustomUser {
                id: task.owner.id.to_string(),
                name: task.owner.name.clone(),
                identifier: task.owner.identifier.clone(),
                role: task.owner.role.clone(),
            }),
            student: Some(pb::Student {
                id: task.student.id.to_string(),
                nim: task.student.nim.clone(),
                name: task.student.name.clone(),
                email: task.student.email.clone(),
                study_program: Some(proto_program(&task.student.study_program)),
            }),
            supervisors: task
                .supervisors
                .iter()
                .map(|sup| pb::Lecturer {
                    id: sup.id.to_string(),
                    nip: sup.nip.clone(),
                    name: sup.name.clone(),
                    email: sup.email.clone(),
                    study_program: Some(proto_program(&sup.study_program)),
                })
                .collect(),
            thesis_info: Some(pb::ThesisInfo {
                title: task.thesis_info.title.clone(),
                description: task.thesis_info.description.clone(),
                progress: task.thesis_info.progress.clone(),
            }),
            messages: task
                .messages
                .iter()
                .map(|msg| pb::MessageSummary {
                    id: msg.message_id.to_string(),
                    is_text: msg.is_text,
                    text: msg.text.clone(),
                    file_url: msg.file_url.clone().unwrap_or_default(),
                    file_type: msg.file_type.clone().unwrap_or_default(),
                    sender: Some(pb::CustomUser {
                        id: msg.sender.id.to_string(),
                        name: msg.sender.name.clone(),
                        identifier: msg.sender.identifier.clone(),
                        role: msg.sender.role.clone(),
                    }),
                    parent_message_id: msg
                        .parent_message_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    timestamp: msg.timestamp.to_rfc3339(),
                })
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SenderSummary, NEW_MESSAGE_EVENT};

    fn program() -> StudyProgram {
        StudyProgram {
            id: Uuid::new_v4(),
            name: "Informatics".into(),
            degree: "S1".into(),
            faculty_id: Uuid::new_v4(),
            faculty_name: "Engineering".into(),
        }
    }

    fn sample_task() -> TaskSummary {
        let session_id = Uuid::new_v4();
        TaskSummary {
            session_id,
            session_status: "processing_summary".into(),
            started_at: Some(Utc::now()),
            ended_at: Some(Utc::now()),
            created_at: Utc::now(),
            owner: TaskOwner {
                id: Uuid::new_v4(),
                name: "Alya".into(),
                identifier: "5025211001".into(),
                role: "student".into(),
            },
            student: StudentProfile {
                id: Uuid::new_v4(),
                nim: "5025211001".into(),
                name: "Alya".into(),
                email: "alya@example.edu".into(),
                study_program: program(),
            },
            supervisors: vec![LecturerProfile {
                id: Uuid::new_v4(),
                nip: "197805152003121002".into(),
                name: "Dr. Bima".into(),
                email: "bima@example.edu".into(),
                study_program: program(),
            }],
            thesis_info: ThesisInfo {
                id: Uuid::new_v4(),
                title: "Realtime Coordination".into(),
                description: "desc".into(),
                progress: "proposal".into(),
            },
            messages: vec![MessageEvent {
                event: NEW_MESSAGE_EVENT.into(),
                message_id: Uuid::new_v4(),
                is_text: true,
                text: "hi".into(),
                file_url: None,
                file_type: None,
                sender: SenderSummary {
                    id: Uuid::new_v4(),
                    name: "Alya".into(),
                    identifier: "5025211001".into(),
                    role: "student".into(),
                },
                session_id,
                parent_message_id: None,
                timestamp: Utc::now(),
            }],
        }
    }

    #[test]
    fn task_round_trips_through_json() {
        let task = sample_task();
        let json = serde_json::to_string(&task).unwrap();
        let back: TaskSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn proto_mapping_carries_all_messages() {
        let task = sample_task();
        let req = to_proto(&task);
        let proto_task = req.task.unwrap();
        assert_eq!(proto_task.session_id, task.session_id.to_string());
        assert_eq!(proto_task.messages.len(), 1);
        assert_eq!(proto_task.messages[0].text, "hi");
        assert_eq!(proto_task.supervisors.len(), 1);
        // absent optionals become empty strings on the wire
        assert_eq!(proto_task.messages[0].parent_message_id, "");
    }

    #[test]
    fn empty_session_produces_zero_message_task() {
        let mut task = sample_task();
        task.messages.clear();
        let req = to_proto(&task);
        assert!(req.task.unwrap().messages.is_empty());
    }
}
