// Round-trip checks for the wire shapes: the broker's TaskSummary, the
// WebSocket message event, and the summarizer protobuf mapping.

use chrono::Utc;
use thesisd::events::{MessageEvent, SenderSummary, NEW_MESSAGE_EVENT};
use thesisd::model::{LecturerProfile, StudentProfile, StudyProgram, ThesisInfo};
use thesisd::summary::{to_proto, TaskOwner, TaskSummary};
use uuid::Uuid;

fn program() -> StudyProgram {
    StudyProgram {
        id: Uuid::new_v4(),
        name: "Informatics".into(),
        degree: "S1".into(),
        faculty_id: Uuid::new_v4(),
        faculty_name: "Engineering".into(),
    }
}

fn message(session_id: Uuid, is_text: bool) -> MessageEvent {
    MessageEvent {
        event: NEW_MESSAGE_EVENT.into(),
        message_id: Uuid::new_v4(),
        is_text,
        text: if is_text { "hi".into() } else { String::new() },
        file_url: (!is_text).then(|| "https://files.example/draft.pdf".to_string()),
        file_type: (!is_text).then(|| "application/pdf".to_string()),
        sender: SenderSummary {
            id: Uuid::new_v4(),
            name: "Alya".into(),
            identifier: "5025211001".into(),
            role: "student".into(),
        },
        session_id,
        parent_message_id: None,
        timestamp: Utc::now(),
    }
}

fn task(messages: Vec<MessageEvent>) -> TaskSummary {
    TaskSummary {
        session_id: Uuid::new_v4(),
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
        supervisors: vec![
            LecturerProfile {
                id: Uuid::new_v4(),
                nip: "197805152003121002".into(),
                name: "Dr. Bima".into(),
                email: "bima@example.edu".into(),
                study_program: program(),
            },
            LecturerProfile {
                id: Uuid::new_v4(),
                nip: "198204202008012003".into(),
                name: "Dr. Citra".into(),
                email: "citra@example.edu".into(),
                study_program: program(),
            },
        ],
        thesis_info: ThesisInfo {
            id: Uuid::new_v4(),
            title: "Realtime Coordination".into(),
            description: "desc".into(),
            progress: "proposal".into(),
        },
        messages,
    }
}

// A message survives buffer → drain → task → (worker decode) unchanged:
// the whole pipeline reuses one serde shape.
#[test]
fn message_event_survives_the_pipeline_encoding() {
    let session_id = Uuid::new_v4();
    let original = message(session_id, true);

    // buffer member encoding
    let member = serde_json::to_string(&original).unwrap();
    let drained: MessageEvent = serde_json::from_str(&member).unwrap();
    assert_eq!(drained, original);

    // broker task encoding
    let task = task(vec![drained]);
    let payload = serde_json::to_string(&task).unwrap();
    let decoded: TaskSummary = serde_json::from_str(&payload).unwrap();
    assert_eq!(decoded.messages[0], original);
}

// File-only messages (is_text = false) keep their file fields through the
// broker and into the protobuf request.
#[test]
fn file_message_fields_reach_the_proto_request() {
    let m = message(Uuid::new_v4(), false);
    let t = task(vec![m.clone()]);
    let req = to_proto(&t);
    let proto_messages = req.task.unwrap().messages;
    assert_eq!(proto_messages.len(), 1);
    assert!(!proto_messages[0].is_text);
    assert_eq!(
        proto_messages[0].file_url,
        m.file_url.clone().unwrap_or_default()
    );
    assert_eq!(
        proto_messages[0].file_type,
        m.file_type.clone().unwrap_or_default()
    );
}

// An empty session's task carries zero messages and still encodes cleanly.
#[test]
fn empty_session_task_is_valid() {
    let t = task(Vec::new());
    let payload = serde_json::to_string(&t).unwrap();
    let decoded: TaskSummary = serde_json::from_str(&payload).unwrap();
    assert!(decoded.messages.is_empty());

    let req = to_proto(&decoded);
    assert!(req.task.unwrap().messages.is_empty());
}

// The proto request mirrors the full directory graph the summarizer
// expects: owner, student with program/faculty, both supervisors.
#[test]
fn proto_request_carries_the_participant_graph() {
    let t = task(vec![message(Uuid::new_v4(), true)]);
    let req = to_proto(&t).task.unwrap();

    assert_eq!(req.supervisors.len(), 2);
    let student = req.student.unwrap();
    assert_eq!(student.nim, "5025211001");
    let sp = student.study_program.unwrap();
    assert_eq!(sp.name, "Informatics");
    assert_eq!(sp.faculty.unwrap().name, "Engineering");
    assert_eq!(req.owner.unwrap().role, "student");
}

// Undecodable broker payloads must be detectable before any persistence.
#[test]
fn poison_payload_fails_decode() {
    let poison = r#"{"session_id": "not-a-uuid", "messages": 42}"#;
    assert!(serde_json::from_str::<TaskSummary>(poison).is_err());
}
