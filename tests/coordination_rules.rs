// Scenario-level checks of the session coordination rules that are pure
// over loaded state: transition guards, recipient resolution, event naming.

use chrono::Utc;
use thesisd::error::AppError;
use thesisd::events::{event_name, recipients, LifecycleEvent, SessionAction};
use thesisd::model::{
    Participant, ParticipantKind, ParticipantSet, SessionRecord, SessionStatus, SupervisorRole,
    ThesisInfo,
};
use thesisd::session::{ensure_endable, ensure_joinable, ensure_leavable};
use uuid::Uuid;

fn participant(kind: ParticipantKind) -> Participant {
    Participant {
        user_id: Uuid::new_v4(),
        person_id: Uuid::new_v4(),
        name: "Someone".into(),
        identifier: "id".into(),
        kind,
    }
}

fn thesis_set() -> (ParticipantSet, Participant, Participant, Participant) {
    let student = participant(ParticipantKind::Student);
    let primary = participant(ParticipantKind::Supervisor(SupervisorRole::PrimaryLecturer));
    let secondary = participant(ParticipantKind::Supervisor(SupervisorRole::SecondaryLecturer));
    let set = ParticipantSet {
        thesis: ThesisInfo {
            id: Uuid::new_v4(),
            title: "Realtime Coordination".into(),
            description: String::new(),
            progress: "proposal".into(),
        },
        participants: vec![student.clone(), primary.clone(), secondary.clone()],
    };
    (set, student, primary, secondary)
}

fn session(status: SessionStatus, owner: Uuid) -> SessionRecord {
    SessionRecord {
        id: Uuid::new_v4(),
        thesis_id: Uuid::new_v4(),
        owner_user_id: owner,
        status,
        start_time: None,
        end_time: None,
        created_at: Utc::now(),
    }
}

// Scenario: the student starts and owns the session; the owner calling
// Leave is rejected and nothing about the session changes.
#[test]
fn owner_cannot_leave_their_session() {
    let (_, student, ..) = thesis_set();
    let s = session(SessionStatus::Ongoing, student.user_id);
    assert!(matches!(
        ensure_leavable(&s, student.user_id),
        Err(AppError::OwnerCannotLeave)
    ));
}

// Scenario: Start then End with no Join — End requires ongoing, so the
// owner gets not_started while the session still waits.
#[test]
fn end_before_any_join_is_rejected() {
    let owner = Uuid::new_v4();
    let s = session(SessionStatus::Waiting, owner);
    assert!(matches!(
        ensure_endable(&s, owner),
        Err(AppError::NotStarted)
    ));
}

// Scenario: two concurrent End calls — the loser observes the session
// already past ongoing and fails with already_finished.
#[test]
fn losing_a_concurrent_end_reads_as_already_finished() {
    let owner = Uuid::new_v4();
    let s = session(SessionStatus::ProcessingSummary, owner);
    assert!(matches!(
        ensure_endable(&s, owner),
        Err(AppError::AlreadyFinished)
    ));
}

// processing_summary is internal: join/leave observe it as finished.
#[test]
fn processing_summary_is_not_externally_addressable() {
    let caller = Uuid::new_v4();
    let s = session(SessionStatus::ProcessingSummary, Uuid::new_v4());
    assert!(matches!(
        ensure_joinable(&s, caller),
        Err(AppError::Finished)
    ));
    assert!(matches!(
        ensure_leavable(&s, caller),
        Err(AppError::Finished)
    ));
}

// Every event goes to all participants except the actor, and the actor
// never gets an echo of their own action.
#[test]
fn fan_out_targets_everyone_but_the_actor() {
    let (set, student, primary, secondary) = thesis_set();

    let from_student = recipients(&set, student.user_id);
    assert_eq!(from_student.len(), 2);
    assert!(from_student
        .iter()
        .all(|p| p.user_id == primary.user_id || p.user_id == secondary.user_id));

    let from_primary = recipients(&set, primary.user_id);
    assert_eq!(from_primary.len(), 2);
    assert!(from_primary.iter().all(|p| p.user_id != primary.user_id));
}

// A non-participant caller resolves to no membership at all.
#[test]
fn outsiders_are_not_participants() {
    let (set, ..) = thesis_set();
    assert!(set.kind_of(Uuid::new_v4()).is_none());
}

// Join/leave event names carry the supervisory sub-role of the actor.
#[test]
fn join_event_names_follow_the_sub_role() {
    assert_eq!(
        event_name(
            SessionAction::Joined,
            ParticipantKind::Supervisor(SupervisorRole::PrimaryLecturer)
        ),
        "primary_lecturer_joined"
    );
    assert_eq!(
        event_name(SessionAction::Leaved, ParticipantKind::Student),
        "student_leaved"
    );
}

// The lifecycle event for a join carries the joiner's summary so the
// receiving client can render who arrived.
#[test]
fn join_event_payload_names_the_joiner() {
    let (set, _, primary, _) = thesis_set();
    let ev = LifecycleEvent::new(
        SessionAction::Joined,
        Uuid::new_v4(),
        set.thesis.id,
        &primary,
    );
    let json = serde_json::to_value(&ev).unwrap();
    assert_eq!(json["event"], "primary_lecturer_joined");
    assert_eq!(json["actor"]["user_id"], primary.user_id.to_string());
    assert_eq!(json["thesis_id"], set.thesis.id.to_string());
}
