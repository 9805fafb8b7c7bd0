// SPDX-License-Identifier: MIT
//! Typed WebSocket events and recipient resolution.
//!
//! Events are built fresh from the authoritative participant set at every
//! transition; nothing about a previous event is carried over, so concurrent
//! sessions can never bleed state into each other's payloads.

use crate::model::{Participant, ParticipantKind, ParticipantSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Lifecycle events ────────────────────────────────────────────────────────

/// What just happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Started,
    Joined,
    Leaved,
    Ended,
}

/// Wire name of a lifecycle event. Join/leave names are prefixed with how
/// the actor participates (`student_joined`, `primary_lecturer_leaved`, …).
pub fn event_name(action: SessionAction, actor: ParticipantKind) -> String {
    let prefix = match actor {
        ParticipantKind::Student => "student",
        ParticipantKind::Supervisor(role) => role.as_str(),
    };
    match action {
        SessionAction::Started => "session_started".to_string(),
        SessionAction::Joined => format!("{prefix}_joined"),
        SessionAction::Leaved => format!("{prefix}_leaved"),
        SessionAction::Ended => "session_ended".to_string(),
    }
}

/// Compact actor description carried on lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSummary {
    pub user_id: Uuid,
    pub name: String,
    pub identifier: String,
    pub role: String,
}

impl ActorSummary {
    pub fn from_participant(p: &Participant) -> Self {
        let role = match p.kind {
            ParticipantKind::Student => "student".to_string(),
            ParticipantKind::Supervisor(r) => r.as_str().to_string(),
        };
        Self {
            user_id: p.user_id,
            name: p.name.clone(),
            identifier: p.identifier.clone(),
            role,
        }
    }
}

/// A session lifecycle event as pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event: String,
    pub session_id: Uuid,
    pub thesis_id: Uuid,
    /// Absent on `session_ended` — clients only need to know it is over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorSummary>,
}

impl LifecycleEvent {
    pub fn new(
        action: SessionAction,
        session_id: Uuid,
        thesis_id: Uuid,
        actor: &Participant,
    ) -> Self {
        let actor_summary = match action {
            SessionAction::Ended => None,
            _ => Some(ActorSummary::from_participant(actor)),
        };
        Self {
            event: event_name(action, actor.kind),
            session_id,
            thesis_id,
            actor: actor_summary,
        }
    }
}

// ─── Message events ──────────────────────────────────────────────────────────

/// Sender snapshot embedded in every message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderSummary {
    pub id: Uuid,
    pub name: String,
    pub identifier: String,
    pub role: String,
}

/// One chat turn. This is simultaneously the WebSocket frame, the live
/// buffer member, the summary task entry, and the shape history reads come
/// back in — a message round-trips through all four unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub event: String,
    pub message_id: Uuid,
    pub is_text: bool,
    pub text: String,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub sender: SenderSummary,
    pub session_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

pub const NEW_MESSAGE_EVENT: &str = "new_message";

// ─── Recipient resolution ────────────────────────────────────────────────────

/// Everyone in the participant set except the acting user. The actor's own
/// client is the source of truth for its own action and never receives an
/// echo.
pub fn recipients(set: &ParticipantSet, actor_user_id: Uuid) -> Vec<&Participant> {
    set.participants
        .iter()
        .filter(|p| p.user_id != actor_user_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SupervisorRole, ThesisInfo};

    fn participant(kind: ParticipantKind) -> Participant {
        Participant {
            user_id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            name: "Someone".into(),
            identifier: "123".into(),
            kind,
        }
    }

    fn set_of(participants: Vec<Participant>) -> ParticipantSet {
        ParticipantSet {
            thesis: ThesisInfo {
                id: Uuid::new_v4(),
                title: "Title".into(),
                description: String::new(),
                progress: "proposal".into(),
            },
            participants,
        }
    }

    #[test]
    fn event_names_follow_the_actor_kind() {
        assert_eq!(
            event_name(SessionAction::Joined, ParticipantKind::Student),
            "student_joined"
        );
        assert_eq!(
            event_name(
                SessionAction::Joined,
                ParticipantKind::Supervisor(SupervisorRole::PrimaryLecturer)
            ),
            "primary_lecturer_joined"
        );
        assert_eq!(
            event_name(
                SessionAction::Leaved,
                ParticipantKind::Supervisor(SupervisorRole::SecondaryLecturer)
            ),
            "secondary_lecturer_leaved"
        );
        assert_eq!(
            event_name(SessionAction::Started, ParticipantKind::Student),
            "session_started"
        );
    }

    #[test]
    fn recipients_exclude_the_actor() {
        let student = participant(ParticipantKind::Student);
        let primary = participant(ParticipantKind::Supervisor(SupervisorRole::PrimaryLecturer));
        let secondary =
            participant(ParticipantKind::Supervisor(SupervisorRole::SecondaryLecturer));
        let actor_id = primary.user_id;
        let set = set_of(vec![student.clone(), primary, secondary.clone()]);

        let rec = recipients(&set, actor_id);
        assert_eq!(rec.len(), 2);
        assert!(rec.iter().all(|p| p.user_id != actor_id));
    }

    #[test]
    fn ended_event_carries_no_actor() {
        let student = participant(ParticipantKind::Student);
        let ev = LifecycleEvent::new(
            SessionAction::Ended,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &student,
        );
        assert_eq!(ev.event, "session_ended");
        assert!(ev.actor.is_none());
        let json = serde_json::to_value(&ev).unwrap();
        assert!(json.get("actor").is_none());
    }

    #[test]
    fn message_event_round_trips_all_fields() {
        let ev = MessageEvent {
            event: NEW_MESSAGE_EVENT.to_string(),
            message_id: Uuid::new_v4(),
            is_text: false,
            text: String::new(),
            file_url: Some("https://files.example/scan.pdf".into()),
            file_type: Some("application/pdf".into()),
            sender: SenderSummary {
                id: Uuid::new_v4(),
                name: "Alya".into(),
                identifier: "5025211001".into(),
                role: "student".into(),
            },
            session_id: Uuid::new_v4(),
            parent_message_id: Some(Uuid::new_v4()),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: MessageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
