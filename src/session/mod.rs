// SPDX-License-Identifier: MIT
//! The session state machine: single authoritative arbiter of session
//! lifecycle and its authorization.
//!
//! `waiting →(first non-owner join)→ ongoing →(owner end)→
//! processing_summary →(summary task published)→ finished`. No other
//! transitions exist. Transition guards are pure functions over loaded
//! rows; the actual flips are conditional updates in storage so concurrent
//! callers race safely.

use crate::error::AppError;
use crate::events::{recipients, LifecycleEvent, SessionAction};
use crate::model::{
    Participant, ParticipantKind, ParticipantSet, SessionRecord, SessionStatus, UserRecord,
};
use crate::pagination::PageRequest;
use crate::storage::SessionFilter;
use crate::ws::NotificationTemplate;
use crate::AppContext;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

// ─── Response shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PersonView {
    pub id: Uuid,
    pub name: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorView {
    pub id: Uuid,
    pub name: String,
    pub identifier: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThesisView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub progress: String,
    pub student: Option<PersonView>,
    pub supervisors: Vec<SupervisorView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerView {
    pub id: Uuid,
    pub identifier: String,
    pub role: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub id: Uuid,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub thesis: ThesisView,
    pub owner: OwnerView,
}

fn build_detail(
    session: &SessionRecord,
    set: &ParticipantSet,
    owner: &UserRecord,
) -> SessionDetail {
    let student = set.student().map(|p| PersonView {
        id: p.person_id,
        name: p.name.clone(),
        identifier: p.identifier.clone(),
    });
    let supervisors = set
        .supervisors()
        .map(|p| SupervisorView {
            id: p.person_id,
            name: p.name.clone(),
            identifier: p.identifier.clone(),
            role: match p.kind {
                ParticipantKind::Supervisor(role) => role.as_str().to_string(),
                ParticipantKind::Student => unreachable!("supervisors() yields supervisors only"),
            },
        })
        .collect();

    SessionDetail {
        id: session.id,
        status: session.status,
        start_time: session.start_time,
        end_time: session.end_time,
        created_at: session.created_at,
        thesis: ThesisView {
            id: set.thesis.id,
            title: set.thesis.title.clone(),
            description: set.thesis.description.clone(),
            progress: set.thesis.progress.clone(),
            student,
            supervisors,
        },
        owner: OwnerView {
            id: owner.id,
            identifier: owner.identifier.clone(),
            role: owner.role().as_str().to_string(),
            name: owner.person.name().to_string(),
        },
    }
}

// ─── Transition guards ───────────────────────────────────────────────────────
//
// Pure checks over a loaded session row. `processing_summary` is internal:
// join/leave/send observe it as finished.

pub fn ensure_joinable(session: &SessionRecord, caller_id: Uuid) -> Result<(), AppError> {
    match session.status {
        SessionStatus::ProcessingSummary | SessionStatus::Finished => {
            return Err(AppError::Finished)
        }
        SessionStatus::Waiting | SessionStatus::Ongoing => {}
    }
    if session.owner_user_id == caller_id {
        return Err(AppError::SameUser);
    }
    Ok(())
}

pub fn ensure_leavable(session: &SessionRecord, caller_id: Uuid) -> Result<(), AppError> {
    match session.status {
        SessionStatus::Waiting => return Err(AppError::NotStarted),
        SessionStatus::ProcessingSummary | SessionStatus::Finished => {
            return Err(AppError::Finished)
        }
        SessionStatus::Ongoing => {}
    }
    if session.owner_user_id == caller_id {
        return Err(AppError::OwnerCannotLeave);
    }
    Ok(())
}

pub fn ensure_endable(session: &SessionRecord, caller_id: Uuid) -> Result<(), AppError> {
    match session.status {
        SessionStatus::Waiting => return Err(AppError::NotStarted),
        SessionStatus::ProcessingSummary | SessionStatus::Finished => {
            return Err(AppError::AlreadyFinished)
        }
        SessionStatus::Ongoing => {}
    }
    if session.owner_user_id != caller_id {
        return Err(AppError::NotOwner);
    }
    Ok(())
}

// ─── Fan-out ─────────────────────────────────────────────────────────────────

fn lifecycle_template(action: SessionAction, actor_name: &str) -> NotificationTemplate {
    match action {
        SessionAction::Started => NotificationTemplate {
            title: "New Thesis Session".to_string(),
            message: format!("Your thesis session has been started by {actor_name}."),
        },
        SessionAction::Joined => NotificationTemplate {
            title: "User has been join the session".to_string(),
            message: format!("{actor_name} has joined the session."),
        },
        SessionAction::Leaved => NotificationTemplate {
            title: "User has been leave the session".to_string(),
            message: format!("{actor_name} has leaved the session."),
        },
        SessionAction::Ended => NotificationTemplate {
            title: "Session Ended".to_string(),
            message: format!("{actor_name} has ended the session."),
        },
    }
}

/// Push a lifecycle event to every participant except the actor. Individual
/// delivery failures degrade to notifications and never fail the transition.
async fn fan_out(
    ctx: &AppContext,
    action: SessionAction,
    session: &SessionRecord,
    set: &ParticipantSet,
    actor: &Participant,
) {
    let event = LifecycleEvent::new(action, session.id, session.thesis_id, actor);
    let payload = match serde_json::to_string(&event) {
        Ok(p) => p,
        Err(e) => {
            warn!(session_id = %session.id, err = %e, "failed to encode lifecycle event");
            return;
        }
    };
    let template = lifecycle_template(action, &actor.name);

    for recipient in recipients(set, actor.user_id) {
        let outcome = ctx
            .router
            .deliver_or_notify(recipient.user_id, &payload, &template)
            .await;
        info!(
            session_id = %session.id,
            event = %event.event,
            receiver = %recipient.user_id,
            outcome = ?outcome,
            "lifecycle event routed"
        );
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn caller_record(ctx: &AppContext, caller_id: Uuid) -> Result<UserRecord, AppError> {
    ctx.storage
        .user_by_id(caller_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Load the participant set and check the caller belongs to it.
async fn authorized_set(
    ctx: &AppContext,
    thesis_id: Uuid,
    caller_id: Uuid,
) -> Result<(ParticipantSet, Participant), AppError> {
    let set = ctx
        .storage
        .participant_set(thesis_id)
        .await?
        .ok_or(AppError::NotFound("thesis"))?;
    let actor = set.get(caller_id).cloned().ok_or(AppError::Unauthorized)?;
    Ok((set, actor))
}

async fn owner_record(ctx: &AppContext, session: &SessionRecord) -> Result<UserRecord, AppError> {
    ctx.storage
        .user_by_id(session.owner_user_id)
        .await?
        .ok_or(AppError::NotFound("session owner"))
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Create a session in `waiting` with the caller as owner and announce it to
/// the other participants.
pub async fn start(
    ctx: &AppContext,
    caller_id: Uuid,
    thesis_id: Uuid,
) -> Result<SessionDetail, AppError> {
    let caller = caller_record(ctx, caller_id).await?;
    let (set, actor) = authorized_set(ctx, thesis_id, caller_id).await?;

    if ctx
        .storage
        .live_session_by_thesis(thesis_id)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadyStarted);
    }

    // The partial unique index still catches a concurrent double-start
    // between the check above and this insert.
    let session = ctx.storage.create_session(thesis_id, caller_id).await?;
    info!(
        session_id = %session.id,
        thesis_id = %thesis_id,
        owner = %caller_id,
        "session started"
    );

    fan_out(ctx, SessionAction::Started, &session, &set, &actor).await;
    Ok(build_detail(&session, &set, &caller))
}

/// Join a waiting or ongoing session as a non-owner participant. The first
/// join flips `waiting → ongoing` and stamps `start_time`.
pub async fn join(
    ctx: &AppContext,
    caller_id: Uuid,
    session_id: Uuid,
) -> Result<SessionDetail, AppError> {
    caller_record(ctx, caller_id).await?;
    let mut session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;

    ensure_joinable(&session, caller_id)?;
    let (set, actor) = authorized_set(ctx, session.thesis_id, caller_id).await?;

    if session.status == SessionStatus::Waiting {
        let flipped = ctx
            .storage
            .mark_session_ongoing(session.id, Utc::now())
            .await?;
        if !flipped {
            // Another joiner won the flip; fall through with their state.
            info!(session_id = %session.id, "session already ongoing");
        }
        session = ctx
            .storage
            .session_by_id(session_id)
            .await?
            .ok_or(AppError::NotFound("session"))?;
        // The session may have raced to a terminal state instead.
        ensure_joinable(&session, caller_id)?;
    }

    info!(session_id = %session.id, user_id = %caller_id, "participant joined");
    fan_out(ctx, SessionAction::Joined, &session, &set, &actor).await;

    let owner = owner_record(ctx, &session).await?;
    Ok(build_detail(&session, &set, &owner))
}

/// Leave an ongoing session. Leaving never changes the session status —
/// only the owner's End finishes a session.
pub async fn leave(
    ctx: &AppContext,
    caller_id: Uuid,
    session_id: Uuid,
) -> Result<SessionDetail, AppError> {
    caller_record(ctx, caller_id).await?;
    let session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;

    ensure_leavable(&session, caller_id)?;
    let (set, actor) = authorized_set(ctx, session.thesis_id, caller_id).await?;

    info!(session_id = %session.id, user_id = %caller_id, "participant left");
    fan_out(ctx, SessionAction::Leaved, &session, &set, &actor).await;

    let owner = owner_record(ctx, &session).await?;
    Ok(build_detail(&session, &set, &owner))
}

/// End an ongoing session: flip to `processing_summary`, announce, and hand
/// the drained log to the summary producer. The session reaches `finished`
/// once the broker accepts the task; if publishing keeps failing it stays
/// in `processing_summary` for the recovery sweep to republish.
pub async fn end(
    ctx: &AppContext,
    caller_id: Uuid,
    session_id: Uuid,
) -> Result<SessionDetail, AppError> {
    let caller = caller_record(ctx, caller_id).await?;
    let session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;

    ensure_endable(&session, caller_id)?;
    let (set, actor) = authorized_set(ctx, session.thesis_id, caller_id).await?;

    if !ctx
        .storage
        .mark_session_processing(session.id, Utc::now())
        .await?
    {
        // A concurrent End won the conditional update.
        return Err(AppError::AlreadyFinished);
    }
    let session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    info!(session_id = %session.id, "session ended — handing off summary task");

    fan_out(ctx, SessionAction::Ended, &session, &set, &actor).await;

    if let Err(e) = crate::summary::producer::finalize_session(ctx, &session).await {
        // The recovery sweep owns the session now; End itself succeeded.
        warn!(session_id = %session.id, err = %e, "summary hand-off failed — left in processing_summary");
    }

    let session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    Ok(build_detail(&session, &set, &caller))
}

/// Sessions visible to the caller, filtered and optionally paginated.
/// Returns the page plus the pre-paging total.
pub async fn list(
    ctx: &AppContext,
    caller_id: Uuid,
    filter: &SessionFilter,
    page: Option<PageRequest>,
) -> Result<(Vec<SessionDetail>, u64), AppError> {
    let caller = caller_record(ctx, caller_id).await?;
    let (sessions, count) = ctx
        .storage
        .list_sessions_for_user(&caller, filter, page)
        .await?;

    // Sessions of one thesis share a participant set; resolve each thesis
    // once.
    let mut sets: HashMap<Uuid, ParticipantSet> = HashMap::new();
    let mut owners: HashMap<Uuid, UserRecord> = HashMap::new();
    let mut details = Vec::with_capacity(sessions.len());
    for session in &sessions {
        if !sets.contains_key(&session.thesis_id) {
            let set = ctx
                .storage
                .participant_set(session.thesis_id)
                .await?
                .ok_or(AppError::NotFound("thesis"))?;
            sets.insert(session.thesis_id, set);
        }
        if !owners.contains_key(&session.owner_user_id) {
            owners.insert(session.owner_user_id, owner_record(ctx, session).await?);
        }
        details.push(build_detail(
            session,
            &sets[&session.thesis_id],
            &owners[&session.owner_user_id],
        ));
    }
    Ok((details, count))
}

/// Detail of one session the caller participates in.
pub async fn detail(
    ctx: &AppContext,
    caller_id: Uuid,
    session_id: Uuid,
) -> Result<SessionDetail, AppError> {
    caller_record(ctx, caller_id).await?;
    let session = ctx
        .storage
        .session_by_id(session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    let (set, _) = authorized_set(ctx, session.thesis_id, caller_id).await?;
    let owner = owner_record(ctx, &session).await?;
    Ok(build_detail(&session, &set, &owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(status: SessionStatus, owner: Uuid) -> SessionRecord {
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

    #[test]
    fn owner_cannot_join_their_own_session() {
        let owner = Uuid::new_v4();
        let session = session_with(SessionStatus::Waiting, owner);
        assert!(matches!(
            ensure_joinable(&session, owner),
            Err(AppError::SameUser)
        ));
    }

    #[test]
    fn join_is_allowed_while_waiting_or_ongoing() {
        let owner = Uuid::new_v4();
        let caller = Uuid::new_v4();
        for status in [SessionStatus::Waiting, SessionStatus::Ongoing] {
            let session = session_with(status, owner);
            assert!(ensure_joinable(&session, caller).is_ok());
        }
    }

    #[test]
    fn processing_summary_behaves_as_finished_for_join() {
        let session = session_with(SessionStatus::ProcessingSummary, Uuid::new_v4());
        assert!(matches!(
            ensure_joinable(&session, Uuid::new_v4()),
            Err(AppError::Finished)
        ));
        let session = session_with(SessionStatus::Finished, Uuid::new_v4());
        assert!(matches!(
            ensure_joinable(&session, Uuid::new_v4()),
            Err(AppError::Finished)
        ));
    }

    #[test]
    fn owner_cannot_leave() {
        let owner = Uuid::new_v4();
        let session = session_with(SessionStatus::Ongoing, owner);
        assert!(matches!(
            ensure_leavable(&session, owner),
            Err(AppError::OwnerCannotLeave)
        ));
    }

    #[test]
    fn leave_requires_an_ongoing_session() {
        let caller = Uuid::new_v4();
        let session = session_with(SessionStatus::Waiting, Uuid::new_v4());
        assert!(matches!(
            ensure_leavable(&session, caller),
            Err(AppError::NotStarted)
        ));
        let session = session_with(SessionStatus::Finished, Uuid::new_v4());
        assert!(matches!(
            ensure_leavable(&session, caller),
            Err(AppError::Finished)
        ));
        let session = session_with(SessionStatus::Ongoing, Uuid::new_v4());
        assert!(ensure_leavable(&session, caller).is_ok());
    }

    #[test]
    fn only_the_owner_may_end() {
        let owner = Uuid::new_v4();
        let session = session_with(SessionStatus::Ongoing, owner);
        assert!(matches!(
            ensure_endable(&session, Uuid::new_v4()),
            Err(AppError::NotOwner)
        ));
        assert!(ensure_endable(&session, owner).is_ok());
    }

    #[test]
    fn end_respects_the_lifecycle() {
        let owner = Uuid::new_v4();
        let session = session_with(SessionStatus::Waiting, owner);
        assert!(matches!(
            ensure_endable(&session, owner),
            Err(AppError::NotStarted)
        ));
        let session = session_with(SessionStatus::ProcessingSummary, owner);
        assert!(matches!(
            ensure_endable(&session, owner),
            Err(AppError::AlreadyFinished)
        ));
        let session = session_with(SessionStatus::Finished, owner);
        assert!(matches!(
            ensure_endable(&session, owner),
            Err(AppError::AlreadyFinished)
        ));
    }

    #[test]
    fn templates_use_the_actor_name() {
        let t = lifecycle_template(SessionAction::Joined, "Dr. Bima Santoso");
        assert_eq!(t.title, "User has been join the session");
        assert_eq!(t.message, "Dr. Bima Santoso has joined the session.");

        let t = lifecycle_template(SessionAction::Started, "Alya");
        assert_eq!(t.message, "Your thesis session has been started by Alya.");
    }
}
