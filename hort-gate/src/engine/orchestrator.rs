//! Scan workflow orchestration
//!
//! Sequences identity resolution, visit tracking, capacity checks,
//! session provisioning and the daily-checkout policy into a single
//! outcome per scan. The first failing step aborts the rest; mutations
//! already committed stay committed and a later scan recovers.

use chrono::{DateTime, Local, Utc};
use hort_common::db::models::{Device, LiveSession, Person, Staff, Student};
use hort_common::{Error, Result};
use tracing::warn;

use crate::engine::daily::DailyCheckoutPolicy;
use crate::engine::identity::{self, ScanSubject};
use crate::engine::provision;
use crate::engine::registry::{ActionRegistry, RequestedAction};
use crate::engine::supervisor;
use crate::engine::visits;
use crate::store::Store;

/// A scan event as submitted by a device
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub tag: String,
    pub action: Option<String>,
    pub room_id: Option<i64>,
}

/// How a scan was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeAction {
    CheckedIn,
    CheckedOut,
    CheckedOutDaily,
    Transferred,
    SupervisorAuthenticated,
    /// Daily checkout is possible but needs confirmation; nothing was
    /// mutated.
    DailyCheckoutPending,
    /// Degenerate: the scan had nothing to do
    NoAction,
}

impl OutcomeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckedIn => "checked_in",
            Self::CheckedOut => "checked_out",
            Self::CheckedOutDaily => "checked_out_daily",
            Self::Transferred => "transferred",
            Self::SupervisorAuthenticated => "supervisor_authenticated",
            Self::DailyCheckoutPending => "daily_checkout_pending",
            Self::NoAction => "no_action",
        }
    }
}

/// The classified result of one scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Student id for student scans, staff id for staff scans
    pub subject_id: i64,
    pub subject_name: String,
    pub action: OutcomeAction,
    pub visit_id: Option<i64>,
    pub room_name: Option<String>,
    /// Set only for transfers
    pub previous_room: Option<String>,
    pub daily_checkout_available: bool,
    pub active_students: Option<i64>,
    pub message: String,
}

/// The scan workflow engine
pub struct CheckinEngine<S> {
    store: S,
    actions: ActionRegistry,
    daily_policy: DailyCheckoutPolicy,
}

impl<S: Store> CheckinEngine<S> {
    pub fn new(store: S, actions: ActionRegistry, daily_policy: DailyCheckoutPolicy) -> Self {
        Self {
            store,
            actions,
            daily_policy,
        }
    }

    /// The store backing this engine (device lookups, liveness pings)
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one scan event from `device`.
    pub async fn handle_scan(&self, device: &Device, request: &ScanRequest) -> Result<ScanOutcome> {
        if request.tag.trim().is_empty() {
            return Err(Error::InvalidRequest("student_rfid is required".to_string()));
        }
        let action = self.actions.resolve(request.action.as_deref())?;

        match identity::resolve_subject(&self.store, &request.tag).await? {
            ScanSubject::Staff { person, staff } => {
                self.handle_staff_scan(device, &person, &staff).await
            }
            ScanSubject::Student { person, student } => {
                self.handle_student_scan(device, &person, &student, action, request.room_id)
                    .await
            }
        }
    }

    async fn handle_staff_scan(
        &self,
        device: &Device,
        person: &Person,
        staff: &Staff,
    ) -> Result<ScanOutcome> {
        let now = Utc::now();
        let auth = supervisor::authenticate(&self.store, device.id, staff, now).await?;

        let room_name = match self.store.room(auth.session.room_id).await {
            Ok(Some(room)) => Some(room.name),
            Ok(None) => None,
            Err(e) => {
                warn!(
                    session_id = auth.session.id,
                    "Room lookup for supervisor response failed: {}", e
                );
                None
            }
        };

        Ok(ScanOutcome {
            subject_id: staff.id,
            subject_name: person.full_name(),
            action: OutcomeAction::SupervisorAuthenticated,
            visit_id: None,
            room_name,
            previous_room: None,
            daily_checkout_available: false,
            active_students: None,
            message: format!("Supervisor authenticated for '{}'", auth.activity_name),
        })
    }

    async fn handle_student_scan(
        &self,
        device: &Device,
        person: &Person,
        student: &Student,
        action: RequestedAction,
        room_id: Option<i64>,
    ) -> Result<ScanOutcome> {
        let now = Utc::now();
        let local_now = Local::now().time();

        let current = visits::current_visit(&self.store, student.id).await;

        // Daily-checkout eligibility applies only to a plain checkout
        // gesture: no target room, or the room the student is already in.
        let mut daily_eligible = false;
        if let Some(open) = &current {
            let checkout_gesture = action == RequestedAction::CheckOut
                || room_id.map_or(true, |r| r == open.room.id);
            if checkout_gesture {
                daily_eligible = self
                    .daily_policy
                    .applies(&self.store, student, open.room.id, local_now)
                    .await?;
            }
            if daily_eligible && action != RequestedAction::CheckOut {
                // Two-step confirm flow: report, mutate nothing.
                let active_students = self.count_active_students(open.room.id, device).await;
                return Ok(ScanOutcome {
                    subject_id: student.id,
                    subject_name: person.full_name(),
                    action: OutcomeAction::DailyCheckoutPending,
                    visit_id: Some(open.visit.id),
                    room_name: Some(open.room.name.clone()),
                    previous_room: None,
                    daily_checkout_available: true,
                    active_students,
                    message: format!(
                        "{} is ready for daily checkout, confirm with action 'checkout'",
                        person.full_name()
                    ),
                });
            }
        }

        let mut checked_out = false;
        let mut previous: Option<(i64, String)> = None;
        let mut visit_id: Option<i64> = None;

        if let Some(open) = &current {
            visits::checkout(&self.store, &open.visit, now, daily_eligible).await?;
            checked_out = true;
            previous = Some((open.room.id, open.room.name.clone()));
            visit_id = Some(open.visit.id);
        }

        // A scan at the room the student just left is the scan-out
        // gesture, not a transfer; an explicit checkout never re-enters.
        let skip_checkin = action == RequestedAction::CheckOut
            || match room_id {
                Some(r) => checked_out && previous.as_ref().map(|p| p.0) == Some(r),
                None => false,
            };

        let mut checked_in = false;
        let mut new_room: Option<(i64, String)> = None;
        let mut joined_session: Option<LiveSession> = None;

        match room_id {
            Some(target) if !skip_checkin => {
                let session =
                    provision::resolve_session(&self.store, target, device, now).await?;
                let room = self.store.room(session.room_id).await?.ok_or_else(|| {
                    Error::NotFound(format!("room {} does not exist", target))
                })?;
                let activity =
                    self.store.activity(session.activity_id).await?.ok_or_else(|| {
                        Error::Internal(format!(
                            "session {} references missing activity {}",
                            session.id, session.activity_id
                        ))
                    })?;
                let visit = self
                    .store
                    .create_visit_guarded(student.id, &session, &room, &activity, now)
                    .await?;
                checked_in = true;
                visit_id = Some(visit.id);
                new_room = Some((room.id, room.name));
                joined_session = Some(session);
            }
            Some(target) => {
                // No new visit; still resolve a room name for the response.
                if let Ok(Some(room)) = self.store.room(target).await {
                    new_room = Some((room.id, room.name));
                }
            }
            None => {
                if !checked_out {
                    return Err(Error::InvalidRequest(
                        "room_id is required for check-in".to_string(),
                    ));
                }
            }
        }

        // Classify. Same-room comparisons use ids; names are display-only.
        let action_out = match (checked_out, checked_in) {
            (true, true) => {
                let transferred = match (&previous, &new_room) {
                    (Some((prev_id, prev_name)), Some((new_id, _))) => {
                        prev_id != new_id && !prev_name.is_empty()
                    }
                    _ => false,
                };
                if transferred {
                    OutcomeAction::Transferred
                } else {
                    OutcomeAction::CheckedIn
                }
            }
            (true, false) => {
                if daily_eligible {
                    OutcomeAction::CheckedOutDaily
                } else {
                    OutcomeAction::CheckedOut
                }
            }
            (false, true) => OutcomeAction::CheckedIn,
            (false, false) => {
                warn!(student_id = student.id, "Scan resolved to no action");
                OutcomeAction::NoAction
            }
        };

        if let Some(target) = room_id {
            self.refresh_session_liveness(target, joined_session.as_ref(), now)
                .await;
        }

        let count_room = room_id.or_else(|| previous.as_ref().map(|p| p.0));
        let active_students = match count_room {
            Some(r) => self.count_active_students(r, device).await,
            None => None,
        };

        let name = person.full_name();
        let message = match action_out {
            OutcomeAction::Transferred => {
                let from = previous.as_ref().map(|p| p.1.as_str()).unwrap_or("?");
                let to = new_room.as_ref().map(|r| r.1.as_str()).unwrap_or("?");
                format!("{} moved from {} to {}", name, from, to)
            }
            OutcomeAction::CheckedIn => {
                let room = new_room.as_ref().map(|r| r.1.as_str()).unwrap_or("?");
                format!("{} checked into {}", name, room)
            }
            OutcomeAction::CheckedOut => {
                let room = previous.as_ref().map(|p| p.1.as_str()).unwrap_or("?");
                format!("{} checked out of {}", name, room)
            }
            OutcomeAction::CheckedOutDaily => format!("{} checked out for the day", name),
            OutcomeAction::NoAction => format!("No action taken for {}", name),
            OutcomeAction::SupervisorAuthenticated | OutcomeAction::DailyCheckoutPending => {
                String::new()
            }
        };

        let room_name = new_room
            .as_ref()
            .map(|r| r.1.clone())
            .or_else(|| previous.as_ref().map(|p| p.1.clone()));
        let previous_room = if action_out == OutcomeAction::Transferred {
            previous.as_ref().map(|p| p.1.clone())
        } else {
            None
        };

        Ok(ScanOutcome {
            subject_id: student.id,
            subject_name: name,
            action: action_out,
            visit_id,
            room_name,
            previous_room,
            daily_checkout_available: daily_eligible,
            active_students,
            message,
        })
    }

    /// Best-effort refresh of the room's live-session activity
    /// timestamp; failures are logged, never surfaced.
    async fn refresh_session_liveness(
        &self,
        room_id: i64,
        joined: Option<&LiveSession>,
        at: DateTime<Utc>,
    ) {
        let session_id = match joined {
            Some(session) => Some(session.id),
            None => match self.store.sessions_in_room(room_id).await {
                Ok(sessions) => sessions.first().map(|s| s.id),
                Err(e) => {
                    warn!(room_id, "Session lookup for liveness refresh failed: {}", e);
                    None
                }
            },
        };
        if let Some(id) = session_id {
            if let Err(e) = self.store.touch_session(id, at).await {
                warn!(session_id = id, "Session liveness refresh failed: {}", e);
            }
        }
    }

    /// Occupancy for the response: the session bound to the scanning
    /// device when one exists in the room, otherwise the whole room.
    async fn count_active_students(&self, room_id: i64, device: &Device) -> Option<i64> {
        let result: Result<i64> = async {
            let sessions = self.store.sessions_in_room(room_id).await?;
            if let Some(bound) = sessions.iter().find(|s| s.device_id == Some(device.id)) {
                return self.store.session_occupancy(bound.id).await;
            }
            let mut total = 0;
            for session in &sessions {
                total += self.store.session_occupancy(session.id).await?;
            }
            Ok(total)
        }
        .await;

        match result {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(room_id, "Active-student count failed: {}", e);
                None
            }
        }
    }
}
