//! Supervisor authentication via staff tag scan
//!
//! A staff tag scanned at a device with a bound session adds the staff
//! member to that session's active supervisors. Re-scanning is a no-op;
//! the response is the same either way.

use chrono::{DateTime, Utc};
use hort_common::db::models::{LiveSession, Staff};
use hort_common::{Error, Result};
use tracing::debug;

use crate::store::{ActivityStore, SessionStore};

/// Result of a staff scan
#[derive(Debug, Clone)]
pub struct SupervisorAuth {
    pub session: LiveSession,
    pub activity_name: String,
    /// False when the staff member was already an active supervisor
    pub newly_added: bool,
}

/// Authenticate a staff member against the session bound to the
/// scanning device.
pub async fn authenticate<S: SessionStore + ActivityStore>(
    store: &S,
    device_id: i64,
    staff: &Staff,
    at: DateTime<Utc>,
) -> Result<SupervisorAuth> {
    let session = store.session_for_device(device_id).await?.ok_or_else(|| {
        Error::NotFound("no active session - start an activity first".to_string())
    })?;

    let supervisors = store.active_supervisors(session.id).await?;
    let already_present = supervisors.iter().any(|s| s.staff_id == staff.id);

    if already_present {
        debug!(
            staff_id = staff.id,
            session_id = session.id,
            "Staff member already supervises this session"
        );
    } else {
        store.add_supervisor(staff.id, session.id, at).await?;
    }

    let activity = store.activity(session.activity_id).await?.ok_or_else(|| {
        Error::Internal(format!(
            "session {} references missing activity {}",
            session.id, session.activity_id
        ))
    })?;

    Ok(SupervisorAuth {
        session,
        activity_name: activity.name,
        newly_added: !already_present,
    })
}
