//! Live-session resolution and schoolyard provisioning
//!
//! Every room except the reserved schoolyard gets its sessions from the
//! session-management feature; the schoolyard provisions itself the
//! first time a check-in targets it.

use chrono::{DateTime, Utc};
use hort_common::db::init::SCHOOLYARD_ROOM_NAME;
use hort_common::db::models::{Device, LiveSession};
use hort_common::{Error, Result};
use tracing::{info, warn};

use crate::store::{RoomStore, SchoolyardDefaults, SessionStore};

const SCHOOLYARD_CATEGORY_NAME: &str = "Schulhof";
const SCHOOLYARD_CATEGORY_COLOR: &str = "#8BC34A";
const SCHOOLYARD_ROOM_COLOR: &str = "#8BC34A";
const SCHOOLYARD_ACTIVITY_NAME: &str = "Schulhof";
const SCHOOLYARD_MAX_PARTICIPANTS: i64 = 500;

impl SchoolyardDefaults {
    /// The fixed defaults used for lazy provisioning
    pub fn standard() -> Self {
        Self {
            room_name: SCHOOLYARD_ROOM_NAME,
            room_capacity: None,
            room_color: SCHOOLYARD_ROOM_COLOR,
            category_name: SCHOOLYARD_CATEGORY_NAME,
            category_color: SCHOOLYARD_CATEGORY_COLOR,
            activity_name: SCHOOLYARD_ACTIVITY_NAME,
            max_participants: SCHOOLYARD_MAX_PARTICIPANTS,
        }
    }
}

/// Resolve the live session a check-in to `room_id` joins.
///
/// Picks the room's most recently started session when one exists.
/// Otherwise only the reserved schoolyard room may provision its own
/// infrastructure; any other empty room is a NotFound for the caller.
pub async fn resolve_session<S: RoomStore + SessionStore>(
    store: &S,
    room_id: i64,
    device: &Device,
    at: DateTime<Utc>,
) -> Result<LiveSession> {
    let sessions = store.sessions_in_room(room_id).await?;
    if sessions.len() > 1 {
        warn!(
            room_id,
            count = sessions.len(),
            "Multiple live sessions bound to one room, using the most recently started"
        );
    }
    if let Some(session) = sessions.into_iter().next() {
        return Ok(session);
    }

    let room = store
        .room(room_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("room {} does not exist", room_id)))?;

    if room.name != SCHOOLYARD_ROOM_NAME {
        return Err(Error::NotFound(
            "no active groups in specified room".to_string(),
        ));
    }

    // The session creator is the device's supervising staff member; a
    // device without one cannot provision and that is an operator
    // mistake, not a scan error.
    let created_by = device.staff_id.ok_or_else(|| {
        Error::Config(format!(
            "device '{}' has no supervising staff member assigned, cannot start the schoolyard session",
            device.name
        ))
    })?;

    info!(room_id, device = %device.name, "Provisioning schoolyard session");
    store
        .ensure_schoolyard_session(
            &SchoolyardDefaults::standard(),
            created_by,
            Some(device.id),
            at,
        )
        .await
}
