//! Capacity limits for rooms and activities
//!
//! Pure occupancy-versus-limit checks. The store evaluates them inside
//! the same transaction that inserts the visit, so the decision and the
//! write cannot be interleaved by a concurrent scan.

use hort_common::db::models::{ActivityGroup, Room};
use hort_common::{Error, Result};

/// Reject when the room is already at its capacity. A room without a
/// configured capacity is unlimited.
pub fn check_room_capacity(room: &Room, occupancy: i64) -> Result<()> {
    if let Some(limit) = room.capacity {
        if occupancy >= limit {
            return Err(Error::CapacityExceeded {
                what: format!("room '{}'", room.name),
                current: occupancy,
                limit,
            });
        }
    }
    Ok(())
}

/// Reject when the activity has reached its participant limit.
pub fn check_activity_capacity(activity: &ActivityGroup, occupancy: i64) -> Result<()> {
    if occupancy >= activity.max_participants {
        return Err(Error::CapacityExceeded {
            what: format!("activity '{}'", activity.name),
            current: occupancy,
            limit: activity.max_participants,
        });
    }
    Ok(())
}
