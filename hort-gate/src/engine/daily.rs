//! Daily-checkout policy
//!
//! A plain room checkout escalates to a full daily checkout when the
//! student leaves their home group's room at or after the configured
//! cutoff time. The decision is pure over a supplied wall-clock time;
//! the orchestrator feeds in the current local time.

use chrono::NaiveTime;
use hort_common::config::CutoffTime;
use hort_common::db::models::Student;
use hort_common::Result;

use crate::store::IdentityStore;

#[derive(Debug, Clone, Copy)]
pub struct DailyCheckoutPolicy {
    cutoff: CutoffTime,
}

impl DailyCheckoutPolicy {
    pub fn new(cutoff: CutoffTime) -> Self {
        Self { cutoff }
    }

    /// Pure decision: the cutoff has passed and the room being left is
    /// the home group's room.
    pub fn applies_at(
        &self,
        now: NaiveTime,
        home_room_id: Option<i64>,
        leaving_room_id: i64,
    ) -> bool {
        match home_room_id {
            Some(home) => now >= self.cutoff.time() && home == leaving_room_id,
            None => false,
        }
    }

    /// Decide for a student leaving `leaving_room_id`, resolving their
    /// home education group. Students without one never escalate.
    pub async fn applies<S: IdentityStore>(
        &self,
        store: &S,
        student: &Student,
        leaving_room_id: i64,
        now: NaiveTime,
    ) -> Result<bool> {
        let Some(group_id) = student.group_id else {
            return Ok(false);
        };
        let Some(group) = store.education_group(group_id).await? else {
            return Ok(false);
        };
        Ok(self.applies_at(now, group.room_id, leaving_room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(cutoff: &str) -> DailyCheckoutPolicy {
        DailyCheckoutPolicy::new(CutoffTime::parse(cutoff).unwrap())
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn escalates_at_and_after_cutoff_in_home_room() {
        let p = policy("15:00");
        assert!(p.applies_at(at(15, 0), Some(7), 7));
        assert!(p.applies_at(at(16, 30), Some(7), 7));
    }

    #[test]
    fn never_escalates_before_cutoff() {
        let p = policy("15:00");
        assert!(!p.applies_at(at(14, 59), Some(7), 7));
    }

    #[test]
    fn never_escalates_outside_home_room() {
        let p = policy("15:00");
        assert!(!p.applies_at(at(16, 0), Some(7), 8));
    }

    #[test]
    fn never_escalates_without_home_room() {
        let p = policy("15:00");
        assert!(!p.applies_at(at(16, 0), None, 7));
    }
}
