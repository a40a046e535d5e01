//! Visit tracking
//!
//! Presence reads are best-effort: a failed current-visit lookup is
//! treated as "no open visit" so a scan can still proceed as a plain
//! check-in. Writes propagate their errors.

use chrono::{DateTime, Utc};
use hort_common::db::models::Visit;
use hort_common::Result;
use tracing::warn;

use crate::store::{OpenVisit, VisitStore};

/// The student's open visit with session and room attached, or `None`
/// if there is none or the lookup fails.
pub async fn current_visit<S: VisitStore>(store: &S, student_id: i64) -> Option<OpenVisit> {
    match store.current_visit(student_id).await {
        Ok(open) => open,
        Err(e) => {
            warn!(
                student_id,
                "Current-visit lookup failed, treating as no open visit: {}", e
            );
            None
        }
    }
}

/// Close an open visit. `sync_daily` additionally closes today's daily
/// attendance record; a plain room-to-room transfer must not set it,
/// since leaving a room is not the same as leaving the building.
pub async fn checkout<S: VisitStore>(
    store: &S,
    visit: &Visit,
    at: DateTime<Utc>,
    sync_daily: bool,
) -> Result<()> {
    store.close_visit(visit, at, sync_daily).await
}
