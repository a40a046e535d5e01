//! Storage capabilities consumed by the workflow engine
//!
//! Each collaborator family is a narrow trait so the engine depends on
//! exactly the operations it uses; `SqliteStore` implements all of them
//! over one connection pool.

use chrono::{DateTime, Utc};
use hort_common::db::models::{
    ActivityGroup, Device, EducationGroup, LiveSession, Person, Room, Staff, Student,
    SupervisorAssignment, Visit,
};
use hort_common::Result;

mod sqlite;
pub use sqlite::SqliteStore;

/// An open visit with its live session and room eagerly attached
#[derive(Debug, Clone)]
pub struct OpenVisit {
    pub visit: Visit,
    pub session: LiveSession,
    pub room: Room,
}

/// Fixed defaults used when the reserved schoolyard infrastructure is
/// provisioned lazily on first use.
#[derive(Debug, Clone)]
pub struct SchoolyardDefaults {
    pub room_name: &'static str,
    pub room_capacity: Option<i64>,
    pub room_color: &'static str,
    pub category_name: &'static str,
    pub category_color: &'static str,
    pub activity_name: &'static str,
    pub max_participants: i64,
}

/// Person, student, staff and education-group lookups
#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    async fn person_by_tag(&self, tag: &str) -> Result<Option<Person>>;
    async fn student_by_person(&self, person_id: i64) -> Result<Option<Student>>;
    async fn staff_by_person(&self, person_id: i64) -> Result<Option<Staff>>;
    async fn education_group(&self, group_id: i64) -> Result<Option<EducationGroup>>;
}

/// Room lookups and occupancy
#[allow(async_fn_in_trait)]
pub trait RoomStore {
    async fn room(&self, room_id: i64) -> Result<Option<Room>>;
    /// Open visits across every live session bound to the room
    async fn room_occupancy(&self, room_id: i64) -> Result<i64>;
}

/// Activity-group lookups
#[allow(async_fn_in_trait)]
pub trait ActivityStore {
    async fn activity(&self, activity_id: i64) -> Result<Option<ActivityGroup>>;
}

/// Live-session lookups, liveness and supervisor list
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    /// Sessions bound to a room, most recently started first
    async fn sessions_in_room(&self, room_id: i64) -> Result<Vec<LiveSession>>;
    async fn session_for_device(&self, device_id: i64) -> Result<Option<LiveSession>>;
    /// Open visits within one session
    async fn session_occupancy(&self, session_id: i64) -> Result<i64>;
    async fn touch_session(&self, session_id: i64, at: DateTime<Utc>) -> Result<()>;
    async fn active_supervisors(&self, session_id: i64) -> Result<Vec<SupervisorAssignment>>;
    /// Add an active supervisor assignment; a concurrent duplicate add
    /// is absorbed by the unique index on the active pair.
    async fn add_supervisor(&self, staff_id: i64, session_id: i64, at: DateTime<Utc>)
        -> Result<()>;
    /// Find or create the reserved schoolyard category/room/activity and
    /// a live session binding them, atomically.
    async fn ensure_schoolyard_session(
        &self,
        defaults: &SchoolyardDefaults,
        created_by: i64,
        device_id: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<LiveSession>;
}

/// Visit creation and closing
#[allow(async_fn_in_trait)]
pub trait VisitStore {
    /// The student's open visit, if any, with session and room attached
    async fn current_visit(&self, student_id: i64) -> Result<Option<OpenVisit>>;
    /// Close an open visit; `sync_daily` also closes today's daily
    /// attendance record (daily checkout only, not room transfers).
    async fn close_visit(&self, visit: &Visit, at: DateTime<Utc>, sync_daily: bool) -> Result<()>;
    /// Create a visit after re-checking room and activity occupancy
    /// inside one write transaction.
    async fn create_visit_guarded(
        &self,
        student_id: i64,
        session: &LiveSession,
        room: &Room,
        activity: &ActivityGroup,
        at: DateTime<Utc>,
    ) -> Result<Visit>;
}

/// Scanning-terminal lookups and liveness
#[allow(async_fn_in_trait)]
pub trait DeviceStore {
    async fn device_by_token(&self, token: &str) -> Result<Option<Device>>;
    async fn touch_device(&self, device_id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// Everything the workflow engine needs from persistence
pub trait Store:
    IdentityStore + RoomStore + ActivityStore + SessionStore + VisitStore + DeviceStore + Send + Sync
{
}

impl<T> Store for T where
    T: IdentityStore
        + RoomStore
        + ActivityStore
        + SessionStore
        + VisitStore
        + DeviceStore
        + Send
        + Sync
{
}
