//! SQLite-backed store
//!
//! All engine-visible persistence in one place. The two read-then-write
//! sequences the engine depends on (occupancy check + visit insert, and
//! the schoolyard find-or-create) run under `BEGIN IMMEDIATE` so a
//! concurrent scan cannot interleave between the read and the write;
//! the partial unique indexes created in the schema back them up.

use chrono::{DateTime, Local, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};

use hort_common::db::models::{
    ActivityGroup, Device, EducationGroup, LiveSession, Person, Room, Staff, Student,
    SupervisorAssignment, Visit,
};
use hort_common::{Error, Result};

use crate::engine::capacity;
use crate::store::{
    ActivityStore, DeviceStore, IdentityStore, OpenVisit, RoomStore, SchoolyardDefaults,
    SessionStore, VisitStore,
};

/// Store implementation over a SQLite connection pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open an immediate (write-locked) transaction on a pooled
    /// connection; pair with [`finish`].
    async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(conn)
    }
}

impl IdentityStore for SqliteStore {
    async fn person_by_tag(&self, tag: &str) -> Result<Option<Person>> {
        let person = sqlx::query_as::<_, Person>(
            "SELECT id, first_name, last_name, tag_id FROM persons WHERE tag_id = ?",
        )
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(person)
    }

    async fn student_by_person(&self, person_id: i64) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, person_id, class_name, group_id FROM students WHERE person_id = ?",
        )
        .bind(person_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(student)
    }

    async fn staff_by_person(&self, person_id: i64) -> Result<Option<Staff>> {
        let staff =
            sqlx::query_as::<_, Staff>("SELECT id, person_id FROM staff WHERE person_id = ?")
                .bind(person_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(staff)
    }

    async fn education_group(&self, group_id: i64) -> Result<Option<EducationGroup>> {
        let group = sqlx::query_as::<_, EducationGroup>(
            "SELECT id, name, room_id FROM education_groups WHERE id = ?",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }
}

impl RoomStore for SqliteStore {
    async fn room(&self, room_id: i64) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            "SELECT id, name, capacity, category_id, color FROM rooms WHERE id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    async fn room_occupancy(&self, room_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM visits v
            JOIN live_sessions s ON v.session_id = s.id
            WHERE s.room_id = ? AND v.exited_at IS NULL
            "#,
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

impl ActivityStore for SqliteStore {
    async fn activity(&self, activity_id: i64) -> Result<Option<ActivityGroup>> {
        let activity = sqlx::query_as::<_, ActivityGroup>(
            r#"
            SELECT id, name, category_id, max_participants, is_open, created_by
            FROM activity_groups WHERE id = ?
            "#,
        )
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(activity)
    }
}

impl SessionStore for SqliteStore {
    async fn sessions_in_room(&self, room_id: i64) -> Result<Vec<LiveSession>> {
        let sessions = sqlx::query_as::<_, LiveSession>(
            r#"
            SELECT id, activity_id, room_id, device_id, started_at, last_activity_at
            FROM live_sessions WHERE room_id = ?
            ORDER BY started_at DESC, id DESC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn session_for_device(&self, device_id: i64) -> Result<Option<LiveSession>> {
        let session = sqlx::query_as::<_, LiveSession>(
            r#"
            SELECT id, activity_id, room_id, device_id, started_at, last_activity_at
            FROM live_sessions WHERE device_id = ?
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn session_occupancy(&self, session_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM visits WHERE session_id = ? AND exited_at IS NULL",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn touch_session(&self, session_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE live_sessions SET last_activity_at = ? WHERE id = ?")
            .bind(at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn active_supervisors(&self, session_id: i64) -> Result<Vec<SupervisorAssignment>> {
        let assignments = sqlx::query_as::<_, SupervisorAssignment>(
            r#"
            SELECT id, staff_id, session_id, started_at, ended_at
            FROM supervisor_assignments
            WHERE session_id = ? AND ended_at IS NULL
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assignments)
    }

    async fn add_supervisor(
        &self,
        staff_id: i64,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        // The partial unique index absorbs a concurrent duplicate add.
        sqlx::query(
            r#"
            INSERT INTO supervisor_assignments (staff_id, session_id, started_at)
            VALUES (?, ?, ?)
            ON CONFLICT(staff_id, session_id) WHERE ended_at IS NULL DO NOTHING
            "#,
        )
        .bind(staff_id)
        .bind(session_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ensure_schoolyard_session(
        &self,
        defaults: &SchoolyardDefaults,
        created_by: i64,
        device_id: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<LiveSession> {
        let mut conn = self.begin_immediate().await?;
        let result =
            ensure_schoolyard_inner(&mut conn, defaults, created_by, device_id, at).await;
        finish(conn, result).await
    }
}

impl VisitStore for SqliteStore {
    async fn current_visit(&self, student_id: i64) -> Result<Option<OpenVisit>> {
        let visit = sqlx::query_as::<_, Visit>(
            r#"
            SELECT id, student_id, session_id, entered_at, exited_at
            FROM visits WHERE student_id = ? AND exited_at IS NULL
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(visit) = visit else {
            return Ok(None);
        };

        let session = sqlx::query_as::<_, LiveSession>(
            r#"
            SELECT id, activity_id, room_id, device_id, started_at, last_activity_at
            FROM live_sessions WHERE id = ?
            "#,
        )
        .bind(visit.session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "visit {} references missing session {}",
                visit.id, visit.session_id
            ))
        })?;

        let room = sqlx::query_as::<_, Room>(
            "SELECT id, name, capacity, category_id, color FROM rooms WHERE id = ?",
        )
        .bind(session.room_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "session {} references missing room {}",
                session.id, session.room_id
            ))
        })?;

        Ok(Some(OpenVisit {
            visit,
            session,
            room,
        }))
    }

    async fn close_visit(&self, visit: &Visit, at: DateTime<Utc>, sync_daily: bool) -> Result<()> {
        sqlx::query("UPDATE visits SET exited_at = ? WHERE id = ? AND exited_at IS NULL")
            .bind(at)
            .bind(visit.id)
            .execute(&self.pool)
            .await?;

        if sync_daily {
            // Leaving the building, not just the room: close today's
            // daily attendance record as well.
            let day = at.with_timezone(&Local).format("%Y-%m-%d").to_string();
            sqlx::query(
                r#"
                INSERT INTO daily_attendance (student_id, day, checked_out_at)
                VALUES (?, ?, ?)
                ON CONFLICT(student_id, day) DO UPDATE SET checked_out_at = excluded.checked_out_at
                "#,
            )
            .bind(visit.student_id)
            .bind(day)
            .bind(at)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn create_visit_guarded(
        &self,
        student_id: i64,
        session: &LiveSession,
        room: &Room,
        activity: &ActivityGroup,
        at: DateTime<Utc>,
    ) -> Result<Visit> {
        let mut conn = self.begin_immediate().await?;
        let result =
            create_visit_inner(&mut conn, student_id, session, room, activity, at).await;
        finish(conn, result).await
    }
}

impl DeviceStore for SqliteStore {
    async fn device_by_token(&self, token: &str) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            "SELECT id, name, token, staff_id, last_seen FROM devices WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(device)
    }

    async fn touch_device(&self, device_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE devices SET last_seen = ? WHERE id = ?")
            .bind(at)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Commit on success, roll back on failure, then return the result.
async fn finish<T>(mut conn: PoolConnection<Sqlite>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(value)
        }
        Err(e) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(e)
        }
    }
}

/// Occupancy checks and visit insert under the write lock
async fn create_visit_inner(
    conn: &mut PoolConnection<Sqlite>,
    student_id: i64,
    session: &LiveSession,
    room: &Room,
    activity: &ActivityGroup,
    at: DateTime<Utc>,
) -> Result<Visit> {
    let room_occupancy: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM visits v
        JOIN live_sessions s ON v.session_id = s.id
        WHERE s.room_id = ? AND v.exited_at IS NULL
        "#,
    )
    .bind(room.id)
    .fetch_one(&mut **conn)
    .await?;
    capacity::check_room_capacity(room, room_occupancy)?;

    let session_occupancy: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM visits WHERE session_id = ? AND exited_at IS NULL",
    )
    .bind(session.id)
    .fetch_one(&mut **conn)
    .await?;
    capacity::check_activity_capacity(activity, session_occupancy)?;

    let visit = sqlx::query_as::<_, Visit>(
        r#"
        INSERT INTO visits (student_id, session_id, entered_at)
        VALUES (?, ?, ?)
        RETURNING id, student_id, session_id, entered_at, exited_at
        "#,
    )
    .bind(student_id)
    .bind(session.id)
    .bind(at)
    .fetch_one(&mut **conn)
    .await?;

    Ok(visit)
}

/// Find-or-create of the reserved schoolyard infrastructure under the
/// write lock: category, room, activity, then a live session binding
/// activity to room. Each find matches exactly what the create writes,
/// so a second call reuses every row.
async fn ensure_schoolyard_inner(
    conn: &mut PoolConnection<Sqlite>,
    defaults: &SchoolyardDefaults,
    created_by: i64,
    device_id: Option<i64>,
    at: DateTime<Utc>,
) -> Result<LiveSession> {
    let category_id: i64 = match sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
        .bind(defaults.category_name)
        .fetch_optional(&mut **conn)
        .await?
    {
        Some(id) => id,
        None => sqlx::query("INSERT INTO categories (name, color) VALUES (?, ?)")
            .bind(defaults.category_name)
            .bind(defaults.category_color)
            .execute(&mut **conn)
            .await?
            .last_insert_rowid(),
    };

    let room_id: i64 = match sqlx::query_scalar("SELECT id FROM rooms WHERE name = ?")
        .bind(defaults.room_name)
        .fetch_optional(&mut **conn)
        .await?
    {
        Some(id) => id,
        None => sqlx::query(
            "INSERT INTO rooms (name, capacity, category_id, color) VALUES (?, ?, ?, ?)",
        )
        .bind(defaults.room_name)
        .bind(defaults.room_capacity)
        .bind(category_id)
        .bind(defaults.room_color)
        .execute(&mut **conn)
        .await?
        .last_insert_rowid(),
    };

    let activity_id: i64 = match sqlx::query_scalar("SELECT id FROM activity_groups WHERE name = ?")
        .bind(defaults.activity_name)
        .fetch_optional(&mut **conn)
        .await?
    {
        Some(id) => id,
        None => sqlx::query(
            r#"
            INSERT INTO activity_groups (name, category_id, max_participants, created_by)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(defaults.activity_name)
        .bind(category_id)
        .bind(defaults.max_participants)
        .bind(created_by)
        .execute(&mut **conn)
        .await?
        .last_insert_rowid(),
    };

    // A session may have appeared since the caller's lookup; reuse it.
    let existing = sqlx::query_as::<_, LiveSession>(
        r#"
        SELECT id, activity_id, room_id, device_id, started_at, last_activity_at
        FROM live_sessions WHERE room_id = ?
        ORDER BY started_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(room_id)
    .fetch_optional(&mut **conn)
    .await?;
    if let Some(session) = existing {
        return Ok(session);
    }

    let session = sqlx::query_as::<_, LiveSession>(
        r#"
        INSERT INTO live_sessions (activity_id, room_id, device_id, started_at, last_activity_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, activity_id, room_id, device_id, started_at, last_activity_at
        "#,
    )
    .bind(activity_id)
    .bind(room_id)
    .bind(device_id)
    .bind(at)
    .bind(at)
    .fetch_one(&mut **conn)
    .await?;

    Ok(session)
}
