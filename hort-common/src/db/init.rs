//! Database schema initialization
//!
//! Creates all tables and indexes if missing. Uniqueness that the
//! check-in engine relies on is enforced here rather than in code:
//! - one person per tag value
//! - one room bearing the reserved schoolyard name
//! - one activity group per name
//! - one open visit per student
//! - one active supervisor assignment per (staff, session) pair

use crate::Result;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Reserved name of the default open-play room. A check-in targeting a
/// room with this name lazily provisions its category/activity/session.
pub const SCHOOLYARD_ROOM_NAME: &str = "Schulhof";

/// Create the full schema (idempotent).
pub async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing database schema");

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            tag_id TEXT
        )
        "#,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS persons_tag
            ON persons(tag_id) WHERE tag_id IS NOT NULL
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            color TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            capacity INTEGER,
            category_id INTEGER REFERENCES categories(id),
            color TEXT
        )
        "#,
        // Keep in sync with SCHOOLYARD_ROOM_NAME
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS rooms_reserved_name
            ON rooms(name) WHERE name = 'Schulhof'
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS education_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            room_id INTEGER REFERENCES rooms(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL UNIQUE REFERENCES persons(id),
            class_name TEXT,
            group_id INTEGER REFERENCES education_groups(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS staff (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL UNIQUE REFERENCES persons(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS activity_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            category_id INTEGER REFERENCES categories(id),
            max_participants INTEGER NOT NULL,
            is_open INTEGER NOT NULL DEFAULT 1,
            created_by INTEGER REFERENCES staff(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            token TEXT NOT NULL UNIQUE,
            staff_id INTEGER REFERENCES staff(id),
            last_seen TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS live_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            activity_id INTEGER NOT NULL REFERENCES activity_groups(id),
            room_id INTEGER NOT NULL REFERENCES rooms(id),
            device_id INTEGER REFERENCES devices(id),
            started_at TIMESTAMP NOT NULL,
            last_activity_at TIMESTAMP NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS visits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(id),
            session_id INTEGER NOT NULL REFERENCES live_sessions(id),
            entered_at TIMESTAMP NOT NULL,
            exited_at TIMESTAMP
        )
        "#,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS visits_open_per_student
            ON visits(student_id) WHERE exited_at IS NULL
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS supervisor_assignments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            staff_id INTEGER NOT NULL REFERENCES staff(id),
            session_id INTEGER NOT NULL REFERENCES live_sessions(id),
            started_at TIMESTAMP NOT NULL,
            ended_at TIMESTAMP
        )
        "#,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS supervisors_active_pair
            ON supervisor_assignments(staff_id, session_id) WHERE ended_at IS NULL
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS daily_attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(id),
            day TEXT NOT NULL,
            checked_in_at TIMESTAMP,
            checked_out_at TIMESTAMP
        )
        "#,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS daily_attendance_day
            ON daily_attendance(student_id, day)
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
