//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub tag_id: Option<String>,
}

impl Person {
    /// Display name, "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: i64,
    pub person_id: i64,
    pub class_name: Option<String>,
    /// Home education group; drives the daily-checkout policy
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Staff {
    pub id: i64,
    pub person_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EducationGroup {
    pub id: i64,
    pub name: String,
    pub room_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: i64,
    pub name: String,
    /// NULL = unlimited
    pub capacity: Option<i64>,
    pub category_id: Option<i64>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityGroup {
    pub id: i64,
    pub name: String,
    pub category_id: Option<i64>,
    pub max_participants: i64,
    pub is_open: bool,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LiveSession {
    pub id: i64,
    pub activity_id: i64,
    pub room_id: i64,
    /// Device the session was started from, if any
    pub device_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: i64,
    pub student_id: i64,
    pub session_id: i64,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupervisorAssignment {
    pub id: i64,
    pub staff_id: i64,
    pub session_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub token: String,
    /// Supervising staff member assigned to this terminal
    pub staff_id: Option<i64>,
    pub last_seen: Option<DateTime<Utc>>,
}
