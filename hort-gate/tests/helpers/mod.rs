//! Shared test fixtures: in-memory database setup and row seeding
#![allow(dead_code)]

use chrono::Utc;
use hort_common::config::CutoffTime;
use hort_common::db::models::Device;
use hort_gate::engine::daily::DailyCheckoutPolicy;
use hort_gate::engine::registry::ActionRegistry;
use hort_gate::engine::CheckinEngine;
use hort_gate::store::SqliteStore;
use sqlx::SqlitePool;

/// Fresh in-memory database with the full schema
pub async fn setup_pool() -> SqlitePool {
    let pool = hort_common::db::connect_in_memory().await.unwrap();
    hort_common::db::init::create_schema(&pool).await.unwrap();
    pool
}

/// Engine over the pool with the given daily-checkout cutoff
pub fn engine_with_cutoff(pool: &SqlitePool, cutoff: &str) -> CheckinEngine<SqliteStore> {
    CheckinEngine::new(
        SqliteStore::new(pool.clone()),
        ActionRegistry::default(),
        DailyCheckoutPolicy::new(CutoffTime::parse(cutoff).unwrap()),
    )
}

pub async fn seed_person(
    pool: &SqlitePool,
    first: &str,
    last: &str,
    tag: Option<&str>,
) -> i64 {
    sqlx::query("INSERT INTO persons (first_name, last_name, tag_id) VALUES (?, ?, ?)")
        .bind(first)
        .bind(last)
        .bind(tag)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_student(pool: &SqlitePool, person_id: i64, group_id: Option<i64>) -> i64 {
    sqlx::query("INSERT INTO students (person_id, class_name, group_id) VALUES (?, '1a', ?)")
        .bind(person_id)
        .bind(group_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_staff(pool: &SqlitePool, person_id: i64) -> i64 {
    sqlx::query("INSERT INTO staff (person_id) VALUES (?)")
        .bind(person_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_group(pool: &SqlitePool, name: &str, room_id: Option<i64>) -> i64 {
    sqlx::query("INSERT INTO education_groups (name, room_id) VALUES (?, ?)")
        .bind(name)
        .bind(room_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_room(pool: &SqlitePool, name: &str, capacity: Option<i64>) -> i64 {
    sqlx::query("INSERT INTO rooms (name, capacity) VALUES (?, ?)")
        .bind(name)
        .bind(capacity)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_activity(pool: &SqlitePool, name: &str, max_participants: i64) -> i64 {
    sqlx::query("INSERT INTO activity_groups (name, max_participants) VALUES (?, ?)")
        .bind(name)
        .bind(max_participants)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_session(
    pool: &SqlitePool,
    activity_id: i64,
    room_id: i64,
    device_id: Option<i64>,
) -> i64 {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO live_sessions (activity_id, room_id, device_id, started_at, last_activity_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(activity_id)
    .bind(room_id)
    .bind(device_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn seed_device(
    pool: &SqlitePool,
    name: &str,
    token: &str,
    staff_id: Option<i64>,
) -> i64 {
    sqlx::query("INSERT INTO devices (name, token, staff_id) VALUES (?, ?, ?)")
        .bind(name)
        .bind(token)
        .bind(staff_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Device value matching a seeded row (the engine only reads it)
pub fn device(id: i64, name: &str, staff_id: Option<i64>) -> Device {
    Device {
        id,
        name: name.to_string(),
        token: format!("token-{}", id),
        staff_id,
        last_seen: None,
    }
}

/// A student with a tag, ready to scan
pub async fn seed_tagged_student(
    pool: &SqlitePool,
    name: &str,
    tag: &str,
    group_id: Option<i64>,
) -> i64 {
    let person_id = seed_person(pool, name, "Muster", Some(tag)).await;
    seed_student(pool, person_id, group_id).await
}

/// Count of open visits for one student
pub async fn open_visits(pool: &SqlitePool, student_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM visits WHERE student_id = ? AND exited_at IS NULL")
        .bind(student_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
