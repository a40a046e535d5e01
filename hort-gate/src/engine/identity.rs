//! Tag-to-person resolution
//!
//! Maps a scanned tag to a person, then classifies the person as
//! student or staff. This three-way branch is the root of the scan
//! state machine.

use hort_common::db::models::{Person, Staff, Student};
use hort_common::{Error, Result};

use crate::store::IdentityStore;

/// Who the scanned tag belongs to
#[derive(Debug, Clone)]
pub enum ScanSubject {
    Student { person: Person, student: Student },
    Staff { person: Person, staff: Staff },
}

/// Resolve a raw tag string to its subject.
pub async fn resolve_subject<S: IdentityStore>(store: &S, tag: &str) -> Result<ScanSubject> {
    let person = store
        .person_by_tag(tag)
        .await?
        .ok_or_else(|| Error::NotFound(format!("tag '{}' is not assigned", tag)))?;

    // The stored tag must match the scanned value exactly
    if person.tag_id.as_deref() != Some(tag) {
        return Err(Error::NotFound(format!("tag '{}' is not assigned", tag)));
    }

    if let Some(student) = store.student_by_person(person.id).await? {
        return Ok(ScanSubject::Student { person, student });
    }

    if let Some(staff) = store.staff_by_person(person.id).await? {
        return Ok(ScanSubject::Staff { person, staff });
    }

    Err(Error::NotFound(format!(
        "tag '{}' is not assigned to a student or staff member",
        tag
    )))
}
