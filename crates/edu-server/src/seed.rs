//! Development Seed Data
//!
//! Fills the in-memory store with a few courses, users and fixed session
//! tokens so the API can be exercised with curl.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use edu_core::{Course, MemoryStore, Profile, Result, Role, Session, SessionToken};

pub const STUDENT_TOKEN: &str = "dev-student-token";
pub const ADMIN_TOKEN: &str = "dev-admin-token";

/// Ids of the seeded rows
#[derive(Clone, Copy, Debug)]
pub struct Seeded {
    pub student_id: Uuid,
    pub admin_id: Uuid,
    pub paid_course_id: Uuid,
    pub free_course_id: Uuid,
}

pub fn seed(store: &MemoryStore) -> Result<Seeded> {
    let student_id = Uuid::new_v4();
    let admin_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();

    store.put_profile(Profile {
        id: student_id,
        email: Some("student@example.com".into()),
        full_name: Some("Dev Student".into()),
        tax_id: Some("123.456.789-09".into()),
        role: Role::Student,
    })?;
    store.put_profile(Profile {
        id: admin_id,
        email: Some("admin@example.com".into()),
        full_name: Some("Dev Admin".into()),
        tax_id: None,
        role: Role::Admin,
    })?;
    store.put_profile(Profile {
        id: instructor_id,
        email: Some("instructor@example.com".into()),
        full_name: Some("Dev Instructor".into()),
        tax_id: None,
        role: Role::Instructor,
    })?;

    let paid = Course {
        id: Uuid::new_v4(),
        title: "Rust for Backend Developers".into(),
        description: Some("Ownership, async and axum from scratch".into()),
        price: dec!(199.90),
        is_free: false,
        instructor_id: Some(instructor_id),
    };
    let free = Course {
        id: Uuid::new_v4(),
        title: "Intro to Git".into(),
        description: None,
        price: dec!(0),
        is_free: true,
        instructor_id: Some(instructor_id),
    };
    let seeded = Seeded {
        student_id,
        admin_id,
        paid_course_id: paid.id,
        free_course_id: free.id,
    };
    store.put_course(paid)?;
    store.put_course(free)?;

    let expires_at = Utc::now() + Duration::days(30);
    for (token, user_id) in [(STUDENT_TOKEN, student_id), (ADMIN_TOKEN, admin_id)] {
        store.put_session(Session {
            token: SessionToken::from_string(token),
            user_id,
            expires_at,
        })?;
    }

    Ok(seeded)
}
