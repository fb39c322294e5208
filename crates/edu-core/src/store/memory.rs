//! In-memory Store
//!
//! For development and tests. Enforces the same enrollment uniqueness and
//! status rules as the PostgreSQL schema.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{EnrollmentInsert, Store};
use crate::error::{CoreError, Result};
use crate::model::{Course, Enrollment, Payment, Profile, Purchase, PurchaseStatus};
use crate::session::{Identity, Session, SessionToken};

#[derive(Default)]
struct Tables {
    courses: HashMap<Uuid, Course>,
    profiles: HashMap<Uuid, Profile>,
    sessions: HashMap<SessionToken, Session>,
    purchases: HashMap<Uuid, Purchase>,
    payments: Vec<Payment>,
    enrollments: HashMap<(Uuid, Uuid), Enrollment>,
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| CoreError::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| CoreError::Storage("memory store lock poisoned".into()))
    }

    /// Seed a course
    pub fn put_course(&self, course: Course) -> Result<()> {
        self.write()?.courses.insert(course.id, course);
        Ok(())
    }

    /// Seed a profile
    pub fn put_profile(&self, profile: Profile) -> Result<()> {
        self.write()?.profiles.insert(profile.id, profile);
        Ok(())
    }

    /// Seed a session
    pub fn put_session(&self, session: Session) -> Result<()> {
        self.write()?.sessions.insert(session.token.clone(), session);
        Ok(())
    }

    /// Number of enrollments held, for assertions
    pub fn enrollment_count(&self) -> Result<usize> {
        Ok(self.read()?.enrollments.len())
    }

    /// Number of purchases held, for assertions
    pub fn purchase_count(&self) -> Result<usize> {
        Ok(self.read()?.purchases.len())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn resolve_session(&self, token: &SessionToken) -> Result<Option<Identity>> {
        let tables = self.read()?;
        let Some(session) = tables.sessions.get(token) else {
            return Ok(None);
        };
        if session.is_expired() {
            return Ok(None);
        }
        Ok(tables
            .profiles
            .get(&session.user_id)
            .map(|profile| Identity::new(profile.id, profile.role)))
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        Ok(self.read()?.courses.get(&id).cloned())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.read()?.profiles.get(&id).cloned())
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()> {
        let mut tables = self.write()?;
        if tables.purchases.contains_key(&purchase.id) {
            return Err(CoreError::Conflict(format!("purchase {}", purchase.id)));
        }
        tables.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
        Ok(self.read()?.purchases.get(&id).cloned())
    }

    async fn set_purchase_preference(&self, id: Uuid, preference_id: &str) -> Result<()> {
        let mut tables = self.write()?;
        let purchase = tables
            .purchases
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Purchase".into()))?;
        purchase.preference_id = Some(preference_id.to_string());
        purchase.updated_at = Utc::now();
        Ok(())
    }

    async fn find_purchase_by_preference(&self, preference_id: &str) -> Result<Option<Purchase>> {
        Ok(self
            .read()?
            .purchases
            .values()
            .find(|p| p.preference_id.as_deref() == Some(preference_id))
            .cloned())
    }

    async fn find_latest_purchase(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>> {
        Ok(self
            .read()?
            .purchases
            .values()
            .filter(|p| p.user_id == user_id && p.course_id == course_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn advance_purchase_status(&self, id: Uuid, to: PurchaseStatus) -> Result<bool> {
        let mut tables = self.write()?;
        let purchase = tables
            .purchases
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Purchase".into()))?;
        match purchase.status.transition(to) {
            Some(next) => {
                purchase.status = next;
                purchase.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.write()?.payments.push(payment.clone());
        Ok(())
    }

    async fn list_payments(&self, purchase_id: Uuid) -> Result<Vec<Payment>> {
        Ok(self
            .read()?
            .payments
            .iter()
            .filter(|p| p.purchase_id == purchase_id)
            .cloned()
            .collect())
    }

    async fn find_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .read()?
            .enrollments
            .get(&(student_id, course_id))
            .cloned())
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<EnrollmentInsert> {
        let mut tables = self.write()?;
        let key = (enrollment.student_id, enrollment.course_id);
        if tables.enrollments.contains_key(&key) {
            return Ok(EnrollmentInsert::AlreadyExists);
        }
        tables.enrollments.insert(key, enrollment.clone());
        Ok(EnrollmentInsert::Created)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn course() -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "Intro to SQL".into(),
            description: None,
            price: dec!(49.90),
            is_free: false,
            instructor_id: None,
        }
    }

    #[tokio::test]
    async fn test_enrollment_uniqueness() {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();
        let course_id = Uuid::new_v4();

        let first = store
            .insert_enrollment(&Enrollment::new(student, course_id))
            .await
            .unwrap();
        let second = store
            .insert_enrollment(&Enrollment::new(student, course_id))
            .await
            .unwrap();

        assert_eq!(first, EnrollmentInsert::Created);
        assert_eq!(second, EnrollmentInsert::AlreadyExists);
        assert_eq!(store.enrollment_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_advance_only_from_pending() {
        let store = MemoryStore::new();
        let purchase = Purchase::pending(Uuid::new_v4(), &course(), "BRL");
        store.insert_purchase(&purchase).await.unwrap();

        assert!(store
            .advance_purchase_status(purchase.id, PurchaseStatus::Approved)
            .await
            .unwrap());
        assert!(!store
            .advance_purchase_status(purchase.id, PurchaseStatus::Rejected)
            .await
            .unwrap());

        let stored = store.get_purchase(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Approved);
    }

    #[tokio::test]
    async fn test_find_by_preference_and_latest() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let c = course();

        let mut older = Purchase::pending(user, &c, "BRL");
        older.created_at -= Duration::minutes(10);
        let newer = Purchase::pending(user, &c, "BRL");
        store.insert_purchase(&older).await.unwrap();
        store.insert_purchase(&newer).await.unwrap();
        store.set_purchase_preference(older.id, "pref-1").await.unwrap();

        let by_pref = store.find_purchase_by_preference("pref-1").await.unwrap().unwrap();
        assert_eq!(by_pref.id, older.id);

        let latest = store.find_latest_purchase(user, c.id).await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
    }

    #[tokio::test]
    async fn test_set_preference_on_unknown_purchase_is_not_found() {
        let store = MemoryStore::new();
        let result = store.set_purchase_preference(Uuid::new_v4(), "pref-9").await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expired_session_resolves_to_none() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store
            .put_profile(Profile {
                id: user,
                email: Some("ana@example.com".into()),
                full_name: None,
                tax_id: None,
                role: Role::Student,
            })
            .unwrap();
        store
            .put_session(Session {
                token: SessionToken::from_string("live"),
                user_id: user,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .unwrap();
        store
            .put_session(Session {
                token: SessionToken::from_string("stale"),
                user_id: user,
                expires_at: Utc::now() - Duration::hours(1),
            })
            .unwrap();

        let live = store
            .resolve_session(&SessionToken::from_string("live"))
            .await
            .unwrap();
        assert_eq!(live, Some(Identity::new(user, Role::Student)));

        let stale = store
            .resolve_session(&SessionToken::from_string("stale"))
            .await
            .unwrap();
        assert!(stale.is_none());
    }
}
