//! PostgreSQL Store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{EnrollmentInsert, Store};
use crate::error::{CoreError, Result};
use crate::model::{Course, Enrollment, Payment, Profile, Purchase, PurchaseStatus, Role};
use crate::session::{Identity, SessionToken};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run pending migrations
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        MIGRATOR.run(&pool).await?;
        tracing::info!("Database migrations completed");
        Ok(Self { pool })
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    email: Option<String>,
    full_name: Option<String>,
    tax_id: Option<String>,
    role: String,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = CoreError;

    fn try_from(row: ProfileRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            tax_id: row.tax_id,
            role: Role::parse(&row.role)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    price: Decimal,
    is_free: bool,
    instructor_id: Option<Uuid>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            is_free: row.is_free,
            instructor_id: row.instructor_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    amount: Decimal,
    currency: String,
    status: String,
    preference_id: Option<String>,
    external_reference: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = CoreError;

    fn try_from(row: PurchaseRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            course_id: row.course_id,
            amount: row.amount,
            currency: row.currency,
            status: PurchaseStatus::parse(&row.status)?,
            preference_id: row.preference_id,
            external_reference: row.external_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    purchase_id: Uuid,
    provider_payment_id: String,
    status: String,
    status_detail: Option<String>,
    amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            purchase_id: row.purchase_id,
            provider_payment_id: row.provider_payment_id,
            status: row.status,
            status_detail: row.status_detail,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    id: Uuid,
    student_id: Uuid,
    course_id: Uuid,
    enrolled_at: DateTime<Utc>,
    progress: i32,
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Self {
            id: row.id,
            student_id: row.student_id,
            course_id: row.course_id,
            enrolled_at: row.enrolled_at,
            progress: row.progress,
        }
    }
}

const PURCHASE_COLUMNS: &str = "id, user_id, course_id, amount, currency, status, preference_id, \
                                external_reference, created_at, updated_at";

#[async_trait]
impl Store for PgStore {
    async fn resolve_session(&self, token: &SessionToken) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT p.id, p.email, p.full_name, p.tax_id, p.role
            FROM sessions s
            JOIN profiles p ON p.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Profile::try_from)
            .transpose()
            .map(|profile| profile.map(|p| Identity::new(p.id, p.role)))
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(
            "SELECT id, title, description, price, is_free, instructor_id \
             FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Course::from))
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, email, full_name, tax_id, role FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Profile::try_from).transpose()
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, user_id, course_id, amount, currency, status, preference_id,
                external_reference, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(purchase.id)
        .bind(purchase.user_id)
        .bind(purchase.course_id)
        .bind(purchase.amount)
        .bind(&purchase.currency)
        .bind(purchase.status.as_str())
        .bind(&purchase.preference_id)
        .bind(&purchase.external_reference)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Purchase::try_from).transpose()
    }

    async fn set_purchase_preference(&self, id: Uuid, preference_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE purchases SET preference_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(preference_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound("Purchase".into()));
        }
        Ok(())
    }

    async fn find_purchase_by_preference(&self, preference_id: &str) -> Result<Option<Purchase>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE preference_id = $1"
        ))
        .bind(preference_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Purchase::try_from).transpose()
    }

    async fn find_latest_purchase(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases \
             WHERE user_id = $1 AND course_id = $2 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Purchase::try_from).transpose()
    }

    async fn advance_purchase_status(&self, id: Uuid, to: PurchaseStatus) -> Result<bool> {
        if PurchaseStatus::Pending.transition(to).is_none() {
            return Ok(false);
        }
        let result = sqlx::query(
            "UPDATE purchases SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, purchase_id, provider_payment_id, status, status_detail, amount, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id)
        .bind(payment.purchase_id)
        .bind(&payment.provider_payment_id)
        .bind(&payment.status)
        .bind(&payment.status_detail)
        .bind(payment.amount)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_payments(&self, purchase_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, purchase_id, provider_payment_id, status, status_detail, amount, \
             created_at FROM payments WHERE purchase_id = $1 ORDER BY created_at",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Payment::from).collect())
    }

    async fn find_enrollment(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            "SELECT id, student_id, course_id, enrolled_at, progress \
             FROM enrollments WHERE student_id = $1 AND course_id = $2",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Enrollment::from))
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<EnrollmentInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO enrollments (id, student_id, course_id, enrolled_at, progress)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (student_id, course_id) DO NOTHING
            "#,
        )
        .bind(enrollment.id)
        .bind(enrollment.student_id)
        .bind(enrollment.course_id)
        .bind(enrollment.enrolled_at)
        .bind(enrollment.progress)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            EnrollmentInsert::Created
        } else {
            EnrollmentInsert::AlreadyExists
        })
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}
