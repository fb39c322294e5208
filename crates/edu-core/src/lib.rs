//! # edu-core
//!
//! Domain model, request-scoped identity, authorization policy and the
//! persistent store abstraction for the EduPlatform checkout service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         edu-core                              │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │   Policy    │  │   Session   │  │        Store         │  │
//! │  │   (table)   │──│  (context)  │──│ (Memory | Postgres)  │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `Store` trait lets the payment services run against PostgreSQL in
//! production and an in-memory store in development and tests.

pub mod error;
pub mod model;
pub mod policy;
pub mod session;
pub mod store;

pub use error::{CoreError, Result};
pub use model::{
    Course, Enrollment, ExternalReference, Payment, Profile, Purchase, PurchaseStatus, Role,
};
pub use policy::{Access, Endpoint};
pub use session::{Identity, RequestContext, Session, SessionToken};
pub use store::{EnrollmentInsert, MemoryStore, Store};
#[cfg(feature = "postgres")]
pub use store::PgStore;
