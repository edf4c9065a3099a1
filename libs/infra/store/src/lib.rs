//! [libs/infra/store/src/lib.rs]
//! The durable store. An embedded libsql database behind a bounded
//! connection pool, with repositories for each persisted entity.

pub mod client;
pub mod errors;
pub mod pool;
pub mod repositories;
pub mod schema;

pub use client::StoreClient;
pub use errors::StoreError;
pub use pool::{PooledConnection, StorePool};
pub use repositories::{AuditRepository, BookingRepository, ClientRepository, CorrectionRepository, TransactionRepository};
