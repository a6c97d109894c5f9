//! Row-level audit logging for SeaORM.
//!
//! [`attach`] wraps a connection so that every create, update and delete issued
//! through it writes an append-only entry to the audit table: the table, the
//! operation, the row's primary key, a JSON snapshot of the row, and the actor taken
//! from the [`AuditContext`]. Audit failures are logged and never reach the caller of
//! the mutation.
//!
//! Creates and updates record the row as it is after the statement; deletes record
//! it as it was right before.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod hooks;
pub mod snapshot;

pub use config::AuditConfig;
pub use context::{AuditContext, UNSPECIFIED_ACTOR};
pub use dispatcher::{attach, register};
pub use entry::AuditEntry;
pub use error::AuditError;
pub use hooks::{Hook, HookedConnection, Mutation, Operation, Timing};
pub use snapshot::{Auditable, Snapshot};
