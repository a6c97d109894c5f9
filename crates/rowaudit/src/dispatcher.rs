use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection};

use crate::config::AuditConfig;
use crate::context::resolve_actor;
use crate::entry::AuditEntry;
use crate::error::{AuditError, PersistError};
use crate::hooks::{Callbacks, Hook, HookedConnection, Mutation, Operation, Timing};
use crate::snapshot::capture;

/// Lifecycle points the audit hooks attach to.
///
/// Deletes are captured before the statement runs, since the row is gone afterwards.
const AUDIT_HOOKS: [(Operation, Timing, &str); 3] = [
    (Operation::Create, Timing::After, "create_audit_log"),
    (Operation::Update, Timing::After, "update_audit_log"),
    (Operation::Delete, Timing::Before, "delete_audit_log"),
];

/// Writes one audit entry per successful create, update or delete.
pub struct AuditHook {
    operation: Operation,
    config: Arc<AuditConfig>,
}

impl AuditHook {
    pub fn new(operation: Operation, config: Arc<AuditConfig>) -> Self {
        Self { operation, config }
    }

    async fn persist(
        &self,
        mutation: &Mutation<'_>,
        entry: &AuditEntry,
    ) -> Result<(), PersistError> {
        let insert = entry.insert_statement(&self.config.audit_table)?;
        let statement = mutation.session.get_database_backend().build(&insert);
        if mutation.dry_run {
            tracing::debug!(sql = %statement.sql, "dry run, audit entry not written");
            return Ok(());
        }
        mutation.session.execute(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl Hook for AuditHook {
    async fn call(&self, mutation: &Mutation<'_>) {
        if mutation.table == self.config.audit_table || mutation.failed() {
            return;
        }

        let snapshot = match capture(mutation).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    %err,
                    table = mutation.table,
                    operation = %self.operation,
                    key = %mutation.target.primary_key(),
                    "failed to capture row for audit log"
                );
                return;
            }
        };

        let actor = resolve_actor(mutation.context, &self.config);
        let entry = AuditEntry::build(
            mutation.table,
            self.operation,
            snapshot,
            actor,
            &self.config.id_field,
        );

        if let Err(err) = self.persist(mutation, &entry).await {
            tracing::warn!(
                %err,
                table = %entry.table_name,
                operation = %entry.operation,
                object_id = %entry.object_id,
                "failed to write audit log"
            );
            return;
        }

        tracing::debug!(
            table = %entry.table_name,
            operation = %entry.operation,
            object_id = %entry.object_id,
            actor = %entry.actor_id,
            "audit log written"
        );
    }
}

/// Adds the audit hooks to an existing connection.
///
/// Either all three hooks are registered or none are.
pub fn register(conn: &mut HookedConnection, config: AuditConfig) -> Result<(), AuditError> {
    let config = Arc::new(config);
    let mut callbacks: Callbacks = conn.callbacks().clone();
    for (operation, timing, suffix) in AUDIT_HOOKS {
        callbacks.register(
            operation,
            timing,
            config.hook_name(suffix),
            AuditHook::new(operation, config.clone()),
        )?;
    }
    *conn.callbacks_mut() = callbacks;
    Ok(())
}

/// Wraps `db` in a [`HookedConnection`] with auditing attached.
pub fn attach(db: DatabaseConnection, config: AuditConfig) -> Result<HookedConnection, AuditError> {
    let mut conn = HookedConnection::new(db);
    register(&mut conn, config)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::context::AuditContext;
    use crate::error::CaptureError;
    use crate::snapshot::{Snapshot, Target};

    #[derive(Default)]
    struct CountingTarget {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl Target for CountingTarget {
        fn primary_key(&self) -> String {
            "42".to_string()
        }

        async fn load(&self, _session: &DatabaseConnection) -> Result<Snapshot, CaptureError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Err(CaptureError::NotFound {
                table: "widgets".to_string(),
                key: self.primary_key(),
            })
        }
    }

    fn mutation<'a>(
        table: &'a str,
        target: &'a CountingTarget,
        ctx: &'a AuditContext,
        session: &'a DatabaseConnection,
    ) -> Mutation<'a> {
        Mutation {
            operation: Operation::Create,
            timing: Timing::After,
            table,
            context: ctx,
            dry_run: false,
            error: None,
            target,
            session,
        }
    }

    fn hook() -> AuditHook {
        AuditHook::new(Operation::Create, Arc::new(AuditConfig::default()))
    }

    #[tokio::test]
    async fn audit_table_is_never_captured() {
        let target = CountingTarget::default();
        let ctx = AuditContext::new();
        let session = DatabaseConnection::Disconnected;
        hook()
            .call(&mutation("audit_logs", &target, &ctx, &session))
            .await;
        assert_eq!(target.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_mutation_is_never_captured() {
        let target = CountingTarget::default();
        let ctx = AuditContext::new();
        let session = DatabaseConnection::Disconnected;
        let err = sea_orm::DbErr::RecordNotInserted;
        hook()
            .call(&Mutation {
                error: Some(&err),
                ..mutation("widgets", &target, &ctx, &session)
            })
            .await;
        assert_eq!(target.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn capture_failure_stops_before_persisting() {
        // A disconnected session would panic if the hook went on to write.
        let target = CountingTarget::default();
        let ctx = AuditContext::new();
        let session = DatabaseConnection::Disconnected;
        hook()
            .call(&mutation("widgets", &target, &ctx, &session))
            .await;
        assert_eq!(target.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn register_adds_three_hooks() {
        let mut conn = HookedConnection::new(DatabaseConnection::Disconnected);
        register(&mut conn, AuditConfig::default()).unwrap();
        let callbacks = conn.callbacks();
        assert_eq!(callbacks.names(Operation::Create), vec!["rowaudit:create_audit_log"]);
        assert_eq!(callbacks.names(Operation::Update), vec!["rowaudit:update_audit_log"]);
        assert_eq!(callbacks.names(Operation::Delete), vec!["rowaudit:delete_audit_log"]);
    }

    #[test]
    fn second_registration_fails_and_keeps_first() {
        let mut conn = HookedConnection::new(DatabaseConnection::Disconnected);
        register(&mut conn, AuditConfig::default()).unwrap();
        let err = register(&mut conn, AuditConfig::default()).unwrap_err();
        assert!(err.to_string().contains("rowaudit:create_audit_log"));
        assert_eq!(conn.callbacks().names(Operation::Create).len(), 1);
    }
}
