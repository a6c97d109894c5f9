use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr,
    DeleteResult, EntityTrait, IntoActiveModel, QueryTrait, Statement,
};
use serde::Serialize;

use crate::context::AuditContext;
use crate::error::RegistrationError;
use crate::snapshot::{Auditable, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a hook runs relative to the statement it wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    Before,
    After,
}

/// The in-flight mutation as seen by a hook.
pub struct Mutation<'a> {
    pub operation: Operation,
    pub timing: Timing,
    pub table: &'a str,
    pub context: &'a AuditContext,
    /// Set when the statement is only being built, not executed.
    pub dry_run: bool,
    /// Storage error of the mutation itself; only ever set for `After` hooks.
    pub error: Option<&'a DbErr>,
    pub target: &'a dyn Target,
    /// Plain connection. Anything a hook does through it bypasses the hook chain.
    pub session: &'a DatabaseConnection,
}

impl Mutation<'_> {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Callback attached to a point of the mutation lifecycle.
///
/// Hooks cannot fail: whatever goes wrong inside one has to be handled there, the
/// mutation result is returned to the caller untouched.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, mutation: &Mutation<'_>);
}

#[derive(Clone)]
struct Registered {
    name: String,
    timing: Timing,
    hook: Arc<dyn Hook>,
}

/// Ordered hook chains, one per operation.
#[derive(Clone, Default)]
pub struct Callbacks {
    chains: HashMap<Operation, Vec<Registered>>,
}

impl Callbacks {
    /// Appends `hook` to the chain of `operation`. Names are unique per operation.
    pub fn register<H>(
        &mut self,
        operation: Operation,
        timing: Timing,
        name: impl Into<String>,
        hook: H,
    ) -> Result<(), RegistrationError>
    where
        H: Hook + 'static,
    {
        let name = name.into();
        let chain = self.chains.entry(operation).or_default();
        if chain.iter().any(|r| r.name == name) {
            return Err(RegistrationError::Duplicate { operation, name });
        }
        chain.push(Registered {
            name,
            timing,
            hook: Arc::new(hook),
        });
        Ok(())
    }

    pub fn names(&self, operation: Operation) -> Vec<&str> {
        self.chains
            .get(&operation)
            .map(|chain| chain.iter().map(|r| r.name.as_str()).collect())
            .unwrap_or_default()
    }

    fn hooks(&self, operation: Operation, timing: Timing) -> impl Iterator<Item = &Arc<dyn Hook>> {
        self.chains
            .get(&operation)
            .into_iter()
            .flatten()
            .filter(move |r| r.timing == timing)
            .map(|r| &r.hook)
    }
}

/// A database connection with lifecycle hooks around create, update and delete.
///
/// Only the mutations issued through this handle run the hooks; the wrapped
/// connection stays available as a hook-free session.
#[derive(Clone)]
pub struct HookedConnection {
    session: DatabaseConnection,
    callbacks: Callbacks,
}

fn table_name<E: EntityTrait>() -> String {
    E::default().table_name().to_string()
}

impl HookedConnection {
    pub fn new(session: DatabaseConnection) -> Self {
        Self {
            session,
            callbacks: Callbacks::default(),
        }
    }

    pub fn session(&self) -> &DatabaseConnection {
        &self.session
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.callbacks
    }

    pub fn dry_run(&self) -> DryRun<'_> {
        DryRun { conn: self }
    }

    fn mutation<'a>(
        &'a self,
        operation: Operation,
        timing: Timing,
        table: &'a str,
        context: &'a AuditContext,
        target: &'a dyn Target,
    ) -> Mutation<'a> {
        Mutation {
            operation,
            timing,
            table,
            context,
            dry_run: false,
            error: None,
            target,
            session: &self.session,
        }
    }

    async fn run(&self, mutation: &Mutation<'_>) {
        for hook in self.callbacks.hooks(mutation.operation, mutation.timing) {
            hook.call(mutation).await;
        }
    }

    pub async fn insert<A>(
        &self,
        ctx: &AuditContext,
        model: A,
    ) -> Result<<A::Entity as EntityTrait>::Model, DbErr>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send,
        A::Entity: Auditable,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        let table = table_name::<A::Entity>();
        let pending = A::Entity::key_of_active(&model);
        self.run(&self.mutation(Operation::Create, Timing::Before, &table, ctx, &pending))
            .await;

        let result = model.insert(&self.session).await;
        match &result {
            Ok(row) => {
                let key = A::Entity::key_of_model(row);
                self.run(&self.mutation(Operation::Create, Timing::After, &table, ctx, &key))
                    .await;
            }
            Err(err) => {
                self.run(&Mutation {
                    error: Some(err),
                    ..self.mutation(Operation::Create, Timing::After, &table, ctx, &pending)
                })
                .await;
            }
        }
        result
    }

    pub async fn update<A>(
        &self,
        ctx: &AuditContext,
        model: A,
    ) -> Result<<A::Entity as EntityTrait>::Model, DbErr>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send,
        A::Entity: Auditable,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        let table = table_name::<A::Entity>();
        let pending = A::Entity::key_of_active(&model);
        self.run(&self.mutation(Operation::Update, Timing::Before, &table, ctx, &pending))
            .await;

        let result = model.update(&self.session).await;
        match &result {
            Ok(row) => {
                let key = A::Entity::key_of_model(row);
                self.run(&self.mutation(Operation::Update, Timing::After, &table, ctx, &key))
                    .await;
            }
            Err(err) => {
                self.run(&Mutation {
                    error: Some(err),
                    ..self.mutation(Operation::Update, Timing::After, &table, ctx, &pending)
                })
                .await;
            }
        }
        result
    }

    pub async fn delete<A>(&self, ctx: &AuditContext, model: A) -> Result<DeleteResult, DbErr>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send,
        A::Entity: Auditable,
    {
        let table = table_name::<A::Entity>();
        let key = A::Entity::key_of_active(&model);
        self.run(&self.mutation(Operation::Delete, Timing::Before, &table, ctx, &key))
            .await;

        let result = model.delete(&self.session).await;
        self.run(&Mutation {
            error: result.as_ref().err(),
            ..self.mutation(Operation::Delete, Timing::After, &table, ctx, &key)
        })
        .await;
        result
    }
}

/// Builds the statements a mutation would run without executing them.
///
/// Hooks still fire, flagged as dry runs.
pub struct DryRun<'a> {
    conn: &'a HookedConnection,
}

impl DryRun<'_> {
    async fn fire(
        &self,
        operation: Operation,
        table: &str,
        ctx: &AuditContext,
        target: &dyn Target,
    ) {
        for timing in [Timing::Before, Timing::After] {
            self.conn
                .run(&Mutation {
                    dry_run: true,
                    ..self.conn.mutation(operation, timing, table, ctx, target)
                })
                .await;
        }
    }

    pub async fn insert<A>(&self, ctx: &AuditContext, model: A) -> Statement
    where
        A: ActiveModelTrait + Send,
        A::Entity: Auditable,
    {
        let backend = self.conn.session.get_database_backend();
        let table = table_name::<A::Entity>();
        let key = A::Entity::key_of_active(&model);
        let statement = A::Entity::insert(model).build(backend);
        self.fire(Operation::Create, &table, ctx, &key).await;
        statement
    }

    pub async fn update<A>(&self, ctx: &AuditContext, model: A) -> Statement
    where
        A: ActiveModelTrait + Send,
        A::Entity: Auditable,
    {
        let backend = self.conn.session.get_database_backend();
        let table = table_name::<A::Entity>();
        let key = A::Entity::key_of_active(&model);
        let statement = A::Entity::update(model).build(backend);
        self.fire(Operation::Update, &table, ctx, &key).await;
        statement
    }

    pub async fn delete<A>(&self, ctx: &AuditContext, model: A) -> Statement
    where
        A: ActiveModelTrait + Send,
        A::Entity: Auditable,
    {
        let backend = self.conn.session.get_database_backend();
        let table = table_name::<A::Entity>();
        let key = A::Entity::key_of_active(&model);
        let statement = A::Entity::delete(model).build(backend);
        self.fire(Operation::Delete, &table, ctx, &key).await;
        statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Hook for Noop {
        async fn call(&self, _mutation: &Mutation<'_>) {}
    }

    #[test]
    fn operation_names_are_uppercase() {
        assert_eq!(Operation::Create.as_str(), "CREATE");
        assert_eq!(Operation::Update.to_string(), "UPDATE");
        assert_eq!(serde_json::to_string(&Operation::Delete).unwrap(), "\"DELETE\"");
    }

    #[test]
    fn register_rejects_duplicate_names_per_operation() {
        let mut callbacks = Callbacks::default();
        callbacks
            .register(Operation::Create, Timing::After, "a", Noop)
            .unwrap();
        // Same name on another operation is a different chain.
        callbacks
            .register(Operation::Delete, Timing::Before, "a", Noop)
            .unwrap();

        let err = callbacks
            .register(Operation::Create, Timing::Before, "a", Noop)
            .unwrap_err();
        assert!(err.to_string().contains("already registered for CREATE"));
        assert_eq!(callbacks.names(Operation::Create), vec!["a"]);
    }

    #[test]
    fn hooks_are_filtered_by_timing_in_order() {
        let mut callbacks = Callbacks::default();
        callbacks
            .register(Operation::Update, Timing::After, "first", Noop)
            .unwrap();
        callbacks
            .register(Operation::Update, Timing::Before, "before", Noop)
            .unwrap();
        callbacks
            .register(Operation::Update, Timing::After, "second", Noop)
            .unwrap();

        assert_eq!(callbacks.hooks(Operation::Update, Timing::After).count(), 2);
        assert_eq!(callbacks.hooks(Operation::Update, Timing::Before).count(), 1);
        assert_eq!(callbacks.hooks(Operation::Create, Timing::After).count(), 0);
        assert_eq!(
            callbacks.names(Operation::Update),
            vec!["first", "before", "second"]
        );
    }
}
