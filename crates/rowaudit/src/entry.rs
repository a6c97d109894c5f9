use sea_orm::sea_query::{Alias, InsertStatement, Query, SimpleExpr};
use serde::Serialize;
use uuid::Uuid;

use crate::error::PersistError;
use crate::hooks::Operation;
use crate::snapshot::Snapshot;

/// One audited mutation, ready to be written.
///
/// The row id and `created_at` are left to write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub table_name: String,
    pub operation: Operation,
    pub object_id: String,
    pub data: serde_json::Value,
    pub actor_id: String,
}

impl AuditEntry {
    pub fn build(
        table_name: impl Into<String>,
        operation: Operation,
        snapshot: Snapshot,
        actor_id: impl Into<String>,
        id_field: &str,
    ) -> Self {
        let object_id = object_id(&snapshot, id_field);
        Self {
            table_name: table_name.into(),
            operation,
            object_id,
            data: serde_json::Value::Object(snapshot),
            actor_id: actor_id.into(),
        }
    }

    /// Insert into `table` with a freshly generated row id.
    pub fn insert_statement(&self, table: &str) -> Result<InsertStatement, PersistError> {
        let values: [SimpleExpr; 6] = [
            Uuid::new_v4().into(),
            self.table_name.as_str().into(),
            self.operation.as_str().into(),
            self.object_id.as_str().into(),
            self.data.clone().into(),
            self.actor_id.as_str().into(),
        ];

        let mut insert = Query::insert();
        insert.into_table(Alias::new(table)).columns([
            Alias::new("id"),
            Alias::new("table_name"),
            Alias::new("operation_type"),
            Alias::new("object_id"),
            Alias::new("data"),
            Alias::new("user_id"),
        ]);
        insert
            .values(values)
            .map_err(|err| PersistError::Build(err.to_string()))?;
        Ok(insert)
    }
}

/// String value of `key` in the snapshot, or empty when missing or not a string.
pub fn object_id(snapshot: &Snapshot, key: &str) -> String {
    snapshot
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}
