use async_trait::async_trait;
use rowaudit_db::entities::audit_logs;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Iterable, ModelTrait,
    PrimaryKeyToColumn, QueryFilter, Value,
};
use serde::Serialize;

use crate::error::CaptureError;
use crate::hooks::Mutation;

/// Field name to value view of a row, in declaration order.
pub type Snapshot = serde_json::Map<String, serde_json::Value>;

/// Opt-in marker for entities whose mutations go through a [`HookedConnection`].
///
/// The default methods read the primary key columns declared on the entity; override
/// them when the row is identified some other way.
///
/// [`HookedConnection`]: crate::hooks::HookedConnection
pub trait Auditable: EntityTrait<Model: Serialize> {
    fn key_of_model(model: &Self::Model) -> RowKey<Self> {
        RowKey::new(
            Self::PrimaryKey::iter()
                .map(|pk| {
                    let column = pk.into_column();
                    (column, Some(model.get(column)))
                })
                .collect(),
        )
    }

    fn key_of_active<A>(model: &A) -> RowKey<Self>
    where
        A: ActiveModelTrait<Entity = Self>,
    {
        RowKey::new(
            Self::PrimaryKey::iter()
                .map(|pk| {
                    let column = pk.into_column();
                    (column, model.get(column).into_value())
                })
                .collect(),
        )
    }
}

impl Auditable for audit_logs::Entity {}

/// Primary key of one row. A `None` value means the key column was not set.
pub struct RowKey<E: EntityTrait> {
    columns: Vec<(E::Column, Option<Value>)>,
}

impl<E: EntityTrait> RowKey<E> {
    pub fn new(columns: Vec<(E::Column, Option<Value>)>) -> Self {
        Self { columns }
    }

    fn values(&self) -> Option<Vec<(E::Column, Value)>> {
        if self.columns.is_empty() {
            return None;
        }
        self.columns
            .iter()
            .map(|(column, value)| value.clone().map(|v| (*column, v)))
            .collect()
    }
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(Some(s)) => Some(s.to_string()),
        Value::Char(Some(c)) => Some(c.to_string()),
        Value::Uuid(Some(u)) => Some(u.to_string()),
        Value::TinyInt(Some(n)) => Some(n.to_string()),
        Value::SmallInt(Some(n)) => Some(n.to_string()),
        Value::Int(Some(n)) => Some(n.to_string()),
        Value::BigInt(Some(n)) => Some(n.to_string()),
        Value::TinyUnsigned(Some(n)) => Some(n.to_string()),
        Value::SmallUnsigned(Some(n)) => Some(n.to_string()),
        Value::Unsigned(Some(n)) => Some(n.to_string()),
        Value::BigUnsigned(Some(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// The row a mutation touches, with its concrete entity type erased.
#[async_trait]
pub trait Target: Send + Sync {
    /// Key as text, composite keys joined by `,`. Empty when unresolvable.
    fn primary_key(&self) -> String;

    /// Reads the persisted row without going through any hook chain.
    async fn load(&self, session: &DatabaseConnection) -> Result<Snapshot, CaptureError>;
}

#[async_trait]
impl<E: Auditable> Target for RowKey<E> {
    fn primary_key(&self) -> String {
        let parts: Option<Vec<String>> = self
            .columns
            .iter()
            .map(|(_, value)| value.as_ref().and_then(key_text))
            .collect();
        parts.map(|p| p.join(",")).unwrap_or_default()
    }

    async fn load(&self, session: &DatabaseConnection) -> Result<Snapshot, CaptureError> {
        let table = E::default().table_name().to_string();
        let Some(values) = self.values() else {
            return Err(CaptureError::MissingKey { table });
        };

        let mut select = E::find();
        for (column, value) in values {
            select = select.filter(column.eq(value));
        }

        let row = select
            .one(session)
            .await?
            .ok_or_else(|| CaptureError::NotFound {
                table,
                key: self.primary_key(),
            })?;
        to_snapshot(&row)
    }
}

/// Encodes `model` to JSON text and decodes it back into a generic map.
pub fn to_snapshot<M: Serialize>(model: &M) -> Result<Snapshot, CaptureError> {
    let encoded = serde_json::to_vec(model)?;
    match serde_json::from_slice(&encoded)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(CaptureError::NotAnObject),
    }
}

/// Current state of the mutated row.
///
/// Failed and dry-run mutations yield an empty snapshot without touching storage.
pub async fn capture(mutation: &Mutation<'_>) -> Result<Snapshot, CaptureError> {
    if mutation.failed() || mutation.dry_run {
        return Ok(Snapshot::new());
    }
    mutation.target.load(mutation.session).await
}
