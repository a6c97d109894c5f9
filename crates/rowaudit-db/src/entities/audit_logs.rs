use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Append-only record of one audited mutation.
///
/// Rows are written by the audit hooks and never updated or deleted by them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub table_name: String,
    pub operation_type: String,
    pub object_id: String,
    pub data: Json,
    pub user_id: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
