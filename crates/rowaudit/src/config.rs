use serde::Deserialize;

use crate::context::UNSPECIFIED_ACTOR;

pub const DEFAULT_AUDIT_TABLE: &str = "audit_logs";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Table the audit entries are written to. Mutations on it are never audited.
    pub audit_table: String,
    /// Snapshot field whose string value becomes the entry's object id.
    pub id_field: String,
    /// Actor recorded when the context carries none.
    pub unspecified_actor: String,
    /// Namespace for the registered hook names, e.g. `rowaudit:create_audit_log`.
    pub hook_prefix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audit_table: DEFAULT_AUDIT_TABLE.to_string(),
            id_field: "id".to_string(),
            unspecified_actor: UNSPECIFIED_ACTOR.to_string(),
            hook_prefix: "rowaudit".to_string(),
        }
    }
}

impl AuditConfig {
    pub fn hook_name(&self, suffix: &str) -> String {
        format!("{}:{suffix}", self.hook_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: AuditConfig = serde_json::from_str(r#"{"audit_table":"history"}"#).unwrap();
        assert_eq!(cfg.audit_table, "history");
        assert_eq!(cfg.id_field, "id");
        assert_eq!(cfg.unspecified_actor, "ctx-nonspecified");
        assert_eq!(cfg.hook_name("create_audit_log"), "rowaudit:create_audit_log");
    }
}
