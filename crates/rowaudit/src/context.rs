use crate::config::AuditConfig;

/// Actor recorded when a mutation runs without an identified principal.
pub const UNSPECIFIED_ACTOR: &str = "ctx-nonspecified";

/// Per-request values the audit hooks read from.
///
/// The host fills the actor slot before issuing audited mutations, typically from
/// its authenticated session (user id, email, service name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    actor: Option<String>,
}

impl AuditContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

pub fn resolve_actor(ctx: &AuditContext, config: &AuditConfig) -> String {
    match ctx.actor() {
        Some(actor) => actor.to_string(),
        None => {
            tracing::warn!(
                sentinel = %config.unspecified_actor,
                "actor not set in audit context, recording mutation without an identified user"
            );
            config.unspecified_actor.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_actor_from_context() {
        let ctx = AuditContext::new().with_actor("alice@example.com");
        assert_eq!(resolve_actor(&ctx, &AuditConfig::default()), "alice@example.com");
    }

    #[test]
    fn missing_actor_uses_sentinel() {
        let ctx = AuditContext::default();
        assert_eq!(resolve_actor(&ctx, &AuditConfig::default()), UNSPECIFIED_ACTOR);
    }

    #[test]
    fn sentinel_is_configurable() {
        let config = AuditConfig {
            unspecified_actor: "system".to_string(),
            ..AuditConfig::default()
        };
        assert_eq!(resolve_actor(&AuditContext::new(), &config), "system");
    }
}
