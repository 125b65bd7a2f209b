//! Strategy resolution by identifier.

use crate::strategy::MethodAuditingStrategyFactory;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vigil_common_config::AuditConfig;

/// Maps a strategy identifier to the factory serving it.
pub trait StrategyResolver: Send + Sync {
    /// Find the factory for `strategy`. `None` is a configuration gap, not an error.
    fn resolve(&self, strategy: &str) -> Option<&dyn MethodAuditingStrategyFactory>;
}

impl<R: StrategyResolver + ?Sized> StrategyResolver for Arc<R> {
    fn resolve(&self, strategy: &str) -> Option<&dyn MethodAuditingStrategyFactory> {
        (**self).resolve(strategy)
    }
}

impl<R: StrategyResolver + ?Sized> StrategyResolver for &R {
    fn resolve(&self, strategy: &str) -> Option<&dyn MethodAuditingStrategyFactory> {
        (**self).resolve(strategy)
    }
}

/// Registry of strategy factories keyed by strategy identifier.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: HashMap<String, Arc<dyn MethodAuditingStrategyFactory>>,
}

impl StrategyRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for the identifier.
    pub fn register<F>(&mut self, strategy: impl Into<String>, factory: F)
    where
        F: MethodAuditingStrategyFactory + 'static,
    {
        self.register_shared(strategy, Arc::new(factory));
    }

    /// Register a factory that is shared with other registries.
    pub fn register_shared(
        &mut self,
        strategy: impl Into<String>,
        factory: Arc<dyn MethodAuditingStrategyFactory>,
    ) {
        let strategy = strategy.into();
        debug!(strategy = %strategy, "Registering strategy factory");
        self.factories.insert(strategy, factory);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, strategy: impl Into<String>, factory: F) -> Self
    where
        F: MethodAuditingStrategyFactory + 'static,
    {
        self.register(strategy, factory);
        self
    }

    /// Remove the factory for an identifier.
    pub fn unregister(&mut self, strategy: &str) -> bool {
        self.factories.remove(strategy).is_some()
    }

    /// Whether a factory is registered for the identifier.
    pub fn contains(&self, strategy: &str) -> bool {
        self.factories.contains_key(strategy)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Drop the factories the configuration disables.
    pub fn retain_enabled(&mut self, config: &AuditConfig) {
        self.factories.retain(|name, _| {
            let enabled = config.is_strategy_enabled(name);
            if !enabled {
                debug!(strategy = %name, "Strategy disabled by configuration");
            }
            enabled
        });
    }
}

impl StrategyResolver for StrategyRegistry {
    fn resolve(&self, strategy: &str) -> Option<&dyn MethodAuditingStrategyFactory> {
        self.factories.get(strategy).map(|f| f.as_ref())
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AuditContext;
    use crate::strategy::{
        BoxedStrategy, FnStrategyFactory, InvocationError, MethodAuditingStrategy, StrategyResult,
    };
    use vigil_audit_types::ReturnValue;
    use vigil_common_config::StrategyConfig;

    struct Silent;

    impl MethodAuditingStrategy for Silent {
        fn before_invocation(&mut self, _: &AuditContext<'_>) -> StrategyResult {
            Ok(())
        }

        fn after_invocation(&mut self, _: &AuditContext<'_>, _: &ReturnValue) -> StrategyResult {
            Ok(())
        }

        fn on_invocation_error(
            &mut self,
            _: &AuditContext<'_>,
            _: &InvocationError<'_>,
        ) -> StrategyResult {
            Ok(())
        }
    }

    fn silent() -> FnStrategyFactory<impl Fn(&str) -> BoxedStrategy + Send + Sync> {
        FnStrategyFactory::new(|_: &str| -> BoxedStrategy { Box::new(Silent) })
    }

    #[test]
    fn test_resolve_registered_and_missing() {
        let registry = StrategyRegistry::new().with("database", silent());
        assert!(registry.resolve("database").is_some());
        assert!(registry.resolve("file").is_none());
        assert!(registry.contains("database"));
    }

    #[test]
    fn test_register_replaces_and_unregister_removes() {
        let mut registry = StrategyRegistry::new();
        registry.register("queue", silent());
        registry.register("queue", silent());
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("queue"));
        assert!(!registry.unregister("queue"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let registry = StrategyRegistry::new()
            .with("queue", silent())
            .with("database", silent())
            .with("file", silent());
        assert_eq!(registry.names(), vec!["database", "file", "queue"]);
    }

    #[test]
    fn test_retain_enabled() {
        let mut registry = StrategyRegistry::new()
            .with("queue", silent())
            .with("database", silent());
        let mut config = AuditConfig::default();
        config
            .strategies
            .insert("queue".to_string(), StrategyConfig { enabled: false });

        registry.retain_enabled(&config);
        assert_eq!(registry.names(), vec!["database"]);
    }

    #[test]
    fn test_shared_resolver() {
        let registry = Arc::new(StrategyRegistry::new().with("file", silent()));
        let borrowed: &StrategyRegistry = &registry;
        assert!(registry.resolve("file").is_some());
        assert!(StrategyResolver::resolve(&borrowed, "file").is_some());
    }
}
