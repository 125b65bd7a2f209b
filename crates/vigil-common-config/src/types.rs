//! Configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vigil_audit_types::{AuditDeclaration, MethodIdentity};

/// Root audit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Global switch; when false no method is audited.
    pub enabled: bool,
    /// Audited methods.
    pub methods: Vec<MethodRegistration>,
    /// Per-strategy settings, keyed by strategy identifier.
    pub strategies: HashMap<String, StrategyConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            methods: Vec::new(),
            strategies: HashMap::new(),
        }
    }
}

impl AuditConfig {
    /// Whether the named strategy may be used. Strategies not listed are enabled.
    pub fn is_strategy_enabled(&self, strategy: &str) -> bool {
        self.strategies
            .get(strategy)
            .map(|s| s.enabled)
            .unwrap_or(true)
    }
}

/// One audited method and its declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRegistration {
    /// Method identity in `Owner::name(T1, T2)` form.
    pub method: MethodIdentity,
    /// Strategy, type, options and parameter metadata.
    #[serde(flatten)]
    pub declaration: AuditDeclaration,
}

/// Settings for one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Whether the strategy's factory stays registered.
    pub enabled: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
