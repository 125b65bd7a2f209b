//! Audit declarations: which strategy audits a method, and how.

use crate::ParameterDescriptor;
use serde::{Deserialize, Serialize};

/// Strategy identifier meaning "perform no auditing".
pub const IGNORE_STRATEGY: &str = "ignore";

/// Audited-type tag used when a declaration does not name one.
pub const DEFAULT_AUDITED_TYPE: &str = "default";

fn default_audited_type() -> String {
    DEFAULT_AUDITED_TYPE.to_string()
}

/// A key/value option handed to the strategy alongside the call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyOption {
    /// Option key, empty when the option is positional.
    #[serde(default)]
    pub key: String,
    /// Option value.
    pub value: String,
}

impl StrategyOption {
    /// Create a keyed option.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create an option without a key.
    pub fn value(value: impl Into<String>) -> Self {
        Self::new(String::new(), value)
    }
}

/// Declares that a method is audited and which strategy handles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDeclaration {
    /// Strategy identifier used to find the strategy factory.
    pub strategy: String,
    /// Audited-type tag, lets one strategy family branch per call category.
    #[serde(rename = "type", default = "default_audited_type")]
    pub audited_type: String,
    /// Strategy options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<StrategyOption>,
    /// Per-parameter metadata, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDescriptor>,
}

impl AuditDeclaration {
    /// Declare auditing with the given strategy and the default type.
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            audited_type: default_audited_type(),
            options: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// A declaration that switches auditing off.
    pub fn ignored() -> Self {
        Self::new(IGNORE_STRATEGY)
    }

    /// Set the audited-type tag. An empty tag means the default type.
    pub fn with_type(mut self, audited_type: impl Into<String>) -> Self {
        let audited_type = audited_type.into();
        self.audited_type = if audited_type.is_empty() {
            default_audited_type()
        } else {
            audited_type
        };
        self
    }

    /// Add a strategy option.
    pub fn with_option(mut self, option: StrategyOption) -> Self {
        self.options.push(option);
        self
    }

    /// Append a parameter descriptor for the next parameter position.
    pub fn with_parameter(mut self, descriptor: ParameterDescriptor) -> Self {
        self.parameters.push(descriptor);
        self
    }

    /// Replace all parameter descriptors.
    pub fn with_parameters(mut self, descriptors: Vec<ParameterDescriptor>) -> Self {
        self.parameters = descriptors;
        self
    }

    /// Whether this declaration switches auditing off.
    pub fn is_ignored(&self) -> bool {
        self.strategy == IGNORE_STRATEGY
    }

    /// Audited-type tag, never empty.
    pub fn resolved_type(&self) -> &str {
        if self.audited_type.is_empty() {
            DEFAULT_AUDITED_TYPE
        } else {
            &self.audited_type
        }
    }

    /// Value of the first option with the given key.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_type() {
        let decl = AuditDeclaration::new("database");
        assert_eq!(decl.strategy, "database");
        assert_eq!(decl.resolved_type(), DEFAULT_AUDITED_TYPE);
        assert!(!decl.is_ignored());
    }

    #[test]
    fn test_empty_type_normalizes_to_default() {
        let decl = AuditDeclaration::new("database").with_type("");
        assert_eq!(decl.audited_type, DEFAULT_AUDITED_TYPE);

        let mut raw = AuditDeclaration::new("database");
        raw.audited_type.clear();
        assert_eq!(raw.resolved_type(), DEFAULT_AUDITED_TYPE);
    }

    #[test]
    fn test_ignored() {
        assert!(AuditDeclaration::ignored().is_ignored());
    }

    #[test]
    fn test_option_lookup_returns_first_match() {
        let decl = AuditDeclaration::new("file")
            .with_option(StrategyOption::new("path", "/var/audit"))
            .with_option(StrategyOption::new("path", "/tmp"))
            .with_option(StrategyOption::value("compact"));
        assert_eq!(decl.option("path"), Some("/var/audit"));
        assert_eq!(decl.option(""), Some("compact"));
        assert_eq!(decl.option("missing"), None);
    }

    #[test]
    fn test_yaml_missing_type_defaults() {
        let decl: AuditDeclaration = serde_yaml::from_str("strategy: queue\n").unwrap();
        assert_eq!(decl.audited_type, DEFAULT_AUDITED_TYPE);
        assert!(decl.options.is_empty());
        assert!(decl.parameters.is_empty());
    }

    #[test]
    fn test_yaml_full_declaration() {
        let yaml = r#"
strategy: database
type: order
options:
  - key: table
    value: orders
  - value: verbose
parameters:
  - description: order
  - {}
"#;
        let decl: AuditDeclaration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(decl.resolved_type(), "order");
        assert_eq!(decl.option("table"), Some("orders"));
        assert_eq!(decl.option(""), Some("verbose"));
        assert_eq!(decl.parameters.len(), 2);
        assert_eq!(decl.parameters[0].label(), Some("order"));
        assert_eq!(decl.parameters[1].label(), None);
    }
}
