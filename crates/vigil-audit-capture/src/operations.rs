//! Named operations an audited instance exposes to strategies.
//!
//! A strategy sometimes needs more than the call arguments, e.g. the current
//! state of the audited object after the call. Instead of runtime type
//! introspection, a receiver lists the operations it is willing to run in an
//! [`OperationTable`] and dispatches to it from
//! [`AuditedInstance::invoke_operation`].

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use vigil_audit_types::ValueKind;

/// Errors produced while running a named operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("audited instance does not provide operation {operation}({signature})")]
    NotFound { operation: String, signature: String },

    #[error("no audited instance is available for operation {operation}")]
    NoReceiver { operation: String },

    #[error("operation {operation} failed: {message}")]
    Failed { operation: String, message: String },
}

impl OperationError {
    /// Create a not-found error for the given call shape.
    pub fn not_found(operation: &str, arguments: &[Value]) -> Self {
        Self::NotFound {
            operation: operation.to_string(),
            signature: format_kinds(&ValueKind::of_all(arguments)),
        }
    }

    /// Create a failure error.
    pub fn failed(operation: &str, message: impl fmt::Display) -> Self {
        Self::Failed {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

fn format_kinds(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Capability implemented by types whose methods can be audited.
///
/// Every method has a default, so `impl AuditedInstance for MyService {}` is
/// enough for a receiver that exposes no operations.
pub trait AuditedInstance: Sync {
    /// Type name used in diagnostics.
    fn instance_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Run a named operation with exactly matching argument kinds.
    ///
    /// `Ok(None)` means the operation ran and produced nothing.
    fn invoke_operation(
        &self,
        operation: &str,
        arguments: &[Value],
    ) -> Result<Option<Value>, OperationError> {
        Err(OperationError::not_found(operation, arguments))
    }
}

type OperationFn<T> =
    Box<dyn Fn(&T, &[Value]) -> Result<Option<Value>, OperationError> + Send + Sync>;

/// Lookup table of named operations on `T`, keyed by name and argument kinds.
pub struct OperationTable<T> {
    operations: HashMap<String, Vec<(Vec<ValueKind>, OperationFn<T>)>>,
}

impl<T> OperationTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register an operation. A later registration with the same name and
    /// signature replaces the earlier one.
    pub fn register<F>(
        mut self,
        name: impl Into<String>,
        signature: &[ValueKind],
        operation: F,
    ) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<Option<Value>, OperationError> + Send + Sync + 'static,
    {
        let signature = signature.to_vec();
        let overloads = self.operations.entry(name.into()).or_default();
        overloads.retain(|(existing, _)| *existing != signature);
        overloads.push((signature, Box::new(operation)));
        self
    }

    /// Whether an operation with this exact signature exists.
    pub fn contains(&self, name: &str, signature: &[ValueKind]) -> bool {
        self.operations
            .get(name)
            .map(|overloads| overloads.iter().any(|(s, _)| s == signature))
            .unwrap_or(false)
    }

    /// Number of registered operations, counting overloads separately.
    pub fn len(&self) -> usize {
        self.operations.values().map(Vec::len).sum()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the operation whose name and argument kinds match exactly.
    pub fn invoke(
        &self,
        target: &T,
        name: &str,
        arguments: &[Value],
    ) -> Result<Option<Value>, OperationError> {
        let kinds = ValueKind::of_all(arguments);
        let operation = self
            .operations
            .get(name)
            .and_then(|overloads| overloads.iter().find(|(s, _)| *s == kinds))
            .map(|(_, op)| op)
            .ok_or_else(|| OperationError::not_found(name, arguments))?;
        operation(target, arguments)
    }
}

impl<T> Default for OperationTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for OperationTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .operations
            .iter()
            .flat_map(|(name, overloads)| {
                overloads
                    .iter()
                    .map(move |(s, _)| format!("{}({})", name, format_kinds(s)))
            })
            .collect();
        entries.sort();
        f.debug_struct("OperationTable")
            .field("operations", &entries)
            .finish()
    }
}
