//! Method call auditing for Vigil.
//!
//! Calls of audited methods are wrapped by an [`Interceptor`], which resolves
//! the method's auditing strategy by name, hands it a snapshot of the call and
//! reports the outcome to it. It includes:
//!
//! - Per-call audit contexts with labelled arguments
//! - The strategy contract and strategy factories
//! - Strategy resolution by identifier
//! - Declaration registry and call-site wrappers
//!
//! Auditing never changes what a call returns: the business result or error
//! reaches the caller exactly as it would without auditing.

mod context;
mod intercept;
mod operations;
mod registry;
mod resolver;
pub mod runtime;
mod strategy;

pub use context::{capture_argument, AuditContext, ContextBuilder};
pub use intercept::{AuditPhase, Hook, InterceptedCall, Interceptor};
pub use operations::{AuditedInstance, OperationError, OperationTable};
pub use registry::{AuditedMethod, Auditor, DeclarationRegistry};
pub use resolver::{StrategyRegistry, StrategyResolver};
pub use strategy::{
    BoxedStrategy, FnStrategyFactory, InvocationError, MethodAuditingStrategy,
    MethodAuditingStrategyFactory, StrategyError, StrategyResult, TypedStrategyFactory,
};

// Re-export types for convenience
pub use serde_json::Value;
pub use vigil_audit_types::{
    AuditDeclaration, MethodIdentity, ParameterAnnotation, ParameterDescriptor, ReturnValue,
    StrategyOption, ValueKind, DEFAULT_AUDITED_TYPE, IGNORE_STRATEGY,
};

/// Snapshot call arguments for an audited call.
///
/// ```
/// use vigil_audit_capture::audit_args;
///
/// let args = audit_args!("alice", 42, vec![1, 2]);
/// assert_eq!(args.len(), 3);
/// assert_eq!(args[1], serde_json::json!(42));
/// ```
#[macro_export]
macro_rules! audit_args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::capture_argument(&$arg)),+]
    };
}
