//! The strategy contract and strategy factories.

use crate::context::AuditContext;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;
use vigil_audit_types::{ReturnValue, DEFAULT_AUDITED_TYPE};

/// Failure reported by a strategy hook. Logged by the interceptor, never
/// surfaced to the audited call.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StrategyError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl StrategyError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type of strategy hooks.
pub type StrategyResult = Result<(), StrategyError>;

/// How an audited call failed, as shown to the error hook.
///
/// The business error is borrowed for the duration of the hook, so any type
/// with a `Display` impl can be audited, including boxed trait objects.
pub struct InvocationError<'a> {
    cause: Cause<'a>,
    type_name: &'static str,
}

enum Cause<'a> {
    Returned(&'a dyn fmt::Display),
    Panicked(&'a str),
}

impl<'a> InvocationError<'a> {
    /// The call returned `Err(error)`.
    pub fn returned<E: fmt::Display>(error: &'a E) -> Self {
        Self {
            cause: Cause::Returned(error),
            type_name: std::any::type_name::<E>(),
        }
    }

    /// The call panicked with the given message.
    pub fn panicked(message: &'a str) -> Self {
        Self {
            cause: Cause::Panicked(message),
            type_name: "panic",
        }
    }

    /// Whether the call panicked instead of returning an error.
    pub fn is_panic(&self) -> bool {
        matches!(self.cause, Cause::Panicked(_))
    }

    /// Type name of the returned error, `"panic"` for panics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for InvocationError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cause {
            Cause::Returned(error) => error.fmt(f),
            Cause::Panicked(message) => write!(f, "panicked: {}", message),
        }
    }
}

impl fmt::Debug for InvocationError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationError")
            .field("type_name", &self.type_name)
            .field("message", &format_args!("{}", self))
            .finish()
    }
}

impl StdError for InvocationError<'_> {}

/// A pluggable auditing strategy.
///
/// An instance serves exactly one intercepted call. The interceptor calls
/// [`accept`](Self::accept) once, then
/// [`before_invocation`](Self::before_invocation), runs the audited call, and
/// finishes with either [`after_invocation`](Self::after_invocation) or
/// [`on_invocation_error`](Self::on_invocation_error), never both.
///
/// Every hook receives the call's context by reference; the context borrows
/// the receiver and is gone when the call returns. Hooks run on the caller's
/// thread and should be quick compared to the audited call.
pub trait MethodAuditingStrategy: Send {
    /// Hand the strategy the context of the call it will audit.
    fn accept(&mut self, context: &AuditContext<'_>) {
        let _ = context;
    }

    /// Record the call before it runs.
    fn before_invocation(&mut self, context: &AuditContext<'_>) -> StrategyResult;

    /// Record a successful call and what it returned.
    fn after_invocation(
        &mut self,
        context: &AuditContext<'_>,
        returned: &ReturnValue,
    ) -> StrategyResult;

    /// Record a failed call: an error it returned or a panic.
    fn on_invocation_error(
        &mut self,
        context: &AuditContext<'_>,
        error: &InvocationError<'_>,
    ) -> StrategyResult;
}

/// Boxed strategy as handed out by factories.
pub type BoxedStrategy = Box<dyn MethodAuditingStrategy>;

/// Produces strategy instances for one strategy identifier.
pub trait MethodAuditingStrategyFactory: Send + Sync {
    /// Get a strategy for a call with the given audited-type tag.
    ///
    /// Whether instances are fresh or pooled is up to the factory; an
    /// instance must not carry state from one call into another.
    fn strategy(&self, audited_type: &str) -> BoxedStrategy;
}

/// Factory backed by a closure.
pub struct FnStrategyFactory<F> {
    make: F,
}

impl<F> FnStrategyFactory<F>
where
    F: Fn(&str) -> BoxedStrategy + Send + Sync,
{
    /// Create a factory from a closure receiving the audited-type tag.
    pub fn new(make: F) -> Self {
        Self { make }
    }
}

impl<F> MethodAuditingStrategyFactory for FnStrategyFactory<F>
where
    F: Fn(&str) -> BoxedStrategy + Send + Sync,
{
    fn strategy(&self, audited_type: &str) -> BoxedStrategy {
        (self.make)(audited_type)
    }
}

impl<F> fmt::Debug for FnStrategyFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStrategyFactory").finish_non_exhaustive()
    }
}

type StrategyConstructor = Box<dyn Fn() -> BoxedStrategy + Send + Sync>;

/// Factory choosing a strategy implementation per audited-type tag.
///
/// Tags without a dedicated constructor get the default one.
pub struct TypedStrategyFactory {
    default: StrategyConstructor,
    by_type: HashMap<String, StrategyConstructor>,
}

impl TypedStrategyFactory {
    /// Create a factory with the constructor used for the default type and
    /// any tag without a dedicated constructor.
    pub fn new<F>(default: F) -> Self
    where
        F: Fn() -> BoxedStrategy + Send + Sync + 'static,
    {
        Self {
            default: Box::new(default),
            by_type: HashMap::new(),
        }
    }

    /// Use a dedicated constructor for one audited-type tag.
    pub fn with_type<F>(mut self, audited_type: impl Into<String>, make: F) -> Self
    where
        F: Fn() -> BoxedStrategy + Send + Sync + 'static,
    {
        self.by_type.insert(audited_type.into(), Box::new(make));
        self
    }

    /// Whether a dedicated constructor exists for the tag.
    pub fn handles(&self, audited_type: &str) -> bool {
        audited_type == DEFAULT_AUDITED_TYPE || self.by_type.contains_key(audited_type)
    }
}

impl MethodAuditingStrategyFactory for TypedStrategyFactory {
    fn strategy(&self, audited_type: &str) -> BoxedStrategy {
        match self.by_type.get(audited_type) {
            Some(make) => make(),
            None => (self.default)(),
        }
    }
}

impl fmt::Debug for TypedStrategyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.by_type.keys().collect();
        types.sort();
        f.debug_struct("TypedStrategyFactory")
            .field("types", &types)
            .finish_non_exhaustive()
    }
}
