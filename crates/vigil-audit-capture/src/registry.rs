//! Registration of audited methods and the call-site wrapper built on it.

use crate::intercept::{InterceptedCall, Interceptor};
use crate::operations::AuditedInstance;
use crate::resolver::{StrategyRegistry, StrategyResolver};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};
use vigil_audit_types::{AuditDeclaration, MethodIdentity, ReturnValue};
use vigil_common_config::AuditConfig;

/// Table of audited methods and their declarations, filled at startup.
#[derive(Debug, Clone, Default)]
pub struct DeclarationRegistry {
    declarations: HashMap<MethodIdentity, AuditDeclaration>,
}

impl DeclarationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration. A disabled configuration
    /// registers nothing.
    pub fn from_config(config: &AuditConfig) -> Self {
        let mut registry = Self::new();
        if !config.enabled {
            debug!("Auditing disabled by configuration");
            return registry;
        }
        for registration in &config.methods {
            registry.register(registration.method.clone(), registration.declaration.clone());
        }
        registry
    }

    /// Declare a method as audited. Returns the declaration it replaces.
    pub fn register(
        &mut self,
        method: MethodIdentity,
        declaration: AuditDeclaration,
    ) -> Option<AuditDeclaration> {
        debug!(%method, strategy = %declaration.strategy, "Registering audited method");
        self.declarations.insert(method, declaration)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, method: MethodIdentity, declaration: AuditDeclaration) -> Self {
        self.register(method, declaration);
        self
    }

    /// Declaration of a method, if it is audited.
    pub fn lookup(&self, method: &MethodIdentity) -> Option<&AuditDeclaration> {
        self.declarations.get(method)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether no method is registered.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Iterate over registered methods and declarations.
    pub fn iter(&self) -> impl Iterator<Item = (&MethodIdentity, &AuditDeclaration)> {
        self.declarations.iter()
    }

    /// Methods whose strategy the resolver cannot serve. `ignore` is never
    /// reported.
    pub fn unresolved<R: StrategyResolver>(&self, resolver: &R) -> Vec<&MethodIdentity> {
        let mut missing: Vec<&MethodIdentity> = self
            .declarations
            .iter()
            .filter(|(_, d)| !d.is_ignored() && resolver.resolve(&d.strategy).is_none())
            .map(|(m, _)| m)
            .collect();
        missing.sort();
        missing
    }
}

/// Audits calls of registered methods; calls of other methods just run.
#[derive(Debug)]
pub struct Auditor<R = StrategyRegistry> {
    declarations: DeclarationRegistry,
    interceptor: Interceptor<R>,
}

impl<R: StrategyResolver> Auditor<R> {
    /// Combine a declaration table with an interceptor.
    pub fn new(declarations: DeclarationRegistry, interceptor: Interceptor<R>) -> Self {
        Self {
            declarations,
            interceptor,
        }
    }

    /// Build an auditor from configuration and the host's strategies.
    pub fn from_config(config: &AuditConfig, resolver: R) -> Self {
        let declarations = DeclarationRegistry::from_config(config);
        let interceptor = Interceptor::new(resolver).with_enabled(config.enabled);
        for method in declarations.unresolved(interceptor.resolver()) {
            warn!(%method, "Audited method names a strategy with no registered factory");
        }
        Self::new(declarations, interceptor)
    }

    /// The declaration table.
    pub fn declarations(&self) -> &DeclarationRegistry {
        &self.declarations
    }

    /// The interceptor.
    pub fn interceptor(&self) -> &Interceptor<R> {
        &self.interceptor
    }

    /// Run a call of `method`, audited if the method is registered.
    pub fn call<T, E, F>(
        &self,
        method: &MethodIdentity,
        receiver: Option<&dyn AuditedInstance>,
        arguments: Vec<Value>,
        proceed: F,
    ) -> Result<T, E>
    where
        T: Serialize + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.call_with(method, receiver, arguments, ReturnValue::capture::<T>, proceed)
    }

    /// Like [`call`](Self::call), with a custom capture of the result.
    pub fn call_with<T, E, F, C>(
        &self,
        method: &MethodIdentity,
        receiver: Option<&dyn AuditedInstance>,
        arguments: Vec<Value>,
        capture: C,
        proceed: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
        C: FnOnce(&T) -> ReturnValue,
    {
        match self.declarations.lookup(method) {
            Some(declaration) => {
                let call = InterceptedCall {
                    declaration,
                    method,
                    receiver,
                };
                self.interceptor
                    .intercept_with(call, arguments, capture, proceed)
            }
            None => proceed(),
        }
    }

    /// Async variant of [`call`](Self::call).
    pub async fn call_async<T, E, Fut>(
        &self,
        method: &MethodIdentity,
        receiver: Option<&dyn AuditedInstance>,
        arguments: Vec<Value>,
        proceed: Fut,
    ) -> Result<T, E>
    where
        T: Serialize + 'static,
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_async_with(method, receiver, arguments, ReturnValue::capture::<T>, proceed)
            .await
    }

    /// Async variant of [`call_with`](Self::call_with).
    pub async fn call_async_with<T, E, Fut, C>(
        &self,
        method: &MethodIdentity,
        receiver: Option<&dyn AuditedInstance>,
        arguments: Vec<Value>,
        capture: C,
        proceed: Fut,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&T) -> ReturnValue,
    {
        match self.declarations.lookup(method) {
            Some(declaration) => {
                let call = InterceptedCall {
                    declaration,
                    method,
                    receiver,
                };
                self.interceptor
                    .intercept_async_with(call, arguments, capture, proceed)
                    .await
            }
            None => proceed.await,
        }
    }

    /// Handle for wrapping one method at service construction time.
    pub fn method(&self, method: MethodIdentity) -> AuditedMethod<'_, R> {
        AuditedMethod {
            auditor: self,
            method,
        }
    }
}

/// A method bound to an [`Auditor`], ready to wrap its calls.
#[derive(Debug)]
pub struct AuditedMethod<'a, R = StrategyRegistry> {
    auditor: &'a Auditor<R>,
    method: MethodIdentity,
}

impl<R: StrategyResolver> AuditedMethod<'_, R> {
    /// Identity of the wrapped method.
    pub fn identity(&self) -> &MethodIdentity {
        &self.method
    }

    /// Whether calls through this handle are audited.
    pub fn is_audited(&self) -> bool {
        self.auditor
            .declarations
            .lookup(&self.method)
            .map(|d| !d.is_ignored())
            .unwrap_or(false)
    }

    /// Run a call on `receiver`.
    pub fn call<T, E, F>(
        &self,
        receiver: &dyn AuditedInstance,
        arguments: Vec<Value>,
        proceed: F,
    ) -> Result<T, E>
    where
        T: Serialize + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.auditor
            .call(&self.method, Some(receiver), arguments, proceed)
    }

    /// Run a call on `receiver`, capturing the result with `capture`.
    pub fn call_with<T, E, F, C>(
        &self,
        receiver: &dyn AuditedInstance,
        arguments: Vec<Value>,
        capture: C,
        proceed: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
        C: FnOnce(&T) -> ReturnValue,
    {
        self.auditor
            .call_with(&self.method, Some(receiver), arguments, capture, proceed)
    }

    /// Run a call of a function without receiver.
    pub fn call_static<T, E, F>(&self, arguments: Vec<Value>, proceed: F) -> Result<T, E>
    where
        T: Serialize + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.auditor.call(&self.method, None, arguments, proceed)
    }

    /// Async variant of [`call`](Self::call).
    pub async fn call_async<T, E, Fut>(
        &self,
        receiver: &dyn AuditedInstance,
        arguments: Vec<Value>,
        proceed: Fut,
    ) -> Result<T, E>
    where
        T: Serialize + 'static,
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.auditor
            .call_async(&self.method, Some(receiver), arguments, proceed)
            .await
    }
}
