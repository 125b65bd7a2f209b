//! The interception core: drives one audited call through its strategy hooks.

use crate::context::{AuditContext, ContextBuilder};
use crate::operations::AuditedInstance;
use crate::resolver::{StrategyRegistry, StrategyResolver};
use crate::strategy::{BoxedStrategy, InvocationError, StrategyResult};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::{self, Future};
use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::task::Poll;
use strum::{Display, IntoStaticStr};
use tracing::{debug, warn, Span};
use vigil_audit_types::{AuditDeclaration, MethodIdentity, ReturnValue};
use vigil_common_log::spans::{audit_span, hook_span, record_error, Timer};

/// Progress of one intercepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuditPhase {
    NotStarted,
    StrategyResolved,
    BeforeHookRun,
    Invoked,
    AfterOrErrorHookRun,
    Done,
}

/// Which strategy hook is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Hook {
    Accept,
    Before,
    After,
    Error,
}

/// Everything the interceptor needs to know about one call, except how to
/// run it.
#[derive(Clone, Copy)]
pub struct InterceptedCall<'a, 'r> {
    /// The audit declaration of the called method.
    pub declaration: &'a AuditDeclaration,
    /// Identity of the called method.
    pub method: &'a MethodIdentity,
    /// Instance the method is called on, absent for free functions.
    pub receiver: Option<&'r dyn AuditedInstance>,
}

impl<'a, 'r> InterceptedCall<'a, 'r> {
    /// Describe a call to `method` declared by `declaration`.
    pub fn new(declaration: &'a AuditDeclaration, method: &'a MethodIdentity) -> Self {
        Self {
            declaration,
            method,
            receiver: None,
        }
    }

    /// Set the receiver.
    pub fn on(mut self, receiver: &'r dyn AuditedInstance) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

/// Wraps calls to audited methods and dispatches to auditing strategies.
///
/// The interceptor holds no per-call state and can be shared between threads
/// as long as its resolver can.
#[derive(Debug)]
pub struct Interceptor<R = StrategyRegistry> {
    resolver: R,
    builder: ContextBuilder,
    enabled: bool,
}

impl<R: StrategyResolver> Interceptor<R> {
    /// Create an interceptor resolving strategies through `resolver`.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            builder: ContextBuilder::new(),
            enabled: true,
        }
    }

    /// Switch all auditing on or off. A disabled interceptor only runs calls.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether auditing is switched on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The strategy resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Run `proceed` as an audited call and return its outcome unchanged.
    ///
    /// The call always runs exactly once. A business error is handed to the
    /// strategy's error hook and then returned as is. A panic in the call is
    /// reported to the error hook and then resumed. Strategy failures are
    /// logged and never reach the caller.
    pub fn intercept<T, E, F>(
        &self,
        call: InterceptedCall<'_, '_>,
        arguments: Vec<Value>,
        proceed: F,
    ) -> Result<T, E>
    where
        T: Serialize + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.intercept_with(call, arguments, ReturnValue::capture::<T>, proceed)
    }

    /// Like [`intercept`](Self::intercept), with `capture` turning the
    /// returned value into what the after-hook sees. Use it for results
    /// without a `Serialize` impl, e.g. with [`ReturnValue::opaque`].
    pub fn intercept_with<T, E, F, C>(
        &self,
        call: InterceptedCall<'_, '_>,
        arguments: Vec<Value>,
        capture: C,
        proceed: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
        C: FnOnce(&T) -> ReturnValue,
    {
        let Some(mut audit) = self.begin(call, arguments) else {
            return proceed();
        };

        match panic::catch_unwind(AssertUnwindSafe(proceed)) {
            Ok(outcome) => {
                audit.complete(&outcome, capture);
                outcome
            }
            Err(payload) => {
                audit.fail(&InvocationError::panicked(panic_message(payload.as_ref())));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async variant of [`intercept`](Self::intercept).
    ///
    /// Hooks run synchronously on the task polling the returned future; the
    /// interceptor never spawns or yields on its own.
    pub async fn intercept_async<T, E, Fut>(
        &self,
        call: InterceptedCall<'_, '_>,
        arguments: Vec<Value>,
        proceed: Fut,
    ) -> Result<T, E>
    where
        T: Serialize + 'static,
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.intercept_async_with(call, arguments, ReturnValue::capture::<T>, proceed)
            .await
    }

    /// Async variant of [`intercept_with`](Self::intercept_with).
    pub async fn intercept_async_with<T, E, Fut, C>(
        &self,
        call: InterceptedCall<'_, '_>,
        arguments: Vec<Value>,
        capture: C,
        proceed: Fut,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&T) -> ReturnValue,
    {
        let Some(mut audit) = self.begin(call, arguments) else {
            return proceed.await;
        };

        let mut proceed = pin!(proceed);
        let caught = future::poll_fn(|cx| {
            match panic::catch_unwind(AssertUnwindSafe(|| proceed.as_mut().poll(cx))) {
                Ok(Poll::Ready(outcome)) => Poll::Ready(Ok(outcome)),
                Ok(Poll::Pending) => Poll::Pending,
                Err(payload) => Poll::Ready(Err(payload)),
            }
        })
        .await;

        match caught {
            Ok(outcome) => {
                audit.complete(&outcome, capture);
                outcome
            }
            Err(payload) => {
                audit.fail(&InvocationError::panicked(panic_message(payload.as_ref())));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Resolve the strategy, build the context and run the before-hook.
    ///
    /// `None` means the call runs unaudited.
    fn begin<'r>(
        &self,
        call: InterceptedCall<'_, 'r>,
        arguments: Vec<Value>,
    ) -> Option<ActiveAudit<'r>> {
        let declaration = call.declaration;
        if !self.enabled || declaration.is_ignored() {
            return None;
        }

        let span = audit_span(
            &call.method.to_string(),
            &declaration.strategy,
            declaration.resolved_type(),
        );
        let _entered = span.enter();

        debug!(
            options = ?declaration.options,
            "Started auditing {} using strategy {}",
            call.method.name(),
            declaration.strategy
        );

        let Some(factory) = self.resolver.resolve(&declaration.strategy) else {
            warn!(
                strategy = %declaration.strategy,
                method = %call.method,
                "No strategy factory was found for the audit strategy"
            );
            return None;
        };

        let context = self
            .builder
            .build(
                call.method.clone(),
                call.receiver,
                arguments,
                &declaration.parameters,
            )
            .with_audited_type(declaration.resolved_type())
            .with_options(declaration.options.clone());

        let mut audit = ActiveAudit {
            strategy: factory.strategy(declaration.resolved_type()),
            strategy_name: declaration.strategy.clone(),
            context,
            phase: AuditPhase::StrategyResolved,
            span: span.clone(),
            timer: Some(Timer::start(call.method.to_string())),
        };

        audit.run_hook(Hook::Accept, |strategy, context| {
            strategy.accept(context);
            Ok(())
        });
        audit.run_hook(Hook::Before, |strategy, context| {
            strategy.before_invocation(context)
        });
        audit.phase = AuditPhase::BeforeHookRun;

        debug!("Invoking audited method {}", call.method.name());
        Some(audit)
    }
}

/// A call whose before-hook has run and which awaits its outcome.
struct ActiveAudit<'r> {
    strategy: BoxedStrategy,
    strategy_name: String,
    context: AuditContext<'r>,
    phase: AuditPhase,
    span: Span,
    timer: Option<Timer>,
}

impl ActiveAudit<'_> {
    /// Deliver the call's outcome to the after- or error-hook.
    fn complete<T, E, C>(&mut self, outcome: &Result<T, E>, capture: C)
    where
        E: fmt::Display,
        C: FnOnce(&T) -> ReturnValue,
    {
        match outcome {
            Ok(value) => {
                self.phase = AuditPhase::Invoked;
                let span = self.span.clone();
                let _entered = span.enter();

                let returned = capture(value);
                debug!(returned = ?returned, "Returned value from audited method");
                self.run_hook(Hook::After, |strategy, context| {
                    strategy.after_invocation(context, &returned)
                });
                self.finish();
            }
            Err(error) => self.fail(&InvocationError::returned(error)),
        }
    }

    /// Deliver a returned error or a panic to the error hook.
    fn fail(&mut self, error: &InvocationError<'_>) {
        self.phase = AuditPhase::Invoked;
        let span = self.span.clone();
        let _entered = span.enter();

        record_error(error);
        warn!(
            method = %self.context.method(),
            strategy = %self.strategy_name,
            error_type = error.type_name(),
            %error,
            "Audited method failed"
        );
        self.run_hook(Hook::Error, |strategy, context| {
            strategy.on_invocation_error(context, error)
        });
        self.finish();
    }

    fn finish(&mut self) {
        self.phase = AuditPhase::AfterOrErrorHookRun;
        debug!("Finished auditing {}", self.context.method().name());
        if let Some(timer) = self.timer.take() {
            timer.finish();
        }
        self.phase = AuditPhase::Done;
    }

    /// Run one hook, containing its errors and panics.
    fn run_hook<H>(&mut self, hook: Hook, run: H)
    where
        H: FnOnce(&mut BoxedStrategy, &AuditContext<'_>) -> StrategyResult,
    {
        let _entered = hook_span(hook.into()).entered();
        let strategy = &mut self.strategy;
        let context = &self.context;
        let result = panic::catch_unwind(AssertUnwindSafe(|| run(strategy, context)));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(%hook, phase = %self.phase, %error, "Audit strategy hook failed");
            }
            Err(payload) => {
                warn!(
                    %hook,
                    phase = %self.phase,
                    panic = panic_message(payload.as_ref()),
                    "Audit strategy hook panicked"
                );
            }
        }
    }
}

impl Drop for ActiveAudit<'_> {
    fn drop(&mut self) {
        // Only reachable when an async call is dropped before it finished.
        if self.phase != AuditPhase::Done {
            let _entered = self.span.enter();
            debug!(phase = %self.phase, "Audited call was cancelled before completing");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
