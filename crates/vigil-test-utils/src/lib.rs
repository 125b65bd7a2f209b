//! Test utilities for Vigil crates.
//!
//! [`RecordingFactory`] hands out strategies that write every hook they see
//! into a shared [`Journal`], so tests can assert on what was audited and in
//! which order.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;
use vigil_audit_capture::{
    AuditContext, BoxedStrategy, InvocationError, MethodAuditingStrategy,
    MethodAuditingStrategyFactory, ReturnValue, StrategyError, StrategyResult, Value,
};

/// Which hook a [`HookEvent`] records.
#[derive(Debug, Clone, PartialEq)]
pub enum HookKind {
    Accept,
    Before,
    After(ReturnValue),
    /// Message of the failure; panics read `panicked: <message>`.
    Error(String),
}

/// One hook invocation seen by a recording strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    /// Name of the factory that produced the strategy.
    pub strategy: String,
    pub audited_type: String,
    /// Method name, without owner.
    pub method: String,
    pub arguments: Vec<Value>,
    pub kind: HookKind,
}

/// Shared, ordered record of hook invocations.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<HookEvent>>>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> MutexGuard<'_, Vec<HookEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, event: HookEvent) {
        self.events().push(event);
    }

    /// Copy of all recorded events.
    pub fn snapshot(&self) -> Vec<HookEvent> {
        self.events().clone()
    }

    /// Recorded hook kinds as short labels (`accept`, `before`, `after`, `error`).
    pub fn hooks(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(|e| match e.kind {
                HookKind::Accept => "accept",
                HookKind::Before => "before",
                HookKind::After(_) => "after",
                HookKind::Error(_) => "error",
            })
            .collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    /// Forget all recorded events.
    pub fn clear(&self) {
        self.events().clear();
    }
}

/// How a recording strategy misbehaves after recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Failure {
    #[default]
    None,
    /// Every hook returns an error.
    Error,
    /// Every hook panics.
    Panic,
}

/// Strategy writing every hook into a [`Journal`].
pub struct RecordingStrategy {
    strategy: String,
    journal: Journal,
    failure: Failure,
}

impl RecordingStrategy {
    fn record(&self, context: &AuditContext<'_>, kind: HookKind) -> StrategyResult {
        self.journal.push(HookEvent {
            strategy: self.strategy.clone(),
            audited_type: context.audited_type().to_string(),
            method: context.method().name().to_string(),
            arguments: context.arguments().to_vec(),
            kind,
        });
        match self.failure {
            Failure::None => Ok(()),
            Failure::Error => Err(StrategyError::new(format!(
                "{} refused to record",
                self.strategy
            ))),
            Failure::Panic => panic!("{} panicked while recording", self.strategy),
        }
    }
}

impl MethodAuditingStrategy for RecordingStrategy {
    fn accept(&mut self, context: &AuditContext<'_>) {
        let _ = self.record(context, HookKind::Accept);
    }

    fn before_invocation(&mut self, context: &AuditContext<'_>) -> StrategyResult {
        self.record(context, HookKind::Before)
    }

    fn after_invocation(
        &mut self,
        context: &AuditContext<'_>,
        returned: &ReturnValue,
    ) -> StrategyResult {
        self.record(context, HookKind::After(returned.clone()))
    }

    fn on_invocation_error(
        &mut self,
        context: &AuditContext<'_>,
        error: &InvocationError<'_>,
    ) -> StrategyResult {
        self.record(context, HookKind::Error(error.to_string()))
    }
}

/// Factory producing [`RecordingStrategy`] instances sharing one journal.
#[derive(Clone)]
pub struct RecordingFactory {
    strategy: String,
    journal: Journal,
    failure: Failure,
}

impl RecordingFactory {
    /// Create a factory recording under the given strategy name.
    pub fn new(strategy: impl Into<String>, journal: &Journal) -> Self {
        Self {
            strategy: strategy.into(),
            journal: journal.clone(),
            failure: Failure::None,
        }
    }

    /// Make produced strategies misbehave after recording.
    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }
}

impl MethodAuditingStrategyFactory for RecordingFactory {
    fn strategy(&self, _audited_type: &str) -> BoxedStrategy {
        Box::new(RecordingStrategy {
            strategy: self.strategy.clone(),
            journal: self.journal.clone(),
            failure: self.failure,
        })
    }
}

impl fmt::Debug for RecordingFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingFactory")
            .field("strategy", &self.strategy)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Creates a temporary project directory with `.vigil/audit.yaml`.
pub fn temp_project(audit_yaml: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let config_dir = dir.path().join(".vigil");
    std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
    let path = config_dir.join("audit.yaml");
    std::fs::write(&path, audit_yaml).expect("Failed to write audit config");
    (dir, path)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vigil_audit_capture::{ContextBuilder, MethodIdentity};

    fn context() -> AuditContext<'static> {
        ContextBuilder::new()
            .build(
                MethodIdentity::new("Ledger", "post"),
                None,
                vec![serde_json::json!("entry")],
                &[],
            )
            .with_audited_type("journal")
    }

    #[test]
    fn test_recording_strategy_records_in_order() {
        let journal = Journal::new();
        let factory = RecordingFactory::new("ledger", &journal);
        let ctx = context();

        let mut strategy = factory.strategy(ctx.audited_type());
        strategy.accept(&ctx);
        assert_ok!(strategy.before_invocation(&ctx));
        assert_ok!(strategy.after_invocation(&ctx, &ReturnValue::Unit));

        assert_eq!(journal.hooks(), vec!["accept", "before", "after"]);
        let events = journal.snapshot();
        assert_eq!(events[0].strategy, "ledger");
        assert_eq!(events[0].audited_type, "journal");
        assert_eq!(events[0].method, "post");
        assert_eq!(events[2].kind, HookKind::After(ReturnValue::Unit));
    }

    #[test]
    fn test_failing_factory_still_records() {
        let journal = Journal::new();
        let factory = RecordingFactory::new("ledger", &journal).failing(Failure::Error);
        let ctx = context();

        let err = assert_err!(factory.strategy("default").before_invocation(&ctx));
        assert_eq!(err.message(), "ledger refused to record");
        assert_eq!(journal.len(), 1);

        journal.clear();
        assert!(journal.is_empty());
    }

    #[test]
    fn test_temp_project_layout() {
        let (dir, path) = temp_project("enabled: true\n");
        assert_eq!(path, dir.path().join(".vigil").join("audit.yaml"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "enabled: true\n");
    }

    proptest! {
        #[test]
        fn test_journal_keeps_every_argument(values in proptest::collection::vec(any::<i64>(), 0..8)) {
            let journal = Journal::new();
            let arguments: Vec<Value> = values.iter().map(|v| serde_json::json!(v)).collect();
            let ctx = ContextBuilder::new().build(MethodIdentity::function("f"), None, arguments.clone(), &[]);

            RecordingFactory::new("any", &journal).strategy("default").accept(&ctx);
            prop_assert_eq!(&journal.snapshot()[0].arguments, &arguments);
        }
    }
}
