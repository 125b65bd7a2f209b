use serde_json::json;
use std::fmt;
use std::sync::{Mutex, OnceLock};
use vigil_audit_capture::{
    audit_args, AuditContext, AuditDeclaration, AuditedInstance, Auditor, BoxedStrategy,
    DeclarationRegistry, FnStrategyFactory, Interceptor, InvocationError, MethodAuditingStrategy,
    MethodIdentity, OperationError, OperationTable, ParameterDescriptor, ReturnValue,
    StrategyOption, StrategyRegistry, StrategyResult, ValueKind,
};
use vigil_test_utils::{assert_err, assert_ok, Failure, HookKind, Journal, RecordingFactory};

#[derive(Debug)]
struct Overdrawn {
    missing: u64,
}

impl fmt::Display for Overdrawn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overdrawn by {}", self.missing)
    }
}

impl std::error::Error for Overdrawn {}

struct Account {
    balance: Mutex<u64>,
}

impl Account {
    fn new(balance: u64) -> Self {
        Self {
            balance: Mutex::new(balance),
        }
    }

    fn withdraw(&self, amount: u64) -> Result<u64, Overdrawn> {
        let mut balance = self.balance.lock().unwrap();
        if amount > *balance {
            return Err(Overdrawn {
                missing: amount - *balance,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }

    fn operations() -> &'static OperationTable<Account> {
        static TABLE: OnceLock<OperationTable<Account>> = OnceLock::new();
        TABLE.get_or_init(|| {
            OperationTable::new().register("balance", &[], |a: &Account, _| {
                Ok(Some(json!(*a.balance.lock().unwrap())))
            })
        })
    }
}

impl AuditedInstance for Account {
    fn invoke_operation(
        &self,
        operation: &str,
        arguments: &[serde_json::Value],
    ) -> Result<Option<serde_json::Value>, OperationError> {
        Self::operations().invoke(self, operation, arguments)
    }
}

fn withdraw() -> MethodIdentity {
    MethodIdentity::new("Account", "withdraw").with_parameters(["u64"])
}

fn auditor(journal: &Journal) -> Auditor {
    let strategies = StrategyRegistry::new().with("ledger", RecordingFactory::new("ledger", journal));
    let declarations = DeclarationRegistry::new().with(
        withdraw(),
        AuditDeclaration::new("ledger")
            .with_type("money")
            .with_parameter(ParameterDescriptor::described("amount")),
    );
    Auditor::new(declarations, Interceptor::new(strategies))
}

#[test]
fn test_successful_call_is_audited_once() {
    let journal = Journal::new();
    let auditor = auditor(&journal);
    let account = Account::new(100);

    let remaining = assert_ok!(auditor
        .method(withdraw())
        .call(&account, audit_args!(30_u64), || account.withdraw(30)));

    assert_eq!(remaining, 70);
    assert_eq!(journal.hooks(), vec!["accept", "before", "after"]);
    let events = journal.snapshot();
    assert!(events.iter().all(|e| e.audited_type == "money"));
    assert_eq!(events[1].arguments, vec![json!(30)]);
    assert_eq!(
        events[2].kind,
        HookKind::After(ReturnValue::Value { value: json!(70) })
    );
}

#[test]
fn test_failed_call_returns_business_error() {
    let journal = Journal::new();
    let auditor = auditor(&journal);
    let account = Account::new(10);

    let err = assert_err!(auditor
        .method(withdraw())
        .call(&account, audit_args!(25_u64), || account.withdraw(25)));

    assert_eq!(err.missing, 15);
    assert_eq!(journal.hooks(), vec!["accept", "before", "error"]);
    assert_eq!(
        journal.snapshot()[2].kind,
        HookKind::Error("overdrawn by 15".to_string())
    );
}

#[test]
fn test_unregistered_method_runs_unaudited() {
    let journal = Journal::new();
    let auditor = auditor(&journal);
    let account = Account::new(10);
    let deposit = auditor.method(MethodIdentity::new("Account", "deposit"));

    assert!(!deposit.is_audited());
    assert_ok!(deposit.call(&account, audit_args!(), || account.withdraw(0)));
    assert!(journal.is_empty());
}

#[test]
fn test_failing_strategies_never_affect_the_call() {
    let journal = Journal::new();

    for (strategy, failure) in [("broken", Failure::Error), ("panicking", Failure::Panic)] {
        let strategies = StrategyRegistry::new()
            .with(strategy, RecordingFactory::new(strategy, &journal).failing(failure));
        let auditor = Auditor::new(
            DeclarationRegistry::new().with(withdraw(), AuditDeclaration::new(strategy)),
            Interceptor::new(strategies),
        );
        let account = Account::new(50);

        let ok = auditor.call(&withdraw(), Some(&account), audit_args!(5_u64), || {
            account.withdraw(5)
        });
        let err = auditor.call(&withdraw(), Some(&account), audit_args!(500_u64), || {
            account.withdraw(500)
        });

        assert!(ok.is_ok());
        assert_eq!(assert_err!(err).missing, 455);
    }

    assert_eq!(
        journal.hooks(),
        vec![
            "accept", "before", "after", "accept", "before", "error", "accept", "before",
            "after", "accept", "before", "error",
        ]
    );
}

struct BalanceSnapshot {
    seen: &'static Mutex<Vec<String>>,
}

impl MethodAuditingStrategy for BalanceSnapshot {
    fn before_invocation(&mut self, context: &AuditContext<'_>) -> StrategyResult {
        let balance = context.invoke_operation("balance", &[]);
        let missing = context.invoke_operation("balance", &[json!("all")]);
        self.seen.lock().unwrap().push(format!(
            "before balance={:?} missing={:?} channel={:?}",
            balance,
            missing,
            context.option("channel")
        ));
        Ok(())
    }

    fn after_invocation(&mut self, context: &AuditContext<'_>, _: &ReturnValue) -> StrategyResult {
        let balance = context.invoke_operation("balance", &[]);
        let amount = context.argument_by_description("amount").cloned();
        self.seen
            .lock()
            .unwrap()
            .push(format!("after balance={:?} amount={:?}", balance, amount));
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

#[test]
fn test_strategy_reads_receiver_through_operations() {
    static SEEN: Mutex<Vec<String>> = Mutex::new(Vec::new());

    let strategies = StrategyRegistry::new().with(
        "snapshot",
        FnStrategyFactory::new(|_: &str| -> BoxedStrategy {
            Box::new(BalanceSnapshot { seen: &SEEN })
        }),
    );
    let declarations = DeclarationRegistry::new().with(
        withdraw(),
        AuditDeclaration::new("snapshot")
            .with_option(StrategyOption::new("channel", "atm"))
            .with_parameter(ParameterDescriptor::described("amount")),
    );
    let auditor = Auditor::new(declarations, Interceptor::new(strategies));
    let account = Account::new(40);

    assert_ok!(auditor
        .method(withdraw())
        .call(&account, audit_args!(15_u64), || account.withdraw(15)));

    assert_eq!(
        *SEEN.lock().unwrap(),
        vec![
            r#"before balance=Some(Number(40)) missing=None channel=Some("atm")"#,
            "after balance=Some(Number(25)) amount=Some(Number(15))",
        ]
    );
    assert!(Account::operations().contains("balance", &[]));
    assert!(!Account::operations().contains("balance", &[ValueKind::String]));
}

#[tokio::test]
async fn test_async_call_through_auditor() {
    let journal = Journal::new();
    let auditor = auditor(&journal);
    let account = Account::new(20);

    let remaining = auditor
        .method(withdraw())
        .call_async(&account, audit_args!(5_u64), async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            account.withdraw(5)
        })
        .await;

    assert_eq!(assert_ok!(remaining), 15);
    assert_eq!(journal.hooks(), vec!["accept", "before", "after"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_calls_share_one_auditor() {
    let journal = Journal::new();
    let auditor = std::sync::Arc::new(auditor(&journal));
    let account = std::sync::Arc::new(Account::new(1_000));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let auditor = auditor.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            auditor
                .call_async(&withdraw(), Some(&*account), audit_args!(10_u64), async {
                    account.withdraw(10)
                })
                .await
                .is_ok()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(*account.balance.lock().unwrap(), 920);
    assert_eq!(journal.len(), 8 * 3);
}
