use vigil_audit_capture::runtime::{assemble, bootstrap};
use vigil_audit_capture::{audit_args, AuditedInstance, MethodIdentity, StrategyRegistry};
use vigil_common_config::ConfigLoader;
use vigil_test_utils::{assert_ok, temp_project, Journal, RecordingFactory};

const AUDIT_YAML: &str = r#"
enabled: true
methods:
  - method: "Mailer::send(String, String)"
    strategy: outbox
    type: email
    options:
      - key: retention
        value: 30d
    parameters:
      - description: recipient
      - tags:
          sensitive: "true"
  - method: "Mailer::preview(String)"
    strategy: ignore
  - method: "Mailer::bounce(String)"
    strategy: queue
strategies:
  queue:
    enabled: false
"#;

struct Mailer;

impl AuditedInstance for Mailer {}

impl Mailer {
    fn send(&self, to: &str, body: &str) -> Result<usize, std::io::Error> {
        Ok(to.len() + body.len())
    }
}

fn strategies(journal: &Journal) -> StrategyRegistry {
    StrategyRegistry::new()
        .with("outbox", RecordingFactory::new("outbox", journal))
        .with("queue", RecordingFactory::new("queue", journal))
}

#[test]
fn test_bootstrap_wires_configured_methods() {
    let (dir, _) = temp_project(AUDIT_YAML);
    let journal = Journal::new();
    let auditor = assert_ok!(bootstrap(dir.path(), strategies(&journal)));
    let mailer = Mailer;

    let send = auditor.method(
        MethodIdentity::new("Mailer", "send").with_parameters(["String", "String"]),
    );
    assert!(send.is_audited());
    let written = assert_ok!(send.call(&mailer, audit_args!("ops@example.com", "hi"), || {
        mailer.send("ops@example.com", "hi")
    }));
    assert_eq!(written, 17);

    let events = journal.snapshot();
    assert_eq!(journal.hooks(), vec!["accept", "before", "after"]);
    assert_eq!(events[0].audited_type, "email");
    assert_eq!(events[0].arguments.len(), 2);
}

#[test]
fn test_ignored_and_disabled_strategies_run_unaudited() {
    let (dir, _) = temp_project(AUDIT_YAML);
    let journal = Journal::new();
    let auditor = assert_ok!(bootstrap(dir.path(), strategies(&journal)));
    let mailer = Mailer;

    assert_eq!(auditor.interceptor().resolver().names(), vec!["outbox"]);

    let preview = MethodIdentity::new("Mailer", "preview").with_parameters(["String"]);
    let bounce = MethodIdentity::new("Mailer", "bounce").with_parameters(["String"]);
    assert!(!auditor.method(preview.clone()).is_audited());

    for method in [preview, bounce] {
        let mut runs = 0;
        let result = auditor.call(&method, Some(&mailer), audit_args!("x"), || {
            runs += 1;
            mailer.send("x", "")
        });
        assert_eq!(assert_ok!(result), 1);
        assert_eq!(runs, 1);
    }
    assert!(journal.is_empty());
    assert_eq!(
        auditor.declarations().unresolved(auditor.interceptor().resolver()),
        vec![&MethodIdentity::new("Mailer", "bounce").with_parameters(["String"])]
    );
}

#[test]
fn test_disabled_configuration_audits_nothing() {
    let (dir, _) = temp_project("enabled: false\nmethods:\n  - method: \"Mailer::send(String, String)\"\n    strategy: outbox\n");
    let journal = Journal::new();
    let config = assert_ok!(ConfigLoader::new(dir.path()).parse(
        &std::fs::read_to_string(dir.path().join(".vigil/audit.yaml")).unwrap()
    ));
    let auditor = assemble(&config, strategies(&journal));
    let mailer = Mailer;

    assert!(!auditor.interceptor().is_enabled());
    assert!(auditor.declarations().is_empty());
    let method = MethodIdentity::new("Mailer", "send").with_parameters(["String", "String"]);
    assert_ok!(auditor.call(&method, Some(&mailer), audit_args!("a", "b"), || {
        mailer.send("a", "b")
    }));
    assert!(journal.is_empty());
}
