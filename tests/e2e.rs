use pretty_assertions::assert_eq;
use serde_json::json;
use skip_markers::testing::FakeHost;
use skip_markers::{
    Decision, EvaluationContext, Evaluator, MarkerInstance, Registry, RunOptions, SourceLocation,
};
use std::sync::Arc;

fn evaluator(host: FakeHost) -> Evaluator {
    Evaluator::new(Registry::with_builtins(), EvaluationContext::new(host, RunOptions::default()))
}

#[test]
fn test_linux_host_skips_unless_on_windows() {
    let ev = evaluator(FakeHost::linux());
    let decision = ev.evaluate(&[MarkerInstance::new("skip_unless_on_windows")]).unwrap();
    assert!(decision.skip);
    assert_eq!(decision.reason.as_deref(), Some("Platform is not Windows, skipped"));
    assert_eq!(decision.marker.as_deref(), Some("skip_unless_on_windows"));
}

#[test]
fn test_flaky_test_env_equality() {
    let ev = evaluator(FakeHost::linux().with_env("FLAKY_TEST", "1"));
    let eq1 = MarkerInstance::new("skip_on_env").arg("FLAKY_TEST").kwarg("eq", "1");
    let eq2 = MarkerInstance::new("skip_on_env").arg("FLAKY_TEST").kwarg("eq", "2");
    assert!(ev.evaluate(&[eq1]).unwrap().skip);
    assert!(!ev.evaluate(&[eq2]).unwrap().skip);
}

#[test]
fn test_first_triggering_marker_wins() {
    let ev = evaluator(FakeHost::linux().privileged(false));
    let decision = ev
        .evaluate(&[
            MarkerInstance::new("skip_on_darwin"),
            MarkerInstance::new("skip_if_not_root"),
            MarkerInstance::new("skip_unless_on_windows"),
        ])
        .unwrap();
    assert_eq!(decision.marker.as_deref(), Some("skip_if_not_root"));
    assert_eq!(decision.reason.as_deref(), Some("You must be logged in as root to run this test"));
}

#[test]
fn test_reason_override_takes_precedence() {
    let ev = evaluator(FakeHost::new("win32"));
    let decision = ev
        .evaluate(&[MarkerInstance::new("skip_on_platforms").kwarg("windows", true).reason("Because!")])
        .unwrap();
    assert_eq!(decision.reason.as_deref(), Some("Because!"));
}

#[test]
fn test_no_markers_means_run() {
    let ev = evaluator(FakeHost::linux());
    let decision = ev.evaluate(&[]).unwrap();
    assert!(!decision.skip);
    assert_eq!(decision.reason, None);
    assert_eq!(decision.marker, None);
}

#[test]
fn test_evaluation_is_deterministic() {
    let ev = evaluator(FakeHost::new("darwin").with_env("CI", "true").with_binary("git"));
    let loc = SourceLocation::new("tests/e2e.rs", 1, 1);
    let markers = [
        MarkerInstance::new("skip_if_binaries_missing").arg("git").arg("hg"),
        MarkerInstance::new("skip_on_env").arg("CI"),
    ];
    let first = ev.evaluate_at(&markers, loc).unwrap();
    let second = ev.evaluate_at(&markers, loc).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.reason.as_deref(), Some("The 'hg' binary was not found"));
}

#[test]
fn test_host_changes_are_seen_by_later_evaluations() {
    let host = Arc::new(FakeHost::linux());
    let ev = Evaluator::new(
        Registry::with_builtins(),
        EvaluationContext::shared(host.clone(), RunOptions::default()),
    );
    let on_darwin = [MarkerInstance::new("skip_on_darwin")];
    let on_env = [MarkerInstance::new("skip_on_env").arg("FOO")];

    assert!(!ev.evaluate(&on_darwin).unwrap().skip);
    host.set_os("darwin");
    assert!(ev.evaluate(&on_darwin).unwrap().skip);

    assert!(!ev.evaluate(&on_env).unwrap().skip);
    host.set_env("FOO", "1");
    assert!(ev.evaluate(&on_env).unwrap().skip);
    host.remove_env("FOO");
    assert!(!ev.evaluate(&on_env).unwrap().skip);
}

#[test]
fn test_run_mode_gates_follow_options() {
    let markers = [MarkerInstance::new("destructive_test"), MarkerInstance::new("expensive_test")];

    let closed = evaluator(FakeHost::linux());
    assert_eq!(closed.evaluate(&markers).unwrap().reason.as_deref(), Some("Destructive tests are disabled"));

    let half = Evaluator::new(
        Registry::with_builtins(),
        EvaluationContext::new(FakeHost::linux(), RunOptions::default().with_destructive(true)),
    );
    assert_eq!(half.evaluate(&markers).unwrap().reason.as_deref(), Some("Expensive tests are disabled"));

    let open = Evaluator::new(
        Registry::with_builtins(),
        EvaluationContext::new(
            FakeHost::linux(),
            RunOptions::default().with_destructive(true).with_expensive(true),
        ),
    );
    assert!(!open.evaluate(&markers).unwrap().skip);
}

#[test]
fn test_skip_location_is_the_test_not_the_library() {
    let ev = evaluator(FakeHost::linux());
    let (decision, line) = (ev.evaluate(&[MarkerInstance::new("skip_on_linux")]).unwrap(), line!());
    assert!(decision.location.file.ends_with("e2e.rs"), "got {}", decision.location.file);
    assert_eq!(decision.location.line, line);

    let (parsed, line) = (ev.evaluate_exprs(&["skip_on_linux"]).unwrap(), line!());
    assert!(parsed.location.file.ends_with("e2e.rs"));
    assert_eq!(parsed.location.line, line);
}

#[test]
fn test_decision_serializes() {
    let loc = SourceLocation::new("tests/e2e.rs", 12, 5);
    let decision = Decision::skipped("skip_on_linux", "Skipped on Linux".to_string(), loc);
    assert_eq!(
        serde_json::to_value(&decision).unwrap(),
        json!({
            "skip": true,
            "reason": "Skipped on Linux",
            "marker": "skip_on_linux",
            "location": {"file": "tests/e2e.rs", "line": 12, "column": 5}
        })
    );
}
