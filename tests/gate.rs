use skip_markers::testing::FakeHost;
use skip_markers::{gate, EvaluationContext, Evaluator, MarkerInstance, Registry, RunOptions};

fn evaluator(host: FakeHost) -> Evaluator {
    Evaluator::new(Registry::with_builtins(), EvaluationContext::new(host, RunOptions::default()))
}

fn gated_body(ev: &Evaluator, ran: &mut bool) {
    gate!(@with ev; "skip_on_darwin", MarkerInstance::new("skip_on_env").arg("FLAKY_TEST"));
    *ran = true;
}

#[test]
fn test_gate_returns_early_on_skip() {
    let mut ran = false;
    gated_body(&evaluator(FakeHost::linux().with_env("FLAKY_TEST", "1")), &mut ran);
    assert!(!ran);
}

#[test]
fn test_gate_falls_through_when_nothing_triggers() {
    let mut ran = false;
    gated_body(&evaluator(FakeHost::linux()), &mut ran);
    assert!(ran);
}

#[test]
#[should_panic(expected = "unknown marker 'skip_on_tuesdays'")]
fn test_gate_fails_the_test_on_unknown_markers() {
    let ev = evaluator(FakeHost::linux());
    gate!(@with ev; "skip_on_tuesdays");
}

#[test]
#[should_panic(expected = "gate.rs")]
fn test_gate_errors_point_at_the_call_site() {
    let ev = evaluator(FakeHost::linux());
    gate!(@with ev; "skip_on_env(");
}

#[test]
fn test_session_gate() {
    let mut ran = false;
    (|| {
        gate!(MarkerInstance::new("skip_on_env").arg("SKIP_MARKERS_GATE_TEST_NEVER_SET"));
        ran = true;
    })();
    assert!(ran);
}

#[test]
fn test_session_evaluate() {
    let decision = skip_markers::evaluate(&["skip_on_env('SKIP_MARKERS_GATE_TEST_NEVER_SET')"]).unwrap();
    assert!(!decision.skip);
    assert!(decision.location.file.ends_with("gate.rs"));
}
