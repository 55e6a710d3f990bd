use pretty_assertions::assert_eq;
use skip_markers::config::{RUN_DESTRUCTIVE_ENV, RUN_EXPENSIVE_ENV};
use skip_markers::testing::FakeHost;
use skip_markers::{EvaluationContext, Evaluator, MarkerInstance, Registry, RunOptions};
use std::env;

// One test per binary: the process environment is shared between threads.
#[test]
fn test_run_options_from_env() {
    env::remove_var(RUN_DESTRUCTIVE_ENV);
    env::remove_var(RUN_EXPENSIVE_ENV);
    assert_eq!(RunOptions::from_env(), RunOptions::default());

    env::set_var(RUN_DESTRUCTIVE_ENV, "yes");
    env::set_var(RUN_EXPENSIVE_ENV, "0");
    let opts = RunOptions::from_env();
    assert!(opts.run_destructive);
    assert!(!opts.run_expensive);

    let ev = Evaluator::new(Registry::with_builtins(), EvaluationContext::new(FakeHost::linux(), opts));
    let decision = ev.evaluate(&[MarkerInstance::new("destructive_test")]).unwrap();
    assert!(!decision.skip);
    let decision = ev.evaluate(&[MarkerInstance::new("expensive_test")]).unwrap();
    assert_eq!(decision.reason.as_deref(), Some("Expensive tests are disabled"));

    env::set_var(RUN_EXPENSIVE_ENV, "On");
    assert!(RunOptions::from_env().run_expensive);
}
