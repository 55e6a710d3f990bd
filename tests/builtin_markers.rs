use pretty_assertions::assert_eq;
use skip_markers::testing::FakeHost;
use skip_markers::{EvaluationContext, Evaluator, MarkerInstance, Registry, RunOptions};

fn evaluator(host: FakeHost) -> Evaluator {
    Evaluator::new(Registry::with_builtins(), EvaluationContext::new(host, RunOptions::default()))
}

fn reason_for(host: FakeHost, marker: MarkerInstance) -> Option<String> {
    evaluator(host).evaluate(&[marker]).unwrap().reason
}

fn env_marker() -> MarkerInstance {
    MarkerInstance::new("skip_on_env").arg("FLAKY_TEST")
}

#[test]
fn test_skip_on_env_present() {
    assert_eq!(
        reason_for(FakeHost::linux().with_env("FLAKY_TEST", "anything"), env_marker()),
        Some("Environment variable 'FLAKY_TEST' is present".to_string())
    );
    assert_eq!(reason_for(FakeHost::linux(), env_marker()), None);
    // An empty value is still present.
    assert!(reason_for(FakeHost::linux().with_env("FLAKY_TEST", ""), env_marker()).is_some());
}

#[test]
fn test_skip_on_env_absent() {
    let absent = || env_marker().kwarg("present", false);
    assert_eq!(
        reason_for(FakeHost::linux(), absent()),
        Some("Environment variable 'FLAKY_TEST' is not present".to_string())
    );
    assert_eq!(reason_for(FakeHost::linux().with_env("FLAKY_TEST", "1"), absent()), None);
}

#[test]
fn test_skip_on_env_eq_and_ne() {
    let set = || FakeHost::linux().with_env("FLAKY_TEST", "1");
    let cases = [
        (set(), env_marker().kwarg("eq", "1"), true),
        (set(), env_marker().kwarg("eq", "2"), false),
        (FakeHost::linux(), env_marker().kwarg("eq", "1"), false),
        (set(), env_marker().kwarg("ne", "2"), true),
        (set(), env_marker().kwarg("ne", "1"), false),
        // Unset never differs from anything.
        (FakeHost::linux(), env_marker().kwarg("ne", "1"), false),
    ];
    for (host, marker, expected) in cases {
        let label = format!("{marker:?}");
        assert_eq!(evaluator(host).evaluate(&[marker]).unwrap().skip, expected, "{label}");
    }
    assert_eq!(
        reason_for(set(), env_marker().kwarg("ne", "2")),
        Some("Environment variable 'FLAKY_TEST' is present and does not equal '2'".to_string())
    );
}

#[test]
fn test_binaries_check_all() {
    let host = || FakeHost::linux().with_binary("python3");
    let all = || MarkerInstance::new("skip_if_binaries_missing").arg("python3").arg("python9");
    assert_eq!(reason_for(host(), all()), Some("The 'python9' binary was not found".to_string()));

    let any = all().kwarg("check_all", false);
    assert_eq!(reason_for(host(), any), None);

    let none = MarkerInstance::new("skip_if_binaries_missing")
        .arg("python8")
        .arg("python9")
        .kwarg("check_all", false);
    assert_eq!(
        reason_for(host(), none),
        Some("None of the following binaries was found: python8, python9".to_string())
    );

    let found = MarkerInstance::new("skip_if_binaries_missing").arg("python3");
    assert_eq!(reason_for(host(), found), None);
}

#[test]
fn test_binaries_reason_override() {
    let m = MarkerInstance::new("skip_if_binaries_missing").arg("nope").reason("install nope first");
    assert_eq!(reason_for(FakeHost::linux(), m), Some("install nope first".to_string()));
}

#[test]
fn test_binaries_reason_wins_over_deprecated_message() {
    let both = MarkerInstance::new("skip_if_binaries_missing")
        .arg("nope")
        .kwarg("message", "old wording")
        .reason("new wording");
    assert_eq!(reason_for(FakeHost::linux(), both), Some("new wording".to_string()));

    let message_only = MarkerInstance::new("skip_if_binaries_missing")
        .arg("nope")
        .kwarg("message", "old wording");
    assert_eq!(reason_for(FakeHost::linux(), message_only), Some("old wording".to_string()));
}

#[test]
fn test_administrator_on_windows() {
    let m = || MarkerInstance::new("skip_if_not_root");
    assert_eq!(
        reason_for(FakeHost::new("win32"), m()),
        Some("You must be logged in as an Administrator to run this test".to_string())
    );
    assert_eq!(reason_for(FakeHost::new("win32").privileged(true), m()), None);
}

#[test]
fn test_network_opt_out() {
    let m = || MarkerInstance::new("requires_network");
    assert_eq!(reason_for(FakeHost::linux(), m()), None);
    assert_eq!(
        reason_for(FakeHost::linux().with_env("NO_INTERNET", "1"), m()),
        Some("Network access was disabled through the NO_INTERNET environment variable".to_string())
    );
    assert_eq!(
        reason_for(FakeHost::linux().network(true, false), m().kwarg("only_local_network", true)),
        None
    );
}

#[test]
fn test_fips_platform() {
    let m = || MarkerInstance::new("skip_on_fips_enabled_platform");
    assert_eq!(
        reason_for(FakeHost::linux().fips(true), m()),
        Some("Skipped on FIPS enabled platform".to_string())
    );
    assert_eq!(reason_for(FakeHost::linux(), m()), None);
}

#[test]
fn test_every_builtin_takes_a_reason() {
    let registry = Registry::with_builtins();
    for spec in registry.specs() {
        assert!(
            spec.params.iter().any(|p| p.name == "reason" && p.keyword_only),
            "{} has no reason keyword",
            spec.name
        );
    }
}

#[test]
fn test_signatures() {
    let registry = Registry::with_builtins();
    let signature = |name: &str| registry.get(name).unwrap().spec().signature();
    assert_eq!(
        signature("skip_on_env"),
        "skip_on_env(envvar, present=true, eq=null, ne=null, reason=null)"
    );
    assert_eq!(
        signature("skip_if_binaries_missing"),
        "skip_if_binaries_missing(*binaries, check_all=true, message=null, reason=null)"
    );
    assert_eq!(signature("skip_on_windows"), "skip_on_windows(reason=null)");
}
