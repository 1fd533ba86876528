use abc_core::errors::{AbcError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("worker", 3)
        .with_context("reason", "example")
}

#[test]
fn worker_error_surface() {
    let err = AbcError::Worker(sample_info("worker-died", "worker exited without sentinel"));
    assert_eq!(err.code(), "worker-died");
    assert_eq!(err.info().context.get("worker").map(String::as_str), Some("3"));
}

#[test]
fn scheduler_error_surface() {
    let err = AbcError::Scheduler(sample_info("threshold-relaxed", "threshold increased"));
    assert_eq!(err.info().code, "threshold-relaxed");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn config_shorthand_sets_family() {
    let err = AbcError::config("zero-particles", "population size must be positive");
    assert!(matches!(err, AbcError::Config(_)));
    assert_eq!(err.code(), "zero-particles");
}

#[test]
fn display_includes_context_and_hint() {
    let err = AbcError::Adaptation(
        ErrorInfo::new("predictor-diverged", "fit slope is positive")
            .with_context("slope", 0.5)
            .with_hint("increase the population size"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("adaptation error: fit slope is positive"));
    assert!(rendered.contains("slope=0.5"));
    assert!(rendered.contains("hint: increase the population size"));
}
