use std::io::Write;
use std::path::Path;

use abc_sampler::{MulticoreEvalParallelSampler, RngStreams, SamplerConfig};

#[test]
fn config_loads_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "n_procs: 3\nseed_policy:\n  master_seed: 7\n  streams: per-evaluation\nmax_evaluations: 10000\n"
    )
    .unwrap();
    let config = SamplerConfig::load(file.path()).unwrap();
    assert_eq!(config.n_procs, Some(3));
    assert_eq!(config.seed_policy.master_seed, 7);
    assert_eq!(config.seed_policy.streams, RngStreams::PerEvaluation);
    assert_eq!(config.max_evaluations, Some(10_000));
    assert_eq!(config.health_poll_ms, 50);

    let sampler = MulticoreEvalParallelSampler::new(config).unwrap();
    assert_eq!(sampler.n_procs(), 3);
}

#[test]
fn empty_document_yields_defaults() {
    let config = SamplerConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, SamplerConfig::default());
    assert!(config.resolved_n_procs() >= 1);
    assert_eq!(config.seed_policy.streams, RngStreams::PerWorker);
}

#[test]
fn invalid_documents_are_rejected() {
    let err = SamplerConfig::from_yaml_str("n_procs: 0\n").unwrap_err();
    assert_eq!(err.code(), "zero-workers");

    let err = SamplerConfig::from_yaml_str("health_poll_ms: 0\n").unwrap_err();
    assert_eq!(err.code(), "invalid-health-poll");

    let err = SamplerConfig::from_yaml_str("seed_policy:\n  streams: per-thread\n").unwrap_err();
    assert_eq!(err.code(), "yaml-parse");

    let err = SamplerConfig::load(Path::new("/nonexistent/sampler.yaml")).unwrap_err();
    assert_eq!(err.code(), "config-read");
}

#[test]
fn config_serialises_back_to_yaml() {
    let config = SamplerConfig::with_n_procs(2);
    let yaml = serde_yaml::to_string(&config).unwrap();
    assert_eq!(SamplerConfig::from_yaml_str(&yaml).unwrap(), config);
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["seed_policy"]["streams"], "per-worker");
}
