use abc_core::{parameter, AbcError, Particle, Proposal, SumStat};
use abc_sampler::{
    MulticoreEvalParallelSampler, Sampler, SamplerConfig, SamplingOptions, SingleCoreSampler,
};

fn rare_acceptance<'a>(n: usize, fail_at: u64, panic: bool) -> SamplingOptions<'a> {
    SamplingOptions::new(
        n,
        |eval| Ok(Proposal::new(0, parameter([("u", eval.rng.uniform())]))),
        move |proposal, eval| {
            if eval.id == fail_at {
                if panic {
                    panic!("simulator crashed on evaluation {fail_at}");
                }
                return Err(AbcError::simulation("model-crashed", "simulator returned garbage"));
            }
            let u = proposal.parameter["u"];
            Ok(Particle::evaluated(proposal, SumStat::new(), u, u < 0.01, 1.0))
        },
    )
}

#[test]
fn worker_panic_is_reported_as_worker_died() {
    for n_procs in [1, 4] {
        let mut sampler = MulticoreEvalParallelSampler::new(SamplerConfig::with_n_procs(n_procs)).unwrap();
        let err = sampler
            .sample_until_n_accepted(&rare_acceptance(1_000, 5, true))
            .unwrap_err();
        assert_eq!(err.code(), "worker-died");
        assert!(matches!(err, AbcError::Worker(_)));
        let panic = &err.info().context["panic"];
        assert!(panic.contains("simulator crashed on evaluation 5"), "{panic}");
    }
}

#[test]
fn simulation_error_is_propagated() {
    for n_procs in [1, 4] {
        let mut sampler = MulticoreEvalParallelSampler::new(SamplerConfig::with_n_procs(n_procs)).unwrap();
        let err = sampler
            .sample_until_n_accepted(&rare_acceptance(1_000, 3, false))
            .unwrap_err();
        assert_eq!(err.code(), "model-crashed");
        assert!(matches!(err, AbcError::Simulation(_)));
    }

    let mut single = SingleCoreSampler::new(SamplerConfig::default()).unwrap();
    let err = single
        .sample_until_n_accepted(&rare_acceptance(1_000, 3, false))
        .unwrap_err();
    assert_eq!(err.code(), "model-crashed");
}

#[test]
fn sampler_recovers_after_a_failed_population() {
    let mut sampler = MulticoreEvalParallelSampler::new(SamplerConfig::with_n_procs(2)).unwrap();
    assert!(sampler
        .sample_until_n_accepted(&rare_acceptance(1_000, 0, false))
        .is_err());
    let sample = sampler
        .sample_until_n_accepted(&rare_acceptance(3, u64::MAX, false))
        .unwrap();
    assert_eq!(sample.n_accepted(), 3);
}

#[test]
fn invalid_requests_fail_before_spawning() {
    let err = MulticoreEvalParallelSampler::new(SamplerConfig::with_n_procs(0)).unwrap_err();
    assert_eq!(err.code(), "zero-workers");
    assert!(err.info().hint.is_some());

    let mut sampler = MulticoreEvalParallelSampler::new(SamplerConfig::with_n_procs(2)).unwrap();
    let err = sampler
        .sample_until_n_accepted(&rare_acceptance(0, u64::MAX, false))
        .unwrap_err();
    assert_eq!(err.code(), "zero-particles");
    assert_eq!(sampler.nr_evaluations(), 0);

    let mut single = SingleCoreSampler::new(SamplerConfig::default()).unwrap();
    assert_eq!(
        single
            .sample_until_n_accepted(&rare_acceptance(0, u64::MAX, false))
            .unwrap_err()
            .code(),
        "zero-particles"
    );
}
