use abc_core::{parameter, Particle, Proposal, SumStat};
use abc_sampler::{
    MulticoreEvalParallelSampler, RngStreams, Sampler, SamplerConfig, SamplingOptions, SeedPolicy,
    SingleCoreSampler,
};

const P_ACCEPT: f64 = 0.25;

fn bernoulli_options<'a>(n: usize) -> SamplingOptions<'a> {
    SamplingOptions::new(
        n,
        |eval| Ok(Proposal::new(0, parameter([("u", eval.rng.uniform())]))),
        |proposal, _eval| {
            let u = proposal.parameter["u"];
            Ok(Particle::evaluated(proposal, SumStat::new(), u, u < P_ACCEPT, 1.0))
        },
    )
}

fn mean_evaluations<S: Sampler>(sampler: &mut S, n: usize, repetitions: usize) -> f64 {
    let options = bernoulli_options(n);
    let total: u64 = (0..repetitions)
        .map(|_| {
            sampler.sample_until_n_accepted(&options).unwrap();
            sampler.nr_evaluations()
        })
        .sum();
    total as f64 / repetitions as f64
}

#[test]
fn mean_attempts_match_inverse_acceptance_rate() {
    let n = 40;
    let expected = n as f64 / P_ACCEPT;

    let mut single = SingleCoreSampler::new(SamplerConfig::default()).unwrap();
    let mean = mean_evaluations(&mut single, n, 60);
    assert!((mean - expected).abs() < 0.1 * expected, "single core mean {mean}");

    let mut parallel = MulticoreEvalParallelSampler::new(SamplerConfig::with_n_procs(4)).unwrap();
    let mean = mean_evaluations(&mut parallel, n, 60);
    assert!((mean - expected).abs() < 0.1 * expected, "parallel mean {mean}");
}

#[test]
fn attempts_grow_with_population_size() {
    let config = SamplerConfig {
        n_procs: Some(1),
        seed_policy: SeedPolicy {
            master_seed: 99,
            streams: RngStreams::PerEvaluation,
        },
        ..SamplerConfig::default()
    };
    let mut previous = 0;
    for n in [1, 2, 5, 10, 20, 40, 80] {
        let mut sampler = MulticoreEvalParallelSampler::new(config.clone()).unwrap();
        sampler.sample_until_n_accepted(&bernoulli_options(n)).unwrap();
        let evaluations = sampler.nr_evaluations();
        assert!(evaluations >= previous, "n={n}: {evaluations} < {previous}");
        assert!(evaluations >= n as u64);
        previous = evaluations;
    }
}
