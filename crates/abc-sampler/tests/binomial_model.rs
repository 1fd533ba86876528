use abc_accept::{AcceptContext, Acceptor};
use abc_core::{parameter, AbcError, Particle, Proposal, SumStat};
use abc_sampler::{
    MulticoreEvalParallelSampler, RngStreams, Sampler, SamplerConfig, SamplingOptions, SeedPolicy,
};
use rand::Rng;

const THETAS: [f64; 2] = [0.2, 0.6];
const OBSERVED: f64 = 1.0;
const THRESHOLD: f64 = 0.1;

fn model_selection_options<'a>(n: usize, acceptor: &'a Acceptor) -> SamplingOptions<'a> {
    SamplingOptions::new(
        n,
        |eval| {
            let m = eval.rng.gen_range(0..THETAS.len());
            Ok(Proposal::new(m, parameter([("theta", THETAS[m])])))
        },
        move |proposal, eval| -> Result<Particle, AbcError> {
            let success = eval.rng.gen_bool(proposal.parameter["theta"]);
            let x = if success { 1.0 } else { 0.0 };
            let distance = (x - OBSERVED).abs();
            let outcome = acceptor.decide(
                distance,
                THRESHOLD,
                &AcceptContext::current(0, &[]),
                eval.rng,
            )?;
            let sum_stat: SumStat = [("x".to_string(), x)].into_iter().collect();
            Ok(Particle::evaluated(
                proposal,
                sum_stat,
                distance,
                outcome.accepted,
                outcome.weight,
            ))
        },
    )
}

#[test]
fn posterior_model_probabilities_match_exact_values() {
    let acceptor = Acceptor::default();
    let config = SamplerConfig {
        n_procs: Some(4),
        seed_policy: SeedPolicy {
            master_seed: 1500,
            streams: RngStreams::PerEvaluation,
        },
        ..SamplerConfig::default()
    };
    let mut sampler = MulticoreEvalParallelSampler::new(config).unwrap();
    let sample = sampler
        .sample_until_n_accepted(&model_selection_options(1500, &acceptor))
        .unwrap();
    assert_eq!(sample.n_accepted(), 1500);

    let probabilities = sample.model_probabilities();
    let total: f64 = THETAS.iter().sum();
    let l1: f64 = THETAS
        .iter()
        .enumerate()
        .map(|(m, theta)| (probabilities.get(&m).copied().unwrap_or(0.0) - theta / total).abs())
        .sum();
    assert!(l1 < 0.05, "L1 distance {l1}, probabilities {probabilities:?}");

    // every success is accepted, so the acceptance rate estimates the evidence
    let evidence = THETAS.iter().sum::<f64>() / THETAS.len() as f64;
    assert!((sample.acceptance_rate() - evidence).abs() < 0.05);
}
