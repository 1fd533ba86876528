use abc_core::{parameter, Particle, Proposal, RngHandle};
use abc_popsize::{AdaptiveConfig, GaussianKdeTransition, PopulationStrategy, Transition};
use rand_distr::{Distribution, Normal};

fn gaussian_population(n: usize, seed: u64) -> Vec<Particle> {
    let mut rng = RngHandle::from_seed(seed);
    let a = Normal::new(1.0, 0.5).unwrap();
    let b = Normal::new(-2.0, 2.0).unwrap();
    (0..n)
        .map(|_| {
            let proposal = Proposal::new(0, parameter([("a", a.sample(&mut rng)), ("b", b.sample(&mut rng))]));
            Particle::evaluated(proposal, Default::default(), 0.0, true, 1.0)
        })
        .collect()
}

#[test]
fn cv_shrinks_with_more_particles() {
    let kde = GaussianKdeTransition::fit(&gaussian_population(60, 1))
        .unwrap()
        .with_bootstrap(40, 7);
    let small = kde.mean_cv(20);
    let large = kde.mean_cv(400);
    assert!(small.is_finite() && large.is_finite());
    assert!(large < small, "cv(20)={small}, cv(400)={large}");
}

#[test]
fn cv_is_reproducible_for_a_seed() {
    let kde = GaussianKdeTransition::fit(&gaussian_population(30, 2))
        .unwrap()
        .with_bootstrap(10, 3);
    assert_eq!(kde.mean_cv(50), kde.mean_cv(50));
}

#[test]
fn rejected_and_weightless_particles_are_ignored() {
    let mut particles = gaussian_population(10, 4);
    particles[0].accepted = false;
    particles[1].weight = 0.0;
    let kde = GaussianKdeTransition::fit(&particles).unwrap();
    assert_eq!(kde.len(), 8);
    assert!((kde.effective_sample_size() - 8.0).abs() < 1e-9);

    let err = GaussianKdeTransition::fit(&[]).unwrap_err();
    assert_eq!(err.code(), "empty-population");
}

#[test]
fn density_peaks_near_the_particles() {
    let kde = GaussianKdeTransition::fit(&gaussian_population(200, 5)).unwrap();
    let center = kde.pdf(&parameter([("a", 1.0), ("b", -2.0)]));
    let far = kde.pdf(&parameter([("a", 10.0), ("b", 20.0)]));
    assert!(center > 0.0);
    assert!(far < center * 1e-6);

    let mut rng = RngHandle::from_seed(9);
    let drawn = kde.sample(&mut rng).unwrap();
    assert_eq!(drawn.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(drawn["a"].is_finite() && drawn["b"].is_finite());
}

#[test]
fn adaptive_strategy_runs_on_kde_transitions() {
    let first = GaussianKdeTransition::fit(&gaussian_population(40, 6))
        .unwrap()
        .with_bootstrap(15, 1);
    let second = GaussianKdeTransition::fit(&gaussian_population(40, 8))
        .unwrap()
        .with_bootstrap(15, 2);
    let config = AdaptiveConfig {
        mean_cv: 0.2,
        min_population_size: 10,
        max_population_size: Some(2_000),
        ..AdaptiveConfig::new(40)
    };
    let mut strategy = PopulationStrategy::adaptive(config).unwrap();
    let size = strategy.adapt_population_size(&[&first, &second], &[0.6, 0.4]);
    assert!((10..=2_000).contains(&size));
}
