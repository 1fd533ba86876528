use abc_accept::{
    AcceptContext, Acceptor, KernelPdfMax, PdfMaxEval, StochasticAcceptor, UniformAcceptor,
    UniformTimePolicy,
};
use abc_core::{parameter, AbcError, Particle, Proposal, RngHandle};

struct NormalKernel {
    sd: f64,
}

impl KernelPdfMax for NormalKernel {
    fn log_pdf_max(&self) -> f64 {
        -(self.sd * (2.0 * std::f64::consts::PI).sqrt()).ln()
    }
}

fn particle_with_density(density: f64) -> Particle {
    let proposal = Proposal::new(0, parameter([("theta", 0.0)]));
    Particle::evaluated(proposal, Default::default(), density, true, 1.0)
}

#[test]
fn uniform_acceptor_handles_infinite_thresholds() {
    let acceptor = Acceptor::default();
    let context = AcceptContext::current(0, &[]);
    let mut rng = RngHandle::from_seed(1);
    for distance in [0.0, 1.0, 1e300] {
        let open = acceptor
            .decide(distance, f64::INFINITY, &context, &mut rng)
            .expect("uniform never fails");
        assert!(open.accepted);
        assert_eq!(open.weight, 1.0);
        let closed = acceptor
            .decide(distance, f64::NEG_INFINITY, &context, &mut rng)
            .expect("uniform never fails");
        assert!(!closed.accepted);
        assert_eq!(closed.weight, 0.0);
    }
}

#[test]
fn proposal_round_policy_uses_historic_threshold() {
    let thresholds = [10.0, 5.0, 2.0];
    let context = AcceptContext {
        round: 2,
        proposal_round: 1,
        thresholds: &thresholds,
    };
    let current = UniformAcceptor::default();
    let historic = UniformAcceptor {
        policy: UniformTimePolicy::ProposalRound,
    };
    assert!(!current.decide(4.0, 2.0, &context).accepted);
    assert!(historic.decide(4.0, 2.0, &context).accepted);
    assert!(!historic.decide(6.0, 2.0, &context).accepted);
}

#[test]
fn stochastic_acceptor_clamps_probability_and_reweights() {
    let acceptor = StochasticAcceptor::new(PdfMaxEval::TakeFromKernel { log_pdf_max: 0.0 });
    let mut rng = RngHandle::from_seed(5);
    let outcome = acceptor.decide(2.0, 1.0, &mut rng).expect("initialised");
    assert!(outcome.accepted);
    assert_eq!(outcome.probability, 1.0);
    assert!((outcome.weight - 2.0_f64.exp()).abs() < 1e-12);

    let below = acceptor.decide(-1.0, 2.0, &mut rng).expect("initialised");
    assert!((below.probability - (-0.5_f64).exp()).abs() < 1e-12);
    if below.accepted {
        assert!((below.weight - 1.0).abs() < 1e-12);
    }
}

#[test]
fn stochastic_acceptance_frequency_matches_probability() {
    let acceptor = StochasticAcceptor::new(PdfMaxEval::TakeFromKernel { log_pdf_max: 0.0 });
    let mut rng = RngHandle::from_seed(11);
    let trials = 20_000;
    let accepted = (0..trials)
        .filter(|_| {
            acceptor
                .decide(-2.0_f64.ln(), 1.0, &mut rng)
                .expect("initialised")
                .accepted
        })
        .count();
    let rate = accepted as f64 / trials as f64;
    assert!((rate - 0.5).abs() < 0.02, "rate {rate}");
}

#[test]
fn stochastic_acceptor_requires_normalisation_and_temperature() {
    let mut rng = RngHandle::from_seed(3);
    let mut acceptor = StochasticAcceptor::new(PdfMaxEval::TakeMaxFound);
    let err = acceptor.decide(-1.0, 1.0, &mut rng).unwrap_err();
    assert_eq!(err.code(), "acceptor-uninitialized");

    acceptor.update(&[particle_with_density(-3.0), particle_with_density(-1.0)]);
    assert_eq!(acceptor.pdf_norm(), Some(-1.0));
    let err = acceptor.decide(-1.0, 0.0, &mut rng).unwrap_err();
    assert_eq!(err.code(), "invalid-temperature");
}

#[test]
fn max_found_normalisation_never_decreases() {
    let mut acceptor = Acceptor::Stochastic(StochasticAcceptor::new(PdfMaxEval::TakeMaxFound));
    acceptor.update(&[particle_with_density(-2.0)]);
    assert_eq!(acceptor.pdf_norm(), Some(-2.0));
    acceptor.update(&[particle_with_density(-5.0), particle_with_density(f64::NAN)]);
    assert_eq!(acceptor.pdf_norm(), Some(-2.0));
    acceptor.update(&[particle_with_density(-0.5)]);
    assert_eq!(acceptor.pdf_norm(), Some(-0.5));
}

#[test]
fn kernel_maximum_is_fixed() {
    let kernel = NormalKernel { sd: 1.0 };
    let pdf_max = PdfMaxEval::from_kernel(&kernel);
    let stochastic = StochasticAcceptor::new(pdf_max);
    assert_eq!(stochastic.pdf_max(), pdf_max);
    let mut acceptor = Acceptor::Stochastic(stochastic);
    let expected = kernel.log_pdf_max();
    acceptor.update(&[particle_with_density(expected + 3.0)]);
    assert_eq!(acceptor.pdf_norm(), Some(expected));
    assert_eq!(Acceptor::default().pdf_norm(), None);
}

#[test]
fn unbounded_density_is_a_simulation_error() {
    let acceptor = StochasticAcceptor::new(PdfMaxEval::TakeFromKernel { log_pdf_max: 0.0 });
    let mut rng = RngHandle::from_seed(8);
    let err = acceptor.decide(f64::INFINITY, 1.0, &mut rng).unwrap_err();
    assert_eq!(err.code(), "non-finite-density");
    assert!(matches!(err, AbcError::Simulation(_)));

    let err = acceptor.decide(800.0, 1.0, &mut rng).unwrap_err();
    assert_eq!(err.code(), "non-finite-density");
}
