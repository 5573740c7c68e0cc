extern crate pontryagin_ascent as ascent;

use ascent::dynamics::costate::{StateCostateVector, ARC_TIME};
use ascent::dynamics::{DynamicsError, StateCostate};
use ascent::linalg::Vector3;
use ascent::md::Arc;
use ascent::propagators::*;
use approx::abs_diff_eq;
use rstest::*;
use std::f64::consts::TAU;

#[fixture]
fn circular() -> StateCostateVector {
    StateCostate::pack(&Vector3::x(), &Vector3::y(), &Vector3::y(), &Vector3::zeros())
}

#[rstest]
#[case::dormand(IntegrationMethod::Dormand45)]
#[case::verner(IntegrationMethod::Verner56)]
#[case::rk4(IntegrationMethod::RK4)]
fn circular_period_fixed(circular: StateCostateVector, #[case] method: IntegrationMethod) {
    let prop = Propagator::with_method(
        method,
        StateCostate::new(Arc::coast()),
        PropOpts::with_fixed_steps(2_000),
    );
    let mut instance = prop.with(circular);
    let end = instance.for_duration(TAU).unwrap();
    assert_eq!(instance.time, TAU);
    let err = (StateCostate::radius(&end) - Vector3::x()).norm();
    assert!(err < 1e-8, "{method} position error {err:.3e} after one period");
    assert!(abs_diff_eq!(StateCostate::velocity(&end), Vector3::y(), epsilon = 1e-8));
    assert!(abs_diff_eq!(end[ARC_TIME], TAU, epsilon = 1e-9));
}

#[rstest]
#[case::dormand(IntegrationMethod::Dormand45)]
#[case::verner(IntegrationMethod::Verner56)]
fn circular_period_adaptive(circular: StateCostateVector, #[case] method: IntegrationMethod) {
    let opts = PropOpts::with_adaptive_step(1e-6, 0.1, 1e-12, LargestError);
    let prop = Propagator::with_method(method, StateCostate::new(Arc::coast()), opts);
    let mut instance = prop.with(circular);
    let end = instance.for_duration(TAU).unwrap();
    assert!(abs_diff_eq!(StateCostate::radius(&end), Vector3::x(), epsilon = 1e-8));
    assert!(instance.details.step <= 0.1);

    // And back again
    let start = instance.for_duration(-TAU).unwrap();
    assert!(abs_diff_eq!(StateCostate::radius(&start), Vector3::x(), epsilon = 1e-8));
    assert!(instance.time.abs() < 1e-12);
}

#[rstest]
fn recorded_samples(circular: StateCostateVector) {
    let prop = Propagator::dp45(StateCostate::new(Arc::coast()), PropOpts::default());
    let (end, samples) = prop.with(circular).for_duration_with_samples(1.0).unwrap();
    assert!(samples.len() > 2);
    assert_eq!(samples[0], (0.0, circular));
    assert_eq!(samples.last(), Some(&(1.0, end)));
    assert!(samples.windows(2).all(|pair| pair[0].0 < pair[1].0));

    let prop = Propagator::dp45(StateCostate::new(Arc::coast()), PropOpts::with_fixed_steps(10));
    let (_, samples) = prop.with(circular).for_duration_with_samples(1.0).unwrap();
    assert_eq!(samples.len(), 11);
}

#[rstest]
fn thrust_raises_energy(circular: StateCostateVector) {
    let energy = |y: &StateCostateVector| {
        StateCostate::velocity(y).norm_squared() / 2.0 - 1.0 / StateCostate::radius(y).norm()
    };
    let burn = Arc::burn_canonical(0.05, 0.5, 5.0, 1_000.0, 0);
    let prop = Propagator::dp45(StateCostate::new(burn), PropOpts::with_fixed_steps(200));
    let end = prop.with(circular).for_duration(1.0).unwrap();
    assert!(energy(&end) > energy(&circular));
}

#[test]
fn mass_depletion() {
    let y = StateCostate::pack(&Vector3::x(), &Vector3::y(), &Vector3::y(), &Vector3::zeros());
    // The mass ratio reaches zero after a unit of time
    let mut burn = Arc::burn_canonical(0.5, 0.5, 0.5, 1_000.0, 3);
    let prop = Propagator::dp45(StateCostate::new(burn), PropOpts::with_fixed_steps(100));
    match prop.with(y).for_duration(2.0) {
        Err(PropagationError::Dynamics {
            source: DynamicsError::MassDepleted { stage, .. },
        }) => assert_eq!(stage, 3),
        other => panic!("expected a mass depletion, got {other:?}"),
    }

    // Unbounded burns keep their burnout mass
    burn.unbounded = true;
    let prop = Propagator::dp45(StateCostate::new(burn), PropOpts::with_fixed_steps(100));
    assert!(prop.with(y).for_duration(2.0).is_ok());
}
