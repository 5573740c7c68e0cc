extern crate pontryagin_ascent as ascent;

use approx::abs_diff_eq;
use ascent::dynamics::StateCostate;
use ascent::md::SolutionError;
use ascent::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::{launch_epoch, leo_context, upper_stage, EARTH_GM};

fn check_solution(solution: &Solution, stage: &Stage) {
    assert!(
        solution.residuals().norm() < 1e-6,
        "terminal residual {:.3e}",
        solution.residuals().norm()
    );
    let burn = solution.burn_time().to_seconds();
    assert!(burn > 0.0, "burn time {burn} s");
    // Upper bound of the burn time of a stage which would burn all its mass
    assert!(burn < stage.exhaust_velocity() * stage.mass / stage.thrust);

    // Continuity across every arc boundary
    for pair in solution.segments.windows(2) {
        let end = pair[0].terminal().unwrap();
        let start = pair[1].initial().unwrap();
        assert_eq!(StateCostate::radius(end), StateCostate::radius(start));
        assert_eq!(StateCostate::velocity(end), StateCostate::velocity(start));
        assert!(abs_diff_eq!(StateCostate::primer(end), StateCostate::primer(start), epsilon = 1e-8));
        assert!(abs_diff_eq!(StateCostate::pos_costate(end), StateCostate::pos_costate(start), epsilon = 1e-8));
        assert!(abs_diff_eq!(pair[0].end(), pair[1].start, epsilon = 1e-12));
    }
    assert_eq!(solution.reports.len(), 3);
    for pair in solution.reports.windows(2) {
        assert_eq!(pair[0].unknowns[0], pair[1].seed[0]);
    }
}

#[test]
fn free_plane_single_stage() {
    let _ = pretty_env_logger::try_init();
    let ctx = leo_context();
    let stage = upper_stage();
    let solution = ctx.bootstrap(&[stage], launch_epoch()).unwrap();
    println!("{solution}");
    check_solution(&solution, &stage);

    let start = solution.sample_at(launch_epoch()).unwrap();
    assert_eq!(start.position, Vector3::new(6_378_137.0, 0.0, 0.0));
    assert!(abs_diff_eq!(start.mass, stage.mass, epsilon = 1e-9));
    assert!(abs_diff_eq!(start.thrust_direction.norm(), 1.0, epsilon = 1e-9));

    let end = solution.sample_at(solution.end_epoch()).unwrap();
    assert!(abs_diff_eq!(end.position.norm(), 6_778_137.0, epsilon = 1.0));
    assert!(abs_diff_eq!(end.velocity.norm(), (EARTH_GM / 6_778_137.0_f64).sqrt(), epsilon = 1e-3));
    assert_eq!(end.throttle, 1.0);
    assert!(end.mass < stage.mass);

    assert!(matches!(
        solution.sample_at(solution.end_epoch() + 1.0 * Unit::Minute),
        Err(SolutionError::OutOfSolution { .. })
    ));
}

#[test]
fn fixed_plane_single_stage() {
    let _ = pretty_env_logger::try_init();
    let mut ctx = leo_context();
    let radius = 6_778_137.0;
    let speed = (EARTH_GM / radius).sqrt();
    // Momentum of the current plane in the host convention, (x, z, y) and pointing the other way
    ctx.set_boundary_mode(BoundaryMode::FixedPlane {
        radius,
        speed,
        fpa: 0.0,
        momentum: Vector3::new(0.0, -radius * speed, 0.0),
    })
    .unwrap();
    let stage = upper_stage();
    let solution = ctx.bootstrap(&[stage], launch_epoch()).unwrap();
    check_solution(&solution, &stage);
}

#[test]
fn zero_thrust_fails() {
    let _ = pretty_env_logger::try_init();
    let ctx = leo_context();
    let stage = Stage::new(10_000.0, 0.0, 300.0, 8_000.0);
    match ctx.bootstrap(&[stage], launch_epoch()) {
        Err(AscentError::IntegrationDivergence { .. })
        | Err(AscentError::OptimizerNonConvergence { .. }) => {}
        other => panic!("a vehicle without thrust cannot reach orbit, got {other:?}"),
    }
}

#[test]
fn background_bootstrap() {
    let ctx = leo_context();
    let stages = vec![upper_stage()];
    let expected = ctx.bootstrap(&stages, launch_epoch()).unwrap();

    let handle = ctx.spawn_bootstrap(stages.clone(), launch_epoch());
    let solution = handle.join().unwrap();
    assert_eq!(solution.unknowns, expected.unknowns);

    // A flag raised before the spawn stops the worker before the first stage
    let cancel = Arc::new(AtomicBool::new(true));
    let handle = ctx.spawn_bootstrap_with(stages.clone(), launch_epoch(), cancel);
    assert!(matches!(
        handle.join(),
        Err(AscentError::Cancelled {
            stage: BootstrapStage::Relaxed,
            ..
        })
    ));

    // Cancelling a running worker either stops it or lets it finish
    let handle = ctx.spawn_bootstrap(stages, launch_epoch());
    handle.cancel();
    match handle.join() {
        Ok(solution) => assert_eq!(solution.unknowns, expected.unknowns),
        Err(AscentError::Cancelled { .. }) => {}
        Err(e) => panic!("unexpected error {e}"),
    }
}

#[test]
fn two_stage_ascent() {
    let _ = pretty_env_logger::try_init();
    let ctx = leo_context();
    let booster = Stage::new(30_000.0, 60_000.0, 300.0, 200.0);
    let stage = upper_stage();
    let solution = ctx.bootstrap(&[booster, stage], launch_epoch()).unwrap();
    println!("{solution}");
    check_solution(&solution, &stage);
    // Booster burn, coast, upper stage burn
    assert_eq!(solution.segments.len(), 3);
    assert!(solution.burn_time().to_seconds() > booster.max_burn_time);

    let before = solution.sample_at(launch_epoch() + 199.0 * Unit::Second).unwrap();
    assert_eq!(before.arc, 0);
    assert!(abs_diff_eq!(
        before.mass,
        booster.mass - 199.0 * booster.mass_flow(),
        epsilon = 1e-3
    ));
    // The booster is dropped at burnout
    let after = solution.sample_at(launch_epoch() + 201.0 * Unit::Second).unwrap();
    assert!(after.arc > 0);
    assert!(after.mass <= stage.mass + 1e-9);
    assert!(after.mass > stage.mass - 2.0 * stage.mass_flow());
}
