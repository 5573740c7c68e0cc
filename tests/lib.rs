mod mission_design;
mod propagation;

use pontryagin_ascent::prelude::*;

pub(crate) const EARTH_GM: f64 = 3.986e14;

pub(crate) fn launch_epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2024, 1, 1)
}

/// Just below circular speed at the Earth's equatorial radius, with a target 400 km higher.
pub(crate) fn leo_context() -> SolverContext {
    let mut ctx = SolverContext::initialize(
        EARTH_GM,
        Vector3::new(6_378_137.0, 0.0, 0.0),
        Vector3::new(0.0, 7_800.0, 0.0),
        Vector3::zeros(),
        Vector3::zeros(),
        350.0,
    )
    .unwrap();
    ctx.set_boundary_mode(BoundaryMode::FreePlane {
        radius: 6_778_137.0,
        speed: (EARTH_GM / 6_778_137.0_f64).sqrt(),
        fpa: 0.0,
        inclination: ctx.current_inclination(),
    })
    .unwrap();
    ctx
}

pub(crate) fn upper_stage() -> Stage {
    Stage::new(10_000.0, 1_000.0, 300.0, 8_000.0)
}
