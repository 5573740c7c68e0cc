/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

/*! # pontryagin-ascent

Open-loop optimal ascent guidance for multi-stage launch vehicles.

The solver poses the ascent as a two point boundary value problem from Pontryagin's
Minimum Principle (thrust along the primer vector), integrates the state and costates
across every burn and coast arc, and finds the initial costates and burn durations
with a damped Newton shooting method. A staged bootstrap (coast free with an unbounded
final burn, then with a coast, then with a finite final burn) walks the root finder from
a crude rocket equation guess to the final solution.

```
use pontryagin_ascent::prelude::*;

let mu = 3.986_004_418e14;
let r0 = Vector3::new(6_378_137.0, 0.0, 0.0);
let v0 = Vector3::new(0.0, 7_800.0, 0.0);

let mut ctx = SolverContext::initialize(mu, r0, v0, Vector3::zeros(), Vector3::zeros(), 350.0)
    .unwrap();
ctx.set_boundary_mode(BoundaryMode::FreePlane {
    radius: 6_778_137.0,
    speed: (mu / 6_778_137.0_f64).sqrt(),
    fpa: 0.0,
    inclination: ctx.current_inclination(),
})
.unwrap();

let stages = [Stage::new(10_000.0, 1_000.0, 300.0, 8_000.0)];
let epoch = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
let solution = ctx.bootstrap(&stages, epoch).unwrap();
assert!(solution.residuals().norm() < 1e-6);
let sample = solution.sample_at(epoch + 10.0 * Unit::Second).unwrap();
println!("{}", sample.thrust_direction);
```
*/

/// Provides the Runge Kutta integrators used to propagate the state and costates.
pub mod propagators;

/// Equations of motion: the generic dynamics trait and the central force state/costate model.
pub mod dynamics;

/// Canonical units, host frame conventions and orbit helpers.
pub mod cosmic;

/// Utility functions shared by different modules.
pub mod utils;

mod errors;
/// The solver (almost) never panics: every fallible operation returns one of these errors.
pub use self::errors::AscentError;

/// Mission configuration files.
pub mod io;

/// Arcs, boundary conditions, shooting, bootstrap and the resulting solution.
pub mod md;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Everything needed to set up and run an ascent solve.
pub mod prelude {
    pub use crate::cosmic::{HostFrame, Scaling};
    pub use crate::errors::AscentError;
    pub use crate::linalg::{DVector, Vector3};
    pub use crate::md::{
        BootstrapOpts, BootstrapStage, BoundaryMode, Solution, SolutionSample, SolverContext,
        Stage,
    };
    pub use crate::time::{Duration, Epoch, Unit};
}
