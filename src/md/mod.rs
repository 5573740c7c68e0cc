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

/// Stages, arcs and the layout of the unknown vector.
pub mod arc;
pub use arc::{Arc, ArcKind, Stage};

mod boundary;
pub use boundary::{BoundaryCondition, BoundaryMode};

/// Propagation of the state and costates across every arc, and the shooting residual.
pub mod integrate;
pub use integrate::{ArcBoundary, ShootingProblem};

/// Root finders driving the shooting residual to zero.
pub mod opti;
pub use opti::{Convergence, DampedNewton, NewtonOpts, RootFinder, ShootingError};

mod bootstrap;
pub use bootstrap::{BootstrapHandle, BootstrapOpts, BootstrapStage, SolverContext, StageReport};

mod solution;
pub use solution::{Segment, SegmentSample, Solution, SolutionError, SolutionSample};
