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

use crate::linalg::SVector;
use snafu::Snafu;

/// The state and costate equations of motion of a thrusting vehicle in a central gravity field.
pub mod costate;
pub use self::costate::StateCostate;

/// The `Dynamics` trait handles and stores any equation of motion *and* the state is integrated.
///
/// Its design is such that several of the provided dynamics can be combined fairly easily. However,
/// when combining the dynamics (e.g. integrating both the attitude of a spaceraft and its orbital
///  parameters), it is up to the implementor to handle time and state organization correctly.
/// The state is always a statically sized vector of canonical quantities.
pub trait Dynamics<const N: usize>: Clone + Sync + Send {
    /// Defines the equations of motion.
    ///
    /// - `delta_t`: canonical time past the start of the propagation.
    /// - `state_vec`: The state vector, which changes at each integration step.
    fn eom(
        &self,
        delta_t: f64,
        state_vec: &SVector<f64, N>,
    ) -> Result<SVector<f64, N>, DynamicsError>;

    /// Performs final changes after each successful integration step.
    ///
    /// Also called before the first integration step to update the initial state if needed.
    fn finally(&self, next_state: SVector<f64, N>) -> Result<SVector<f64, N>, DynamicsError> {
        Ok(next_state)
    }
}

/// Dynamical model errors.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    /// The derivative could not be computed, usually because the state crossed the center of the attracting body.
    #[snafu(display("non finite derivative {elapsed:.6} canonical time units into the arc"))]
    NonFiniteDerivative { elapsed: f64 },
    /// The burn continued past the point where the stage has no mass left.
    #[snafu(display("stage #{stage} depleted its mass {elapsed:.6} canonical time units into its burn"))]
    MassDepleted { stage: usize, elapsed: f64 },
}
