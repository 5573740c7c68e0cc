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

use super::error_ctrl::ErrorCtrl;
use super::{Dormand45, IntegrationDetails, PropInstance, PropOpts, RK4Fixed, Verner56, RK};
use crate::dynamics::Dynamics;
use crate::linalg::SVector;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Runge Kutta method used by the solver, selectable from a configuration file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationMethod {
    #[default]
    Dormand45,
    Verner56,
    RK4,
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Dormand45 => write!(f, "Dormand-Prince 5(4)"),
            Self::Verner56 => write!(f, "Verner 5(6)"),
            Self::RK4 => write!(f, "classic RK4"),
        }
    }
}

/// A Propagator allows propagating a set of dynamics forward or backward in time.
/// It includes the options and the set of coefficients used for the monomorphic instance.
#[derive(Clone, Debug)]
pub struct Propagator<D: Dynamics<N>, E: ErrorCtrl, const N: usize> {
    pub dynamics: D, // Stores the dynamics used. *Must* use this to get the latest values
    pub opts: PropOpts<E>, // Stores the integration options (tolerance, min/max step, init step, etc.)
    pub(crate) order: u8,  // Order of the integrator
    pub(crate) stages: usize, // Number of stages, i.e. how many times the derivatives will be called
    pub(crate) a_coeffs: &'static [f64],
    pub(crate) b_coeffs: &'static [f64],
    pub(crate) adaptive: bool,
}

impl<D: Dynamics<N>, E: ErrorCtrl, const N: usize> Propagator<D, E, N> {
    /// Each propagator must be initialized with `new` which stores propagator information.
    pub fn new<T: RK>(dynamics: D, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            stages: T::STAGES,
            order: T::ORDER,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
            adaptive: T::EMBEDDED,
        }
    }

    /// A Dormand Prince 5(4) propagator with custom propagator options.
    pub fn dp45(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<Dormand45>(dynamics, opts)
    }

    /// A Verner 5(6) propagator with custom propagator options.
    pub fn verner56(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<Verner56>(dynamics, opts)
    }

    /// Builds the propagator of the requested method.
    pub fn with_method(method: IntegrationMethod, dynamics: D, opts: PropOpts<E>) -> Self {
        match method {
            IntegrationMethod::Dormand45 => Self::new::<Dormand45>(dynamics, opts),
            IntegrationMethod::Verner56 => Self::new::<Verner56>(dynamics, opts),
            IntegrationMethod::RK4 => Self::new::<RK4Fixed>(dynamics, opts),
        }
    }

    /// Start an instance of this propagator from the provided state, at canonical time zero.
    pub fn with(&self, state: SVector<f64, N>) -> PropInstance<'_, D, E, N> {
        // Pre-allocate the k used in the propagator
        let k = vec![SVector::<f64, N>::zeros(); self.stages];
        PropInstance {
            state,
            time: 0.0,
            prop: self,
            details: IntegrationDetails {
                step: self.opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            step_size: self.opts.init_step,
            // Methods without an embedded error estimate always step with the initial step
            fixed_step: !self.adaptive,
            k,
        }
    }
}
