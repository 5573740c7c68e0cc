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

use super::{Dynamics, DynamicsError, NonFiniteDerivativeSnafu};
use crate::linalg::{SVector, Vector3};
use crate::md::Arc;
use crate::utils::{is_finite, unit_or_zero};
use snafu::ensure;
use std::fmt;

/// Size of the state and costate vector: position, velocity, velocity costate (primer vector),
/// position costate, and the time elapsed since the start of the arc.
pub const STATE_COSTATE_SIZE: usize = 13;

/// The canonical state and costate vector.
pub type StateCostateVector = SVector<f64, STATE_COSTATE_SIZE>;

/// Index of the first component of each block of the state and costate vector
pub const POS: usize = 0;
pub const VEL: usize = 3;
pub const PRIMER: usize = 6;
pub const POS_COSTATE: usize = 9;
pub const ARC_TIME: usize = 12;

/// Central force dynamics in canonical units (mu = 1), with thrust along the primer vector.
///
/// ```text
/// r'  = v
/// v'  = -r / |r|^3 + a(t) pv / |pv|
/// pv' = -pr
/// pr' = pv / |r|^3 - 3 (r . pv) r / |r|^5
/// t'  = 1
/// ```
///
/// Coast arcs have no thrust acceleration, but the costates still evolve under gravity.
#[derive(Clone, Copy, Debug)]
pub struct StateCostate {
    pub arc: Arc,
}

impl StateCostate {
    pub fn new(arc: Arc) -> Self {
        Self { arc }
    }

    /// Builds the state and costate vector at the start of an arc: the arc time is reset to zero.
    pub fn pack(
        r: &Vector3<f64>,
        v: &Vector3<f64>,
        pv: &Vector3<f64>,
        pr: &Vector3<f64>,
    ) -> StateCostateVector {
        let mut y = StateCostateVector::zeros();
        y.fixed_rows_mut::<3>(POS).copy_from(r);
        y.fixed_rows_mut::<3>(VEL).copy_from(v);
        y.fixed_rows_mut::<3>(PRIMER).copy_from(pv);
        y.fixed_rows_mut::<3>(POS_COSTATE).copy_from(pr);
        y
    }

    pub fn radius(y: &StateCostateVector) -> Vector3<f64> {
        y.fixed_rows::<3>(POS).into_owned()
    }

    pub fn velocity(y: &StateCostateVector) -> Vector3<f64> {
        y.fixed_rows::<3>(VEL).into_owned()
    }

    pub fn primer(y: &StateCostateVector) -> Vector3<f64> {
        y.fixed_rows::<3>(PRIMER).into_owned()
    }

    pub fn pos_costate(y: &StateCostateVector) -> Vector3<f64> {
        y.fixed_rows::<3>(POS_COSTATE).into_owned()
    }

    /// Hamiltonian of the unpowered motion, `pr . v - pv . r / |r|^3`.
    ///
    /// It is conserved along a coast.
    pub fn coast_hamiltonian(y: &StateCostateVector) -> f64 {
        let r = Self::radius(y);
        let rmag = r.norm();
        Self::pos_costate(y).dot(&Self::velocity(y)) - Self::primer(y).dot(&r) / rmag.powi(3)
    }

    /// Full Hamiltonian on this arc at the provided state, i.e. including the thrust term.
    pub fn hamiltonian(&self, y: &StateCostateVector) -> Result<f64, DynamicsError> {
        let accel = self.arc.thrust_accel(y[ARC_TIME])?;
        Ok(Self::coast_hamiltonian(y) + accel * Self::primer(y).norm())
    }
}

impl fmt::Display for StateCostate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "state-costate dynamics on {}", self.arc)
    }
}

impl Dynamics<STATE_COSTATE_SIZE> for StateCostate {
    fn eom(
        &self,
        _delta_t: f64,
        state: &StateCostateVector,
    ) -> Result<StateCostateVector, DynamicsError> {
        let r = Self::radius(state);
        let v = Self::velocity(state);
        let pv = Self::primer(state);
        let pr = Self::pos_costate(state);

        let rmag = r.norm();
        let r3 = rmag.powi(3);
        let r5 = rmag.powi(5);

        let accel = self.arc.thrust_accel(state[ARC_TIME])?;
        let thrust_dir = unit_or_zero(&pv);

        let v_dot = -r / r3 + accel * thrust_dir;
        let pv_dot = -pr;
        let pr_dot = pv / r3 - 3.0 * r.dot(&pv) * r / r5;

        let mut d_x = StateCostateVector::zeros();
        d_x.fixed_rows_mut::<3>(POS).copy_from(&v);
        d_x.fixed_rows_mut::<3>(VEL).copy_from(&v_dot);
        d_x.fixed_rows_mut::<3>(PRIMER).copy_from(&pv_dot);
        d_x.fixed_rows_mut::<3>(POS_COSTATE).copy_from(&pr_dot);
        d_x[ARC_TIME] = 1.0;

        ensure!(
            is_finite(&d_x),
            NonFiniteDerivativeSnafu {
                elapsed: state[ARC_TIME]
            }
        );

        Ok(d_x)
    }
}

#[cfg(test)]
mod ut_costate {
    use super::*;
    use approx::abs_diff_eq;
    use crate::md::Arc;

    #[test]
    fn coast_is_keplerian() {
        let dyn_ = StateCostate::new(Arc::coast());
        let y = StateCostate::pack(
            &Vector3::new(2.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.5, 0.0),
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::new(0.3, 0.0, 0.0),
        );
        let d_x = dyn_.eom(0.0, &y).unwrap();
        assert_eq!(StateCostate::radius(&d_x), Vector3::new(0.0, 0.5, 0.0));
        assert!((d_x[VEL] + 0.25).abs() < 1e-15);
        assert_eq!(StateCostate::primer(&d_x), Vector3::new(-0.3, 0.0, 0.0));
        // pv is orthogonal to r, so only the 1/r^3 term remains
        assert!(abs_diff_eq!(d_x[POS_COSTATE + 1], 0.125, epsilon = 1e-15));
        assert_eq!(d_x[ARC_TIME], 1.0);
    }

    #[test]
    fn thrust_is_along_the_primer() {
        let arc = Arc::burn_canonical(0.1, 2.0, 5.0, 10_000.0, 0);
        let dyn_ = StateCostate::new(arc);
        let y = StateCostate::pack(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::new(0.0, 0.0, 4.0),
            &Vector3::zeros(),
        );
        let d_x = dyn_.eom(0.0, &y).unwrap();
        assert!(abs_diff_eq!(d_x[VEL + 2], 0.1, epsilon = 1e-15));
        assert!(abs_diff_eq!(dyn_.hamiltonian(&y).unwrap(), 0.4, epsilon = 1e-15));
    }

    #[test]
    fn singular_position_is_an_error() {
        let dyn_ = StateCostate::new(Arc::coast());
        let y = StateCostateVector::zeros();
        assert!(matches!(
            dyn_.eom(0.0, &y),
            Err(DynamicsError::NonFiniteDerivative { .. })
        ));
    }
}
