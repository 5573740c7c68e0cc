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

// This determines when to take into consideration the magnitude of the state_delta -- prevents dividing by too small of a number.
const REL_ERR_THRESH: f64 = 0.1;

/// The Error Control trait manages how a propagator computes the error in the current step.
pub trait ErrorCtrl: Copy + Send + Sync {
    /// Computes the actual error of the current step.
    ///
    /// The `error_est` is the estimated error computed from the difference in the two stages of
    /// of the RK propagator. The `candidate` variable is the candidate state, and `cur_state` is
    /// the current state. This function must return the error.
    fn estimate<const N: usize>(
        error_est: &SVector<f64, N>,
        candidate: &SVector<f64, N>,
        cur_state: &SVector<f64, N>,
    ) -> f64;
}

/// A largest error control which effectively computes the largest error at each component
///
/// This is a standard error computation algorithm, but it's argubly bad if the state's components have different units.
/// It calculates the largest local estimate of the error from the integration (`error_est`)
/// given the difference in the candidate state and the previous state (`state_delta`).
/// In canonical units all the components of the shooting state are of order one, so this is the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct LargestError;

impl ErrorCtrl for LargestError {
    fn estimate<const N: usize>(
        error_est: &SVector<f64, N>,
        candidate: &SVector<f64, N>,
        cur_state: &SVector<f64, N>,
    ) -> f64 {
        let state_delta = candidate - cur_state;
        let mut max_err = 0.0;
        for (i, prop_err_i) in error_est.iter().enumerate() {
            let err = if state_delta[i].abs() > REL_ERR_THRESH {
                (prop_err_i / state_delta[i]).abs()
            } else {
                prop_err_i.abs()
            };
            if err > max_err {
                max_err = err;
            }
        }
        max_err
    }
}

#[cfg(test)]
mod ut_error_ctrl {
    use super::*;
    use approx::abs_diff_eq;
    use crate::linalg::Vector3;

    #[test]
    fn largest_error_is_relative_for_large_deltas() {
        let cur = Vector3::new(0.0, 0.0, 0.0);
        let cand = Vector3::new(1.0, 0.01, 0.0);
        let err = Vector3::new(1e-6, 1e-7, 0.0);
        // First component is relative to its delta, second is absolute
        let est = LargestError::estimate(&err, &cand, &cur);
        assert!(abs_diff_eq!(est, 1e-6, epsilon = 1e-18));

        let err = Vector3::new(1e-8, 1e-7, 0.0);
        let est = LargestError::estimate(&err, &cand, &cur);
        assert!(abs_diff_eq!(est, 1e-7, epsilon = 1e-18));
    }
}
