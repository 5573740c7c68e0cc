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

use std::fmt;

use super::{ErrorCtrl, LargestError};
use typed_builder::TypedBuilder;

/// PropOpts stores the integrator options, including the minimum and maximum step sizes, and the
/// max error size. All durations are in canonical time units.
///
/// When `fixed_steps` is set, each call to `for_duration` splits the requested duration into exactly
/// that many equal steps, and the step sizes and tolerance are ignored. This makes the final state a
/// smooth function of the initial state and of the duration, which finite differencing relies on.
#[derive(Clone, Copy, Debug, TypedBuilder)]
#[builder(doc)]
pub struct PropOpts<E: ErrorCtrl> {
    #[builder(default = 1e-2)]
    pub init_step: f64,
    #[builder(default = 1e-6)]
    pub min_step: f64,
    #[builder(default = 0.1)]
    pub max_step: f64,
    #[builder(default = 1e-12)]
    pub tolerance: f64,
    #[builder(default = 50)]
    pub attempts: u8,
    #[builder(default, setter(strip_option))]
    pub fixed_steps: Option<usize>,
    pub error_ctrl: E,
}

impl<E: ErrorCtrl> PropOpts<E> {
    /// `with_adaptive_step` initializes an `PropOpts` such that the integrator is used with an
    ///  adaptive step size. The number of attempts is currently fixed to 50 (as in GMAT).
    pub fn with_adaptive_step(min_step: f64, max_step: f64, tolerance: f64, error_ctrl: E) -> Self {
        PropOpts {
            init_step: max_step,
            min_step,
            max_step,
            tolerance,
            attempts: 50,
            fixed_steps: None,
            error_ctrl,
        }
    }
}

impl<E: ErrorCtrl> fmt::Display for PropOpts<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fixed_steps {
            Some(steps) => write!(f, "fixed steps: {steps}"),
            None => write!(
                f,
                "min_step: {:e}, max_step: {:e}, tol: {:e}, attempts: {}",
                self.min_step, self.max_step, self.tolerance, self.attempts,
            ),
        }
    }
}

impl PropOpts<LargestError> {
    /// `with_fixed_steps` initializes an `PropOpts` such that every propagation is split into `steps` equal steps.
    pub fn with_fixed_steps(steps: usize) -> Self {
        PropOpts {
            fixed_steps: Some(steps),
            ..Default::default()
        }
    }
}

impl Default for PropOpts<LargestError> {
    fn default() -> PropOpts<LargestError> {
        PropOpts {
            init_step: 1e-2,
            min_step: 1e-6,
            max_step: 0.1,
            tolerance: 1e-12,
            attempts: 50,
            fixed_steps: None,
            error_ctrl: LargestError,
        }
    }
}

#[test]
fn test_options() {
    use approx::abs_diff_eq;

    let opts = PropOpts::with_fixed_steps(200);
    assert_eq!(opts.fixed_steps, Some(200));
    assert_eq!(format!("{opts}"), "fixed steps: 200");

    let opts = PropOpts::with_adaptive_step(1e-4, 0.5, 1e-10, LargestError);
    assert_eq!(opts.init_step, 0.5);
    assert_eq!(opts.min_step, 1e-4);
    assert!(abs_diff_eq!(opts.tolerance, 1e-10, epsilon = f64::EPSILON));
    assert!(opts.fixed_steps.is_none());

    let opts = PropOpts::builder()
        .init_step(1.0)
        .error_ctrl(LargestError)
        .build();
    assert_eq!(opts.attempts, 50);
    assert_eq!(opts.init_step, 1.0);
}
