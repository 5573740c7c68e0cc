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

use super::arc::{arc_durations, arc_index};
use super::{Arc, ShootingProblem};
use crate::linalg::DVector;
use crate::propagators::PropagationError;
use snafu::prelude::*;
use std::fmt;

/// Damped Newton iterations with a finite difference Jacobian.
pub mod newton;
pub use newton::{DampedNewton, NewtonOpts};

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ShootingError {
    #[snafu(display("propagation failed while evaluating the shooting residual: {source}"))]
    Divergence {
        source: PropagationError,
        unknowns: DVector<f64>,
    },
    #[snafu(display(
        "shooting did not converge after {iterations} iterations (residual norm {residual_norm:.3e})"
    ))]
    NonConvergence {
        iterations: usize,
        residual_norm: f64,
        unknowns: DVector<f64>,
    },
    #[snafu(display("converged to an infeasible solution: {reason}"))]
    Infeasible {
        reason: String,
        unknowns: DVector<f64>,
    },
    #[snafu(display("shooting cancelled after {iterations} iterations"))]
    Cancelled { iterations: usize },
}

/// A root of the shooting residual.
#[derive(Clone, Debug, PartialEq)]
pub struct Convergence {
    pub unknowns: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Number of Jacobian evaluations needed
    pub iterations: usize,
}

impl Convergence {
    pub fn residual_norm(&self) -> f64 {
        self.residuals.norm()
    }
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "converged in {} iterations (residual norm {:.3e})",
            self.iterations,
            self.residual_norm()
        )
    }
}

/// Anything that can drive the shooting residual of a problem to zero from an initial guess.
pub trait RootFinder: Send + Sync {
    fn solve(
        &self,
        problem: &ShootingProblem,
        guess: &DVector<f64>,
    ) -> Result<Convergence, ShootingError>;
}

/// Rejects roots which are not physical: a negative burn or coast duration, or a final burn which
/// outlasts its propellant. Coasts shorter than `-tolerance` are rejected, shorter ones are accepted.
pub fn classify(
    arcs: &[Arc],
    conv: Convergence,
    tolerance: f64,
) -> Result<Convergence, ShootingError> {
    let x = &conv.unknowns;
    let reason = if x.iter().any(|val| !val.is_finite()) {
        Some("non finite unknowns".to_string())
    } else if x[0] < 0.0 {
        Some(format!("negative total burn time ({:.6e})", x[0]))
    } else {
        let durations = arc_durations(arcs, x);
        let last = arcs.len() - 1;
        arcs.iter()
            .zip(&durations)
            .enumerate()
            .find_map(|(i, (arc, &duration))| {
                if arc.is_coast() && duration < -tolerance {
                    Some(format!(
                        "negative coast duration ({duration:.6e}) at x[{}]",
                        arc_index(arcs, i, true)
                    ))
                } else if !arc.is_coast() && i == last && duration < 0.0 {
                    Some(format!("negative final burn duration ({duration:.6e})"))
                } else if !arc.is_coast()
                    && i == last
                    && !arc.unbounded
                    && duration > arc.max_burn + tolerance
                {
                    Some(format!(
                        "final burn of {duration:.6} exceeds the stage burn time of {:.6}",
                        arc.max_burn
                    ))
                } else {
                    None
                }
            })
    };

    match reason {
        Some(reason) => InfeasibleSnafu {
            reason,
            unknowns: conv.unknowns,
        }
        .fail(),
        None => Ok(conv),
    }
}

#[cfg(test)]
mod ut_opti {
    use super::*;
    use crate::md::arc::{insert_coast, unknown_len};
    use crate::linalg::Vector3;

    fn converged(arcs: &[Arc], total: f64) -> Convergence {
        let mut unknowns = DVector::zeros(unknown_len(arcs));
        unknowns[0] = total;
        Convergence {
            unknowns,
            residuals: DVector::zeros(unknown_len(arcs)),
            iterations: 4,
        }
    }

    fn arcs() -> Vec<Arc> {
        vec![
            Arc::burn_canonical(0.2, 0.3, 1.0, 1000.0, 0),
            Arc::burn_canonical(0.1, 0.35, 2.0, 200.0, 1),
        ]
    }

    #[test]
    fn feasible_root() {
        let arcs = arcs();
        let conv = converged(&arcs, 2.5);
        assert_eq!(classify(&arcs, conv.clone(), 1e-8), Ok(conv));
    }

    #[test]
    fn negative_burn_time() {
        let arcs = arcs();
        let err = classify(&arcs, converged(&arcs, -0.1), 1e-8).unwrap_err();
        assert!(matches!(err, ShootingError::Infeasible { ref reason, .. } if reason.contains("total burn")));
        // The final burn cannot start before the previous stage burns out
        let err = classify(&arcs, converged(&arcs, 0.5), 1e-8).unwrap_err();
        assert!(matches!(err, ShootingError::Infeasible { ref reason, .. } if reason.contains("final burn")));
    }

    #[test]
    fn final_burn_limits() {
        let mut arcs = arcs();
        assert!(classify(&arcs, converged(&arcs, 3.5), 1e-8).is_err());
        arcs[1].unbounded = true;
        assert!(classify(&arcs, converged(&arcs, 3.5), 1e-8).is_ok());
    }

    #[test]
    fn coast_tolerance() {
        let (arcs, mut x) = insert_coast(
            &arcs(),
            &DVector::from_element(13, 2.0),
            1,
            &Vector3::x(),
            &Vector3::y(),
        );
        x[13] = -1e-10;
        let conv = Convergence {
            residuals: DVector::zeros(x.len()),
            unknowns: x.clone(),
            iterations: 1,
        };
        assert!(classify(&arcs, conv.clone(), 1e-8).is_ok());
        let mut conv = conv;
        conv.unknowns[13] = -1e-3;
        let err = classify(&arcs, conv, 1e-8).unwrap_err();
        assert!(matches!(err, ShootingError::Infeasible { ref reason, .. } if reason.contains("coast")));
    }
}
