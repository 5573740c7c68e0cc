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

use super::{
    CancelledSnafu, Convergence, DivergenceSnafu, NonConvergenceSnafu, RootFinder, ShootingError,
};
use crate::linalg::{DMatrix, DVector};
use crate::md::ShootingProblem;
use crate::propagators::PropagationError;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// Smallest damping used after a long run of successful steps.
const MIN_DAMPING: f64 = 1e-12;
/// Floor of the diagonal scaling of the damping term.
const DIAG_FLOOR: f64 = 1e-12;

/// Settings of the damped Newton root finder.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct NewtonOpts {
    /// Convergence threshold on the Euclidean norm of the residual
    #[builder(default = 1e-10)]
    pub tolerance: f64,
    #[builder(default = 200)]
    pub max_iterations: usize,
    /// Relative forward difference step, scaled by `max(1, |x_j|)`
    #[builder(default = 1e-7)]
    pub fd_step: f64,
    /// Largest norm of a single correction
    #[builder(default = 2.0)]
    pub max_step: f64,
    #[builder(default = 1e-3)]
    pub initial_damping: f64,
    /// The solver gives up once the damping exceeds this value
    #[builder(default = 1e16)]
    pub max_damping: f64,
    /// Evaluates the Jacobian columns on the rayon thread pool
    #[builder(default = false)]
    pub parallel_jacobian: bool,
}

impl Default for NewtonOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A Levenberg-Marquardt flavored Newton solver: each correction solves
/// `(JᵀJ + λ diag(JᵀJ)) δ = -Jᵀz` and is only accepted if it keeps the final burn positive and
/// reduces the residual norm.
#[derive(Clone, Debug, Default)]
pub struct DampedNewton {
    pub opts: NewtonOpts,
    cancel: Option<Arc<AtomicBool>>,
}

impl DampedNewton {
    pub fn new(opts: NewtonOpts) -> Self {
        Self { opts, cancel: None }
    }

    /// The solver stops with a cancellation error at the next iteration after this flag is raised.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn column(
        &self,
        problem: &ShootingProblem,
        x: &DVector<f64>,
        z: &DVector<f64>,
        j: usize,
    ) -> Result<DVector<f64>, PropagationError> {
        let step = self.opts.fd_step * x[j].abs().max(1.0);
        let mut pert = x.clone();
        pert[j] += step;
        // Use the step actually represented in floating point
        let step = pert[j] - x[j];
        Ok((problem.residuals(&pert)? - z) / step)
    }

    /// Forward difference Jacobian of the residual at `x`, where the residual is `z`.
    pub fn jacobian(
        &self,
        problem: &ShootingProblem,
        x: &DVector<f64>,
        z: &DVector<f64>,
    ) -> Result<DMatrix<f64>, PropagationError> {
        let columns = if self.opts.parallel_jacobian {
            (0..x.len())
                .into_par_iter()
                .map(|j| self.column(problem, x, z, j))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            (0..x.len())
                .map(|j| self.column(problem, x, z, j))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(DMatrix::from_columns(&columns))
    }
}

impl RootFinder for DampedNewton {
    fn solve(
        &self,
        problem: &ShootingProblem,
        guess: &DVector<f64>,
    ) -> Result<Convergence, ShootingError> {
        let mut x = guess.clone();
        let mut z = problem
            .residuals(&x)
            .context(DivergenceSnafu { unknowns: x.clone() })?;
        let mut damping = self.opts.initial_damping;

        for it in 0..self.opts.max_iterations {
            let norm = z.norm();
            debug!("#{it} residual norm = {norm:.6e}, damping = {damping:.1e}");
            if norm < self.opts.tolerance {
                return Ok(Convergence {
                    unknowns: x,
                    residuals: z,
                    iterations: it,
                });
            }
            ensure!(!self.cancelled(), CancelledSnafu { iterations: it });

            let jac = self
                .jacobian(problem, &x, &z)
                .context(DivergenceSnafu { unknowns: x.clone() })?;
            let jtj = jac.transpose() * &jac;
            let grad = jac.transpose() * &z;

            loop {
                ensure!(
                    damping <= self.opts.max_damping,
                    NonConvergenceSnafu {
                        iterations: it,
                        residual_norm: norm,
                        unknowns: x.clone(),
                    }
                );

                let mut lhs = jtj.clone();
                for i in 0..lhs.nrows() {
                    lhs[(i, i)] += damping * jtj[(i, i)].max(DIAG_FLOOR);
                }
                let Some(chol) = lhs.cholesky() else {
                    damping *= 10.0;
                    continue;
                };
                let mut delta = -chol.solve(&grad);
                let step_norm = delta.norm();
                if !step_norm.is_finite() {
                    damping *= 10.0;
                    continue;
                }
                if step_norm > self.opts.max_step {
                    delta *= self.opts.max_step / step_norm;
                }

                let trial = &x + &delta;
                if !problem.admissible(&trial) {
                    trace!("rejected step of {step_norm:.3e}: non positive final burn");
                    damping *= 10.0;
                    continue;
                }
                match problem.residuals(&trial) {
                    Ok(trial_z) if trial_z.norm() < norm => {
                        x = trial;
                        z = trial_z;
                        damping = (damping / 10.0).max(MIN_DAMPING);
                        break;
                    }
                    Ok(trial_z) => {
                        trace!(
                            "rejected step of {step_norm:.3e}: residual norm {:.6e}",
                            trial_z.norm()
                        );
                        damping *= 10.0;
                    }
                    Err(e) => {
                        warn!("rejected step of {step_norm:.3e}: {e}");
                        damping *= 10.0;
                    }
                }
            }
        }

        let residual_norm = z.norm();
        if residual_norm < self.opts.tolerance {
            Ok(Convergence {
                unknowns: x,
                residuals: z,
                iterations: self.opts.max_iterations,
            })
        } else {
            NonConvergenceSnafu {
                iterations: self.opts.max_iterations,
                residual_norm,
                unknowns: x,
            }
            .fail()
        }
    }
}
