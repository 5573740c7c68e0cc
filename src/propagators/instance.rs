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
use super::{
    DynamicsSnafu, IntegrationDetails, NonFiniteDurationSnafu, NonFiniteStateSnafu,
    PropagationError, Propagator,
};
use crate::dynamics::Dynamics;
use crate::linalg::SVector;
use crate::utils::is_finite;
use snafu::prelude::*;
use std::f64;

/// A propagated state and the canonical time at which it was reached.
pub type Sample<const N: usize> = (f64, SVector<f64, N>);

/// A Propagator allows propagating a set of dynamics forward or backward in time.
/// It includes the options, the integrator details of the previous step, and the set of
/// coefficients used for the monomorphic instance.
#[derive(Debug)]
pub struct PropInstance<'a, D: Dynamics<N>, E: ErrorCtrl, const N: usize> {
    /// The state of this propagator instance
    pub state: SVector<f64, N>,
    /// Canonical time elapsed since the instance was created
    pub time: f64,
    /// The propagator setup (kind, stages, etc.)
    pub prop: &'a Propagator<D, E, N>,
    /// Stores the details of the previous integration step
    pub details: IntegrationDetails,
    pub(crate) step_size: f64, // Stores the adapted step for the _next_ call
    pub(crate) fixed_step: bool,
    // Allows us to do pre-allocation of the ki vectors
    pub(crate) k: Vec<SVector<f64, N>>,
}

impl<D: Dynamics<N>, E: ErrorCtrl, const N: usize> PropInstance<'_, D, E, N> {
    /// Allows setting the step size of the propagator
    pub fn set_step(&mut self, step_size: f64, fixed: bool) {
        self.step_size = step_size;
        self.fixed_step = fixed;
    }

    fn record(&self, samples: &mut Option<&mut Vec<Sample<N>>>) {
        if let Some(samples) = samples {
            samples.push((self.time, self.state));
        }
    }

    fn for_duration_option(
        &mut self,
        duration: f64,
        mut samples: Option<&mut Vec<Sample<N>>>,
    ) -> Result<SVector<f64, N>, PropagationError> {
        ensure!(duration.is_finite(), NonFiniteDurationSnafu { duration });
        self.record(&mut samples);
        if duration == 0.0 {
            return Ok(self.state);
        }
        let stop_time = self.time + duration;
        // Call `finally` on the current state to set anything up
        self.state = self
            .prop
            .dynamics
            .finally(self.state)
            .context(DynamicsSnafu)?;

        if let Some(steps) = self.prop.opts.fixed_steps {
            let steps = steps.max(1);
            let prev_step_size = self.step_size;
            let prev_step_kind = self.fixed_step;
            self.set_step(duration / steps as f64, true);
            for _ in 0..steps {
                self.single_step()?;
                self.record(&mut samples);
            }
            // Remove the accumulated round-off on the final time
            self.time = stop_time;
            if let Some(samples) = samples {
                if let Some(last) = samples.last_mut() {
                    last.0 = stop_time;
                }
            }
            self.set_step(prev_step_size, prev_step_kind);
            return Ok(self.state);
        }

        let backprop = duration < 0.0;
        if backprop {
            self.step_size = -self.step_size; // Invert the step size
        }
        loop {
            let t = self.time;
            if (!backprop && t + self.step_size > stop_time)
                || (backprop && t + self.step_size <= stop_time)
            {
                if stop_time == t {
                    // No propagation necessary
                    if backprop {
                        self.step_size = -self.step_size;
                    }
                    return Ok(self.state);
                }
                // Take one final step of exactly the needed duration until the stop time
                let prev_step_size = self.step_size;
                let prev_step_kind = self.fixed_step;
                self.set_step(stop_time - t, true);

                self.single_step()?;
                self.time = stop_time;
                self.record(&mut samples);

                // Restore the step size for subsequent calls
                self.set_step(prev_step_size, prev_step_kind);

                if backprop {
                    self.step_size = -self.step_size; // Restore to a positive step size
                }

                return Ok(self.state);
            } else {
                self.single_step()?;
                self.record(&mut samples);
            }
        }
    }

    /// This method propagates the provided Dynamics for the provided duration (in canonical time units).
    pub fn for_duration(&mut self, duration: f64) -> Result<SVector<f64, N>, PropagationError> {
        self.for_duration_option(duration, None)
    }

    /// Propagates the provided Dynamics for the provided duration and returns the end state
    /// with every intermediate state, including the initial one.
    pub fn for_duration_with_samples(
        &mut self,
        duration: f64,
    ) -> Result<(SVector<f64, N>, Vec<Sample<N>>), PropagationError> {
        let mut samples = Vec::new();
        let end_state = self.for_duration_option(duration, Some(&mut samples))?;
        Ok((end_state, samples))
    }

    /// Take a single propagator step.
    pub fn single_step(&mut self) -> Result<(), PropagationError> {
        let (t, state_vec) = self.derive()?;
        self.time += t;
        self.state = self
            .prop
            .dynamics
            .finally(state_vec)
            .context(DynamicsSnafu)?;
        ensure!(
            is_finite(&self.state),
            NonFiniteStateSnafu { elapsed: self.time }
        );

        Ok(())
    }

    /// This method integrates whichever function is provided as `d_xdt`.
    ///
    /// This function returns the step sized used and the new state as y_{n+1} = y_n + \frac{dy_n}{dt}.
    /// To get the integration details, check `self.details`.
    fn derive(&mut self) -> Result<(f64, SVector<f64, N>), PropagationError> {
        let state_vec = self.state;
        let t0 = self.time;
        // Reset the number of attempts used (we don't reset the error because it's set before it's read)
        self.details.attempts = 1;
        // It's mutable because we may change it below
        let mut step_size = self.step_size;
        loop {
            let ki = self
                .prop
                .dynamics
                .eom(t0, &state_vec)
                .context(DynamicsSnafu)?;
            self.k[0] = ki;
            let mut a_idx: usize = 0;
            for i in 0..(self.prop.stages - 1) {
                // Let's compute the c_i by summing the relevant items from the list of coefficients.
                // \sum_{j=1}^{i-1} a_ij  ∀ i ∈ [2, s]
                let mut ci: f64 = 0.0;
                // The wi stores the a_{s1} * k_1 + a_{s2} * k_2 + ... + a_{s, s-1} * k_{s-1} +
                let mut wi = SVector::<f64, N>::zeros();
                for kj in &self.k[0..i + 1] {
                    let a_ij = self.prop.a_coeffs[a_idx];
                    ci += a_ij;
                    wi += a_ij * kj;
                    a_idx += 1;
                }

                let ki = self
                    .prop
                    .dynamics
                    .eom(t0 + ci * step_size, &(state_vec + step_size * wi))
                    .context(DynamicsSnafu)?;
                self.k[i + 1] = ki;
            }
            // Compute the next state and the error
            let mut next_state = state_vec;
            // State error estimation from https://en.wikipedia.org/wiki/Runge%E2%80%93Kutta_methods#Adaptive_Runge%E2%80%93Kutta_methods
            let mut error_est = SVector::<f64, N>::zeros();
            for (i, ki) in self.k.iter().enumerate() {
                let b_i = self.prop.b_coeffs[i];
                if !self.fixed_step {
                    let b_i_star = self.prop.b_coeffs[i + self.prop.stages];
                    error_est += step_size * (b_i - b_i_star) * ki;
                }
                next_state += step_size * b_i * ki;
            }

            if self.fixed_step {
                // Using a fixed step, no adaptive step necessary
                self.details.step = self.step_size;
                return Ok((self.details.step, next_state));
            } else {
                // Compute the error estimate.
                self.details.error = E::estimate(&error_est, &next_state, &state_vec);
                if self.details.error <= self.prop.opts.tolerance
                    || step_size.abs() <= self.prop.opts.min_step
                    || self.details.attempts >= self.prop.opts.attempts
                {
                    if self.details.attempts >= self.prop.opts.attempts {
                        warn!(
                            "Could not further decrease step size: maximum number of attempts reached ({})",
                            self.details.attempts
                        );
                    }

                    self.details.step = step_size;
                    if self.details.error < self.prop.opts.tolerance {
                        // Error is less than tolerance, let's attempt to increase the step for the next iteration.
                        let proposed_step = 0.9
                            * step_size
                            * (self.prop.opts.tolerance / self.details.error)
                                .powf(1.0 / f64::from(self.prop.order));
                        step_size = if proposed_step.abs() > self.prop.opts.max_step {
                            self.prop.opts.max_step.copysign(step_size)
                        } else {
                            proposed_step
                        };
                    }
                    // In all cases, let's update the step size to whatever was the adapted step size
                    self.step_size = step_size;
                    return Ok((self.details.step, next_state));
                } else {
                    // Error is too high and we aren't using the smallest step, and we haven't hit the max number of attempts.
                    // So let's adapt the step size.
                    self.details.attempts += 1;
                    let proposed_step = 0.9
                        * step_size
                        * (self.prop.opts.tolerance / self.details.error)
                            .powf(1.0 / f64::from(self.prop.order - 1));
                    step_size = if proposed_step.abs() < self.prop.opts.min_step {
                        self.prop.opts.min_step.copysign(step_size)
                    } else {
                        proposed_step
                    };
                    // Note that we don't set self.step_size, that will be updated right before we return
                }
            }
        }
    }
}
