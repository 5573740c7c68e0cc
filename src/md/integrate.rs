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

use super::arc::{arc_durations, arc_index, costates, residual_len, set_costates, COSTATES_PER_ARC};
use super::{Arc, BoundaryCondition, Segment, SegmentSample};
use crate::dynamics::costate::{StateCostate, StateCostateVector, PRIMER, STATE_COSTATE_SIZE};
use crate::dynamics::Dynamics;
use crate::linalg::{DVector, Vector3};
use crate::propagators::{
    DynamicsSnafu, IntegrationMethod, LargestError, PropOpts, PropagationError, Propagator,
};
use crate::utils::fischer_burmeister;
use snafu::ResultExt;

/// Initial and terminal state and costates of an arc, as propagated in point mode.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ArcBoundary {
    /// Canonical time since the start of the ascent
    pub start: f64,
    pub duration: f64,
    pub initial: StateCostateVector,
    pub terminal: StateCostateVector,
}

/// Everything needed to evaluate the shooting residual of an unknown vector: the arcs, the canonical
/// initial state, the terminal constraints and the integration setup.
#[derive(Clone, Debug)]
pub struct ShootingProblem {
    pub arcs: Vec<Arc>,
    pub r0: Vector3<f64>,
    pub v0: Vector3<f64>,
    pub boundary: BoundaryCondition,
    pub prop_opts: PropOpts<LargestError>,
    pub method: IntegrationMethod,
}

impl ShootingProblem {
    pub fn new(
        arcs: Vec<Arc>,
        r0: Vector3<f64>,
        v0: Vector3<f64>,
        boundary: BoundaryCondition,
        prop_opts: PropOpts<LargestError>,
        method: IntegrationMethod,
    ) -> Self {
        Self {
            arcs,
            r0,
            v0,
            boundary,
            prop_opts,
            method,
        }
    }

    fn propagator(&self, arc: Arc) -> Propagator<StateCostate, LargestError, STATE_COSTATE_SIZE> {
        Propagator::with_method(self.method, StateCostate::new(arc), self.prop_opts)
    }

    /// Initial state of arc `i`: carried over position and velocity, costates from the unknowns.
    fn arc_initial(
        &self,
        x: &DVector<f64>,
        i: usize,
        r: &Vector3<f64>,
        v: &Vector3<f64>,
    ) -> StateCostateVector {
        let (pv, pr) = costates(&self.arcs, x, i);
        StateCostate::pack(r, v, &pv, &pr)
    }

    /// Propagates every arc and only keeps their initial and terminal states.
    pub fn point_mode(&self, x: &DVector<f64>) -> Result<Vec<ArcBoundary>, PropagationError> {
        let durations = arc_durations(&self.arcs, x);
        let mut r = self.r0;
        let mut v = self.v0;
        let mut start = 0.0;
        let mut boundaries = Vec::with_capacity(self.arcs.len());
        for (i, (arc, duration)) in self.arcs.iter().zip(durations).enumerate() {
            let initial = self.arc_initial(x, i, &r, &v);
            let prop = self.propagator(*arc);
            let terminal = prop.with(initial).for_duration(duration)?;
            r = StateCostate::radius(&terminal);
            v = StateCostate::velocity(&terminal);
            boundaries.push(ArcBoundary {
                start,
                duration,
                initial,
                terminal,
            });
            start += duration;
        }
        Ok(boundaries)
    }

    /// Propagates every arc and records each integration step with its derivative.
    pub fn full_mode(&self, x: &DVector<f64>) -> Result<Vec<Segment>, PropagationError> {
        let durations = arc_durations(&self.arcs, x);
        let mut r = self.r0;
        let mut v = self.v0;
        let mut start = 0.0;
        let mut segments = Vec::with_capacity(self.arcs.len());
        for (i, (arc, duration)) in self.arcs.iter().zip(durations).enumerate() {
            let initial = self.arc_initial(x, i, &r, &v);
            let prop = self.propagator(*arc);
            let (terminal, states) = prop.with(initial).for_duration_with_samples(duration)?;
            let samples = states
                .into_iter()
                .map(|(t, state)| {
                    let derivative = prop.dynamics.eom(t, &state).context(DynamicsSnafu)?;
                    Ok(SegmentSample {
                        time: start + t,
                        state,
                        derivative,
                    })
                })
                .collect::<Result<Vec<_>, PropagationError>>()?;
            r = StateCostate::radius(&terminal);
            v = StateCostate::velocity(&terminal);
            segments.push(Segment {
                arc: *arc,
                start,
                duration,
                samples,
            });
            start += duration;
        }
        Ok(segments)
    }

    /// Copies the terminal costates of each arc into the initial costates of the next one.
    pub fn seed_continuity(&self, x: &mut DVector<f64>) -> Result<(), PropagationError> {
        let durations = arc_durations(&self.arcs, x);
        let mut r = self.r0;
        let mut v = self.v0;
        for i in 0..self.arcs.len().saturating_sub(1) {
            let initial = self.arc_initial(x, i, &r, &v);
            let terminal = self
                .propagator(self.arcs[i])
                .with(initial)
                .for_duration(durations[i])?;
            r = StateCostate::radius(&terminal);
            v = StateCostate::velocity(&terminal);
            set_costates(
                &self.arcs,
                x,
                i + 1,
                &StateCostate::primer(&terminal),
                &StateCostate::pos_costate(&terminal),
            );
        }
        Ok(())
    }

    /// Evaluates the shooting residual of the unknown vector.
    pub fn residuals(&self, x: &DVector<f64>) -> Result<DVector<f64>, PropagationError> {
        let boundaries = self.point_mode(x)?;
        Ok(self.assemble(x, &boundaries))
    }

    /// Assembles the shooting residual from the propagated arc boundaries:
    /// `[terminal conditions (6), primer normalization, costate continuity (6 per internal
    /// boundary), coast complementarity (1 per coast)]`.
    pub fn assemble(&self, x: &DVector<f64>, boundaries: &[ArcBoundary]) -> DVector<f64> {
        let mut z = DVector::zeros(residual_len(&self.arcs));
        let (Some(first), Some(last)) = (boundaries.first(), boundaries.last()) else {
            return z;
        };
        z.fixed_rows_mut::<6>(0)
            .copy_from(&self.boundary.residuals(&last.terminal));
        // The costates are only defined up to a positive factor
        z[6] = 0.5 * (StateCostate::primer(&first.initial).norm_squared() - 1.0);

        let mut k = 7;
        for i in 1..boundaries.len() {
            let idx = arc_index(&self.arcs, i, false);
            for j in 0..COSTATES_PER_ARC {
                z[k + j] = x[idx + j] - boundaries[i - 1].terminal[PRIMER + j];
            }
            k += COSTATES_PER_ARC;
        }

        for (arc, boundary) in self.arcs.iter().zip(boundaries) {
            if arc.is_coast() {
                z[k] = fischer_burmeister(boundary.duration, primer_recovery(boundary));
                k += 1;
            }
        }
        z
    }

    /// Returns whether the unknown vector describes a flight of positive final burn duration.
    pub fn admissible(&self, x: &DVector<f64>) -> bool {
        let durations = arc_durations(&self.arcs, x);
        durations.iter().all(|duration| duration.is_finite())
            && durations.last().map_or(false, |duration| *duration > 0.0)
    }
}

/// Primer magnitude gained over a coast.
///
/// Without mass flow the switching function of the next burn follows the primer magnitude, so an
/// optimal coast of non zero duration ends once the primer has recovered the magnitude it started
/// with. A coast of zero duration recovers nothing and is always admissible.
pub fn primer_recovery(boundary: &ArcBoundary) -> f64 {
    StateCostate::primer(&boundary.terminal).norm() - StateCostate::primer(&boundary.initial).norm()
}
