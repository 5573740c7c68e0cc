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

use super::{Arc, BoundaryCondition, StageReport};
use crate::cosmic::Scaling;
use crate::dynamics::costate::{StateCostate, StateCostateVector, ARC_TIME};
use crate::linalg::{DVector, Vector3, Vector6};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::unit_or_zero;
use snafu::prelude::*;
use std::fmt;

/// Slack allowed at both ends of the solution when sampling, in canonical time (about a microsecond).
const TIME_SLACK: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SolutionError {
    #[snafu(display("{req} is outside of the solution, which spans {start} to {end}"))]
    OutOfSolution {
        req: Epoch,
        start: Epoch,
        end: Epoch,
    },
}

/// A recorded state and its derivative, at a canonical time since the start of the ascent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentSample {
    pub time: f64,
    pub state: StateCostateVector,
    pub derivative: StateCostateVector,
}

/// The recorded trajectory of a single arc.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub arc: Arc,
    /// Canonical time since the start of the ascent
    pub start: f64,
    /// Canonical duration
    pub duration: f64,
    /// Samples in chronological order, at least the initial state
    pub samples: Vec<SegmentSample>,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn initial(&self) -> Option<&StateCostateVector> {
        self.samples.first().map(|sample| &sample.state)
    }

    pub fn terminal(&self) -> Option<&StateCostateVector> {
        self.samples.last().map(|sample| &sample.state)
    }

    /// Cubic Hermite interpolation of the state and costates at canonical time `t`.
    pub fn interpolate(&self, t: f64) -> Option<StateCostateVector> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        if t <= first.time {
            return (first.time - t <= TIME_SLACK).then_some(first.state);
        } else if t >= last.time {
            return (t - last.time <= TIME_SLACK).then_some(last.state);
        }
        // Index of the first sample strictly after t, which exists and isn't the first one
        let idx = self.samples.partition_point(|sample| sample.time <= t);
        let left = &self.samples[idx - 1];
        let right = &self.samples[idx];

        let h = right.time - left.time;
        let s = (t - left.time) / h;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        Some(
            h00 * left.state
                + (h10 * h) * left.derivative
                + h01 * right.state
                + (h11 * h) * right.derivative,
        )
    }
}

/// Steering information of the solution at a given epoch, in physical units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolutionSample {
    pub epoch: Epoch,
    /// Position in m
    pub position: Vector3<f64>,
    /// Velocity in m/s
    pub velocity: Vector3<f64>,
    /// Unit thrust direction, along the primer vector (also reported on coasts)
    pub thrust_direction: Vector3<f64>,
    /// One on burns, zero on coasts
    pub throttle: f64,
    /// Vehicle mass in kg
    pub mass: f64,
    /// Index of the arc this epoch belongs to
    pub arc: usize,
}

impl fmt::Display for SolutionSample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (arc #{}): r = {} m, v = {} m/s, u = {}, throttle = {}, mass = {:.3} kg",
            self.epoch,
            self.arc,
            self.position,
            self.velocity,
            self.thrust_direction,
            self.throttle,
            self.mass
        )
    }
}

/// A converged ascent: one recorded segment per arc, and everything needed to check it.
///
/// The solution is only ever built once every bootstrap stage converged.
#[derive(Clone, Debug)]
pub struct Solution {
    /// Epoch of the start of the ascent
    pub epoch: Epoch,
    pub scaling: Scaling,
    pub segments: Vec<Segment>,
    /// Converged unknown vector, in canonical units
    pub unknowns: DVector<f64>,
    /// Boundary condition the solution satisfies
    pub boundary: BoundaryCondition,
    /// Final state and costates, in canonical units
    pub terminal: StateCostateVector,
    /// Report of each bootstrap stage, in order
    pub reports: Vec<StageReport>,
}

impl Solution {
    /// Total burn time of all the stages
    pub fn burn_time(&self) -> Duration {
        self.scaling.unscale_time(self.unknowns[0]) * Unit::Second
    }

    /// Total duration of the ascent, burns and coasts included
    pub fn duration(&self) -> Duration {
        let end = self.segments.last().map_or(0.0, Segment::end);
        self.scaling.unscale_time(end) * Unit::Second
    }

    /// Total duration of the coasts
    pub fn coast_time(&self) -> Duration {
        let coast: f64 = self
            .segments
            .iter()
            .filter(|seg| seg.arc.is_coast())
            .map(|seg| seg.duration)
            .sum();
        self.scaling.unscale_time(coast) * Unit::Second
    }

    pub fn end_epoch(&self) -> Epoch {
        self.epoch + self.duration()
    }

    /// Re-evaluates the terminal boundary conditions on the final state and costates.
    pub fn residuals(&self) -> Vector6<f64> {
        self.boundary.residuals(&self.terminal)
    }

    /// Samples the solution at the provided epoch.
    pub fn sample_at(&self, epoch: Epoch) -> Result<SolutionSample, SolutionError> {
        let t = self.scaling.scale_time((epoch - self.epoch).to_seconds());
        let end = self.segments.last().map_or(0.0, Segment::end);
        ensure!(
            t >= -TIME_SLACK && t <= end + TIME_SLACK,
            OutOfSolutionSnafu {
                req: epoch,
                start: self.epoch,
                end: self.end_epoch()
            }
        );
        let t = t.clamp(0.0, end);
        // At a boundary between arcs, the later arc wins
        let (arc_idx, segment) = self
            .segments
            .iter()
            .enumerate()
            .rev()
            .find(|(_, seg)| seg.start <= t)
            .context(OutOfSolutionSnafu {
                req: epoch,
                start: self.epoch,
                end: self.end_epoch(),
            })?;
        let y = segment.interpolate(t).context(OutOfSolutionSnafu {
            req: epoch,
            start: self.epoch,
            end: self.end_epoch(),
        })?;

        Ok(SolutionSample {
            epoch,
            position: self.scaling.unscale_position(&StateCostate::radius(&y)),
            velocity: self.scaling.unscale_velocity(&StateCostate::velocity(&y)),
            thrust_direction: unit_or_zero(&StateCostate::primer(&y)),
            throttle: segment.arc.throttle(),
            mass: segment.arc.mass * segment.arc.mass_ratio(y[ARC_TIME]),
            arc: arc_idx,
        })
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ascent from {} over {} arcs: burn time {}, coast time {}, ends {} (|z| = {:.3e})",
            self.epoch,
            self.segments.len(),
            self.burn_time(),
            self.coast_time(),
            self.end_epoch(),
            self.residuals().norm()
        )
    }
}

#[cfg(test)]
mod ut_solution {
    use super::*;
    use approx::abs_diff_eq;

    /// Straight line motion at unit speed along X, sampled every 0.1 time units.
    fn line_segment(start: f64, arc: Arc) -> Segment {
        let samples = (0..=10)
            .map(|i| {
                let dt = 0.1 * i as f64;
                let mut state = StateCostateVector::zeros();
                state[0] = 1.0 + dt;
                state[3] = 1.0;
                state[6] = 1.0;
                state[ARC_TIME] = dt;
                let mut derivative = StateCostateVector::zeros();
                derivative[0] = 1.0;
                derivative[ARC_TIME] = 1.0;
                SegmentSample {
                    time: start + dt,
                    state,
                    derivative,
                }
            })
            .collect();
        Segment {
            arc,
            start,
            duration: 1.0,
            samples,
        }
    }

    #[test]
    fn hermite_is_exact_for_cubics() {
        let seg = line_segment(2.0, Arc::coast());
        let y = seg.interpolate(2.537).unwrap();
        assert!(abs_diff_eq!(y[0], 1.537, epsilon = 1e-14));
        assert!(abs_diff_eq!(y[ARC_TIME], 0.537, epsilon = 1e-14));
        assert!(seg.interpolate(1.5).is_none());
        assert!(seg.interpolate(3.0 + 1e-6).is_none());
        assert_eq!(seg.interpolate(3.0), seg.terminal().copied());
    }

    #[test]
    fn sampling_out_of_the_solution() {
        let scaling = Scaling::new(3.986e14, 6_378_137.0).unwrap();
        let burn = Arc::burn_canonical(0.01, 0.4, 10.0, 1_000.0, 0);
        let epoch = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let mut unknowns = DVector::zeros(7);
        unknowns[0] = 1.0;
        let segment = line_segment(0.0, burn);
        let terminal = *segment.terminal().unwrap();
        let sol = Solution {
            epoch,
            scaling,
            segments: vec![segment],
            unknowns,
            boundary: BoundaryCondition::FreePlane {
                radius: 2.0,
                speed: 1.0,
                fpa: 0.0,
                inclination: 0.0,
                pole: Vector3::z(),
            },
            terminal,
            reports: Vec::new(),
        };
        assert!(abs_diff_eq!(sol.burn_time().to_seconds(), scaling.time, epsilon = 1e-6));
        assert_eq!(sol.coast_time(), Duration::ZERO);

        let sample = sol.sample_at(epoch + 0.5 * scaling.time * Unit::Second).unwrap();
        assert_eq!(sample.arc, 0);
        assert_eq!(sample.throttle, 1.0);
        assert!(abs_diff_eq!(sample.position[0], 1.5 * scaling.length, epsilon = 1e-3));
        assert!(abs_diff_eq!(sample.thrust_direction, Vector3::x(), epsilon = 1e-15));
        let expected_mass = 1_000.0 * (1.0 - 0.01 * 0.5 / 0.4);
        assert!(abs_diff_eq!(sample.mass, expected_mass, epsilon = 1e-9));

        assert!(matches!(
            sol.sample_at(epoch - 1.0 * Unit::Second),
            Err(SolutionError::OutOfSolution { .. })
        ));
        assert!(sol.sample_at(sol.end_epoch() + 1.0 * Unit::Second).is_err());
    }
}
