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

use crate::cosmic::{Scaling, STD_GRAVITY};
use crate::dynamics::{DynamicsError, MassDepletedSnafu};
use crate::errors::{AscentError, InvalidVehicleSnafu};
use crate::linalg::{DVector, Vector3};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

/// Number of costates owned by every arc in the unknown vector: the primer vector and the position costate.
pub const COSTATES_PER_ARC: usize = 6;

/// A vehicle stage, in physical units, as fired in the order of the stage list.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Mass at ignition, in kg (including all the upper stages)
    pub mass: f64,
    /// Vacuum thrust, in N
    pub thrust: f64,
    /// Specific impulse, in s
    pub isp: f64,
    /// Propellant-limited burn duration, in s
    pub max_burn_time: f64,
}

impl Stage {
    pub fn new(mass: f64, thrust: f64, isp: f64, max_burn_time: f64) -> Self {
        Self {
            mass,
            thrust,
            isp,
            max_burn_time,
        }
    }

    /// Exhaust velocity in m/s
    pub fn exhaust_velocity(&self) -> f64 {
        STD_GRAVITY * self.isp
    }

    /// Mass flow in kg/s
    pub fn mass_flow(&self) -> f64 {
        self.thrust / self.exhaust_velocity()
    }

    /// Mass at burnout, in kg
    pub fn burnout_mass(&self) -> f64 {
        self.mass - self.mass_flow() * self.max_burn_time
    }

    /// Ideal delta-v of the full burn of this stage, in m/s
    pub fn delta_v(&self) -> f64 {
        self.exhaust_velocity() * (self.mass / self.burnout_mass()).ln()
    }

    /// Burn duration needed to impart `delta_v` (in m/s) from ignition, from the ideal rocket equation.
    pub fn burn_time_for(&self, delta_v: f64) -> f64 {
        let ve = self.exhaust_velocity();
        ve * self.mass / self.thrust * (1.0 - (-delta_v / ve).exp())
    }

    /// Checks the physical consistency of this stage. A zero thrust is accepted.
    pub(crate) fn validate(&self, index: usize) -> Result<(), AscentError> {
        ensure!(
            self.mass.is_finite() && self.mass > 0.0,
            InvalidVehicleSnafu {
                index,
                reason: format!("mass must be positive, got {} kg", self.mass)
            }
        );
        ensure!(
            self.thrust.is_finite() && self.thrust >= 0.0,
            InvalidVehicleSnafu {
                index,
                reason: format!("thrust must be non negative, got {} N", self.thrust)
            }
        );
        ensure!(
            self.isp.is_finite() && self.isp > 0.0,
            InvalidVehicleSnafu {
                index,
                reason: format!("isp must be positive, got {} s", self.isp)
            }
        );
        ensure!(
            self.max_burn_time.is_finite() && self.max_burn_time > 0.0,
            InvalidVehicleSnafu {
                index,
                reason: format!(
                    "burn time must be positive, got {} s",
                    self.max_burn_time
                )
            }
        );
        ensure!(
            self.burnout_mass() > 0.0,
            InvalidVehicleSnafu {
                index,
                reason: format!(
                    "stage burns {:.1} kg of propellant but only has {} kg",
                    self.mass_flow() * self.max_burn_time,
                    self.mass
                )
            }
        );
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "stage: {} kg, {} N, {} s isp, {} s burn",
            self.mass, self.thrust, self.isp, self.max_burn_time
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArcKind {
    Burn,
    Coast,
}

/// A continuous segment of the ascent, either a full thrust burn of one stage or a coast.
///
/// The physical data is fixed when the arc is built. The `unbounded` flag is only a solver mode:
/// an unbounded burn keeps thrusting at its burnout mass past its burn time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Arc {
    pub kind: ArcKind,
    /// Thrust acceleration at ignition, canonical
    pub accel: f64,
    /// Exhaust velocity, canonical
    pub exhaust_velocity: f64,
    /// Propellant-limited burn duration, canonical
    pub max_burn: f64,
    /// Mass at ignition, in kg
    pub mass: f64,
    /// Index of the stage in the stage list, `None` for coasts
    pub stage: Option<usize>,
    pub unbounded: bool,
}

impl Arc {
    /// Builds the burn arc of the provided stage.
    pub fn burn(stage: &Stage, scaling: &Scaling, index: usize) -> Self {
        Self::burn_canonical(
            scaling.scale_accel(stage.thrust / stage.mass),
            scaling.scale_speed(stage.exhaust_velocity()),
            scaling.scale_time(stage.max_burn_time),
            stage.mass,
            index,
        )
    }

    /// Builds a burn arc from canonical quantities.
    pub fn burn_canonical(
        accel: f64,
        exhaust_velocity: f64,
        max_burn: f64,
        mass: f64,
        index: usize,
    ) -> Self {
        Self {
            kind: ArcKind::Burn,
            accel,
            exhaust_velocity,
            max_burn,
            mass,
            stage: Some(index),
            unbounded: false,
        }
    }

    pub fn coast() -> Self {
        Self {
            kind: ArcKind::Coast,
            accel: 0.0,
            exhaust_velocity: 0.0,
            max_burn: 0.0,
            mass: 0.0,
            stage: None,
            unbounded: false,
        }
    }

    pub fn is_coast(&self) -> bool {
        self.kind == ArcKind::Coast
    }

    /// Throttle setting on this arc: full thrust on burns, zero on coasts.
    pub fn throttle(&self) -> f64 {
        match self.kind {
            ArcKind::Burn => 1.0,
            ArcKind::Coast => 0.0,
        }
    }

    /// Elapsed burn time used for the mass bookkeeping.
    fn mass_time(&self, elapsed: f64) -> f64 {
        if self.unbounded {
            elapsed.min(self.max_burn)
        } else {
            elapsed
        }
    }

    /// Fraction of the ignition mass left after `elapsed` canonical time units on this arc.
    pub fn mass_ratio(&self, elapsed: f64) -> f64 {
        match self.kind {
            ArcKind::Coast => 1.0,
            ArcKind::Burn => 1.0 - self.accel * self.mass_time(elapsed) / self.exhaust_velocity,
        }
    }

    /// Thrust acceleration after `elapsed` canonical time units on this arc: `a0 / (1 - a0 t / ve)`.
    pub fn thrust_accel(&self, elapsed: f64) -> Result<f64, DynamicsError> {
        match self.kind {
            ArcKind::Coast => Ok(0.0),
            ArcKind::Burn => {
                let ratio = self.mass_ratio(elapsed);
                ensure!(
                    ratio > 0.0,
                    MassDepletedSnafu {
                        stage: self.stage.unwrap_or_default(),
                        elapsed
                    }
                );
                Ok(self.accel / ratio)
            }
        }
    }
}

impl fmt::Display for Arc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.kind, self.stage) {
            (ArcKind::Burn, Some(stage)) => write!(
                f,
                "burn of stage #{stage} (a0 = {:.4e}, ve = {:.4e}, max burn = {:.4}{})",
                self.accel,
                self.exhaust_velocity,
                self.max_burn,
                if self.unbounded { ", unbounded" } else { "" }
            ),
            _ => write!(f, "coast"),
        }
    }
}

/// Builds one burn arc per stage, in order.
pub fn arcs_from_stages(stages: &[Stage], scaling: &Scaling) -> Vec<Arc> {
    stages
        .iter()
        .enumerate()
        .map(|(i, stage)| Arc::burn(stage, scaling, i))
        .collect()
}

/// Returns the offset in the unknown vector of the costates of arc `i`, or of its coast duration if
/// `parameters` is set. `arc_index(arcs, arcs.len(), false)` is the length of the unknown vector.
///
/// The layout is `[T_burn | arc0: pv pr (coast duration) | arc1: ... ]`.
pub fn arc_index(arcs: &[Arc], i: usize, parameters: bool) -> usize {
    let offset = 1 + arcs[..i]
        .iter()
        .map(|arc| COSTATES_PER_ARC + usize::from(arc.is_coast()))
        .sum::<usize>();
    if parameters {
        offset + COSTATES_PER_ARC
    } else {
        offset
    }
}

/// Length of the unknown vector for this arc list.
pub fn unknown_len(arcs: &[Arc]) -> usize {
    arc_index(arcs, arcs.len(), false)
}

/// Length of the shooting residual: boundary conditions, primer normalization, costate continuity
/// at every internal arc boundary, and one complementarity condition per coast.
pub fn residual_len(arcs: &[Arc]) -> usize {
    let coasts = arcs.iter().filter(|arc| arc.is_coast()).count();
    6 + 1 + COSTATES_PER_ARC * arcs.len().saturating_sub(1) + coasts
}

/// Returns the duration of every arc from the unknown vector.
///
/// Non-final burns deplete their stage, coasts own their duration, and the final burn lasts what is
/// left of the total burn time.
pub fn arc_durations(arcs: &[Arc], x: &DVector<f64>) -> Vec<f64> {
    let last = arcs.len().saturating_sub(1);
    let prior_burns: f64 = arcs[..last]
        .iter()
        .filter(|arc| !arc.is_coast())
        .map(|arc| arc.max_burn)
        .sum();
    arcs.iter()
        .enumerate()
        .map(|(i, arc)| {
            if arc.is_coast() {
                x[arc_index(arcs, i, true)]
            } else if i == last {
                x[0] - prior_burns
            } else {
                arc.max_burn
            }
        })
        .collect()
}

/// Returns the primer vector and position costate of arc `i` stored in the unknown vector.
pub fn costates(arcs: &[Arc], x: &DVector<f64>, i: usize) -> (Vector3<f64>, Vector3<f64>) {
    let idx = arc_index(arcs, i, false);
    (
        x.fixed_rows::<3>(idx).into_owned(),
        x.fixed_rows::<3>(idx + 3).into_owned(),
    )
}

/// Stores the primer vector and position costate of arc `i` in the unknown vector.
pub fn set_costates(
    arcs: &[Arc],
    x: &mut DVector<f64>,
    i: usize,
    pv: &Vector3<f64>,
    pr: &Vector3<f64>,
) {
    let idx = arc_index(arcs, i, false);
    x.fixed_rows_mut::<3>(idx).copy_from(pv);
    x.fixed_rows_mut::<3>(idx + 3).copy_from(pr);
}

/// Inserts a coast of zero duration before arc `index` and remaps the unknown vector accordingly.
///
/// The coast starts with the provided costates, and every other arc keeps its own.
pub fn insert_coast(
    arcs: &[Arc],
    x: &DVector<f64>,
    index: usize,
    pv: &Vector3<f64>,
    pr: &Vector3<f64>,
) -> (Vec<Arc>, DVector<f64>) {
    let mut coast = Arc::coast();
    // The vehicle coasts with the mass it will ignite the next arc with
    coast.mass = arcs.get(index).map_or(0.0, |next| next.mass);
    let mut new_arcs = arcs.to_vec();
    new_arcs.insert(index, coast);

    let mut new_x = DVector::zeros(unknown_len(&new_arcs));
    new_x[0] = x[0];
    for (old_i, arc) in arcs.iter().enumerate() {
        let new_i = if old_i < index { old_i } else { old_i + 1 };
        let (arc_pv, arc_pr) = costates(arcs, x, old_i);
        set_costates(&new_arcs, &mut new_x, new_i, &arc_pv, &arc_pr);
        if arc.is_coast() {
            new_x[arc_index(&new_arcs, new_i, true)] = x[arc_index(arcs, old_i, true)];
        }
    }
    set_costates(&new_arcs, &mut new_x, index, pv, pr);
    new_x[arc_index(&new_arcs, index, true)] = 0.0;

    (new_arcs, new_x)
}

#[cfg(test)]
mod ut_arc {
    use super::*;
    use approx::abs_diff_eq;

    fn two_stages() -> Vec<Arc> {
        vec![
            Arc::burn_canonical(0.2, 0.3, 1.0, 1000.0, 0),
            Arc::burn_canonical(0.1, 0.35, 2.0, 200.0, 1),
        ]
    }

    #[test]
    fn layout_is_a_function_of_the_arc_kinds() {
        let arcs = two_stages();
        assert_eq!(arc_index(&arcs, 0, false), 1);
        assert_eq!(arc_index(&arcs, 1, false), 7);
        assert_eq!(unknown_len(&arcs), 13);
        assert_eq!(residual_len(&arcs), 13);

        let x = DVector::from_element(13, 1.0);
        let (with_coast, x) = insert_coast(&arcs, &x, 1, &Vector3::x(), &Vector3::y());
        assert!(with_coast[1].is_coast());
        // Coast costates, then its duration, then the final burn
        assert_eq!(arc_index(&with_coast, 1, false), 7);
        assert_eq!(arc_index(&with_coast, 1, true), 13);
        assert_eq!(arc_index(&with_coast, 2, false), 14);
        assert_eq!(unknown_len(&with_coast), 20);
        assert_eq!(residual_len(&with_coast), 20);
        assert_eq!(x.len(), 20);
        assert_eq!(x[13], 0.0);
        assert_eq!(costates(&with_coast, &x, 1), (Vector3::x(), Vector3::y()));
        assert_eq!(
            costates(&with_coast, &x, 2),
            (Vector3::repeat(1.0), Vector3::repeat(1.0))
        );
        // Recomputing the layout gives the same answer
        for i in 0..=with_coast.len() {
            assert_eq!(
                arc_index(&with_coast, i, false),
                arc_index(&with_coast.clone(), i, false)
            );
        }
    }

    #[test]
    fn final_burn_gets_the_rest_of_the_burn_time() {
        let arcs = two_stages();
        let mut x = DVector::zeros(unknown_len(&arcs));
        x[0] = 2.5;
        assert_eq!(arc_durations(&arcs, &x), vec![1.0, 1.5]);

        let (arcs, mut x) = insert_coast(&arcs, &x, 1, &Vector3::x(), &Vector3::zeros());
        x[arc_index(&arcs, 1, true)] = 0.25;
        assert_eq!(arc_durations(&arcs, &x), vec![1.0, 0.25, 1.5]);
    }

    #[test]
    fn unbounded_burn_keeps_its_burnout_mass() {
        let mut arc = Arc::burn_canonical(0.1, 0.2, 1.0, 100.0, 0);
        assert!(abs_diff_eq!(arc.thrust_accel(1.0).unwrap(), 0.2, epsilon = 1e-15));
        assert!(matches!(
            arc.thrust_accel(2.5),
            Err(DynamicsError::MassDepleted { stage: 0, .. })
        ));
        arc.unbounded = true;
        assert!(abs_diff_eq!(arc.thrust_accel(2.5).unwrap(), 0.2, epsilon = 1e-15));
        assert!(abs_diff_eq!(arc.mass_ratio(3.0), 0.5, epsilon = 1e-15));
        assert_eq!(Arc::coast().thrust_accel(10.0).unwrap(), 0.0);
    }

    #[test]
    fn stage_validation() {
        let stage = Stage::new(10_000.0, 1_000.0, 300.0, 8_000.0);
        assert!(stage.validate(0).is_ok());
        assert!(stage.delta_v() > 0.0);
        let tgo = stage.burn_time_for(stage.delta_v());
        assert!(abs_diff_eq!(tgo, stage.max_burn_time, epsilon = 1e-6));

        assert!(Stage::new(10_000.0, 0.0, 300.0, 8_000.0).validate(0).is_ok());
        assert!(matches!(
            Stage::new(-1.0, 1_000.0, 300.0, 8_000.0).validate(2),
            Err(AscentError::InvalidVehicle { index: 2, .. })
        ));
        assert!(Stage::new(1_000.0, 1_000.0, 300.0, 8_000.0)
            .validate(0)
            .is_err());
    }
}
