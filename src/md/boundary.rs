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

use crate::cosmic::{HostFrame, Scaling};
use crate::dynamics::costate::{StateCostate, StateCostateVector};
use crate::errors::{AscentError, InvalidTargetSnafu};
use crate::linalg::{Vector3, Vector6};
use crate::utils::{dominant_axis, unit_or_zero};
use snafu::ensure;
use std::fmt;

/// Target orbit of the ascent, in physical units. Angles are in radians.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BoundaryMode {
    /// Insertion into the plane normal to `momentum`, which is given in the host convention (m^2/s).
    FixedPlane {
        radius: f64,
        speed: f64,
        fpa: f64,
        momentum: Vector3<f64>,
    },
    /// Insertion into any plane of the provided inclination with respect to the reference pole.
    FreePlane {
        radius: f64,
        speed: f64,
        fpa: f64,
        inclination: f64,
    },
}

/// Canonical terminal constraints, in the solver frame.
///
/// Both modes return six residuals which vanish when the final state reaches the target and the
/// costates satisfy the transversality conditions of the orbital angles left free by the target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BoundaryCondition {
    FixedPlane {
        radius: f64,
        speed: f64,
        fpa: f64,
        /// Unit target angular momentum
        h_hat: Vector3<f64>,
    },
    FreePlane {
        radius: f64,
        speed: f64,
        fpa: f64,
        inclination: f64,
        /// Unit reference pole the inclination is measured from
        pole: Vector3<f64>,
    },
}

impl BoundaryCondition {
    /// Scales the target, and converts the host momentum into the solver frame.
    pub fn from_mode(
        mode: &BoundaryMode,
        scaling: &Scaling,
        frame: HostFrame,
        pole: &Vector3<f64>,
    ) -> Result<Self, AscentError> {
        let (radius, speed, fpa) = match *mode {
            BoundaryMode::FixedPlane {
                radius, speed, fpa, ..
            }
            | BoundaryMode::FreePlane {
                radius, speed, fpa, ..
            } => (radius, speed, fpa),
        };
        ensure!(
            radius.is_finite() && radius > 0.0,
            InvalidTargetSnafu {
                reason: format!("radius must be positive, got {radius} m")
            }
        );
        ensure!(
            speed.is_finite() && speed > 0.0,
            InvalidTargetSnafu {
                reason: format!("speed must be positive, got {speed} m/s")
            }
        );
        ensure!(
            fpa.is_finite(),
            InvalidTargetSnafu {
                reason: "flight path angle is not finite"
            }
        );
        let radius = scaling.scale_length(radius);
        let speed = scaling.scale_speed(speed);

        match *mode {
            BoundaryMode::FixedPlane { momentum, .. } => {
                let h = frame.momentum_to_solver(&momentum, scaling);
                ensure!(
                    h.norm() > 0.0 && h.iter().all(|x| x.is_finite()),
                    InvalidTargetSnafu {
                        reason: format!("target momentum must be non zero, got {momentum}")
                    }
                );
                Ok(Self::FixedPlane {
                    radius,
                    speed,
                    fpa,
                    h_hat: h.normalize(),
                })
            }
            BoundaryMode::FreePlane { inclination, .. } => {
                ensure!(
                    inclination.is_finite(),
                    InvalidTargetSnafu {
                        reason: "inclination is not finite"
                    }
                );
                ensure!(
                    pole.norm() > 0.0,
                    InvalidTargetSnafu {
                        reason: "reference pole must be non zero"
                    }
                );
                Ok(Self::FreePlane {
                    radius,
                    speed,
                    fpa,
                    inclination,
                    pole: pole.normalize(),
                })
            }
        }
    }

    /// Evaluates the six terminal residuals on the final state and costates.
    pub fn residuals(&self, y: &StateCostateVector) -> Vector6<f64> {
        let r = StateCostate::radius(y);
        let v = StateCostate::velocity(y);
        let pv = StateCostate::primer(y);
        let pr = StateCostate::pos_costate(y);

        let rmag = r.norm();
        let vmag = v.norm();
        let h = r.cross(&v);
        // Derivative of the costate-weighted state along a rotation about an axis n is n . l
        let l = r.cross(&pr) + v.cross(&pv);

        let mut z = Vector6::zeros();
        match *self {
            Self::FixedPlane {
                radius,
                speed,
                fpa,
                h_hat,
            } => {
                z[0] = 0.5 * (r.norm_squared() - radius.powi(2));
                z[1] = 0.5 * (v.norm_squared() - speed.powi(2));
                z[2] = r.dot(&v) - rmag * vmag * fpa.sin();
                // The axis most aligned with the target momentum is implied by the two others
                let skip = dominant_axis(&h_hat);
                let dh = unit_or_zero(&h) - h_hat;
                z[3] = dh[(skip + 1) % 3];
                z[4] = dh[(skip + 2) % 3];
                // Free argument of periapsis
                z[5] = l.dot(&h_hat);
            }
            Self::FreePlane {
                radius,
                speed,
                fpa,
                inclination,
                pole,
            } => {
                z[0] = 0.5 * (r.norm_squared() - radius.powi(2));
                z[1] = 0.5 * (v.norm_squared() - speed.powi(2));
                z[2] = pole.dot(&h) - h.norm() * inclination.cos();
                z[3] = r.dot(&v) - rmag * vmag * fpa.sin();
                // Free argument of periapsis
                z[4] = l.dot(&unit_or_zero(&h));
                // Free longitude of the ascending node
                z[5] = l.dot(&pole);
            }
        }
        z
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FixedPlane {
                radius,
                speed,
                fpa,
                h_hat,
            } => write!(
                f,
                "fixed plane: r = {radius:.6}, v = {speed:.6}, fpa = {:.3} deg, h = {h_hat}",
                fpa.to_degrees()
            ),
            Self::FreePlane {
                radius,
                speed,
                fpa,
                inclination,
                pole,
            } => write!(
                f,
                "free plane: r = {radius:.6}, v = {speed:.6}, fpa = {:.3} deg, inc = {:.3} deg (pole {pole})",
                fpa.to_degrees(),
                inclination.to_degrees()
            ),
        }
    }
}
