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

use snafu::ensure;

use super::{CosmicError, InvalidScalingSnafu};
use crate::linalg::Vector3;

/// Canonical units of the solver.
///
/// Every physical quantity entering the solver is divided by the matching unit so that the
/// initial radius, the circular speed at that radius and the gravitational parameter are all
/// exactly one. All results are multiplied back before leaving the solver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Scaling {
    /// Gravitational parameter in m^3/s^2
    pub mu: f64,
    /// Length unit in meters
    pub length: f64,
    /// Speed unit in meters per second
    pub speed: f64,
    /// Time unit in seconds
    pub time: f64,
}

impl Scaling {
    /// Derives the canonical units from the gravitational parameter and a reference radius (meters).
    pub fn new(mu: f64, reference_radius: f64) -> Result<Self, CosmicError> {
        ensure!(
            mu.is_finite() && mu > 0.0 && reference_radius.is_finite() && reference_radius > 0.0,
            InvalidScalingSnafu {
                mu,
                length: reference_radius
            }
        );
        let length = reference_radius;
        let speed = (mu / length).sqrt();
        Ok(Self {
            mu,
            length,
            speed,
            time: length / speed,
        })
    }

    /// Acceleration unit in m/s^2, i.e. the local gravity at the reference radius.
    pub fn accel(&self) -> f64 {
        self.speed / self.time
    }

    pub fn scale_length(&self, meters: f64) -> f64 {
        meters / self.length
    }

    pub fn unscale_length(&self, length: f64) -> f64 {
        length * self.length
    }

    pub fn scale_speed(&self, meters_per_second: f64) -> f64 {
        meters_per_second / self.speed
    }

    pub fn unscale_speed(&self, speed: f64) -> f64 {
        speed * self.speed
    }

    pub fn scale_time(&self, seconds: f64) -> f64 {
        seconds / self.time
    }

    pub fn unscale_time(&self, time: f64) -> f64 {
        time * self.time
    }

    pub fn scale_accel(&self, meters_per_second2: f64) -> f64 {
        meters_per_second2 / self.accel()
    }

    pub fn unscale_accel(&self, accel: f64) -> f64 {
        accel * self.accel()
    }

    /// Specific angular momentum in m^2/s to canonical units
    pub fn scale_momentum(&self, h: &Vector3<f64>) -> Vector3<f64> {
        h / (self.length * self.speed)
    }

    pub fn unscale_momentum(&self, h: &Vector3<f64>) -> Vector3<f64> {
        h * (self.length * self.speed)
    }

    pub fn scale_position(&self, r: &Vector3<f64>) -> Vector3<f64> {
        r / self.length
    }

    pub fn unscale_position(&self, r: &Vector3<f64>) -> Vector3<f64> {
        r * self.length
    }

    pub fn scale_velocity(&self, v: &Vector3<f64>) -> Vector3<f64> {
        v / self.speed
    }

    pub fn unscale_velocity(&self, v: &Vector3<f64>) -> Vector3<f64> {
        v * self.speed
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "length = {:.3} m, speed = {:.3} m/s, time = {:.3} s",
            self.length, self.speed, self.time
        )
    }
}

#[cfg(test)]
mod ut_scaling {
    use super::*;
    use approx::abs_diff_eq;

    #[test]
    fn canonical_units_of_earth() {
        let units = Scaling::new(3.986e14, 6_378_137.0).unwrap();
        assert!(abs_diff_eq!(units.speed, 7_905.36, epsilon = 0.1));
        assert!(abs_diff_eq!(units.time, 806.8, epsilon = 0.1));
        // Gravity at the reference radius is the acceleration unit
        let g = 3.986e14 / 6_378_137.0_f64.powi(2);
        assert!(abs_diff_eq!(units.accel(), g, epsilon = 1e-12));
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(Scaling::new(0.0, 6_378_137.0).is_err());
        assert!(Scaling::new(3.986e14, -1.0).is_err());
        assert!(Scaling::new(f64::NAN, 1.0).is_err());
    }
}
