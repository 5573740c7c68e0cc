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

use snafu::prelude::*;

use crate::linalg::Vector3;

mod frames;
pub use frames::HostFrame;
mod scaling;
pub use scaling::Scaling;

/// Standard gravity used to convert a specific impulse into an exhaust velocity, in m/s^2.
pub const STD_GRAVITY: f64 = 9.80665;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CosmicError {
    #[snafu(display("cannot build canonical units from mu = {mu} and length = {length}"))]
    InvalidScaling { mu: f64, length: f64 },
}

/// Speed of a circular orbit of radius `radius` around a body of gravitational parameter `mu`.
pub fn circular_speed(mu: f64, radius: f64) -> f64 {
    (mu / radius).sqrt()
}

/// Flight path angle in radians: the angle between the velocity and the local horizontal.
pub fn flight_path_angle(r: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    (r.dot(v) / (r.norm() * v.norm())).clamp(-1.0, 1.0).asin()
}

/// Inclination in radians of the orbit defined by `r` and `v`, measured from the provided pole.
pub fn inclination(r: &Vector3<f64>, v: &Vector3<f64>, pole: &Vector3<f64>) -> f64 {
    let h = r.cross(v);
    (pole.dot(&h) / (pole.norm() * h.norm()))
        .clamp(-1.0, 1.0)
        .acos()
}
