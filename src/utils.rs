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

use crate::linalg::{SVector, Vector3};

/// Returns the unit vector of `v`, or a zero vector if `v` has a zero norm.
pub fn unit_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        Vector3::zeros()
    }
}

/// Returns true if every component of the vector is finite.
pub fn is_finite<const N: usize>(v: &SVector<f64, N>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Returns the x-z-y swizzle of the provided vector, i.e. swaps the Y and Z axes.
pub fn swizzle_xzy(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v[0], v[2], v[1])
}

/// Returns the index of the largest component (in absolute value) of the vector.
pub fn dominant_axis(v: &Vector3<f64>) -> usize {
    let mut axis = 0;
    for i in 1..3 {
        if v[i].abs() > v[axis].abs() {
            axis = i;
        }
    }
    axis
}

/// Fischer-Burmeister complementarity function: zero if and only if `a >= 0`, `b >= 0` and `a * b = 0`.
pub fn fischer_burmeister(a: f64, b: f64) -> f64 {
    a + b - a.hypot(b)
}

#[cfg(test)]
mod ut_utils {
    use super::*;
    use approx::abs_diff_eq;

    #[test]
    fn swizzle_is_an_involution() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(swizzle_xzy(&v), Vector3::new(1.0, 3.0, 2.0));
        assert_eq!(swizzle_xzy(&swizzle_xzy(&v)), v);
    }

    #[test]
    fn dominant_axis_ignores_sign() {
        assert_eq!(dominant_axis(&Vector3::new(0.1, -0.9, 0.2)), 1);
        assert_eq!(dominant_axis(&Vector3::z()), 2);
    }

    #[test]
    fn fischer_burmeister_roots() {
        assert!(fischer_burmeister(0.0, 2.0).abs() < f64::EPSILON);
        assert!(fischer_burmeister(3.0, 0.0).abs() < f64::EPSILON);
        assert!(fischer_burmeister(0.0, -1.0) < 0.0);
        assert!(fischer_burmeister(1.0, 1.0) > 0.0);
    }

    #[test]
    fn unit_of_zero() {
        assert_eq!(unit_or_zero(&Vector3::zeros()), Vector3::zeros());
        assert!(abs_diff_eq!(unit_or_zero(&Vector3::new(3.0, 4.0, 0.0)).norm(), 1.0, epsilon = 1e-15));
    }
}
