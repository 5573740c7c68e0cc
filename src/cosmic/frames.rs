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

use super::Scaling;
use crate::linalg::Vector3;
use crate::utils::swizzle_xzy;
use serde_derive::{Deserialize, Serialize};

/// Conversion between the host simulation's conventions and the solver frame.
///
/// Positions and velocities are exchanged in the solver frame directly. The host reports specific
/// angular momentum with its Y and Z axes swapped and pointing the opposite way of `r x v`, so the
/// target momentum of a fixed plane solve goes through [`HostFrame::momentum_to_solver`] exactly once,
/// when the boundary condition is configured.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HostFrame {
    /// Host momentum is swizzled (x, z, y) and inverted with respect to `r x v`.
    SwizzledInverted,
    /// Host momentum already is `r x v` in the solver frame.
    Identity,
}

impl Default for HostFrame {
    fn default() -> Self {
        Self::SwizzledInverted
    }
}

impl HostFrame {
    /// Converts a physical host angular momentum (m^2/s) into a canonical solver frame momentum.
    pub fn momentum_to_solver(&self, h_host: &Vector3<f64>, units: &Scaling) -> Vector3<f64> {
        let h = match self {
            Self::SwizzledInverted => -swizzle_xzy(h_host),
            Self::Identity => *h_host,
        };
        units.scale_momentum(&h)
    }

    /// Converts a canonical solver frame momentum into the physical host convention.
    pub fn momentum_from_solver(&self, h: &Vector3<f64>, units: &Scaling) -> Vector3<f64> {
        let h = units.unscale_momentum(h);
        match self {
            Self::SwizzledInverted => -swizzle_xzy(&h),
            Self::Identity => h,
        }
    }
}

#[cfg(test)]
mod ut_frames {
    use super::*;
    use approx::abs_diff_eq;

    #[test]
    fn swizzled_inverted_momentum() {
        let units = Scaling::new(3.986e14, 6_378_137.0).unwrap();
        let hu = units.length * units.speed;
        // A prograde equatorial orbit in the solver frame has its momentum along +Z
        let h_host = Vector3::new(0.0, -hu, 0.0);
        let h = HostFrame::SwizzledInverted.momentum_to_solver(&h_host, &units);
        assert!(abs_diff_eq!(h, Vector3::z(), epsilon = 1e-12));
    }

    #[test]
    fn host_round_trip() {
        let units = Scaling::new(3.986e14, 6_600_000.0).unwrap();
        let h_host = Vector3::new(1.2e10, -4.5e10, 3.3e9);
        for frame in [HostFrame::SwizzledInverted, HostFrame::Identity] {
            let h = frame.momentum_to_solver(&h_host, &units);
            let back = frame.momentum_from_solver(&h, &units);
            assert!((back - h_host).norm() / h_host.norm() < 1e-14);
        }
    }
}
