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
    epoch_from_str, epoch_to_str, ConfigError, ConfigRepr, Configurable, InvalidConfigSnafu,
};
use crate::cosmic::{circular_speed, HostFrame};
use crate::errors::AscentError;
use crate::linalg::Vector3;
use crate::md::{BootstrapOpts, BoundaryMode, SolverContext, Stage};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use snafu::ResultExt;

/// Target orbit of a mission file. Angles are in degrees, and a missing speed selects the circular
/// speed at the target radius.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetConfig {
    FixedPlane {
        radius: f64,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        fpa_deg: f64,
        /// Target angular momentum in the host convention, m^2/s
        momentum: [f64; 3],
    },
    FreePlane {
        radius: f64,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        fpa_deg: f64,
        /// Keeps the current inclination if unset
        #[serde(default)]
        inclination_deg: Option<f64>,
    },
}

impl TargetConfig {
    /// Builds the boundary mode; the context provides `mu` and the current inclination.
    pub fn boundary_mode(&self, ctx: &SolverContext) -> BoundaryMode {
        let mu = ctx.scaling.mu;
        match *self {
            Self::FixedPlane {
                radius,
                speed,
                fpa_deg,
                momentum,
            } => BoundaryMode::FixedPlane {
                radius,
                speed: speed.unwrap_or_else(|| circular_speed(mu, radius)),
                fpa: fpa_deg.to_radians(),
                momentum: Vector3::from(momentum),
            },
            Self::FreePlane {
                radius,
                speed,
                fpa_deg,
                inclination_deg,
            } => BoundaryMode::FreePlane {
                radius,
                speed: speed.unwrap_or_else(|| circular_speed(mu, radius)),
                fpa: fpa_deg.to_radians(),
                inclination: inclination_deg
                    .map_or_else(|| ctx.current_inclination(), f64::to_radians),
            },
        }
    }
}

impl From<BoundaryMode> for TargetConfig {
    fn from(mode: BoundaryMode) -> Self {
        match mode {
            BoundaryMode::FixedPlane {
                radius,
                speed,
                fpa,
                momentum,
            } => Self::FixedPlane {
                radius,
                speed: Some(speed),
                fpa_deg: fpa.to_degrees(),
                momentum: momentum.into(),
            },
            BoundaryMode::FreePlane {
                radius,
                speed,
                fpa,
                inclination,
            } => Self::FreePlane {
                radius,
                speed: Some(speed),
                fpa_deg: fpa.to_degrees(),
                inclination_deg: Some(inclination.to_degrees()),
            },
        }
    }
}

fn zero() -> [f64; 3] {
    [0.0; 3]
}

fn south() -> [f64; 3] {
    [0.0, -1.0, 0.0]
}

/// Serializable description of an ascent: physical units throughout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissionConfig {
    /// Gravitational parameter, m^3/s^2
    pub mu: f64,
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub epoch: Epoch,
    /// Position at the start of the ascent, m
    pub position: [f64; 3],
    /// Velocity at the start of the ascent, m/s
    pub velocity: [f64; 3],
    #[serde(default = "zero")]
    pub primer_guess: [f64; 3],
    #[serde(default = "zero")]
    pub position_costate_guess: [f64; 3],
    /// Delta-v estimate to reach the target, m/s
    pub delta_v: f64,
    pub stages: Vec<Stage>,
    pub target: TargetConfig,
    /// Reference pole of the free plane inclination, in the solver frame
    #[serde(default = "south")]
    pub pole: [f64; 3],
    #[serde(default)]
    pub frame: HostFrame,
    #[serde(default)]
    pub opts: BootstrapOpts,
}

impl ConfigRepr for MissionConfig {}

/// A ready to solve ascent: the context with its target set, the stages and the start epoch.
#[derive(Clone, Debug)]
pub struct Mission {
    pub context: SolverContext,
    pub stages: Vec<Stage>,
    pub epoch: Epoch,
}

impl Configurable for Mission {
    type IntermediateRepr = MissionConfig;

    fn from_config(cfg: MissionConfig) -> Result<Self, ConfigError> {
        let mut context = SolverContext::initialize(
            cfg.mu,
            cfg.position.into(),
            cfg.velocity.into(),
            cfg.primer_guess.into(),
            cfg.position_costate_guess.into(),
            cfg.delta_v,
        )
        .context(InvalidConfigSnafu)?
        .with_host_frame(cfg.frame)
        .with_pole(cfg.pole.into())
        .with_opts(cfg.opts);
        let mode = cfg.target.boundary_mode(&context);
        context
            .set_boundary_mode(mode)
            .context(InvalidConfigSnafu)?;
        Ok(Self {
            context,
            stages: cfg.stages,
            epoch: cfg.epoch,
        })
    }

    fn to_config(&self) -> Result<MissionConfig, ConfigError> {
        let mode = self
            .context
            .boundary_mode()
            .ok_or(AscentError::BoundaryUnset)
            .context(InvalidConfigSnafu)?;
        let (pv, pr) = self.context.costate_guesses();
        Ok(MissionConfig {
            mu: self.context.scaling.mu,
            epoch: self.epoch,
            position: self.context.initial_position().into(),
            velocity: self.context.initial_velocity().into(),
            primer_guess: pv.into(),
            position_costate_guess: pr.into(),
            delta_v: self.context.dv_estimate(),
            stages: self.stages.clone(),
            target: mode.into(),
            pole: self.context.pole().into(),
            frame: self.context.host_frame(),
            opts: self.context.opts,
        })
    }
}

impl Mission {
    /// Loads a mission from a YAML string.
    pub fn loads(data: &str) -> Result<Self, ConfigError> {
        Self::from_config(MissionConfig::loads(data)?)
    }
}

#[cfg(test)]
mod ut_mission {
    use super::*;
    use approx::abs_diff_eq;

    const LEO: &str = r#"
mu: 3.986e14
epoch: 2024-01-01T00:00:00 UTC
position: [6378137.0, 0.0, 0.0]
velocity: [0.0, 7800.0, 0.0]
delta_v: 350.0
stages:
  - mass: 10000.0
    thrust: 1000.0
    isp: 300.0
    max_burn_time: 8000.0
target:
  mode: free_plane
  radius: 6778137.0
"#;

    #[test]
    fn free_plane_defaults() {
        let mission = Mission::loads(LEO).unwrap();
        assert_eq!(mission.stages, vec![Stage::new(10_000.0, 1_000.0, 300.0, 8_000.0)]);
        assert_eq!(mission.epoch, Epoch::from_gregorian_utc_at_midnight(2024, 1, 1));
        assert_eq!(mission.context.pole(), -Vector3::y());
        assert_eq!(mission.context.host_frame(), HostFrame::SwizzledInverted);
        assert_eq!(mission.context.opts, BootstrapOpts::default());
        match mission.context.boundary_mode() {
            Some(BoundaryMode::FreePlane {
                speed, inclination, ..
            }) => {
                assert!(abs_diff_eq!(speed, (3.986e14_f64 / 6_778_137.0).sqrt(), epsilon = 1e-9));
                assert!(abs_diff_eq!(inclination, std::f64::consts::FRAC_PI_2, epsilon = 1e-12));
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn round_trip() {
        let mission = Mission::loads(LEO).unwrap();
        let cfg = mission.to_config().unwrap();
        let yaml = cfg.dumps().unwrap();
        let reloaded = MissionConfig::loads(&yaml).unwrap();
        assert_eq!(reloaded.stages, cfg.stages);
        assert_eq!(reloaded.epoch, cfg.epoch);
        assert_eq!(reloaded.target, cfg.target);
        assert!(abs_diff_eq!(reloaded.position[0], 6_378_137.0, epsilon = 1e-6));
    }

    #[test]
    fn fixed_plane_and_options() {
        let yaml = r#"
mu: 3.986e14
epoch: 2024-01-01T00:00:00 UTC
position: [6378137.0, 0.0, 0.0]
velocity: [0.0, 7800.0, 0.0]
delta_v: 350.0
stages:
  - mass: 10000.0
    thrust: 1000.0
    isp: 300.0
    max_burn_time: 8000.0
target:
  mode: fixed_plane
  radius: 6778137.0
  fpa_deg: 1.0
  momentum: [0.0, -52000000000.0, 0.0]
frame: Identity
opts:
  fixed_steps: 50
  insert_coast: false
  newton:
    max_iterations: 20
"#;
        let mission = Mission::loads(yaml).unwrap();
        assert_eq!(mission.context.host_frame(), HostFrame::Identity);
        assert_eq!(mission.context.opts.fixed_steps, Some(50));
        assert!(!mission.context.opts.insert_coast);
        assert_eq!(mission.context.opts.newton.max_iterations, 20);
        assert_eq!(mission.context.opts.newton.tolerance, 1e-10);
        assert!(matches!(
            mission.context.boundary_mode(),
            Some(BoundaryMode::FixedPlane { fpa, .. }) if (fpa - 1.0_f64.to_radians()).abs() < 1e-15
        ));
    }

    #[test]
    fn invalid_missions() {
        assert!(matches!(
            Mission::loads(&LEO.replace("mu: 3.986e14", "mu: -1.0")),
            Err(ConfigError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Mission::loads(&LEO.replace("radius: 6778137.0", "radius: -6778137.0")),
            Err(ConfigError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Mission::loads("mu: [1, 2]"),
            Err(ConfigError::ParseError { .. })
        ));
        assert!(matches!(
            MissionConfig::load("/does/not/exist.yaml"),
            Err(ConfigError::ReadError { .. })
        ));
    }
}
