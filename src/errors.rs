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

use crate::cosmic::CosmicError;
use crate::linalg::DVector;
use crate::md::{BootstrapStage, ShootingError};
use crate::propagators::PropagationError;

/// Aggregate failure of a bootstrap run. No partial solution is ever returned alongside it.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AscentError {
    #[snafu(display("{stage} stage: integration diverged: {source}"))]
    IntegrationDivergence {
        stage: BootstrapStage,
        source: PropagationError,
        unknowns: DVector<f64>,
    },
    #[snafu(display(
        "{stage} stage: no convergence after {iterations} iterations (residual norm {residual_norm:.3e})"
    ))]
    OptimizerNonConvergence {
        stage: BootstrapStage,
        iterations: usize,
        residual_norm: f64,
        unknowns: DVector<f64>,
    },
    #[snafu(display("{stage} stage: infeasible solution: {reason}"))]
    InfeasibleSolution {
        stage: BootstrapStage,
        reason: String,
        unknowns: DVector<f64>,
    },
    #[snafu(display("bootstrap cancelled during the {stage} stage"))]
    Cancelled { stage: BootstrapStage },
    #[snafu(display("no boundary condition set, call set_boundary_mode before bootstrapping"))]
    BoundaryUnset,
    #[snafu(display("invalid target: {reason}"))]
    InvalidTarget { reason: String },
    #[snafu(display("vehicle stage #{index} is invalid: {reason}"))]
    InvalidVehicle { index: usize, reason: String },
    #[snafu(display("cannot build canonical units: {source}"))]
    InvalidScaling { source: CosmicError },
}

impl AscentError {
    /// Tags a shooting failure with the bootstrap stage it happened in.
    pub(crate) fn from_shooting(stage: BootstrapStage, err: ShootingError) -> Self {
        match err {
            ShootingError::Divergence { source, unknowns } => Self::IntegrationDivergence {
                stage,
                source,
                unknowns,
            },
            ShootingError::NonConvergence {
                iterations,
                residual_norm,
                unknowns,
            } => Self::OptimizerNonConvergence {
                stage,
                iterations,
                residual_norm,
                unknowns,
            },
            ShootingError::Infeasible { reason, unknowns } => Self::InfeasibleSolution {
                stage,
                reason,
                unknowns,
            },
            ShootingError::Cancelled { .. } => Self::Cancelled { stage },
        }
    }

    /// Returns the bootstrap stage which failed, if the failure happened during a solve.
    pub fn stage(&self) -> Option<BootstrapStage> {
        match self {
            Self::IntegrationDivergence { stage, .. }
            | Self::OptimizerNonConvergence { stage, .. }
            | Self::InfeasibleSolution { stage, .. }
            | Self::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Returns the unknown vector (canonical units) held by the solver when it gave up.
    pub fn unknowns(&self) -> Option<&DVector<f64>> {
        match self {
            Self::IntegrationDivergence { unknowns, .. }
            | Self::OptimizerNonConvergence { unknowns, .. }
            | Self::InfeasibleSolution { unknowns, .. } => Some(unknowns),
            _ => None,
        }
    }
}
