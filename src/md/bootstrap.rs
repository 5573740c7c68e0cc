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

use super::arc::{
    arc_index, arcs_from_stages, costates, insert_coast, set_costates, unknown_len,
};
use super::opti::{classify, DampedNewton, NewtonOpts, RootFinder};
use super::{BoundaryCondition, BoundaryMode, Segment, ShootingProblem, Solution, Stage};
use crate::cosmic::{inclination, HostFrame, Scaling};
use crate::dynamics::StateCostate;
use crate::errors::{
    AscentError, BoundaryUnsetSnafu, CancelledSnafu, IntegrationDivergenceSnafu,
    InvalidScalingSnafu, InvalidTargetSnafu, InvalidVehicleSnafu,
};
use crate::linalg::{DVector, Vector3};
use crate::propagators::{IntegrationMethod, LargestError, PropOpts};
use crate::time::Epoch;
use crate::utils::unit_or_zero;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use typed_builder::TypedBuilder;

/// Successive relaxations of the ascent problem, solved in this order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BootstrapStage {
    /// No coast, and the final stage may burn past its propellant
    Relaxed,
    /// A coast is inserted before the final stage
    Coast,
    /// The final stage is limited to its propellant
    Finite,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Relaxed => write!(f, "relaxed"),
            Self::Coast => write!(f, "coast"),
            Self::Finite => write!(f, "finite"),
        }
    }
}

/// Outcome of one converged bootstrap stage.
#[derive(Clone, Debug, PartialEq)]
pub struct StageReport {
    pub stage: BootstrapStage,
    /// Unknown vector the root finder started from
    pub seed: DVector<f64>,
    /// Converged unknown vector
    pub unknowns: DVector<f64>,
    pub iterations: usize,
    pub residual_norm: f64,
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} stage: {} unknowns converged in {} iterations (|z| = {:.3e}, T = {:.6})",
            self.stage,
            self.unknowns.len(),
            self.iterations,
            self.residual_norm,
            self.unknowns[0]
        )
    }
}

/// Settings of a bootstrap run.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct BootstrapOpts {
    /// Number of fixed integration steps per arc, or `None` for an adaptive step
    #[builder(default = Some(200))]
    pub fixed_steps: Option<usize>,
    /// Tolerance of the adaptive step integration
    #[builder(default = 1e-10)]
    pub prop_tolerance: f64,
    #[builder(default)]
    pub method: IntegrationMethod,
    #[builder(default)]
    pub newton: NewtonOpts,
    /// Solves the coast stage; when unset the final stage is made finite right after the relaxed stage
    #[builder(default = true)]
    pub insert_coast: bool,
    /// Negative coast durations smaller than this (canonical) are accepted and clamped to zero
    #[builder(default = 1e-8)]
    pub feasibility_tolerance: f64,
}

impl Default for BootstrapOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BootstrapOpts {
    /// Integration options used for every arc.
    pub fn prop_opts(&self) -> PropOpts<LargestError> {
        match self.fixed_steps {
            Some(steps) => PropOpts::with_fixed_steps(steps),
            None => PropOpts::with_adaptive_step(1e-6, 0.1, self.prop_tolerance, LargestError),
        }
    }
}

/// Initial state, guesses and target of an ascent solve.
///
/// Inputs and outputs are physical (meters, seconds). The context keeps the initial state in
/// canonical units, scaled from `mu` and the initial radius.
#[derive(Clone, Debug)]
pub struct SolverContext {
    pub scaling: Scaling,
    r0: Vector3<f64>,
    v0: Vector3<f64>,
    pv0_guess: Vector3<f64>,
    pr0_guess: Vector3<f64>,
    /// Delta-v estimate to reach the target, in m/s
    dv_estimate: f64,
    frame: HostFrame,
    pole: Vector3<f64>,
    mode: Option<BoundaryMode>,
    pub opts: BootstrapOpts,
}

impl SolverContext {
    /// Builds a context from the gravitational parameter (m^3/s^2), the current position (m) and
    /// velocity (m/s), guesses of the initial primer vector and position costate (canonical, only
    /// their direction matters; zero guesses select a tangential guess), and the delta-v (m/s)
    /// needed to reach the target.
    pub fn initialize(
        mu: f64,
        r0: Vector3<f64>,
        v0: Vector3<f64>,
        pv0_guess: Vector3<f64>,
        pr0_guess: Vector3<f64>,
        dv_estimate: f64,
    ) -> Result<Self, AscentError> {
        let scaling = Scaling::new(mu, r0.norm()).context(InvalidScalingSnafu)?;
        ensure!(
            v0.iter().all(|x| x.is_finite()),
            InvalidTargetSnafu {
                reason: format!("initial velocity is not finite: {v0}")
            }
        );
        ensure!(
            pv0_guess.iter().chain(pr0_guess.iter()).all(|x| x.is_finite()),
            InvalidTargetSnafu {
                reason: "costate guesses are not finite"
            }
        );
        ensure!(
            dv_estimate.is_finite() && dv_estimate >= 0.0,
            InvalidTargetSnafu {
                reason: format!("delta-v estimate must be non negative, got {dv_estimate} m/s")
            }
        );
        Ok(Self {
            r0: scaling.scale_position(&r0),
            v0: scaling.scale_velocity(&v0),
            scaling,
            pv0_guess,
            pr0_guess,
            dv_estimate,
            frame: HostFrame::default(),
            // Host angular momenta point south
            pole: -Vector3::y(),
            mode: None,
            opts: BootstrapOpts::default(),
        })
    }

    pub fn with_opts(mut self, opts: BootstrapOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_host_frame(mut self, frame: HostFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_pole(mut self, pole: Vector3<f64>) -> Self {
        self.pole = pole;
        self
    }

    /// Sets the reference pole of the free plane inclination, in the solver frame.
    pub fn set_pole(&mut self, pole: Vector3<f64>) {
        self.pole = pole;
    }

    pub fn pole(&self) -> Vector3<f64> {
        self.pole
    }

    pub fn host_frame(&self) -> HostFrame {
        self.frame
    }

    /// Initial position, in meters
    pub fn initial_position(&self) -> Vector3<f64> {
        self.scaling.unscale_position(&self.r0)
    }

    /// Initial velocity, in meters per second
    pub fn initial_velocity(&self) -> Vector3<f64> {
        self.scaling.unscale_velocity(&self.v0)
    }

    /// Primer vector and position costate guesses, as provided
    pub fn costate_guesses(&self) -> (Vector3<f64>, Vector3<f64>) {
        (self.pv0_guess, self.pr0_guess)
    }

    pub fn dv_estimate(&self) -> f64 {
        self.dv_estimate
    }

    /// Checks and sets the target orbit.
    pub fn set_boundary_mode(&mut self, mode: BoundaryMode) -> Result<(), AscentError> {
        let boundary = BoundaryCondition::from_mode(&mode, &self.scaling, self.frame, &self.pole)?;
        debug!("target set to {boundary}");
        self.mode = Some(mode);
        Ok(())
    }

    pub fn boundary_mode(&self) -> Option<BoundaryMode> {
        self.mode
    }

    /// Inclination of the current orbit with respect to the reference pole, in radians.
    pub fn current_inclination(&self) -> f64 {
        inclination(&self.r0, &self.v0, &self.pole)
    }

    /// Builds the first unknown vector: the total burn time from the ideal rocket equation, and
    /// the first arc costates from the guesses.
    pub fn seed(&self, stages: &[Stage]) -> DVector<f64> {
        let arcs = arcs_from_stages(stages, &self.scaling);
        let mut x = DVector::zeros(unknown_len(&arcs));
        let Some((last, upper)) = stages.split_last() else {
            return x;
        };

        // Every stage but the last burns to depletion, the last one provides what is left
        let remaining = self.dv_estimate - upper.iter().map(Stage::delta_v).sum::<f64>();
        let final_burn = if remaining > 0.0 {
            last.burn_time_for(remaining)
        } else {
            0.1 * last.max_burn_time
        };
        let burn_time = upper.iter().map(|stage| stage.max_burn_time).sum::<f64>() + final_burn;
        x[0] = self.scaling.scale_time(burn_time);

        let (pv, pr) = if self.pv0_guess.norm() > 0.0 {
            let norm = self.pv0_guess.norm();
            (self.pv0_guess / norm, self.pr0_guess / norm)
        } else {
            (
                unit_or_zero(&self.v0),
                unit_or_zero(&self.r0) * self.v0.norm() / self.r0.norm(),
            )
        };
        set_costates(&arcs, &mut x, 0, &pv, &pr);
        x
    }

    /// Solves the ascent with the default damped Newton root finder.
    pub fn bootstrap(&self, stages: &[Stage], epoch: Epoch) -> Result<Solution, AscentError> {
        self.bootstrap_with(&DampedNewton::new(self.opts.newton), stages, epoch)
    }

    /// Solves the ascent with the provided root finder.
    pub fn bootstrap_with(
        &self,
        finder: &dyn RootFinder,
        stages: &[Stage],
        epoch: Epoch,
    ) -> Result<Solution, AscentError> {
        self.run(finder, stages, epoch, None)
    }

    /// Solves the ascent on a worker thread.
    pub fn spawn_bootstrap(&self, stages: Vec<Stage>, epoch: Epoch) -> BootstrapHandle {
        self.spawn_bootstrap_with(stages, epoch, std::sync::Arc::new(AtomicBool::new(false)))
    }

    /// Solves the ascent on a worker thread which stops at the next stage or iteration once `cancel`
    /// is raised. The flag may be shared with other workers, or raised before the spawn.
    pub fn spawn_bootstrap_with(
        &self,
        stages: Vec<Stage>,
        epoch: Epoch,
        cancel: std::sync::Arc<AtomicBool>,
    ) -> BootstrapHandle {
        let flag = cancel.clone();
        let ctx = self.clone();
        let handle = thread::spawn(move || {
            let finder = DampedNewton::new(ctx.opts.newton).with_cancel(flag.clone());
            ctx.run(&finder, &stages, epoch, Some(&flag))
        });
        BootstrapHandle { cancel, handle }
    }

    pub(crate) fn run(
        &self,
        finder: &dyn RootFinder,
        stages: &[Stage],
        epoch: Epoch,
        cancel: Option<&AtomicBool>,
    ) -> Result<Solution, AscentError> {
        let mode = self.mode.context(BoundaryUnsetSnafu)?;
        ensure!(
            !stages.is_empty(),
            InvalidVehicleSnafu {
                index: 0_usize,
                reason: "the vehicle has no stage"
            }
        );
        for (index, stage) in stages.iter().enumerate() {
            stage.validate(index)?;
        }
        let boundary = BoundaryCondition::from_mode(&mode, &self.scaling, self.frame, &self.pole)?;

        let mut arcs = arcs_from_stages(stages, &self.scaling);
        if let Some(last) = arcs.last_mut() {
            last.unbounded = true;
        }
        let mut problem = ShootingProblem::new(
            arcs,
            self.r0,
            self.v0,
            boundary,
            self.opts.prop_opts(),
            self.opts.method,
        );
        let mut reports = Vec::with_capacity(3);

        // Relaxed
        let mut x = self.seed(stages);
        problem
            .seed_continuity(&mut x)
            .context(IntegrationDivergenceSnafu {
                stage: BootstrapStage::Relaxed,
                unknowns: x.clone(),
            })?;
        let report = self.solve_stage(finder, &problem, x, BootstrapStage::Relaxed, cancel)?;
        x = report.unknowns.clone();
        reports.push(report);

        // Coast
        if self.opts.insert_coast {
            let last = problem.arcs.len() - 1;
            let segments = problem
                .full_mode(&x)
                .context(IntegrationDivergenceSnafu {
                    stage: BootstrapStage::Coast,
                    unknowns: x.clone(),
                })?;
            // The coast starts with the costates the final burn starts with
            let (pv, pr) = match segments.get(last).and_then(Segment::initial) {
                Some(y) => (StateCostate::primer(y), StateCostate::pos_costate(y)),
                None => costates(&problem.arcs, &x, last),
            };
            let (arcs, seed) = insert_coast(&problem.arcs, &x, last, &pv, &pr);
            problem.arcs = arcs;
            let report = self.solve_stage(finder, &problem, seed, BootstrapStage::Coast, cancel)?;
            x = report.unknowns.clone();
            reports.push(report);
        }

        // Finite
        if let Some(last) = problem.arcs.last_mut() {
            last.unbounded = false;
        }
        let report = self.solve_stage(finder, &problem, x, BootstrapStage::Finite, cancel)?;
        x = report.unknowns.clone();
        reports.push(report);

        for i in 0..problem.arcs.len() {
            if problem.arcs[i].is_coast() {
                let idx = arc_index(&problem.arcs, i, true);
                x[idx] = x[idx].max(0.0);
            }
        }

        let segments = problem
            .full_mode(&x)
            .context(IntegrationDivergenceSnafu {
                stage: BootstrapStage::Finite,
                unknowns: x.clone(),
            })?;
        let Some((terminal, final_arc)) = segments
            .last()
            .and_then(|seg| seg.terminal().map(|y| (*y, seg.arc)))
        else {
            unreachable!("every arc records at least its initial state")
        };

        match StateCostate::new(final_arc).hamiltonian(&terminal) {
            Ok(hamiltonian) if hamiltonian > 0.0 => {
                debug!("final Hamiltonian = {hamiltonian:.6e}")
            }
            Ok(hamiltonian) => warn!(
                "final Hamiltonian is {hamiltonian:.6e}, the solution may not be a minimum"
            ),
            Err(e) => warn!("cannot evaluate the final Hamiltonian: {e}"),
        }

        let solution = Solution {
            epoch,
            scaling: self.scaling,
            segments,
            unknowns: x,
            boundary,
            terminal,
            reports,
        };
        info!("{solution}");
        Ok(solution)
    }

    fn solve_stage(
        &self,
        finder: &dyn RootFinder,
        problem: &ShootingProblem,
        seed: DVector<f64>,
        stage: BootstrapStage,
        cancel: Option<&AtomicBool>,
    ) -> Result<StageReport, AscentError> {
        ensure!(
            !cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)),
            CancelledSnafu { stage }
        );
        info!(
            "{stage} stage: solving for {} unknowns over {} arcs ({} with {})",
            seed.len(),
            problem.arcs.len(),
            problem.method,
            problem.prop_opts
        );
        let result = finder
            .solve(problem, &seed)
            .and_then(|conv| classify(&problem.arcs, conv, self.opts.feasibility_tolerance));
        match result {
            Ok(conv) => {
                let report = StageReport {
                    stage,
                    seed,
                    iterations: conv.iterations,
                    residual_norm: conv.residual_norm(),
                    unknowns: conv.unknowns,
                };
                info!("{report}");
                Ok(report)
            }
            Err(e) => {
                let err = AscentError::from_shooting(stage, e);
                error!("{err}");
                if let Some(x) = err.unknowns() {
                    error!("unknowns: {}", x.transpose());
                }
                Err(err)
            }
        }
    }
}

/// A bootstrap running on a worker thread.
#[derive(Debug)]
pub struct BootstrapHandle {
    cancel: std::sync::Arc<AtomicBool>,
    handle: JoinHandle<Result<Solution, AscentError>>,
}

impl BootstrapHandle {
    /// Requests the bootstrap to stop at the next stage or root finder iteration.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the bootstrap to finish. A panic of the worker is propagated to the caller.
    pub fn join(self) -> Result<Solution, AscentError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
