extern crate pontryagin_ascent as ascent;

use ascent::io::{ConfigRepr, Configurable, Mission, MissionConfig, TargetConfig};
use ascent::prelude::*;
use std::path::PathBuf;

fn mission_path() -> PathBuf {
    PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or(".".to_string()))
        .join("data")
        .join("leo_ascent.yaml")
}

#[test]
fn load_mission_file() {
    let cfg = MissionConfig::load(mission_path()).unwrap();
    assert_eq!(cfg.stages.len(), 1);
    assert_eq!(
        cfg.target,
        TargetConfig::FreePlane {
            radius: 6_778_137.0,
            speed: None,
            fpa_deg: 0.0,
            inclination_deg: None
        }
    );

    let mission = Mission::from_yaml(mission_path()).unwrap();
    assert_eq!(mission.epoch, crate::launch_epoch());
    assert_eq!(mission.context.opts.fixed_steps, Some(200));
    assert_eq!(
        mission.context.boundary_mode(),
        crate::leo_context().boundary_mode()
    );
}

#[test]
fn solve_mission_file() {
    let _ = pretty_env_logger::try_init();
    let mission = Mission::from_yaml(mission_path()).unwrap();
    let solution = mission
        .context
        .bootstrap(&mission.stages, mission.epoch)
        .unwrap();
    assert!(solution.residuals().norm() < 1e-6);
    assert!(solution.burn_time() > Duration::ZERO);
}
