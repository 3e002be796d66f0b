//! Simulated demonstration run: a short fixed sequence of behaviors on the
//! in-process simulator, wired entirely from [`Config`].

use pidmove_hal::SimRobot;
use pidmove_motion::conditions::{after_ticks, drive_angle_reached};
use pidmove_motion::guard::CancelToken;
use pidmove_motion::{EncoderStraight, GyroStraight, GyroTurn, HardwareDefaults, LineSquare, LineTrack, TurnPrecision};
use pidmove_types::{Behavior, LineEdge, LinePosition, MotionError};
use tracing::{info, warn};

use crate::config::Config;

/// One finished step of the demo.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub name: &'static str,
    pub ticks: u64,
    pub heading: i32,
    pub detail: String,
}

const CRUISE_SPEED: f64 = 400.0;
const RAMP_START_SPEED: f64 = 100.0;

/// Run the demo sequence, reporting each step to `on_step` as it finishes.
/// Every registered motor is left holding, whether or not the sequence
/// completed.
///
/// # Errors
///
/// The first error raised by any behavior, including
/// [`MotionError::Cancelled`] once `cancel` is set.
pub fn run(
    cfg: &Config,
    robot: &SimRobot,
    cancel: &CancelToken,
    on_step: impl FnMut(&StepOutcome),
) -> Result<(), MotionError> {
    let result = run_steps(cfg, robot, cancel, on_step);
    if let Err(e) = robot.registry().hold_all() {
        warn!(error = %e, "failed to park motors after demo");
    }
    result
}

/// The simulated robot described by `cfg.sim`.
pub fn robot(cfg: &Config) -> SimRobot {
    let [left_offset, right_offset] = cfg.sim.square_sensor_offsets;
    SimRobot::builder()
        .with_config(cfg.sim.world.clone())
        .with_square_sensors(left_offset, right_offset)
        .with_tracking_sensor()
        .build()
}

fn run_steps(
    cfg: &Config,
    robot: &SimRobot,
    cancel: &CancelToken,
    mut on_step: impl FnMut(&StepOutcome),
) -> Result<(), MotionError> {
    let defaults = HardwareDefaults::from_config(&cfg.motion, robot.registry())?;
    let gyro = robot.gyro();
    let mut report = |name: &'static str, ticks: u64, detail: String| {
        let outcome = StepOutcome {
            name,
            ticks,
            heading: gyro.angle(),
            detail,
        };
        info!(step = name, ticks, heading = outcome.heading, "demo step finished");
        on_step(&outcome);
    };

    // Heading-hold with a speed ramp, re-tasking the same controller.
    let mut straight = GyroStraight::builder(0, RAMP_START_SPEED).build(&defaults)?;
    straight.drive().reset_angle(0)?;
    let mut reached = drive_angle_reached(straight.drive(), 300.0);
    let guard = cfg.run.guard(cancel);
    let mut guarded = guard.start(Behavior::GyroStraight);
    while !reached() {
        guarded.tick(straight.drive())?;
        straight.speed = (RAMP_START_SPEED + straight.drive().angle() * 2.0).min(CRUISE_SPEED);
        straight.step()?;
    }
    straight.drive().hold()?;
    report(
        "gyro straight (ramped)",
        guarded.ticks(),
        format!("drive angle {:.0}", straight.drive().angle()),
    );

    let mut turn = GyroTurn::builder(90, true, true).build(&defaults)?;
    let summary = turn.run(TurnPrecision::Loose, &cfg.run.guard(cancel))?;
    report("gyro turn (loose)", summary.ticks, "both wheels driven".to_string());

    let mut turn = GyroTurn::builder(0, true, true).build(&defaults)?;
    let summary = turn.run(TurnPrecision::Precise, &cfg.run.guard(cancel))?;
    report("gyro turn (precise)", summary.ticks, "both wheels driven".to_string());

    let mut encoder = EncoderStraight::builder(250.0).build(&defaults)?;
    let stop = drive_angle_reached(encoder.drive(), 450.0);
    let summary = encoder.run_until_then_hold(stop, &cfg.run.guard(cancel))?;
    report(
        "encoder straight",
        summary.ticks,
        format!("drive angle {:.0}", encoder.drive().angle()),
    );

    let mut square = LineSquare::builder(LinePosition::Ahead).build(&defaults)?;
    let squared = square.run(&cfg.run.guard(cancel))?;
    let mut detail = format!("{} edge contact(s)", squared.edge_events.len());
    if let Some(anomaly) = &squared.anomaly {
        detail.push_str(&format!(", {anomaly}"));
    }
    report("line square", squared.approach_ticks + squared.align_ticks, detail);

    let mut track = LineTrack::builder(250.0, LineEdge::Left).build(&defaults)?;
    let summary = track.run_until_then_hold(after_ticks(800), &cfg.run.guard(cancel))?;
    report(
        "line track",
        summary.ticks,
        format!("lateral offset {:.1}", robot.world().lateral()),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_every_step() {
        let mut cfg = Config::default();
        cfg.motion.line_square.settle_ms = 0;
        let mut steps = Vec::new();
        run(&cfg, &robot(&cfg), &CancelToken::new(), |s| steps.push(s.clone())).expect("demo completes");

        let names: Vec<_> = steps.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "gyro straight (ramped)",
                "gyro turn (loose)",
                "gyro turn (precise)",
                "encoder straight",
                "line square",
                "line track",
            ]
        );
        assert!((steps[1].heading - 90).abs() <= 1);
        assert_eq!(steps[2].heading, 0);
        assert_eq!(steps[4].detail, "2 edge contact(s)");
    }

    #[test]
    fn cancelled_token_stops_first_step() {
        let cfg = Config::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut steps = 0;
        let err = run(&cfg, &robot(&cfg), &cancel, |_| steps += 1).unwrap_err();
        assert!(matches!(err, MotionError::Cancelled { behavior: Behavior::GyroStraight, ticks: 0 }));
        assert_eq!(steps, 0);
    }

    #[test]
    fn failed_sequence_still_parks_motors() {
        let mut cfg = Config::default();
        cfg.motion.wiring.gyro = None;
        let robot = robot(&cfg);
        robot.left_motor().run(300.0).expect("run");
        robot.right_motor().run(300.0).expect("run");

        let err = run(&cfg, &robot, &CancelToken::new(), |_| {}).unwrap_err();
        assert_eq!(err, MotionError::missing(Behavior::GyroStraight, "gyro"));
        assert_eq!(robot.left_motor().speed(), 0);
        assert_eq!(robot.right_motor().speed(), 0);
    }
}
