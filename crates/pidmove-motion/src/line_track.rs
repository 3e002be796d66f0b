//! [`LineTrack`] – follow one edge of a line with a single colour sensor.
//!
//! The controller holds `reflection - threshold` at zero.  Its output is
//! multiplied by the edge's direction (`+1` left edge, `-1` right edge) so
//! one set of gains follows either edge, then applied as
//! `left = speed + output`, `right = speed - output`.

use pidmove_hal::{ColorHandle, MotorHandle, PidController, TwoWheelDrive};
use pidmove_types::{Behavior, DriveCommand, LineEdge, MotionError, PartialTuning};
use tracing::{info, trace};

use crate::defaults::{HardwareDefaults, TuningProfile};
use crate::guard::{RunGuard, RunSummary};

pub struct LineTrack {
    /// Cruise speed in degrees per second; may be changed between ticks.
    pub speed: f64,
    edge: LineEdge,
    threshold: i32,
    sensor: ColorHandle,
    drive: TwoWheelDrive,
    pid: PidController,
}

impl LineTrack {
    pub fn builder(speed: f64, edge: LineEdge) -> LineTrackBuilder {
        LineTrackBuilder {
            speed,
            edge,
            sensor: None,
            threshold: None,
            left: None,
            right: None,
            tuning: PartialTuning::new(),
        }
    }

    /// One controller update from the current reflection, edge direction
    /// applied, without touching the motors.
    pub fn raw_controller_output(&mut self) -> f64 {
        let error = f64::from(self.sensor.reflection() - self.threshold);
        self.edge.multiplier() * self.pid.update(error)
    }

    pub fn step(&mut self) -> Result<DriveCommand, MotionError> {
        let output = self.raw_controller_output();
        let command = DriveCommand {
            left: self.speed + output,
            right: self.speed - output,
        };
        self.drive.left().run(command.left)?;
        self.drive.right().run(command.right)?;
        trace!(output, left = command.left, right = command.right, "line_track tick");
        Ok(command)
    }

    /// Step until `stop` returns true.  The motors keep their last command.
    pub fn run_until(&mut self, mut stop: impl FnMut() -> bool, guard: &RunGuard) -> Result<RunSummary, MotionError> {
        info!(
            behavior = %Behavior::LineTrack,
            edge = ?self.edge,
            threshold = self.threshold,
            speed = self.speed,
            "starting"
        );
        let mut run = guard.start(Behavior::LineTrack);
        while !stop() {
            run.tick(&self.drive)?;
            self.step()?;
        }
        let summary = run.summary();
        info!(behavior = %Behavior::LineTrack, ticks = summary.ticks, "finished");
        Ok(summary)
    }

    pub fn run_until_then_hold(&mut self, stop: impl FnMut() -> bool, guard: &RunGuard) -> Result<RunSummary, MotionError> {
        let summary = self.run_until(stop, guard)?;
        self.drive.hold()?;
        Ok(summary)
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn drive(&self) -> &TwoWheelDrive {
        &self.drive
    }
}

pub struct LineTrackBuilder {
    speed: f64,
    edge: LineEdge,
    sensor: Option<ColorHandle>,
    threshold: Option<i32>,
    left: Option<MotorHandle>,
    right: Option<MotorHandle>,
    tuning: PartialTuning,
}

impl LineTrackBuilder {
    pub fn sensor(mut self, sensor: ColorHandle) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Reflectance at the line edge.  Without this the sensor's known
    /// threshold is used.
    pub fn threshold(mut self, threshold: i32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn motors(mut self, left: MotorHandle, right: MotorHandle) -> Self {
        self.left = Some(left);
        self.right = Some(right);
        self
    }

    pub fn tuning(mut self, tuning: impl Into<PartialTuning>) -> Self {
        self.tuning = tuning.into();
        self
    }

    pub fn build(self, defaults: &HardwareDefaults) -> Result<LineTrack, MotionError> {
        let behavior = Behavior::LineTrack;
        let sensor = defaults.resolve_line_sensor(behavior, self.sensor)?;
        let threshold = defaults.resolve_threshold(behavior, "threshold", self.threshold, &sensor)?;
        let drive = defaults.resolve_drive(behavior, self.left, self.right)?;
        let tuning = defaults.resolve_tuning(TuningProfile::LineTrack, self.tuning)?;
        Ok(LineTrack {
            speed: self.speed,
            edge: self.edge,
            threshold,
            sensor,
            drive,
            pid: PidController::new(f64::from(threshold), tuning),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::after_ticks;
    use pidmove_hal::sim::{ReflectanceProfile, TRACKING_SENSOR_PORT};
    use pidmove_hal::SimRobot;
    use pidmove_types::Tuning;

    fn defaults(robot: &SimRobot) -> HardwareDefaults {
        let mut defaults = HardwareDefaults::new();
        defaults.set_default_motors(robot.left_motor(), robot.right_motor());
        if let Some(sensor) = robot.color_sensor(TRACKING_SENSOR_PORT) {
            defaults.set_default_line_sensor(sensor);
        }
        defaults.set_default_tuning(TuningProfile::LineTrack, Tuning::gains(1.0, 0.0, 50.0));
        defaults.set_known_thresholds([(TRACKING_SENSOR_PORT, 45)]);
        defaults
    }

    #[test]
    fn converges_onto_left_edge() {
        let robot = SimRobot::builder()
            .with_initial_lateral(-15.0)
            .with_tracking_sensor()
            .build();
        let defaults = defaults(&robot);
        let mut track = LineTrack::builder(200.0, LineEdge::Left).build(&defaults).unwrap();
        assert_eq!(track.threshold(), 45);

        track
            .run_until_then_hold(after_ticks(1_500), &RunGuard::default())
            .unwrap();
        let lateral = robot.world().lateral();
        assert!(lateral.abs() < 5.0, "lateral offset {lateral}");
        assert!(robot.world().heading().abs() < 10.0);
    }

    #[test]
    fn edge_direction_flips_correction() {
        let robot = SimRobot::builder()
            .with_initial_lateral(-40.0)
            .with_tracking_sensor()
            .build();
        let defaults = defaults(&robot);

        // Light surface (80) against threshold 45.
        let mut left_edge = LineTrack::builder(100.0, LineEdge::Left)
            .tuning(PartialTuning::new().kd(0.0))
            .build(&defaults)
            .unwrap();
        assert_eq!(left_edge.step().unwrap(), DriveCommand { left: 135.0, right: 65.0 });

        let mut right_edge = LineTrack::builder(100.0, LineEdge::Right)
            .tuning(PartialTuning::new().kd(0.0))
            .build(&defaults)
            .unwrap();
        assert_eq!(right_edge.step().unwrap(), DriveCommand { left: 65.0, right: 135.0 });
    }

    #[test]
    fn explicit_threshold_needs_no_known_threshold() {
        let robot = SimRobot::builder().with_tracking_sensor().build();
        let mut defaults = HardwareDefaults::new();
        defaults.set_default_motors(robot.left_motor(), robot.right_motor());
        let sensor = robot.color_sensor(TRACKING_SENSOR_PORT).unwrap();

        let err = LineTrack::builder(100.0, LineEdge::Left)
            .sensor(sensor.clone())
            .tuning(Tuning::gains(1.0, 0.0, 0.0))
            .build(&defaults)
            .err()
            .unwrap();
        assert_eq!(err, MotionError::missing(Behavior::LineTrack, "threshold"));

        let track = LineTrack::builder(100.0, LineEdge::Left)
            .sensor(sensor)
            .threshold(52)
            .tuning(Tuning::gains(1.0, 0.0, 0.0))
            .build(&defaults)
            .unwrap();
        assert_eq!(track.threshold(), 52);
    }

    #[test]
    fn missing_line_sensor_is_a_configuration_error() {
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let err = LineTrack::builder(100.0, LineEdge::Right).build(&defaults).err().unwrap();
        assert_eq!(err, MotionError::missing(Behavior::LineTrack, "line_sensor"));
    }

    #[test]
    fn midpoint_threshold_drives_straight_on_the_edge() {
        let mat = ReflectanceProfile {
            light: 90,
            dark: 20,
            ramp: 10.0,
        };
        let robot = SimRobot::builder()
            .with_edge_profile(mat)
            .with_tracking_sensor()
            .build();
        let mut defaults = defaults(&robot);
        defaults.set_known_thresholds([(TRACKING_SENSOR_PORT, mat.midpoint())]);

        let mut track = LineTrack::builder(150.0, LineEdge::Left)
            .tuning(PartialTuning::new().kd(0.0))
            .build(&defaults)
            .unwrap();
        assert_eq!(track.threshold(), 55);
        assert_eq!(track.step().unwrap(), DriveCommand { left: 150.0, right: 150.0 });
    }
}
