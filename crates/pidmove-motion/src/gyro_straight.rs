//! [`GyroStraight`] – drive straight while holding a gyro heading.
//!
//! Each tick the heading error `gyro - target` goes through the controller,
//! and the output is split across the wheels: `left = speed - output`,
//! `right = speed + output`.  A positive output therefore turns the robot
//! counter-clockwise, back toward the target.
//!
//! `speed` is a public field so a caller stepping the behavior can ramp it
//! without losing the controller's integral and derivative memory.

use pidmove_hal::{GyroHandle, MotorHandle, PidController, TwoWheelDrive};
use pidmove_types::{Behavior, DriveCommand, MotionError, PartialTuning};
use tracing::{info, trace};

use crate::defaults::{HardwareDefaults, TuningProfile};
use crate::guard::{RunGuard, RunSummary};

pub struct GyroStraight {
    /// Cruise speed in degrees per second; may be changed between ticks.
    pub speed: f64,
    target: f64,
    gyro: GyroHandle,
    drive: TwoWheelDrive,
    pid: PidController,
}

impl GyroStraight {
    /// Start building a heading-hold drive toward `target` heading at
    /// `speed`.
    pub fn builder(target: i32, speed: f64) -> GyroStraightBuilder {
        GyroStraightBuilder {
            target,
            speed,
            gyro: None,
            left: None,
            right: None,
            tuning: PartialTuning::new(),
        }
    }

    /// Read the gyro, update the controller and command both wheels once.
    pub fn step(&mut self) -> Result<DriveCommand, MotionError> {
        let error = f64::from(self.gyro.angle()) - self.target;
        let output = self.pid.update(error);
        let command = DriveCommand {
            left: self.speed - output,
            right: self.speed + output,
        };
        self.drive.left().run(command.left)?;
        self.drive.right().run(command.right)?;
        trace!(error, output, left = command.left, right = command.right, "gyro_straight tick");
        Ok(command)
    }

    /// Step until `stop` returns true.  The motors keep their last command;
    /// the caller decides how to stop.
    pub fn run_until(&mut self, mut stop: impl FnMut() -> bool, guard: &RunGuard) -> Result<RunSummary, MotionError> {
        info!(behavior = %Behavior::GyroStraight, target = self.target, speed = self.speed, "starting");
        let mut run = guard.start(Behavior::GyroStraight);
        while !stop() {
            run.tick(&self.drive)?;
            self.step()?;
        }
        let summary = run.summary();
        info!(behavior = %Behavior::GyroStraight, ticks = summary.ticks, "finished");
        Ok(summary)
    }

    /// [`run_until`](Self::run_until), then hold both motors.
    pub fn run_until_then_hold(&mut self, stop: impl FnMut() -> bool, guard: &RunGuard) -> Result<RunSummary, MotionError> {
        let summary = self.run_until(stop, guard)?;
        self.drive.hold()?;
        Ok(summary)
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn drive(&self) -> &TwoWheelDrive {
        &self.drive
    }

    pub fn controller(&self) -> &PidController {
        &self.pid
    }
}

/// Builder for [`GyroStraight`].  Anything not set resolves through
/// [`HardwareDefaults`].
pub struct GyroStraightBuilder {
    target: i32,
    speed: f64,
    gyro: Option<GyroHandle>,
    left: Option<MotorHandle>,
    right: Option<MotorHandle>,
    tuning: PartialTuning,
}

impl GyroStraightBuilder {
    pub fn gyro(mut self, gyro: GyroHandle) -> Self {
        self.gyro = Some(gyro);
        self
    }

    pub fn motors(mut self, left: MotorHandle, right: MotorHandle) -> Self {
        self.left = Some(left);
        self.right = Some(right);
        self
    }

    /// Override some or all of the registered tuning.
    pub fn tuning(mut self, tuning: impl Into<PartialTuning>) -> Self {
        self.tuning = tuning.into();
        self
    }

    /// # Errors
    ///
    /// [`MotionError::Configuration`] if the gyro, a motor or a gain has
    /// neither an explicit value nor a registered default.
    pub fn build(self, defaults: &HardwareDefaults) -> Result<GyroStraight, MotionError> {
        let behavior = Behavior::GyroStraight;
        let gyro = defaults.resolve_gyro(behavior, self.gyro)?;
        let drive = defaults.resolve_drive(behavior, self.left, self.right)?;
        let tuning = defaults.resolve_tuning(TuningProfile::GyroStraight, self.tuning)?;
        let target = f64::from(self.target);
        Ok(GyroStraight {
            speed: self.speed,
            target,
            gyro,
            drive,
            pid: PidController::new(target, tuning),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{after_ticks, drive_angle_reached};
    use pidmove_hal::SimRobot;
    use pidmove_types::Tuning;

    fn defaults(robot: &SimRobot) -> HardwareDefaults {
        let mut defaults = HardwareDefaults::new();
        defaults.set_default_motors(robot.left_motor(), robot.right_motor());
        defaults.set_default_gyro(robot.gyro());
        defaults.set_default_tuning(TuningProfile::GyroStraight, Tuning::gains(3.0, 0.0, 0.0));
        defaults
    }

    #[test]
    fn corrects_initial_heading_error() {
        let robot = SimRobot::builder().with_initial_heading(10.0).build();
        let defaults = defaults(&robot);
        let mut straight = GyroStraight::builder(0, 200.0).build(&defaults).unwrap();

        let stop = drive_angle_reached(straight.drive(), 720.0);
        straight.run_until_then_hold(stop, &RunGuard::default()).unwrap();

        assert!(robot.world().heading().abs() <= 1.0);
        assert_eq!(straight.drive().speed(), 0.0);
        assert!(straight.drive().angle() >= 720.0);
    }

    #[test]
    fn heading_right_of_target_slows_left_wheel() {
        let robot = SimRobot::builder().with_initial_heading(5.0).build();
        let defaults = defaults(&robot);
        let mut straight = GyroStraight::builder(0, 100.0).build(&defaults).unwrap();

        let command = straight.step().unwrap();
        assert_eq!(command, DriveCommand { left: 85.0, right: 115.0 });
    }

    #[test]
    fn speed_can_change_between_ticks() {
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let mut straight = GyroStraight::builder(0, 100.0).build(&defaults).unwrap();

        straight.run_until(after_ticks(5), &RunGuard::default()).unwrap();
        straight.speed = 400.0;
        let command = straight.step().unwrap();
        assert_eq!(command, DriveCommand { left: 400.0, right: 400.0 });
        // run_until leaves the motors running.
        assert_eq!(straight.drive().speed(), 400.0);
    }

    #[test]
    fn explicit_tuning_overrides_default() {
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let straight = GyroStraight::builder(0, 100.0)
            .tuning(PartialTuning::new().kp(7.0))
            .build(&defaults)
            .unwrap();
        assert_eq!(straight.controller().tuning().kp, 7.0);
        assert_eq!(straight.controller().setpoint(), 0.0);
    }

    #[test]
    fn missing_gyro_fails_before_commanding_motors() {
        let robot = SimRobot::builder().build();
        let mut defaults = HardwareDefaults::new();
        defaults.set_default_motors(robot.left_motor(), robot.right_motor());

        let err = GyroStraight::builder(0, 100.0).build(&defaults).err().unwrap();
        assert_eq!(err, MotionError::missing(Behavior::GyroStraight, "gyro"));
        assert_eq!(robot.world().frames(), 0);
    }

    #[test]
    fn tick_budget_stops_endless_drive() {
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let mut straight = GyroStraight::builder(0, 300.0).build(&defaults).unwrap();

        let guard = RunGuard::default().with_max_ticks(50);
        let err = straight.run_until(|| false, &guard).unwrap_err();
        assert!(matches!(err, MotionError::Timeout { ticks: 50, .. }));
        assert_eq!(robot.world().frames(), 51);
        assert_eq!(straight.drive().speed(), 0.0);
    }
}
