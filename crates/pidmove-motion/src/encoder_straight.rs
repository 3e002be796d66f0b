//! [`EncoderStraight`] – drive straight without a gyro.
//!
//! Holds the difference between the left and right encoder travel, measured
//! from construction, at zero: `error = Δleft - Δright`,
//! `left = speed - output`, `right = speed + output`.  Useful when the gyro
//! drifts or is not fitted; it cannot correct a heading error that existed
//! before the move started.

use pidmove_hal::{MotorHandle, PidController, TwoWheelDrive};
use pidmove_types::{Behavior, DriveCommand, MotionError, PartialTuning};
use tracing::{info, trace};

use crate::defaults::{HardwareDefaults, TuningProfile};
use crate::guard::{RunGuard, RunSummary};

pub struct EncoderStraight {
    pub speed: f64,
    baseline: i32,
    drive: TwoWheelDrive,
    pid: PidController,
}

impl EncoderStraight {
    pub fn builder(speed: f64) -> EncoderStraightBuilder {
        EncoderStraightBuilder {
            speed,
            left: None,
            right: None,
            tuning: PartialTuning::new(),
        }
    }

    fn difference(&self) -> i32 {
        self.drive.left().angle() - self.drive.right().angle()
    }

    pub fn step(&mut self) -> Result<DriveCommand, MotionError> {
        let error = f64::from(self.difference() - self.baseline);
        let output = self.pid.update(error);
        let command = DriveCommand {
            left: self.speed - output,
            right: self.speed + output,
        };
        self.drive.left().run(command.left)?;
        self.drive.right().run(command.right)?;
        trace!(error, output, "encoder_straight tick");
        Ok(command)
    }

    pub fn run_until(&mut self, mut stop: impl FnMut() -> bool, guard: &RunGuard) -> Result<RunSummary, MotionError> {
        info!(behavior = %Behavior::EncoderStraight, speed = self.speed, "starting");
        let mut run = guard.start(Behavior::EncoderStraight);
        while !stop() {
            run.tick(&self.drive)?;
            self.step()?;
        }
        let summary = run.summary();
        info!(behavior = %Behavior::EncoderStraight, ticks = summary.ticks, "finished");
        Ok(summary)
    }

    pub fn run_until_then_hold(&mut self, stop: impl FnMut() -> bool, guard: &RunGuard) -> Result<RunSummary, MotionError> {
        let summary = self.run_until(stop, guard)?;
        self.drive.hold()?;
        Ok(summary)
    }

    pub fn drive(&self) -> &TwoWheelDrive {
        &self.drive
    }
}

pub struct EncoderStraightBuilder {
    speed: f64,
    left: Option<MotorHandle>,
    right: Option<MotorHandle>,
    tuning: PartialTuning,
}

impl EncoderStraightBuilder {
    pub fn motors(mut self, left: MotorHandle, right: MotorHandle) -> Self {
        self.left = Some(left);
        self.right = Some(right);
        self
    }

    pub fn tuning(mut self, tuning: impl Into<PartialTuning>) -> Self {
        self.tuning = tuning.into();
        self
    }

    pub fn build(self, defaults: &HardwareDefaults) -> Result<EncoderStraight, MotionError> {
        let behavior = Behavior::EncoderStraight;
        let drive = defaults.resolve_drive(behavior, self.left, self.right)?;
        let tuning = defaults.resolve_tuning(TuningProfile::EncoderStraight, self.tuning)?;
        let baseline = drive.left().angle() - drive.right().angle();
        Ok(EncoderStraight {
            speed: self.speed,
            baseline,
            drive,
            pid: PidController::new(0.0, tuning),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::drive_angle_reached;
    use pidmove_hal::SimRobot;
    use pidmove_types::{Stop, Tuning};

    fn defaults(robot: &SimRobot) -> HardwareDefaults {
        let mut defaults = HardwareDefaults::new();
        defaults.set_default_motors(robot.left_motor(), robot.right_motor());
        defaults.set_default_tuning(TuningProfile::EncoderStraight, Tuning::gains(2.0, 0.0, 0.0));
        defaults
    }

    #[test]
    fn leading_left_wheel_is_slowed() {
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let mut straight = EncoderStraight::builder(300.0).build(&defaults).unwrap();

        robot.left_motor().run_angle(100.0, 10, Stop::Hold, true).unwrap();
        let command = straight.step().unwrap();
        assert_eq!(command, DriveCommand { left: 280.0, right: 320.0 });
    }

    #[test]
    fn difference_is_measured_from_construction() {
        let robot = SimRobot::builder().build();
        robot.left_motor().run_angle(100.0, 30, Stop::Hold, true).unwrap();
        let defaults = defaults(&robot);
        let mut straight = EncoderStraight::builder(300.0).build(&defaults).unwrap();

        let command = straight.step().unwrap();
        assert_eq!(command, DriveCommand { left: 300.0, right: 300.0 });
    }

    #[test]
    fn keeps_wheels_together_until_distance() {
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let mut straight = EncoderStraight::builder(250.0).build(&defaults).unwrap();
        robot.right_motor().run_angle(100.0, 8, Stop::Hold, true).unwrap();

        let stop = drive_angle_reached(straight.drive(), 500.0);
        straight.run_until_then_hold(stop, &RunGuard::default()).unwrap();

        let left = robot.left_motor().angle();
        let right = robot.right_motor().angle();
        assert!((left - right).abs() <= 1, "left {left} right {right}");
        assert!(straight.drive().angle() >= 500.0);
    }
}
