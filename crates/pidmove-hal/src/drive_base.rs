//! [`TwoWheelDrive`] – a two-motor drive base that behaves like a single
//! motor.
//!
//! Commands are issued to both wheels; readings are the average of the two
//! encoders.  Blocking commands start the left wheel without waiting and
//! let the right wheel's call carry the `wait` flag, so both wheels move
//! together.

use std::time::Duration;

use pidmove_types::{MotionError, Stop};

use crate::motor::MotorHandle;

#[derive(Clone)]
pub struct TwoWheelDrive {
    left: MotorHandle,
    right: MotorHandle,
}

impl TwoWheelDrive {
    pub fn new(left: MotorHandle, right: MotorHandle) -> Self {
        Self { left, right }
    }

    pub fn left(&self) -> &MotorHandle {
        &self.left
    }

    pub fn right(&self) -> &MotorHandle {
        &self.right
    }

    /// Mean wheel speed in degrees per second.
    pub fn speed(&self) -> f64 {
        f64::from(self.left.speed() + self.right.speed()) / 2.0
    }

    /// Mean wheel angle in degrees.
    pub fn angle(&self) -> f64 {
        f64::from(self.left.angle() + self.right.angle()) / 2.0
    }

    pub fn reset_angle(&self, angle: i32) -> Result<(), MotionError> {
        self.left.reset_angle(angle)?;
        self.right.reset_angle(angle)
    }

    pub fn hold(&self) -> Result<(), MotionError> {
        self.left.hold()?;
        self.right.hold()
    }

    pub fn run(&self, speed: f64) -> Result<(), MotionError> {
        self.left.run(speed)?;
        self.right.run(speed)
    }

    pub fn run_time(&self, speed: f64, duration: Duration, then: Stop, wait: bool) -> Result<(), MotionError> {
        self.left.run_time(speed, duration, then, false)?;
        self.right.run_time(speed, duration, then, wait)
    }

    pub fn run_angle(&self, speed: f64, rotation_angle: i32, then: Stop, wait: bool) -> Result<(), MotionError> {
        self.left.run_angle(speed, rotation_angle, then, false)?;
        self.right.run_angle(speed, rotation_angle, then, wait)
    }

    pub fn run_target(&self, speed: f64, target_angle: i32, then: Stop, wait: bool) -> Result<(), MotionError> {
        self.left.run_target(speed, target_angle, then, false)?;
        self.right.run_target(speed, target_angle, then, wait)
    }

    pub fn dc(&self, duty: f64) -> Result<(), MotionError> {
        self.left.dc(duty)?;
        self.right.dc(duty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRobot;

    fn drive() -> TwoWheelDrive {
        let robot = SimRobot::builder().build();
        TwoWheelDrive::new(robot.left_motor(), robot.right_motor())
    }

    #[test]
    fn run_angle_moves_both_wheels() {
        let drive = drive();
        drive.run_angle(300.0, 360, Stop::Hold, true).unwrap();
        assert_eq!(drive.left().angle(), 360);
        assert_eq!(drive.right().angle(), 360);
        assert_eq!(drive.angle(), 360.0);
        assert_eq!(drive.speed(), 0.0);
    }

    #[test]
    fn reset_angle_applies_to_both_wheels() {
        let drive = drive();
        drive.run_target(300.0, 180, Stop::Hold, true).unwrap();
        drive.reset_angle(0).unwrap();
        assert_eq!(drive.angle(), 0.0);
        drive.run_angle(300.0, -90, Stop::Hold, true).unwrap();
        assert_eq!(drive.angle(), -90.0);
    }

    #[test]
    fn run_reports_mean_speed() {
        let drive = drive();
        drive.run(250.0).unwrap();
        assert_eq!(drive.speed(), 250.0);
        drive.hold().unwrap();
        assert_eq!(drive.speed(), 0.0);
    }

    #[test]
    fn run_time_integrates_speed() {
        let drive = drive();
        drive.run_time(200.0, Duration::from_secs(2), Stop::Brake, true).unwrap();
        assert_eq!(drive.angle(), 400.0);
    }
}
