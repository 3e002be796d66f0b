//! [`GyroTurn`] – rotate in place to a gyro heading.
//!
//! Either wheel, or both, may be driven.  The driven wheels receive the
//! controller output with opposite signs (`left = -output`,
//! `right = +output`); an undriven wheel is always commanded `0`.  Single-
//! and double-wheel turns resolve separate tuning profiles.
//!
//! The turn ends when the heading is within tolerance and both wheels have
//! slowed to the exit speed, then both motors hold.  [`TurnPrecision::Precise`]
//! requires an exact heading and stationary wheels;
//! [`TurnPrecision::Loose`] uses the registered [`TurnSettings`], which
//! avoids hunting around the target.

use pidmove_hal::{GyroHandle, MotorHandle, PidController, TwoWheelDrive};
use pidmove_types::{Behavior, DriveCommand, MotionError, PartialTuning};
use tracing::{info, trace};

use crate::defaults::{HardwareDefaults, TuningProfile, TurnSettings};
use crate::guard::{RunGuard, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPrecision {
    #[default]
    Precise,
    Loose,
}

pub struct GyroTurn {
    target: f64,
    left_driven: bool,
    right_driven: bool,
    gyro: GyroHandle,
    drive: TwoWheelDrive,
    pid: PidController,
    settings: TurnSettings,
}

impl GyroTurn {
    pub fn builder(target: i32, left_driven: bool, right_driven: bool) -> GyroTurnBuilder {
        GyroTurnBuilder {
            target,
            left_driven,
            right_driven,
            gyro: None,
            left: None,
            right: None,
            tuning: PartialTuning::new(),
        }
    }

    fn error(&self) -> f64 {
        f64::from(self.gyro.angle()) - self.target
    }

    /// One controller update from the current heading, without touching
    /// the motors.
    pub fn raw_controller_output(&mut self) -> f64 {
        let error = self.error();
        self.pid.update(error)
    }

    pub fn step(&mut self) -> Result<DriveCommand, MotionError> {
        let output = self.raw_controller_output();
        let command = DriveCommand {
            left: if self.left_driven { -output } else { 0.0 },
            right: if self.right_driven { output } else { 0.0 },
        };
        self.drive.left().run(command.left)?;
        self.drive.right().run(command.right)?;
        trace!(output, left = command.left, right = command.right, "gyro_turn tick");
        Ok(command)
    }

    fn settled(&self, tolerance: i32, exit_speed: i32) -> bool {
        let heading_ok = self.error().abs() <= f64::from(tolerance);
        heading_ok
            && self.drive.left().speed().abs() <= exit_speed
            && self.drive.right().speed().abs() <= exit_speed
    }

    /// Turn until settled, then hold both motors.
    pub fn run(&mut self, precision: TurnPrecision, guard: &RunGuard) -> Result<RunSummary, MotionError> {
        let (tolerance, exit_speed) = match precision {
            TurnPrecision::Precise => (0, 0),
            TurnPrecision::Loose => (self.settings.loose_tolerance, self.settings.loose_exit_speed),
        };
        info!(
            behavior = %Behavior::GyroTurn,
            target = self.target,
            left_driven = self.left_driven,
            right_driven = self.right_driven,
            ?precision,
            "starting"
        );

        let mut run = guard.start(Behavior::GyroTurn);
        while !self.settled(tolerance, exit_speed) {
            run.tick(&self.drive)?;
            self.step()?;
        }
        self.drive.hold()?;

        let summary = run.summary();
        info!(behavior = %Behavior::GyroTurn, ticks = summary.ticks, heading = self.gyro.angle(), "finished");
        Ok(summary)
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn controller(&self) -> &PidController {
        &self.pid
    }
}

pub struct GyroTurnBuilder {
    target: i32,
    left_driven: bool,
    right_driven: bool,
    gyro: Option<GyroHandle>,
    left: Option<MotorHandle>,
    right: Option<MotorHandle>,
    tuning: PartialTuning,
}

impl GyroTurnBuilder {
    pub fn gyro(mut self, gyro: GyroHandle) -> Self {
        self.gyro = Some(gyro);
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

    /// # Errors
    ///
    /// - [`MotionError::InvalidParameter`] if neither wheel is driven.
    /// - [`MotionError::Configuration`] for an unresolvable gyro, motor or
    ///   gain.  The gains come from the single- or double-wheel profile
    ///   according to the driven flags.
    pub fn build(self, defaults: &HardwareDefaults) -> Result<GyroTurn, MotionError> {
        let behavior = Behavior::GyroTurn;
        let profile = match (self.left_driven, self.right_driven) {
            (true, true) => TuningProfile::GyroTurnDouble,
            (true, false) | (false, true) => TuningProfile::GyroTurnSingle,
            (false, false) => {
                return Err(MotionError::InvalidParameter {
                    behavior,
                    parameter: "driven_wheels".to_string(),
                    details: "at least one wheel must be driven".to_string(),
                });
            }
        };
        let gyro = defaults.resolve_gyro(behavior, self.gyro)?;
        let drive = defaults.resolve_drive(behavior, self.left, self.right)?;
        let tuning = defaults.resolve_tuning(profile, self.tuning)?;
        let target = f64::from(self.target);
        Ok(GyroTurn {
            target,
            left_driven: self.left_driven,
            right_driven: self.right_driven,
            gyro,
            drive,
            pid: PidController::new(target, tuning),
            settings: defaults.turn_settings(),
        })
    }
}
