//! Generic `Motor` trait for the drive motors.
//!
//! Drivers implement this trait and register themselves with a
//! [`HardwareRegistry`][crate::registry::HardwareRegistry].  Movement
//! behaviors only ever talk to the trait, so the same control code runs
//! against real hardware and against [`SimMotor`][crate::sim::SimMotor].

use std::sync::Arc;
use std::time::Duration;

use pidmove_types::{MotionError, MotorPort, Stop};

/// A speed-controlled motor with an angle encoder.
///
/// Speeds are in degrees per second, angles in degrees.  Methods take
/// `&self` because a motor is a process-wide resource shared by every
/// behavior; drivers keep their own interior state.
pub trait Motor: Send + Sync {
    /// The port this motor is plugged into.
    fn port(&self) -> MotorPort;

    /// Run at a constant signed speed until given another command.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::HardwareFault`] if the command cannot be applied.
    fn run(&self, speed: f64) -> Result<(), MotionError>;

    /// Stop and actively hold the current angle.
    fn hold(&self) -> Result<(), MotionError>;

    /// Encoder angle in degrees.
    fn angle(&self) -> i32;

    /// Current speed in degrees per second.
    fn speed(&self) -> i32;

    /// Redefine the current encoder angle as `angle`.
    fn reset_angle(&self, angle: i32) -> Result<(), MotionError>;

    /// Run at `speed` for `duration`, then apply `then`.  When `wait` is
    /// `false` the call returns as soon as the command is issued.
    fn run_time(&self, speed: f64, duration: Duration, then: Stop, wait: bool) -> Result<(), MotionError>;

    /// Rotate by `rotation_angle` degrees relative to the current angle.
    fn run_angle(&self, speed: f64, rotation_angle: i32, then: Stop, wait: bool) -> Result<(), MotionError>;

    /// Rotate to the absolute encoder angle `target_angle`.
    fn run_target(&self, speed: f64, target_angle: i32, then: Stop, wait: bool) -> Result<(), MotionError>;

    /// Open-loop duty cycle in percent (`-100..=100`).
    fn dc(&self, duty: f64) -> Result<(), MotionError>;
}

/// Shared handle to a registered motor.
pub type MotorHandle = Arc<dyn Motor>;
