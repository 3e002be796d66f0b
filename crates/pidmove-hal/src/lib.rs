//! `pidmove-hal` – Hardware Abstraction Layer
//!
//! Everything the movement behaviors need to touch the robot, and nothing
//! they decide.
//!
//! # Modules
//!
//! - [`motor`] – the [`Motor`][motor::Motor] trait implemented by drive
//!   motor drivers, shared as [`MotorHandle`][motor::MotorHandle].
//! - [`sensor`] – [`GyroSensor`][sensor::GyroSensor] and
//!   [`ColorSensor`][sensor::ColorSensor] traits.
//! - [`drive_base`] – [`TwoWheelDrive`][drive_base::TwoWheelDrive]: two
//!   motors commanded as one.
//! - [`pid`] – [`PidController`][pid::PidController]: the discrete PID
//!   controller every behavior is built on.
//! - [`registry`] – [`HardwareRegistry`][registry::HardwareRegistry]:
//!   port-keyed lookup of registered drivers.
//! - [`sim`] – a deterministic kinematic simulator implementing all of the
//!   above traits, used by tests and the CLI demo.

pub mod drive_base;
pub mod motor;
pub mod pid;
pub mod registry;
pub mod sensor;
pub mod sim;

pub use drive_base::TwoWheelDrive;
pub use motor::{Motor, MotorHandle};
pub use pid::PidController;
pub use registry::HardwareRegistry;
pub use sensor::{ColorHandle, ColorSensor, GyroHandle, GyroSensor};
pub use sim::{SimConfig, SimRobot};
