//! `pidmove-motion` – Closed-loop Movement Behaviors
//!
//! Every behavior follows the same cycle: read a sensor, compute the error
//! against a setpoint, feed it through a
//! [`PidController`][pidmove_hal::PidController], turn the output into
//! differential wheel speeds, and poll a stop condition.  Loops block the
//! calling thread and are bounded only by their [`RunGuard`].
//!
//! # Modules
//!
//! - [`defaults`] – [`HardwareDefaults`][defaults::HardwareDefaults]:
//!   resolves omitted motors, sensors, gains and thresholds to values
//!   registered once at startup.
//! - [`guard`] – [`RunGuard`][guard::RunGuard] and
//!   [`CancelToken`][guard::CancelToken]: timeout, tick budget and
//!   cancellation for run loops.
//! - [`conditions`] – stop-condition helpers for `run_until`.
//! - [`gyro_straight`] – heading-hold straight driving.
//! - [`gyro_turn`] – in-place rotation to a heading, one or both wheels
//!   driven.
//! - [`line_track`] – single-sensor line-edge following.
//! - [`line_square`] – two-sensor perpendicular alignment to a line.
//! - [`encoder_straight`] – straight driving on wheel encoders alone.

pub mod conditions;
pub mod defaults;
pub mod encoder_straight;
pub mod guard;
pub mod gyro_straight;
pub mod gyro_turn;
pub mod line_square;
pub mod line_track;

pub use defaults::{DefaultsConfig, HardwareDefaults, TuningProfile};
pub use encoder_straight::EncoderStraight;
pub use guard::{CancelToken, RunGuard, RunSummary};
pub use gyro_straight::GyroStraight;
pub use gyro_turn::{GyroTurn, TurnPrecision};
pub use line_square::{EdgeEvent, LineSquare, LineSquareReport};
pub use line_track::LineTrack;
