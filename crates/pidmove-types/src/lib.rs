use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output port a motor is plugged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotorPort {
    A,
    B,
    C,
    D,
}

impl fmt::Display for MotorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotorPort::A => "A",
            MotorPort::B => "B",
            MotorPort::C => "C",
            MotorPort::D => "D",
        };
        write!(f, "motor:{name}")
    }
}

/// Input port a sensor is plugged into.  Used as the stable identity of a
/// sensor when looking up its known reflectance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorPort {
    S1,
    S2,
    S3,
    S4,
}

impl fmt::Display for SensorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorPort::S1 => "S1",
            SensorPort::S2 => "S2",
            SensorPort::S3 => "S3",
            SensorPort::S4 => "S4",
        };
        write!(f, "sensor:{name}")
    }
}

/// Colour classification reported by a colour sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    None,
    Black,
    Blue,
    Green,
    Yellow,
    Red,
    White,
    Brown,
}

/// What a motor does once a timed or positional command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stop {
    Coast,
    Brake,
    #[default]
    Hold,
}

/// Which side of the robot a wheel or sensor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// The edge of the line a single tracking sensor follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEdge {
    Left,
    Right,
}

impl LineEdge {
    /// `+1` for the left edge, `-1` for the right edge.
    pub fn multiplier(self) -> f64 {
        match self {
            LineEdge::Left => 1.0,
            LineEdge::Right => -1.0,
        }
    }
}

/// Where the line to square against lies relative to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinePosition {
    Ahead,
    Behind,
}

impl LinePosition {
    /// `+1` when the line is ahead (drive forward), `-1` when behind.
    pub fn multiplier(self) -> f64 {
        match self {
            LinePosition::Ahead => 1.0,
            LinePosition::Behind => -1.0,
        }
    }
}

/// The closed-loop movement behaviors.  Used to name the origin of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    GyroStraight,
    GyroTurn,
    LineTrack,
    LineSquare,
    EncoderStraight,
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Behavior::GyroStraight => "gyro_straight",
            Behavior::GyroTurn => "gyro_turn",
            Behavior::LineTrack => "line_track",
            Behavior::LineSquare => "line_square",
            Behavior::EncoderStraight => "encoder_straight",
        };
        f.write_str(name)
    }
}

/// Fully resolved controller tuning.  A `None` limit means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub integral_limit: Option<f64>,
    pub output_limit: Option<f64>,
}

impl Tuning {
    /// Gains only, both clamps unbounded.
    pub fn gains(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: None,
            output_limit: None,
        }
    }

    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    pub fn with_output_limit(mut self, limit: f64) -> Self {
        self.output_limit = Some(limit);
        self
    }
}

/// A tuning where any field may be absent.
///
/// Used both for caller overrides at construction time and for the registered
/// per-behavior defaults.  [`PartialTuning::or`] layers an override on top of
/// a default; [`PartialTuning::resolve`] turns the result into a [`Tuning`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialTuning {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub integral_limit: Option<f64>,
    pub output_limit: Option<f64>,
}

impl From<Tuning> for PartialTuning {
    fn from(t: Tuning) -> Self {
        Self {
            kp: Some(t.kp),
            ki: Some(t.ki),
            kd: Some(t.kd),
            integral_limit: t.integral_limit,
            output_limit: t.output_limit,
        }
    }
}

impl PartialTuning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kp(mut self, kp: f64) -> Self {
        self.kp = Some(kp);
        self
    }

    pub fn ki(mut self, ki: f64) -> Self {
        self.ki = Some(ki);
        self
    }

    pub fn kd(mut self, kd: f64) -> Self {
        self.kd = Some(kd);
        self
    }

    pub fn integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    pub fn output_limit(mut self, limit: f64) -> Self {
        self.output_limit = Some(limit);
        self
    }

    /// Field-wise `self` if present, otherwise `fallback`.
    pub fn or(self, fallback: &PartialTuning) -> PartialTuning {
        PartialTuning {
            kp: self.kp.or(fallback.kp),
            ki: self.ki.or(fallback.ki),
            kd: self.kd.or(fallback.kd),
            integral_limit: self.integral_limit.or(fallback.integral_limit),
            output_limit: self.output_limit.or(fallback.output_limit),
        }
    }

    /// Resolve into a complete [`Tuning`] for `behavior`.
    ///
    /// # Errors
    ///
    /// - [`MotionError::Configuration`] when a gain is absent.
    /// - [`MotionError::InvalidParameter`] when a gain is not finite or a
    ///   limit is negative or not finite.
    pub fn resolve(self, behavior: Behavior) -> Result<Tuning, MotionError> {
        let kp = require_gain(behavior, "kp", self.kp)?;
        let ki = require_gain(behavior, "ki", self.ki)?;
        let kd = require_gain(behavior, "kd", self.kd)?;
        check_limit(behavior, "integral_limit", self.integral_limit)?;
        check_limit(behavior, "output_limit", self.output_limit)?;
        Ok(Tuning {
            kp,
            ki,
            kd,
            integral_limit: self.integral_limit,
            output_limit: self.output_limit,
        })
    }
}

fn require_gain(behavior: Behavior, parameter: &str, value: Option<f64>) -> Result<f64, MotionError> {
    let value = value.ok_or_else(|| MotionError::missing(behavior, parameter))?;
    if !value.is_finite() {
        return Err(MotionError::InvalidParameter {
            behavior,
            parameter: parameter.to_string(),
            details: format!("gain must be finite, got {value}"),
        });
    }
    Ok(value)
}

fn check_limit(behavior: Behavior, parameter: &str, value: Option<f64>) -> Result<(), MotionError> {
    match value {
        Some(limit) if !limit.is_finite() || limit < 0.0 => Err(MotionError::InvalidParameter {
            behavior,
            parameter: parameter.to_string(),
            details: format!("limit must be a finite non-negative number, got {limit}"),
        }),
        _ => Ok(()),
    }
}

/// Speeds commanded to the left and right drive wheels on one control tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveCommand {
    pub left: f64,
    pub right: f64,
}

/// Sensor readings that were out of the physically expected range but were
/// recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorAnomaly {
    /// More line-edge contacts were sensed during an approach than the two
    /// (one per sensor) that are physically possible.  Only the first and
    /// last were kept.
    ExcessEdgeCrossings { sensed: usize, kept: usize },
}

impl fmt::Display for SensorAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorAnomaly::ExcessEdgeCrossings { sensed, kept } => {
                write!(f, "sensed {sensed} edge crossings, kept {kept}")
            }
        }
    }
}

/// Error type for behavior construction and run loops.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotionError {
    #[error("Configuration Error in {behavior}: no value for `{parameter}`")]
    Configuration { behavior: Behavior, parameter: String },

    #[error("Invalid Configuration in {behavior}: `{parameter}` {details}")]
    InvalidParameter {
        behavior: Behavior,
        parameter: String,
        details: String,
    },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("{behavior} timed out after {ticks} ticks ({elapsed_ms} ms)")]
    Timeout {
        behavior: Behavior,
        ticks: u64,
        elapsed_ms: u64,
    },

    #[error("{behavior} cancelled after {ticks} ticks")]
    Cancelled { behavior: Behavior, ticks: u64 },
}

impl MotionError {
    /// Shorthand for [`MotionError::Configuration`].
    pub fn missing(behavior: Behavior, parameter: &str) -> Self {
        MotionError::Configuration {
            behavior,
            parameter: parameter.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_takes_precedence_over_default() {
        let registered = PartialTuning::new().kp(1.0).ki(0.1).kd(0.5).output_limit(300.0);
        let explicit = PartialTuning::new().kp(4.0);
        let tuning = explicit.or(&registered).resolve(Behavior::GyroStraight).unwrap();
        assert_eq!(tuning.kp, 4.0);
        assert_eq!(tuning.ki, 0.1);
        assert_eq!(tuning.kd, 0.5);
        assert_eq!(tuning.output_limit, Some(300.0));
        assert_eq!(tuning.integral_limit, None);
    }

    #[test]
    fn missing_gain_names_the_parameter() {
        let err = PartialTuning::new()
            .kp(1.0)
            .kd(0.0)
            .resolve(Behavior::LineTrack)
            .unwrap_err();
        assert_eq!(err, MotionError::missing(Behavior::LineTrack, "ki"));
        assert!(err.to_string().contains("line_track"));
        assert!(err.to_string().contains("`ki`"));
    }

    #[test]
    fn zero_gains_are_valid() {
        let tuning = PartialTuning::from(Tuning::gains(0.0, 0.0, 0.0))
            .resolve(Behavior::GyroTurn)
            .unwrap();
        assert_eq!(tuning, Tuning::gains(0.0, 0.0, 0.0));
    }

    #[test]
    fn negative_limit_is_rejected() {
        let err = PartialTuning::from(Tuning::gains(1.0, 0.0, 0.0).with_output_limit(-5.0))
            .resolve(Behavior::LineSquare)
            .unwrap_err();
        assert!(matches!(err, MotionError::InvalidParameter { ref parameter, .. } if parameter == "output_limit"));
    }

    #[test]
    fn nan_gain_is_rejected() {
        let err = PartialTuning::new()
            .kp(f64::NAN)
            .ki(0.0)
            .kd(0.0)
            .resolve(Behavior::GyroStraight)
            .unwrap_err();
        assert!(matches!(err, MotionError::InvalidParameter { .. }));
    }

    #[test]
    fn multipliers_flip_sign() {
        assert_eq!(LineEdge::Left.multiplier(), 1.0);
        assert_eq!(LineEdge::Right.multiplier(), -1.0);
        assert_eq!(LinePosition::Ahead.multiplier(), 1.0);
        assert_eq!(LinePosition::Behind.multiplier(), -1.0);
    }

    #[test]
    fn partial_tuning_json_omits_nothing_required() {
        let json = r#"{"kp": 2.0, "output_limit": 150.0}"#;
        let partial: PartialTuning = serde_json::from_str(json).unwrap();
        assert_eq!(partial.kp, Some(2.0));
        assert_eq!(partial.ki, None);
        assert_eq!(partial.output_limit, Some(150.0));
    }

    #[test]
    fn motion_error_roundtrip() {
        let err = MotionError::Timeout {
            behavior: Behavior::GyroTurn,
            ticks: 40,
            elapsed_ms: 2000,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: MotionError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn port_display() {
        assert_eq!(MotorPort::B.to_string(), "motor:B");
        assert_eq!(SensorPort::S3.to_string(), "sensor:S3");
        assert_eq!(Behavior::LineSquare.to_string(), "line_square");
    }
}
