//! [`HardwareDefaults`] – startup-time defaults for every movement behavior.
//!
//! Behaviors are constructed many times over a run with the same wiring and
//! tuning, so the caller registers those once and passes `&HardwareDefaults`
//! to every builder.  Each omitted builder argument resolves as follows:
//!
//! 1. the value given to the builder, if any;
//! 2. the default registered here;
//! 3. for reflectance thresholds only, the known threshold registered for the
//!    sensor's port with [`HardwareDefaults::set_known_thresholds`];
//! 4. otherwise construction fails with [`MotionError::Configuration`]
//!    naming the missing parameter.
//!
//! An absent value is never replaced by a built-in constant.
//!
//! Defaults can be registered one by one or loaded from a serde-described
//! [`DefaultsConfig`] with [`HardwareDefaults::from_config`].

use std::collections::HashMap;
use std::fmt;

use pidmove_hal::{ColorHandle, GyroHandle, HardwareRegistry, MotorHandle, TwoWheelDrive};
use pidmove_types::{Behavior, Color, MotionError, MotorPort, PartialTuning, SensorPort, Tuning};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Serialisable configuration
// ────────────────────────────────────────────────────────────────────────────

/// Which port each default device is plugged into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wiring {
    pub left_motor: Option<MotorPort>,
    pub right_motor: Option<MotorPort>,
    pub gyro: Option<SensorPort>,
    /// Single sensor used by line tracking.
    pub line_sensor: Option<SensorPort>,
    /// Sensor pair used by line squaring.
    pub left_line_sensor: Option<SensorPort>,
    pub right_line_sensor: Option<SensorPort>,
}

/// A set of controller gains registered under one name.
///
/// Turning keeps two profiles because one driven wheel and two driven wheels
/// respond differently to the same output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningProfile {
    GyroStraight,
    GyroTurnSingle,
    GyroTurnDouble,
    LineTrack,
    LineSquare,
    EncoderStraight,
}

impl TuningProfile {
    pub const ALL: [TuningProfile; 6] = [
        TuningProfile::GyroStraight,
        TuningProfile::GyroTurnSingle,
        TuningProfile::GyroTurnDouble,
        TuningProfile::LineTrack,
        TuningProfile::LineSquare,
        TuningProfile::EncoderStraight,
    ];

    /// The behavior that uses this profile.
    pub fn behavior(self) -> Behavior {
        match self {
            TuningProfile::GyroStraight => Behavior::GyroStraight,
            TuningProfile::GyroTurnSingle | TuningProfile::GyroTurnDouble => Behavior::GyroTurn,
            TuningProfile::LineTrack => Behavior::LineTrack,
            TuningProfile::LineSquare => Behavior::LineSquare,
            TuningProfile::EncoderStraight => Behavior::EncoderStraight,
        }
    }
}

/// Per-profile tunings as they appear in a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningTable {
    pub gyro_straight: PartialTuning,
    pub gyro_turn_single: PartialTuning,
    pub gyro_turn_double: PartialTuning,
    pub line_track: PartialTuning,
    pub line_square: PartialTuning,
    pub encoder_straight: PartialTuning,
}

impl TuningTable {
    pub fn get(&self, profile: TuningProfile) -> &PartialTuning {
        match profile {
            TuningProfile::GyroStraight => &self.gyro_straight,
            TuningProfile::GyroTurnSingle => &self.gyro_turn_single,
            TuningProfile::GyroTurnDouble => &self.gyro_turn_double,
            TuningProfile::LineTrack => &self.line_track,
            TuningProfile::LineSquare => &self.line_square,
            TuningProfile::EncoderStraight => &self.encoder_straight,
        }
    }
}

/// Calibrated reflectance threshold of the sensor on `sensor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownThreshold {
    pub sensor: SensorPort,
    pub threshold: i32,
}

/// Exit condition of a loose turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnSettings {
    /// Allowed heading error, in gyro units.
    pub loose_tolerance: i32,
    /// Largest wheel speed still counted as stopped.
    pub loose_exit_speed: i32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            loose_tolerance: 1,
            loose_exit_speed: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSquareSettings {
    /// Open-loop wheel speed while driving onto the line.
    pub approach_speed: f64,
    /// Pause after each phase to let the robot come to rest.
    pub settle_ms: u64,
    /// Allowed reflectance error on each sensor when aligned.
    pub tolerance: i32,
    pub line_color: Color,
}

impl Default for LineSquareSettings {
    fn default() -> Self {
        Self {
            approach_speed: 250.0,
            settle_ms: 75,
            tolerance: 2,
            line_color: Color::Black,
        }
    }
}

/// Everything [`HardwareDefaults::from_config`] needs, in serialisable form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub wiring: Wiring,
    pub tuning: TuningTable,
    pub thresholds: Vec<KnownThreshold>,
    pub gyro_turn: TurnSettings,
    pub line_square: LineSquareSettings,
}

// ────────────────────────────────────────────────────────────────────────────
// HardwareDefaults
// ────────────────────────────────────────────────────────────────────────────

/// Registered defaults shared by every behavior builder.
#[derive(Clone, Default)]
pub struct HardwareDefaults {
    left_motor: Option<MotorHandle>,
    right_motor: Option<MotorHandle>,
    gyro: Option<GyroHandle>,
    line_sensor: Option<ColorHandle>,
    left_line_sensor: Option<ColorHandle>,
    right_line_sensor: Option<ColorHandle>,
    tunings: HashMap<TuningProfile, PartialTuning>,
    thresholds: HashMap<SensorPort, i32>,
    turn: TurnSettings,
    line_square: LineSquareSettings,
}

impl fmt::Debug for HardwareDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareDefaults")
            .field("left_motor", &self.left_motor.as_ref().map(|m| m.port()))
            .field("right_motor", &self.right_motor.as_ref().map(|m| m.port()))
            .field("gyro", &self.gyro.as_ref().map(|g| g.port()))
            .field("line_sensor", &self.line_sensor.as_ref().map(|s| s.port()))
            .field("left_line_sensor", &self.left_line_sensor.as_ref().map(|s| s.port()))
            .field("right_line_sensor", &self.right_line_sensor.as_ref().map(|s| s.port()))
            .field("tunings", &self.tunings)
            .field("thresholds", &self.thresholds)
            .field("turn", &self.turn)
            .field("line_square", &self.line_square)
            .finish()
    }
}

impl HardwareDefaults {
    /// Empty defaults: every behavior argument must be given explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `config`'s wiring against `registry` and register everything
    /// it describes.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::HardwareFault`] when the wiring names a port
    /// with no driver of the right kind in `registry`.
    pub fn from_config(config: &DefaultsConfig, registry: &HardwareRegistry) -> Result<Self, MotionError> {
        let wiring = &config.wiring;
        let mut defaults = Self::new();

        defaults.left_motor = wiring.left_motor.map(|p| registry.motor(p)).transpose()?;
        defaults.right_motor = wiring.right_motor.map(|p| registry.motor(p)).transpose()?;
        defaults.gyro = wiring.gyro.map(|p| registry.gyro(p)).transpose()?;
        defaults.line_sensor = wiring.line_sensor.map(|p| registry.color_sensor(p)).transpose()?;
        defaults.left_line_sensor = wiring
            .left_line_sensor
            .map(|p| registry.color_sensor(p))
            .transpose()?;
        defaults.right_line_sensor = wiring
            .right_line_sensor
            .map(|p| registry.color_sensor(p))
            .transpose()?;

        for profile in TuningProfile::ALL {
            let tuning = *config.tuning.get(profile);
            if tuning != PartialTuning::default() {
                defaults.set_default_tuning(profile, tuning);
            }
        }
        defaults.set_known_thresholds(config.thresholds.iter().map(|t| (t.sensor, t.threshold)));
        defaults.turn = config.gyro_turn;
        defaults.line_square = config.line_square;

        debug!(?defaults, "hardware defaults loaded");
        Ok(defaults)
    }

    // ── registration ───────────────────────────────────────────────────────

    pub fn set_default_motors(&mut self, left: MotorHandle, right: MotorHandle) {
        self.left_motor = Some(left);
        self.right_motor = Some(right);
    }

    pub fn set_default_gyro(&mut self, gyro: GyroHandle) {
        self.gyro = Some(gyro);
    }

    /// Default sensor for single-sensor line tracking.
    pub fn set_default_line_sensor(&mut self, sensor: ColorHandle) {
        self.line_sensor = Some(sensor);
    }

    /// Default sensor pair for line squaring.
    pub fn set_default_line_sensors(&mut self, left: ColorHandle, right: ColorHandle) {
        self.left_line_sensor = Some(left);
        self.right_line_sensor = Some(right);
    }

    /// Register (or replace) the tuning used when a builder gives none.
    ///
    /// Partial tunings are allowed; builder overrides fill the gaps field by
    /// field.
    pub fn set_default_tuning(&mut self, profile: TuningProfile, tuning: impl Into<PartialTuning>) {
        self.tunings.insert(profile, tuning.into());
    }

    /// Associate sensors with their calibrated reflectance thresholds.
    ///
    /// A sensor that already has a threshold gets the new value.
    pub fn set_known_thresholds(&mut self, thresholds: impl IntoIterator<Item = (SensorPort, i32)>) {
        for (port, threshold) in thresholds {
            debug!(%port, threshold, "registering known threshold");
            self.thresholds.insert(port, threshold);
        }
    }

    pub fn set_turn_settings(&mut self, settings: TurnSettings) {
        self.turn = settings;
    }

    pub fn set_line_square_settings(&mut self, settings: LineSquareSettings) {
        self.line_square = settings;
    }

    // ── lookup ─────────────────────────────────────────────────────────────

    pub fn known_threshold(&self, port: SensorPort) -> Option<i32> {
        self.thresholds.get(&port).copied()
    }

    pub fn turn_settings(&self) -> TurnSettings {
        self.turn
    }

    pub fn line_square_settings(&self) -> LineSquareSettings {
        self.line_square
    }

    /// The default drive base, if both motors are registered.
    pub fn drive_base(&self) -> Option<TwoWheelDrive> {
        match (&self.left_motor, &self.right_motor) {
            (Some(l), Some(r)) => Some(TwoWheelDrive::new(l.clone(), r.clone())),
            _ => None,
        }
    }

    // ── resolution ─────────────────────────────────────────────────────────

    /// Resolve the drive motors for `behavior`.
    ///
    /// # Errors
    ///
    /// [`MotionError::Configuration`] naming `left_motor` or `right_motor`.
    pub fn resolve_drive(
        &self,
        behavior: Behavior,
        left: Option<MotorHandle>,
        right: Option<MotorHandle>,
    ) -> Result<TwoWheelDrive, MotionError> {
        let left = pick(behavior, "left_motor", left, &self.left_motor)?;
        let right = pick(behavior, "right_motor", right, &self.right_motor)?;
        Ok(TwoWheelDrive::new(left, right))
    }

    pub fn resolve_gyro(&self, behavior: Behavior, gyro: Option<GyroHandle>) -> Result<GyroHandle, MotionError> {
        pick(behavior, "gyro", gyro, &self.gyro)
    }

    pub fn resolve_line_sensor(
        &self,
        behavior: Behavior,
        sensor: Option<ColorHandle>,
    ) -> Result<ColorHandle, MotionError> {
        pick(behavior, "line_sensor", sensor, &self.line_sensor)
    }

    /// Resolve the left and right squaring sensors.
    pub fn resolve_line_sensors(
        &self,
        behavior: Behavior,
        left: Option<ColorHandle>,
        right: Option<ColorHandle>,
    ) -> Result<(ColorHandle, ColorHandle), MotionError> {
        Ok((
            pick(behavior, "left_line_sensor", left, &self.left_line_sensor)?,
            pick(behavior, "right_line_sensor", right, &self.right_line_sensor)?,
        ))
    }

    /// Layer `overrides` on the registered tuning for `profile` and resolve.
    ///
    /// # Errors
    ///
    /// See [`PartialTuning::resolve`].
    pub fn resolve_tuning(&self, profile: TuningProfile, overrides: PartialTuning) -> Result<Tuning, MotionError> {
        let registered = self.tunings.get(&profile).copied().unwrap_or_default();
        overrides.or(&registered).resolve(profile.behavior())
    }

    /// Resolve the reflectance threshold of `sensor`: explicit value first,
    /// then the sensor's known threshold.
    ///
    /// # Errors
    ///
    /// [`MotionError::Configuration`] naming `parameter`.
    pub fn resolve_threshold(
        &self,
        behavior: Behavior,
        parameter: &str,
        threshold: Option<i32>,
        sensor: &ColorHandle,
    ) -> Result<i32, MotionError> {
        threshold
            .or_else(|| self.known_threshold(sensor.port()))
            .ok_or_else(|| MotionError::missing(behavior, parameter))
    }
}

fn pick<T: Clone>(behavior: Behavior, parameter: &str, explicit: Option<T>, default: &Option<T>) -> Result<T, MotionError> {
    explicit
        .or_else(|| default.clone())
        .ok_or_else(|| MotionError::missing(behavior, parameter))
}
