//! Sensor traits consumed by the movement behaviors: a heading (gyro)
//! sensor and a reflected-light colour sensor.

use std::sync::Arc;

use pidmove_types::{Color, MotionError, SensorPort};

/// A heading sensor reporting cumulative rotation in fixed units.
pub trait GyroSensor: Send + Sync {
    /// Stable identifier for this sensor.
    fn port(&self) -> SensorPort;

    /// Cumulative heading.  Positive is clockwise.
    fn angle(&self) -> i32;

    /// Redefine the current heading as `angle`.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::HardwareFault`] if the sensor rejects the reset.
    fn reset_angle(&self, angle: i32) -> Result<(), MotionError>;
}

/// A downward-facing colour sensor.
pub trait ColorSensor: Send + Sync {
    /// Stable identifier for this sensor; also the key under which its known
    /// reflectance threshold is registered.
    fn port(&self) -> SensorPort;

    /// Reflected light intensity, `0..=100`.
    fn reflection(&self) -> i32;

    /// Colour classification of the surface under the sensor.
    fn color(&self) -> Color;
}

pub type GyroHandle = Arc<dyn GyroSensor>;
pub type ColorHandle = Arc<dyn ColorSensor>;
