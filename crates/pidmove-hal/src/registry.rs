//! [`HardwareRegistry`] – port-keyed registry of the robot's motors and
//! sensors.
//!
//! Hardware wiring is fixed for the life of a run, so drivers are registered
//! once at startup and handed out as shared handles.  A sensor port holds
//! exactly one device: registering a gyro on a port previously used by a
//! colour sensor replaces it, and vice versa.

use std::collections::HashMap;

use pidmove_types::{MotionError, MotorPort, SensorPort};
use tracing::debug;

use crate::motor::MotorHandle;
use crate::sensor::{ColorHandle, GyroHandle};

#[derive(Default, Clone)]
pub struct HardwareRegistry {
    motors: HashMap<MotorPort, MotorHandle>,
    gyros: HashMap<SensorPort, GyroHandle>,
    color_sensors: HashMap<SensorPort, ColorHandle>,
}

impl HardwareRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a motor driver.  Any previously registered driver on the same
    /// port is replaced.
    pub fn register_motor(&mut self, motor: MotorHandle) {
        let port = motor.port();
        debug!(%port, "registering motor");
        self.motors.insert(port, motor);
    }

    /// Register a gyro driver on its port.
    pub fn register_gyro(&mut self, gyro: GyroHandle) {
        let port = gyro.port();
        debug!(%port, "registering gyro sensor");
        self.color_sensors.remove(&port);
        self.gyros.insert(port, gyro);
    }

    /// Register a colour sensor driver on its port.
    pub fn register_color_sensor(&mut self, sensor: ColorHandle) {
        let port = sensor.port();
        debug!(%port, "registering colour sensor");
        self.gyros.remove(&port);
        self.color_sensors.insert(port, sensor);
    }

    /// Look up the motor on `port`.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::HardwareFault`] when nothing is registered there.
    pub fn motor(&self, port: MotorPort) -> Result<MotorHandle, MotionError> {
        self.motors
            .get(&port)
            .cloned()
            .ok_or_else(|| not_registered(port.to_string(), "motor"))
    }

    pub fn gyro(&self, port: SensorPort) -> Result<GyroHandle, MotionError> {
        self.gyros
            .get(&port)
            .cloned()
            .ok_or_else(|| not_registered(port.to_string(), "gyro sensor"))
    }

    pub fn color_sensor(&self, port: SensorPort) -> Result<ColorHandle, MotionError> {
        self.color_sensors
            .get(&port)
            .cloned()
            .ok_or_else(|| not_registered(port.to_string(), "colour sensor"))
    }

    /// Command every registered motor to hold its position.
    ///
    /// Every motor is attempted even if one fails; the first failure is
    /// returned.
    pub fn hold_all(&self) -> Result<(), MotionError> {
        let mut first_err = None;
        for motor in self.motors.values() {
            if let Err(e) = motor.hold() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn not_registered(component: String, kind: &str) -> MotionError {
    MotionError::HardwareFault {
        details: format!("no {kind} registered on {component}"),
        component,
    }
}
