//! In-process kinematic simulator for running behaviors without hardware.
//!
//! [`SimWorld`] models a differential-drive robot on a flat field:
//!
//! - each wheel integrates its commanded speed into travel (degrees);
//! - the heading changes with the difference of the wheel speeds;
//! - the lateral offset from a tracked line edge changes with the mean speed
//!   and the heading;
//! - an optional line band lies across the path for squaring against.
//!
//! Time advances by one sample period per *command frame*: once both wheels
//! have received a command since the last frame.  Every behavior commands
//! both wheels on every tick, so one tick is one frame and tests are fully
//! deterministic.  Sensor reads never change the world.
//!
//! # Example
//!
//! ```rust
//! use pidmove_hal::motor::Motor;
//! use pidmove_hal::sensor::GyroSensor;
//! use pidmove_hal::sim::SimRobot;
//!
//! let robot = SimRobot::builder().with_initial_heading(10.0).build();
//! assert_eq!(robot.gyro().angle(), 10);
//!
//! let (left, right) = (robot.left_motor(), robot.right_motor());
//! left.run(-100.0).unwrap();
//! right.run(100.0).unwrap();
//! assert!(robot.world().heading() < 10.0);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pidmove_types::{Color, MotionError, MotorPort, SensorPort, Side, Stop};
use serde::{Deserialize, Serialize};

use crate::motor::{Motor, MotorHandle};
use crate::registry::HardwareRegistry;
use crate::sensor::{ColorHandle, ColorSensor, GyroHandle, GyroSensor};

pub const LEFT_MOTOR_PORT: MotorPort = MotorPort::B;
pub const RIGHT_MOTOR_PORT: MotorPort = MotorPort::C;
pub const GYRO_PORT: SensorPort = SensorPort::S1;
pub const LEFT_LINE_SENSOR_PORT: SensorPort = SensorPort::S2;
pub const RIGHT_LINE_SENSOR_PORT: SensorPort = SensorPort::S3;
pub const TRACKING_SENSOR_PORT: SensorPort = SensorPort::S4;

// ────────────────────────────────────────────────────────────────────────────
// Field model
// ────────────────────────────────────────────────────────────────────────────

/// Reflectance of a light/dark boundary with a linear gradient of half-width
/// `ramp` centred on the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectanceProfile {
    pub light: i32,
    pub dark: i32,
    pub ramp: f64,
}

impl Default for ReflectanceProfile {
    fn default() -> Self {
        Self {
            light: 80,
            dark: 10,
            ramp: 10.0,
        }
    }
}

impl ReflectanceProfile {
    /// Reflectance at signed distance `into_dark` past the boundary
    /// (negative = on the light side).
    pub fn at(&self, into_dark: f64) -> f64 {
        let light = f64::from(self.light);
        let dark = f64::from(self.dark);
        if self.ramp <= 0.0 {
            return if into_dark >= 0.0 { dark } else { light };
        }
        let t = ((into_dark + self.ramp) / (2.0 * self.ramp)).clamp(0.0, 1.0);
        light + (dark - light) * t
    }

    /// The reflectance halfway between light and dark.
    pub fn midpoint(&self) -> i32 {
        (self.light + self.dark) / 2
    }

    fn classify(&self, reflection: f64) -> Color {
        let quarter = f64::from(self.light - self.dark) / 4.0;
        if reflection <= f64::from(self.dark) + quarter {
            Color::Black
        } else {
            Color::White
        }
    }
}

/// A dark band crossing the robot's path, `width` wheel-degrees wide,
/// beginning `start` wheel-degrees ahead of the starting position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineBand {
    pub start: f64,
    pub width: f64,
    pub profile: ReflectanceProfile,
}

impl LineBand {
    pub fn reflection(&self, position: f64) -> f64 {
        let centre = self.start + self.width / 2.0;
        let into_dark = self.width / 2.0 - (position - centre).abs();
        self.profile.at(into_dark)
    }
}

/// Simulation constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seconds per command frame.
    pub sample_period: f64,
    /// Heading units per wheel-degree of differential travel.
    pub turn_rate: f64,
    /// Wheel speed at 100 % duty cycle.
    pub max_speed: f64,
    pub initial_heading: f64,
    /// Lateral offset from the tracked edge; positive is on the dark side.
    pub initial_lateral: f64,
    pub line: Option<LineBand>,
    pub edge: ReflectanceProfile,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sample_period: 0.01,
            turn_rate: 0.25,
            max_speed: 1000.0,
            initial_heading: 0.0,
            initial_lateral: 0.0,
            line: None,
            edge: ReflectanceProfile {
                light: 80,
                dark: 10,
                ramp: 20.0,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// World
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WorldState {
    heading: f64,
    lateral: f64,
    travel: [f64; 2],
    command: [f64; 2],
    pending: [bool; 2],
    frames: u64,
}

/// Shared physical state of the simulated robot.
#[derive(Debug)]
pub struct SimWorld {
    config: SimConfig,
    state: Mutex<WorldState>,
}

fn index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

impl SimWorld {
    pub fn new(config: SimConfig) -> Arc<Self> {
        let state = WorldState {
            heading: config.initial_heading,
            lateral: config.initial_lateral,
            ..WorldState::default()
        };
        Arc::new(Self {
            config,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn heading(&self) -> f64 {
        self.state().heading
    }

    pub fn lateral(&self) -> f64 {
        self.state().lateral
    }

    /// Physical travel of one wheel, unaffected by encoder resets.
    pub fn travel(&self, side: Side) -> f64 {
        self.state().travel[index(side)]
    }

    pub fn command(&self, side: Side) -> f64 {
        self.state().command[index(side)]
    }

    /// Number of command frames integrated so far.
    pub fn frames(&self) -> u64 {
        self.state().frames
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_command(&self, side: Side, speed: f64) {
        let mut state = self.state();
        let i = index(side);
        state.command[i] = speed;
        state.pending[i] = true;
        if state.pending == [true, true] {
            self.integrate(&mut state);
        }
    }

    fn integrate(&self, state: &mut WorldState) {
        let dt = self.config.sample_period;
        let [left, right] = state.command;
        let mean = (left + right) / 2.0;
        state.lateral += mean * dt * state.heading.to_radians().sin();
        state.heading += (left - right) * self.config.turn_rate * dt;
        state.travel[0] += left * dt;
        state.travel[1] += right * dt;
        state.pending = [false, false];
        state.frames += 1;
    }

    /// Instantly move one wheel by `delta` degrees and stop it.
    fn displace(&self, side: Side, delta: f64) {
        let mut state = self.state();
        let i = index(side);
        state.travel[i] += delta;
        state.command[i] = 0.0;
        let turn = delta * self.config.turn_rate;
        match side {
            Side::Left => state.heading += turn,
            Side::Right => state.heading -= turn,
        }
    }

    fn longitudinal_reflection(&self, side: Side, offset: f64) -> f64 {
        match self.config.line {
            Some(band) => band.reflection(self.travel(side) + offset),
            None => f64::from(self.config.edge.light),
        }
    }

    fn lateral_reflection(&self, offset: f64) -> f64 {
        self.config.edge.at(self.lateral() + offset)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Motor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated drive motor bound to one side of a [`SimWorld`].
pub struct SimMotor {
    port: MotorPort,
    side: Side,
    world: Arc<SimWorld>,
    angle_offset: Mutex<f64>,
}

impl SimMotor {
    pub fn new(port: MotorPort, side: Side, world: Arc<SimWorld>) -> Arc<Self> {
        Arc::new(Self {
            port,
            side,
            world,
            angle_offset: Mutex::new(0.0),
        })
    }

    fn offset(&self) -> MutexGuard<'_, f64> {
        self.angle_offset.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn precise_angle(&self) -> f64 {
        self.world.travel(self.side) - *self.offset()
    }
}

impl Motor for SimMotor {
    fn port(&self) -> MotorPort {
        self.port
    }

    fn run(&self, speed: f64) -> Result<(), MotionError> {
        self.world.set_command(self.side, speed);
        Ok(())
    }

    fn hold(&self) -> Result<(), MotionError> {
        self.world.set_command(self.side, 0.0);
        Ok(())
    }

    fn angle(&self) -> i32 {
        self.precise_angle().round() as i32
    }

    fn speed(&self) -> i32 {
        self.world.command(self.side).round() as i32
    }

    fn reset_angle(&self, angle: i32) -> Result<(), MotionError> {
        *self.offset() = self.world.travel(self.side) - f64::from(angle);
        Ok(())
    }

    fn run_time(&self, speed: f64, duration: Duration, _then: Stop, _wait: bool) -> Result<(), MotionError> {
        self.world.displace(self.side, speed * duration.as_secs_f64());
        Ok(())
    }

    fn run_angle(&self, speed: f64, rotation_angle: i32, _then: Stop, _wait: bool) -> Result<(), MotionError> {
        if speed != 0.0 {
            self.world
                .displace(self.side, f64::from(rotation_angle) * speed.signum());
        }
        Ok(())
    }

    fn run_target(&self, speed: f64, target_angle: i32, _then: Stop, _wait: bool) -> Result<(), MotionError> {
        if speed != 0.0 {
            let delta = f64::from(target_angle) - self.precise_angle();
            self.world.displace(self.side, delta);
        }
        Ok(())
    }

    fn dc(&self, duty: f64) -> Result<(), MotionError> {
        let duty = duty.clamp(-100.0, 100.0);
        self.run(duty / 100.0 * self.world.config.max_speed)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensors
// ────────────────────────────────────────────────────────────────────────────

/// A simulated gyro reading the world heading.
pub struct SimGyro {
    port: SensorPort,
    world: Arc<SimWorld>,
    offset: Mutex<f64>,
}

impl SimGyro {
    pub fn new(port: SensorPort, world: Arc<SimWorld>) -> Arc<Self> {
        Arc::new(Self {
            port,
            world,
            offset: Mutex::new(0.0),
        })
    }
}

impl GyroSensor for SimGyro {
    fn port(&self) -> SensorPort {
        self.port
    }

    fn angle(&self) -> i32 {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        (self.world.heading() - offset).round() as i32
    }

    fn reset_angle(&self, angle: i32) -> Result<(), MotionError> {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) =
            self.world.heading() - f64::from(angle);
        Ok(())
    }
}

/// Where a simulated colour sensor looks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorMount {
    /// In front of one wheel, `offset` wheel-degrees ahead of it; reads the
    /// [`LineBand`] crossing the path.
    Longitudinal { side: Side, offset: f64 },
    /// On the centreline, `offset` to the dark side of the robot; reads the
    /// tracked edge.
    Lateral { offset: f64 },
}

/// A simulated reflected-light sensor.
pub struct SimColorSensor {
    port: SensorPort,
    world: Arc<SimWorld>,
    mount: SensorMount,
}

impl SimColorSensor {
    pub fn new(port: SensorPort, world: Arc<SimWorld>, mount: SensorMount) -> Arc<Self> {
        Arc::new(Self { port, world, mount })
    }

    fn precise_reflection(&self) -> f64 {
        match self.mount {
            SensorMount::Longitudinal { side, offset } => {
                self.world.longitudinal_reflection(side, offset)
            }
            SensorMount::Lateral { offset } => self.world.lateral_reflection(offset),
        }
    }

    fn profile(&self) -> ReflectanceProfile {
        match (self.mount, self.world.config.line) {
            (SensorMount::Longitudinal { .. }, Some(band)) => band.profile,
            _ => self.world.config.edge,
        }
    }
}

impl ColorSensor for SimColorSensor {
    fn port(&self) -> SensorPort {
        self.port
    }

    fn reflection(&self) -> i32 {
        self.precise_reflection().round() as i32
    }

    fn color(&self) -> Color {
        self.profile().classify(self.precise_reflection())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRobot builder
// ────────────────────────────────────────────────────────────────────────────

/// A simulated robot: a [`SimWorld`], its drivers, and a
/// [`HardwareRegistry`] holding them.
///
/// Drive motors are on [`LEFT_MOTOR_PORT`]/[`RIGHT_MOTOR_PORT`] and the gyro
/// on [`GYRO_PORT`].  Colour sensors are added through the builder.
pub struct SimRobot {
    world: Arc<SimWorld>,
    registry: HardwareRegistry,
    left: Arc<SimMotor>,
    right: Arc<SimMotor>,
    gyro: Arc<SimGyro>,
}

impl SimRobot {
    pub fn builder() -> SimRobotBuilder {
        SimRobotBuilder::default()
    }

    pub fn world(&self) -> Arc<SimWorld> {
        Arc::clone(&self.world)
    }

    pub fn registry(&self) -> &HardwareRegistry {
        &self.registry
    }

    pub fn left_motor(&self) -> MotorHandle {
        self.left.clone()
    }

    pub fn right_motor(&self) -> MotorHandle {
        self.right.clone()
    }

    pub fn gyro(&self) -> GyroHandle {
        self.gyro.clone()
    }

    /// The colour sensor registered on `port`, if any.
    pub fn color_sensor(&self, port: SensorPort) -> Option<ColorHandle> {
        self.registry.color_sensor(port).ok()
    }
}

/// Builder for [`SimRobot`].
#[derive(Default)]
pub struct SimRobotBuilder {
    config: SimConfig,
    color_sensors: Vec<(SensorPort, SensorMount)>,
}

impl SimRobotBuilder {
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_initial_heading(mut self, heading: f64) -> Self {
        self.config.initial_heading = heading;
        self
    }

    pub fn with_initial_lateral(mut self, lateral: f64) -> Self {
        self.config.initial_lateral = lateral;
        self
    }

    /// Lay a dark band across the path.
    pub fn with_line(mut self, line: LineBand) -> Self {
        self.config.line = Some(line);
        self
    }

    pub fn with_edge_profile(mut self, edge: ReflectanceProfile) -> Self {
        self.config.edge = edge;
        self
    }

    /// Add the two squaring sensors on [`LEFT_LINE_SENSOR_PORT`] and
    /// [`RIGHT_LINE_SENSOR_PORT`], mounted `left_offset`/`right_offset`
    /// ahead of their wheels.
    pub fn with_square_sensors(self, left_offset: f64, right_offset: f64) -> Self {
        self.with_color_sensor(
            LEFT_LINE_SENSOR_PORT,
            SensorMount::Longitudinal {
                side: Side::Left,
                offset: left_offset,
            },
        )
        .with_color_sensor(
            RIGHT_LINE_SENSOR_PORT,
            SensorMount::Longitudinal {
                side: Side::Right,
                offset: right_offset,
            },
        )
    }

    /// Add a centreline tracking sensor on [`TRACKING_SENSOR_PORT`].
    pub fn with_tracking_sensor(self) -> Self {
        self.with_color_sensor(TRACKING_SENSOR_PORT, SensorMount::Lateral { offset: 0.0 })
    }

    pub fn with_color_sensor(mut self, port: SensorPort, mount: SensorMount) -> Self {
        self.color_sensors.push((port, mount));
        self
    }

    /// Consume the builder and wire everything into a registry.
    pub fn build(self) -> SimRobot {
        let world = SimWorld::new(self.config);
        let left = SimMotor::new(LEFT_MOTOR_PORT, Side::Left, Arc::clone(&world));
        let right = SimMotor::new(RIGHT_MOTOR_PORT, Side::Right, Arc::clone(&world));
        let gyro = SimGyro::new(GYRO_PORT, Arc::clone(&world));

        let mut registry = HardwareRegistry::new();
        registry.register_motor(left.clone());
        registry.register_motor(right.clone());
        registry.register_gyro(gyro.clone());
        for (port, mount) in self.color_sensors {
            registry.register_color_sensor(SimColorSensor::new(port, Arc::clone(&world), mount));
        }

        SimRobot {
            world,
            registry,
            left,
            right,
            gyro,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
