//! [`LineSquare`] – align the robot perpendicular to a line with two sensors.
//!
//! # Phases
//!
//! 1. **Approach.**  Both wheels run open-loop at the approach speed, forward
//!    when the line is ahead and backward when it is behind, until both
//!    sensors see the line colour.  Every not-line to line transition is
//!    recorded as an [`EdgeEvent`].  Both motors then hold for the settle
//!    time.
//! 2. **Align.**  Each wheel gets its own controller driving its sensor's
//!    `reflection - threshold` to zero, scaled by the same direction as the
//!    approach.  Once both errors are within tolerance the motors hold and
//!    the robot settles again.
//!
//! Only two edge contacts (one per sensor) are physically possible.  Extra
//! contacts from a noisy sensor are reduced to the first and last, reported
//! as a [`SensorAnomaly`] and logged; the run itself continues.

use std::thread;
use std::time::Duration;

use pidmove_hal::{ColorHandle, MotorHandle, PidController, TwoWheelDrive};
use pidmove_types::{Behavior, Color, DriveCommand, LinePosition, MotionError, PartialTuning, SensorAnomaly, Side};
use tracing::{debug, info, trace, warn};

use crate::defaults::{HardwareDefaults, LineSquareSettings, TuningProfile};
use crate::guard::RunGuard;

/// A sensor moving onto the line during the approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub side: Side,
    /// Tick of the approach on which the contact was read.
    pub tick: u64,
    /// Encoder angle of that side's wheel at the contact.
    pub motor_angle: i32,
}

/// What happened during a completed [`LineSquare::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSquareReport {
    /// Edge contacts, reduced to at most two.
    pub edge_events: Vec<EdgeEvent>,
    pub anomaly: Option<SensorAnomaly>,
    pub approach_ticks: u64,
    pub align_ticks: u64,
}

/// Keep only the first and last of more than two edge events.
pub fn clamp_edge_events(mut events: Vec<EdgeEvent>) -> (Vec<EdgeEvent>, Option<SensorAnomaly>) {
    let sensed = events.len();
    if sensed <= 2 {
        return (events, None);
    }
    let last = events[sensed - 1];
    events.truncate(1);
    events.push(last);
    let anomaly = SensorAnomaly::ExcessEdgeCrossings { sensed, kept: 2 };
    warn!(behavior = %Behavior::LineSquare, %anomaly, "truncating edge events");
    (events, Some(anomaly))
}

pub struct LineSquare {
    position: LinePosition,
    left_sensor: ColorHandle,
    right_sensor: ColorHandle,
    left_threshold: i32,
    right_threshold: i32,
    drive: TwoWheelDrive,
    left_pid: PidController,
    right_pid: PidController,
    settings: LineSquareSettings,
}

impl LineSquare {
    pub fn builder(position: LinePosition) -> LineSquareBuilder {
        LineSquareBuilder {
            position,
            left_sensor: None,
            right_sensor: None,
            left_threshold: None,
            right_threshold: None,
            left: None,
            right: None,
            tuning: PartialTuning::new(),
            settings: None,
        }
    }

    /// Approach the line, align to it and hold.
    pub fn run(&mut self, guard: &RunGuard) -> Result<LineSquareReport, MotionError> {
        let direction = self.position.multiplier();
        info!(
            behavior = %Behavior::LineSquare,
            position = ?self.position,
            left_threshold = self.left_threshold,
            right_threshold = self.right_threshold,
            "starting"
        );
        let mut run = guard.start(Behavior::LineSquare);

        // Approach.
        let line = self.settings.line_color;
        let speed = self.settings.approach_speed * direction;
        let mut on_line = [false, false];
        let mut events = Vec::new();
        loop {
            let seen = [self.left_sensor.color() == line, self.right_sensor.color() == line];
            for (i, side) in [Side::Left, Side::Right].into_iter().enumerate() {
                if seen[i] && !on_line[i] {
                    let motor = match side {
                        Side::Left => self.drive.left(),
                        Side::Right => self.drive.right(),
                    };
                    let event = EdgeEvent {
                        side,
                        tick: run.ticks(),
                        motor_angle: motor.angle(),
                    };
                    debug!(?event, "edge contact");
                    events.push(event);
                }
            }
            on_line = seen;
            if on_line == [true, true] {
                break;
            }
            run.tick(&self.drive)?;
            self.drive.run(speed)?;
        }
        self.drive.hold()?;
        let approach_ticks = run.ticks();
        self.settle();

        // Align.
        while !self.aligned() {
            run.tick(&self.drive)?;
            self.step()?;
        }
        self.drive.hold()?;
        self.settle();

        let (edge_events, anomaly) = clamp_edge_events(events);
        let report = LineSquareReport {
            edge_events,
            anomaly,
            approach_ticks,
            align_ticks: run.ticks() - approach_ticks,
        };
        info!(
            behavior = %Behavior::LineSquare,
            approach_ticks = report.approach_ticks,
            align_ticks = report.align_ticks,
            "finished"
        );
        Ok(report)
    }

    fn errors(&self) -> (i32, i32) {
        (
            self.left_sensor.reflection() - self.left_threshold,
            self.right_sensor.reflection() - self.right_threshold,
        )
    }

    /// Both sensors are within tolerance of their thresholds.
    pub fn aligned(&self) -> bool {
        let (left, right) = self.errors();
        let tolerance = self.settings.tolerance;
        left.abs() <= tolerance && right.abs() <= tolerance
    }

    /// One align-phase tick: update both controllers from the current
    /// reflections and command each wheel independently.
    pub fn step(&mut self) -> Result<DriveCommand, MotionError> {
        let direction = self.position.multiplier();
        let (left_error, right_error) = self.errors();
        let command = DriveCommand {
            left: self.left_pid.update(f64::from(left_error)) * direction,
            right: self.right_pid.update(f64::from(right_error)) * direction,
        };
        self.drive.left().run(command.left)?;
        self.drive.right().run(command.right)?;
        trace!(left_error, right_error, left = command.left, right = command.right, "line_square align tick");
        Ok(command)
    }

    fn settle(&self) {
        if self.settings.settle_ms > 0 {
            thread::sleep(Duration::from_millis(self.settings.settle_ms));
        }
    }

    pub fn thresholds(&self) -> (i32, i32) {
        (self.left_threshold, self.right_threshold)
    }

    pub fn drive(&self) -> &TwoWheelDrive {
        &self.drive
    }
}

pub struct LineSquareBuilder {
    position: LinePosition,
    left_sensor: Option<ColorHandle>,
    right_sensor: Option<ColorHandle>,
    left_threshold: Option<i32>,
    right_threshold: Option<i32>,
    left: Option<MotorHandle>,
    right: Option<MotorHandle>,
    tuning: PartialTuning,
    settings: Option<LineSquareSettings>,
}

impl LineSquareBuilder {
    pub fn sensors(mut self, left: ColorHandle, right: ColorHandle) -> Self {
        self.left_sensor = Some(left);
        self.right_sensor = Some(right);
        self
    }

    pub fn thresholds(mut self, left: i32, right: i32) -> Self {
        self.left_threshold = Some(left);
        self.right_threshold = Some(right);
        self
    }

    pub fn motors(mut self, left: MotorHandle, right: MotorHandle) -> Self {
        self.left = Some(left);
        self.right = Some(right);
        self
    }

    /// Override the registered tuning; applies to both sides.
    pub fn tuning(mut self, tuning: impl Into<PartialTuning>) -> Self {
        self.tuning = tuning.into();
        self
    }

    /// Replace the registered approach speed, settle time, tolerance and
    /// line colour for this run.
    pub fn settings(mut self, settings: LineSquareSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self, defaults: &HardwareDefaults) -> Result<LineSquare, MotionError> {
        let behavior = Behavior::LineSquare;
        let (left_sensor, right_sensor) =
            defaults.resolve_line_sensors(behavior, self.left_sensor, self.right_sensor)?;
        let left_threshold =
            defaults.resolve_threshold(behavior, "left_threshold", self.left_threshold, &left_sensor)?;
        let right_threshold =
            defaults.resolve_threshold(behavior, "right_threshold", self.right_threshold, &right_sensor)?;
        let drive = defaults.resolve_drive(behavior, self.left, self.right)?;
        let tuning = defaults.resolve_tuning(TuningProfile::LineSquare, self.tuning)?;
        let settings = self.settings.unwrap_or_else(|| defaults.line_square_settings());
        if settings.line_color == Color::None {
            return Err(MotionError::InvalidParameter {
                behavior,
                parameter: "line_color".to_string(),
                details: "must name a colour".to_string(),
            });
        }
        Ok(LineSquare {
            position: self.position,
            left_sensor,
            right_sensor,
            left_threshold,
            right_threshold,
            drive,
            left_pid: PidController::new(f64::from(left_threshold), tuning),
            right_pid: PidController::new(f64::from(right_threshold), tuning),
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use pidmove_hal::sim::{LineBand, ReflectanceProfile, LEFT_LINE_SENSOR_PORT, RIGHT_LINE_SENSOR_PORT};
    use pidmove_hal::{ColorSensor, SimRobot};
    use pidmove_types::{SensorPort, Tuning};

    fn band(start: f64) -> LineBand {
        LineBand {
            start,
            width: 60.0,
            profile: ReflectanceProfile {
                light: 80,
                dark: 10,
                ramp: 10.0,
            },
        }
    }

    fn defaults(robot: &SimRobot) -> HardwareDefaults {
        let mut defaults = HardwareDefaults::new();
        defaults.set_default_motors(robot.left_motor(), robot.right_motor());
        if let (Some(l), Some(r)) = (
            robot.color_sensor(LEFT_LINE_SENSOR_PORT),
            robot.color_sensor(RIGHT_LINE_SENSOR_PORT),
        ) {
            defaults.set_default_line_sensors(l, r);
        }
        defaults.set_known_thresholds([(LEFT_LINE_SENSOR_PORT, 45), (RIGHT_LINE_SENSOR_PORT, 45)]);
        defaults.set_default_tuning(TuningProfile::LineSquare, Tuning::gains(2.0, 0.0, 0.0).with_output_limit(200.0));
        defaults.set_line_square_settings(LineSquareSettings {
            settle_ms: 0,
            ..LineSquareSettings::default()
        });
        defaults
    }

    fn event(side: Side, tick: u64) -> EdgeEvent {
        EdgeEvent { side, tick, motor_angle: 0 }
    }

    #[test]
    fn four_edge_events_clamp_to_first_and_last() {
        let events = vec![
            event(Side::Left, 3),
            event(Side::Right, 4),
            event(Side::Left, 5),
            event(Side::Right, 9),
        ];
        let (kept, anomaly) = clamp_edge_events(events);
        assert_eq!(kept, vec![event(Side::Left, 3), event(Side::Right, 9)]);
        assert_eq!(anomaly, Some(SensorAnomaly::ExcessEdgeCrossings { sensed: 4, kept: 2 }));
    }

    #[test]
    fn two_edge_events_are_kept_as_is() {
        let events = vec![event(Side::Right, 1), event(Side::Left, 2)];
        let (kept, anomaly) = clamp_edge_events(events.clone());
        assert_eq!(kept, events);
        assert_eq!(anomaly, None);
    }

    #[test]
    fn squares_to_line_ahead() {
        // The right sensor sits 15 degrees behind the left, as if the robot
        // approached at an angle.
        let robot = SimRobot::builder()
            .with_line(band(200.0))
            .with_square_sensors(0.0, -15.0)
            .build();
        let defaults = defaults(&robot);
        let mut square = LineSquare::builder(LinePosition::Ahead).build(&defaults).unwrap();

        let report = square.run(&RunGuard::default().with_max_ticks(5_000)).unwrap();
        assert_eq!(report.anomaly, None);
        assert_eq!(report.edge_events.len(), 2);
        assert_eq!(report.edge_events[0].side, Side::Left);
        assert_eq!(report.edge_events[1].side, Side::Right);
        assert!(report.edge_events[0].tick < report.edge_events[1].tick);
        assert!(report.approach_ticks > 0 && report.align_ticks > 0);

        let world = robot.world();
        assert!((world.travel(Side::Left) - 200.0).abs() < 1.0);
        assert!((world.travel(Side::Right) - 215.0).abs() < 1.0);
        for port in [LEFT_LINE_SENSOR_PORT, RIGHT_LINE_SENSOR_PORT] {
            let reflection = robot.color_sensor(port).unwrap().reflection();
            assert!((reflection - 45).abs() <= 2, "{port} reads {reflection}");
        }
        assert_eq!(square.drive().speed(), 0.0);
    }

    #[test]
    fn squares_to_line_behind() {
        let robot = SimRobot::builder()
            .with_line(band(-100.0))
            .with_square_sensors(0.0, 0.0)
            .build();
        let defaults = defaults(&robot);
        let mut square = LineSquare::builder(LinePosition::Behind).build(&defaults).unwrap();

        square.run(&RunGuard::default().with_max_ticks(5_000)).unwrap();
        let world = robot.world();
        assert!((world.travel(Side::Left) + 40.0).abs() < 1.0);
        assert!((world.travel(Side::Right) + 40.0).abs() < 1.0);
    }

    #[test]
    fn step_drives_each_wheel_from_its_own_sensor() {
        // Left sensor on the dark band, right sensor still on light floor.
        let robot = SimRobot::builder()
            .with_line(band(0.0))
            .with_square_sensors(30.0, -40.0)
            .build();
        let defaults = defaults(&robot);
        let mut square = LineSquare::builder(LinePosition::Ahead).build(&defaults).unwrap();
        assert!(!square.aligned());

        // (10 - 45) * 2 and (80 - 45) * 2
        assert_eq!(square.step().unwrap(), DriveCommand { left: -70.0, right: 70.0 });
    }

    #[test]
    fn no_line_times_out_and_holds() {
        let robot = SimRobot::builder().with_square_sensors(0.0, 0.0).build();
        let defaults = defaults(&robot);
        let mut square = LineSquare::builder(LinePosition::Ahead).build(&defaults).unwrap();

        let err = square.run(&RunGuard::default().with_max_ticks(100)).unwrap_err();
        assert!(matches!(err, MotionError::Timeout { behavior: Behavior::LineSquare, ticks: 100, .. }));
        assert_eq!(square.drive().speed(), 0.0);
    }

    struct ScriptedSensor {
        port: SensorPort,
        colors: Mutex<VecDeque<Color>>,
        last: Mutex<Color>,
    }

    impl ScriptedSensor {
        fn new(port: SensorPort, script: &[Color]) -> Arc<Self> {
            Arc::new(Self {
                port,
                colors: Mutex::new(script.iter().copied().collect()),
                last: Mutex::new(Color::White),
            })
        }
    }

    impl ColorSensor for ScriptedSensor {
        fn port(&self) -> SensorPort {
            self.port
        }

        fn reflection(&self) -> i32 {
            45
        }

        fn color(&self) -> Color {
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.colors.lock().unwrap().pop_front() {
                *last = next;
            }
            *last
        }
    }

    #[test]
    fn noisy_approach_reports_anomaly() {
        use Color::{Black as B, White as W};
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let left = ScriptedSensor::new(SensorPort::S2, &[W, B, W, B, B]);
        let right = ScriptedSensor::new(SensorPort::S3, &[W, W, B, W, B]);

        let mut square = LineSquare::builder(LinePosition::Ahead)
            .sensors(left, right)
            .build(&defaults)
            .unwrap();
        let report = square.run(&RunGuard::default()).unwrap();

        assert_eq!(report.anomaly, Some(SensorAnomaly::ExcessEdgeCrossings { sensed: 4, kept: 2 }));
        assert_eq!(report.edge_events.len(), 2);
        assert_eq!((report.edge_events[0].side, report.edge_events[0].tick), (Side::Left, 1));
        assert_eq!((report.edge_events[1].side, report.edge_events[1].tick), (Side::Right, 4));
        assert_eq!(report.approach_ticks, 4);
        assert_eq!(report.align_ticks, 0);
    }

    #[test]
    fn missing_right_sensor_is_a_configuration_error() {
        let robot = SimRobot::builder().build();
        let defaults = defaults(&robot);
        let err = LineSquare::builder(LinePosition::Ahead).build(&defaults).err().unwrap();
        assert_eq!(err, MotionError::missing(Behavior::LineSquare, "left_line_sensor"));
    }
}
