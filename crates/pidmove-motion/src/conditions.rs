//! Ready-made stop conditions for `run_until`.
//!
//! A stop condition is any `FnMut() -> bool` polled once per control tick;
//! the loop ends the first time it returns `true`.  These helpers cover the
//! common cases and clone the handles they read, so the returned closure
//! does not borrow the caller's hardware.

use pidmove_hal::{ColorHandle, TwoWheelDrive};
use pidmove_types::Color;

/// True once the drive base's mean wheel angle has reached `angle` degrees,
/// in the direction of its sign.
///
/// The angle is measured from the last `reset_angle`, which the caller
/// issues before starting the move.
pub fn drive_angle_reached(drive: &TwoWheelDrive, angle: f64) -> impl FnMut() -> bool + use<> {
    let drive = drive.clone();
    move || {
        if angle >= 0.0 {
            drive.angle() >= angle
        } else {
            drive.angle() <= angle
        }
    }
}

pub fn color_seen(sensor: &ColorHandle, color: Color) -> impl FnMut() -> bool + use<> {
    let sensor = sensor.clone();
    move || sensor.color() == color
}

pub fn reflection_below(sensor: &ColorHandle, value: i32) -> impl FnMut() -> bool + use<> {
    let sensor = sensor.clone();
    move || sensor.reflection() < value
}

pub fn reflection_above(sensor: &ColorHandle, value: i32) -> impl FnMut() -> bool + use<> {
    let sensor = sensor.clone();
    move || sensor.reflection() > value
}

/// False for the first `ticks` polls, true afterwards.
pub fn after_ticks(ticks: u64) -> impl FnMut() -> bool {
    let mut polled = 0u64;
    move || {
        if polled >= ticks {
            return true;
        }
        polled += 1;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidmove_hal::SimRobot;
    use pidmove_hal::sim::{LineBand, ReflectanceProfile, LEFT_LINE_SENSOR_PORT};
    use pidmove_types::Stop;

    #[test]
    fn after_ticks_counts_polls() {
        let mut stop = after_ticks(2);
        assert!(!stop());
        assert!(!stop());
        assert!(stop());
        assert!(stop());
        assert!(after_ticks(0)());
    }

    #[test]
    fn drive_angle_respects_direction() {
        let robot = SimRobot::builder().build();
        let drive = TwoWheelDrive::new(robot.left_motor(), robot.right_motor());
        let mut forward = drive_angle_reached(&drive, 100.0);
        let mut backward = drive_angle_reached(&drive, -100.0);
        assert!(!forward());
        assert!(!backward());

        drive.run_angle(400.0, 150, Stop::Hold, true).unwrap();
        assert!(forward());
        assert!(!backward());

        drive.run_angle(400.0, -300, Stop::Hold, true).unwrap();
        assert!(!forward());
        assert!(backward());
    }

    #[test]
    fn reflection_and_color_conditions() {
        let robot = SimRobot::builder()
            .with_line(LineBand {
                start: 100.0,
                width: 50.0,
                profile: ReflectanceProfile::default(),
            })
            .with_square_sensors(0.0, 0.0)
            .build();
        let sensor = robot.color_sensor(LEFT_LINE_SENSOR_PORT).unwrap();
        let mut dark = reflection_below(&sensor, 30);
        let mut light = reflection_above(&sensor, 60);
        let mut black = color_seen(&sensor, Color::Black);
        assert!(!dark() && light() && !black());

        robot.left_motor().run_angle(300.0, 125, Stop::Hold, true).unwrap();
        assert!(dark() && !light() && black());
    }
}
