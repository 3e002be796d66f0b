//! Single-axis PID (Proportional–Integral–Derivative) controller.
//!
//! The controller is error-driven: the caller computes the error of the
//! controlled quantity (heading error, reflectance error, encoder drift) and
//! receives the corrective output, which it converts into wheel commands.
//! One call to [`PidController::update`] is one control tick; there is no
//! time step, the gains are tuned per tick.
//!
//! # Example
//!
//! ```rust
//! use pidmove_hal::pid::PidController;
//! use pidmove_types::Tuning;
//!
//! let mut pid = PidController::new(0.0, Tuning::gains(2.0, 0.0, 0.0));
//! assert_eq!(pid.update(5.0), 10.0);
//! assert_eq!(pid.update(-5.0), -10.0);
//! ```

use pidmove_types::Tuning;

/// A stateful PID controller with optional symmetric integral and output
/// clamps.
///
/// The integral clamp bounds the stored accumulator itself, so the
/// anti-windup effect carries across ticks.  The output clamp is applied to
/// the P+I+D sum.
#[derive(Debug, Clone)]
pub struct PidController {
    setpoint: f64,
    tuning: Tuning,
    integral: f64,
    prev_error: f64,
}

impl PidController {
    /// Create a controller holding `setpoint` with the given tuning.
    ///
    /// The setpoint is informational; [`update`][Self::update] takes the
    /// error directly.
    pub fn new(setpoint: f64, tuning: Tuning) -> Self {
        Self {
            setpoint,
            tuning,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    /// Compute the output for one tick.
    pub fn update(&mut self, error: f64) -> f64 {
        self.update_with_integral_multiplier(error, 1.0)
    }

    /// Compute the output for one tick, scaling the stored integral by
    /// `integral_multiplier` before adding `error`.
    ///
    /// A multiplier of `0.0` discards the accumulated history; values in
    /// `(0, 1)` decay it.
    pub fn update_with_integral_multiplier(&mut self, error: f64, integral_multiplier: f64) -> f64 {
        let p = error * self.tuning.kp;

        self.integral = self.integral * integral_multiplier + error;
        if let Some(limit) = self.tuning.integral_limit {
            self.integral = symmetric_clamp(self.integral, limit);
        }
        let i = self.integral * self.tuning.ki;

        let d = (error - self.prev_error) * self.tuning.kd;
        self.prev_error = error;

        let output = p + i + d;
        match self.tuning.output_limit {
            Some(limit) => symmetric_clamp(output, limit),
            None => output,
        }
    }

    /// Zero the accumulator and derivative memory.  Gains and limits are
    /// kept.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// The stored (already clamped) integral accumulator.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn previous_error(&self) -> f64 {
        self.prev_error
    }
}

// Does not panic on a NaN or negative limit.
fn symmetric_clamp(value: f64, limit: f64) -> f64 {
    let limit = limit.abs();
    value.min(limit).max(-limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_proportional_is_pass_through() {
        let mut pid = PidController::new(0.0, Tuning::gains(1.0, 0.0, 0.0));
        for e in [3.0, -7.5, 0.0, 120.0, -0.25] {
            assert_eq!(pid.update(e), e);
        }
    }

    #[test]
    fn proportional_ticks_are_independent() {
        let mut pid = PidController::new(0.0, Tuning::gains(2.0, 0.0, 0.0));
        assert_eq!(pid.update(5.0), 10.0);
        assert_eq!(pid.update(-5.0), -10.0);
    }

    #[test]
    fn integral_accumulates_per_tick() {
        let mut pid = PidController::new(0.0, Tuning::gains(0.0, 1.0, 0.0));
        assert_eq!(pid.update(1.0), 1.0);
        assert_eq!(pid.update(1.0), 2.0);
        assert_eq!(pid.update(1.0), 3.0);
    }

    #[test]
    fn integral_limit_bounds_stored_accumulator() {
        let tuning = Tuning::gains(0.0, 0.5, 0.0).with_integral_limit(10.0);
        let mut pid = PidController::new(0.0, tuning);
        let mut last = 0.0;
        for _ in 0..1000 {
            last = pid.update(3.0);
            assert!(pid.integral() <= 10.0);
        }
        assert_eq!(pid.integral(), 10.0);
        assert_eq!(last, 0.5 * 10.0);
    }

    #[test]
    fn anti_windup_persists_across_sign_change() {
        let tuning = Tuning::gains(0.0, 1.0, 0.0).with_integral_limit(5.0);
        let mut pid = PidController::new(0.0, tuning);
        for _ in 0..100 {
            pid.update(10.0);
        }
        // Clamped state is 5, so one tick of -5 brings it straight back to 0.
        assert_eq!(pid.update(-5.0), 0.0);
    }

    #[test]
    fn output_limit_holds_for_any_sequence() {
        let tuning = Tuning::gains(3.0, 0.7, 4.0).with_output_limit(25.0);
        let mut pid = PidController::new(0.0, tuning);
        let errors = [100.0, -250.0, 0.0, 13.0, -1.0, 999.0, -999.0, 5.0, 5.0, 5.0];
        for e in errors.iter().cycle().take(200) {
            let out = pid.update(*e);
            assert!((-25.0..=25.0).contains(&out), "{out} escaped the clamp");
        }
    }

    #[test]
    fn derivative_memory_updates_even_when_clamped() {
        let tuning = Tuning::gains(0.0, 0.0, 1.0).with_output_limit(1.0);
        let mut pid = PidController::new(0.0, tuning);
        assert_eq!(pid.update(50.0), 1.0);
        assert_eq!(pid.previous_error(), 50.0);
        // (50 - 50) * kd
        assert_eq!(pid.update(50.0), 0.0);
    }

    #[test]
    fn reset_matches_fresh_controller() {
        let tuning = Tuning::gains(1.5, 0.3, 0.8)
            .with_integral_limit(20.0)
            .with_output_limit(100.0);
        let mut used = PidController::new(4.0, tuning);
        for e in [12.0, -3.0, 40.0, 7.0] {
            used.update(e);
        }
        used.reset();

        let mut fresh = PidController::new(4.0, tuning);
        assert_eq!(used.update(6.0), fresh.update(6.0));
        assert_eq!(used.tuning(), fresh.tuning());
    }

    #[test]
    fn zero_integral_multiplier_discards_history() {
        let mut pid = PidController::new(0.0, Tuning::gains(0.0, 1.0, 0.0));
        pid.update(10.0);
        pid.update(10.0);
        assert_eq!(pid.update_with_integral_multiplier(2.0, 0.0), 2.0);
    }

    #[test]
    fn setpoint_is_reported() {
        let pid = PidController::new(47.0, Tuning::gains(1.0, 0.0, 0.0));
        assert_eq!(pid.setpoint(), 47.0);
    }
}
