//! Angle to pulse-width duty mapping.
//!
//! Hobby servos are positioned with a 50 Hz pulse train where the pulse width
//! selects the shaft angle: 500 µs for one end of the travel range, 2500 µs
//! for the other. The hardware peripheral expects the pulse width as a 16-bit
//! fractional duty value over the 20 ms frame, so the functions in this module
//! convert degrees to that representation.
//!
//! All conversions are total. Out-of-range input is clamped, never rejected,
//! because a malformed command must not be able to stop the control loop.
//! Intermediate math is done in 64 bits to avoid truncation bias when
//! narrowing to the 16-bit duty.

/// Pulse frame period in microseconds (50 Hz carrier).
pub const PERIOD_US: i64 = 20_000;

/// Minimum pulse width in microseconds, corresponding to 0 degrees.
pub const PULSE_MIN_US: i64 = 500;

/// Maximum pulse width in microseconds, corresponding to 180 degrees.
pub const PULSE_MAX_US: i64 = 2_500;

/// Maximum duty value of the 16-bit pulse output peripheral.
pub const DUTY_MAX: i64 = 65_535;

/// Lowest addressable shaft angle in degrees.
pub const ANGLE_MIN: i32 = 0;

/// Highest addressable shaft angle in degrees.
pub const ANGLE_MAX: i32 = 180;

/// Converts a pulse width in microseconds to a 16-bit fractional duty value
/// over the 20 ms frame. The pulse width is clamped to the frame.
pub fn duty_for_pulse_us(pulse_us: i64) -> u16 {
    let pulse_us = pulse_us.clamp(0, PERIOD_US);

    ((pulse_us * DUTY_MAX) / PERIOD_US) as u16
}

/// Converts a shaft angle in degrees to a duty value.
///
/// The angle is clamped to `[0, 180]` before mapping, so 0 degrees yields the
/// duty for a 500 µs pulse and 180 degrees the duty for a 2500 µs pulse.
pub fn duty_for_angle(angle: i32) -> u16 {
    let angle = i64::from(angle.clamp(ANGLE_MIN, ANGLE_MAX));
    let pulse_us = PULSE_MIN_US + (angle * (PULSE_MAX_US - PULSE_MIN_US)) / 180;

    duty_for_pulse_us(pulse_us)
}

/// Converts an unclamped raw step angle to a duty value.
///
/// Used by the homing search, which deliberately walks past the nominal
/// 0-180 degree window while looking for the mechanical deadstop. The raw
/// angle itself isn't clamped; the resulting pulse width is clamped to
/// `[500 µs, 2500 µs]` so the servo is never commanded outside its safe
/// electrical range.
pub fn duty_for_raw_angle(raw_angle: i32) -> u16 {
    let raw_angle = i64::from(raw_angle);
    let pulse_us = PULSE_MIN_US + (raw_angle * (PULSE_MAX_US - PULSE_MIN_US)) / 180;

    duty_for_pulse_us(pulse_us.clamp(PULSE_MIN_US, PULSE_MAX_US))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_match_pulse_widths() {
        assert_eq!(duty_for_angle(0), duty_for_pulse_us(PULSE_MIN_US));
        assert_eq!(duty_for_angle(90), duty_for_pulse_us(1_500));
        assert_eq!(duty_for_angle(180), duty_for_pulse_us(PULSE_MAX_US));
    }

    #[test]
    fn monotonic_over_full_range() {
        let mut previous = duty_for_angle(ANGLE_MIN);
        for angle in ANGLE_MIN + 1..=ANGLE_MAX {
            let duty = duty_for_angle(angle);
            assert!(duty >= previous, "duty regressed at {} degrees", angle);
            previous = duty;
        }
    }

    #[test]
    fn out_of_range_angles_clamp() {
        assert_eq!(duty_for_angle(-45), duty_for_angle(0));
        assert_eq!(duty_for_angle(999), duty_for_angle(180));
    }

    #[test]
    fn raw_angles_clamp_at_pulse_level() {
        // Raw angles outside the window saturate at the pulse limits, not at
        // the angle limits.
        assert_eq!(duty_for_raw_angle(-50), duty_for_pulse_us(PULSE_MIN_US));
        assert_eq!(duty_for_raw_angle(400), duty_for_pulse_us(PULSE_MAX_US));
        assert_eq!(duty_for_raw_angle(90), duty_for_angle(90));
    }

    #[test]
    fn pulse_conversion_is_exact() {
        // 500 µs over a 20 ms frame at 16-bit resolution.
        assert_eq!(duty_for_pulse_us(500), 1_638);
        // 2500 µs.
        assert_eq!(duty_for_pulse_us(2_500), 8_191);
        assert_eq!(duty_for_pulse_us(PERIOD_US), DUTY_MAX as u16);
    }
}
