//! `embedded-hal` v1 adapters for the capability traits.

use embedded_hal::digital::InputPin;
use embedded_hal::pwm::SetDutyCycle;

use super::{Error, LimitSwitch, PulseOutput, Result};

/// Wraps a set of `embedded-hal` PWM channels as a [`PulseOutput`].
///
/// Channel numbers index into the wrapped collection in order. The 16-bit
/// fractional duty is rescaled to each channel's own duty range.
#[derive(Debug)]
pub struct HalPulseOutput<T> {
    channels: Vec<T>,
}

impl<T: SetDutyCycle> HalPulseOutput<T> {
    /// Constructs a `HalPulseOutput` from PWM channels in actuator order.
    pub fn new(channels: Vec<T>) -> HalPulseOutput<T> {
        HalPulseOutput { channels }
    }
}

impl<T: SetDutyCycle> PulseOutput for HalPulseOutput<T> {
    fn write_pulse(&mut self, channel: u8, duty: u16) -> Result<()> {
        let pwm = self
            .channels
            .get_mut(channel as usize)
            .ok_or(Error::ChannelNotAvailable(channel))?;

        let max = u32::from(pwm.max_duty_cycle());
        let scaled = (u32::from(duty) * max / 65_535) as u16;

        pwm.set_duty_cycle(scaled).map_err(|_| Error::Driver)
    }
}

/// Wraps an `embedded-hal` input pin as a [`LimitSwitch`].
///
/// The switch is treated as active-high: a high level means the deadstop has
/// been reached.
#[derive(Debug)]
pub struct HalLimitSwitch<T> {
    pin: T,
}

impl<T: InputPin> HalLimitSwitch<T> {
    /// Constructs a `HalLimitSwitch` from an input pin.
    pub fn new(pin: T) -> HalLimitSwitch<T> {
        HalLimitSwitch { pin }
    }
}

impl<T: InputPin> LimitSwitch for HalLimitSwitch<T> {
    fn limit_reached(&mut self) -> Result<bool> {
        self.pin.is_high().map_err(|_| Error::Driver)
    }
}
