//! Hardware capability seam.
//!
//! The control loop doesn't talk to a PWM peripheral or a GPIO register
//! directly. It is handed two capabilities at construction time: a
//! [`PulseOutput`] that accepts per-channel duty values, and a [`LimitSwitch`]
//! that reports whether an actuator has hit its mechanical deadstop. Whoever
//! builds the controller decides what's behind them: a memory-mapped PWM
//! block, an I2C servo driver board, or a recording stub in tests.
//!
//! The controller owns the `PulseOutput` for its entire lifetime, so the
//! hardware handle can never be dropped while tick threads still write to it.
//!
//! With the `hal` feature enabled, adapters are provided that wrap any
//! `embedded-hal` v1 PWM channel or input pin in these traits.

use std::error;
use std::fmt;
use std::io;
use std::result;

#[cfg(feature = "hal")]
mod hal;
#[cfg(feature = "hal")]
pub use self::hal::{HalLimitSwitch, HalPulseOutput};

/// Errors that can occur when accessing the pulse output or limit switch.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    Io(io::Error),
    /// The pulse output doesn't expose a channel with the specified number.
    ChannelNotAvailable(u8),
    /// The underlying hardware driver reported a failure.
    Driver,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::ChannelNotAvailable(channel) => {
                write!(f, "Channel {} is not available", channel)
            }
            Error::Driver => write!(f, "Hardware driver error"),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `drive::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// Pulse-width output peripheral, one channel per actuator.
///
/// `duty` is a 16-bit fractional on-time over the 20 ms servo frame; see
/// [`crate::pulse`] for the angle conversions.
pub trait PulseOutput {
    /// Writes a duty value to the specified output channel.
    fn write_pulse(&mut self, channel: u8, duty: u16) -> Result<()>;
}

/// Binary deadstop sensor, polled during homing.
///
/// Typical leg hardware wires a single switch that every actuator can
/// reach, which is why homing runs strictly one actuator at a time.
pub trait LimitSwitch {
    /// Returns `true` while the actuator currently being driven is pressing
    /// against its mechanical travel limit.
    fn limit_reached(&mut self) -> Result<bool>;
}

impl<T: PulseOutput + ?Sized> PulseOutput for &mut T {
    fn write_pulse(&mut self, channel: u8, duty: u16) -> Result<()> {
        (**self).write_pulse(channel, duty)
    }
}

impl<T: LimitSwitch + ?Sized> LimitSwitch for &mut T {
    fn limit_reached(&mut self) -> Result<bool> {
        (**self).limit_reached()
    }
}
