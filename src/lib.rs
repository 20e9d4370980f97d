//! `legdrive` drives the servo actuators of a robot leg module from a
//! real-time position control loop.
//!
//! An external command source sets per-group target angles through the shared
//! [`actuator::Bank`]; tick threads converge each actuator's current position
//! toward its target one bounded step at a time and push the resulting
//! pulse-width duty to the hardware. Before the loop is allowed to run, a
//! one-shot homing pass can discover each actuator's safe travel range
//! against a mechanical limit switch and park it at the calibrated center.
//!
//! Hardware access goes through the two capability traits in [`drive`]:
//! [`drive::PulseOutput`] for the pulse peripheral and [`drive::LimitSwitch`]
//! for the deadstop sensor. Enable the `hal` feature for `embedded-hal` v1
//! adapters.
//!
//! # Example
//!
//! ```
//! use legdrive::actuator::Group;
//! use legdrive::drive::{self, PulseOutput};
//! use legdrive::motion::{Config, MotionController};
//!
//! // Stand-in for a PWM peripheral.
//! struct Console;
//!
//! impl PulseOutput for Console {
//!     fn write_pulse(&mut self, channel: u8, duty: u16) -> drive::Result<()> {
//!         println!("channel {} <- duty {}", channel, duty);
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> legdrive::motion::Result<()> {
//! let config = Config {
//!     homing: false, // no limit switch wired up
//!     ..Config::default()
//! };
//!
//! let mut leg = MotionController::new(Console, 4, config)?;
//! leg.start()?;
//!
//! // Command the left pair of actuators; the loop ramps toward these.
//! leg.set_targets(Group::Left, &[120, 60]);
//!
//! leg.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod actuator;
pub mod drive;
pub mod motion;
pub mod pulse;
