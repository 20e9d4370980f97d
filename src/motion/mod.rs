//! Actuator motion control: homing pass and position ramp loop.
//!
//! [`MotionController`] ties the shared actuator [`Bank`] to the hardware
//! capabilities and enforces the bring-up order the hardware requires:
//! construct with an initialized pulse output, run the homing pass (or
//! configure it away), then start the tick loop. Starting the ramp before
//! homing has been attempted returns [`Error::NotCalibrated`]; driving
//! uncalibrated actuators toward unknown mechanical limits is the one thing
//! this module refuses to do.
//!
//! Once started, the ramp runs until the controller is stopped or dropped.
//! Targets are fed in concurrently through [`Bank::set_targets`].

use std::io;
use std::result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::{error, fmt};

use log::info;

use crate::actuator::{Bank, Group};
use crate::drive::{self, LimitSwitch, PulseOutput};
use crate::pulse;

pub mod homing;
mod ramp;

pub use self::homing::{Outcome, Report};

/// Errors that can occur while controlling actuator motion.
#[derive(Debug)]
pub enum Error {
    /// Error from the pulse output or limit switch capability.
    Drive(drive::Error),
    /// I/O error.
    Io(io::Error),
    /// Tick thread panicked.
    ThreadPanic,
    /// The ramp can't start because homing hasn't been attempted for every
    /// actuator.
    NotCalibrated,
    /// The operation requires the ramp to be stopped.
    RampRunning,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Drive(ref err) => write!(f, "Drive error: {}", err),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::ThreadPanic => write!(f, "Tick thread panicked"),
            Error::NotCalibrated => write!(f, "Homing hasn't been attempted"),
            Error::RampRunning => write!(f, "Ramp is running"),
        }
    }
}

impl error::Error for Error {}

impl From<drive::Error> for Error {
    fn from(err: drive::Error) -> Error {
        Error::Drive(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `motion::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// How tick loops are distributed over threads.
///
/// Both shapes behave identically as far as the actuators are concerned,
/// since per-actuator state has no cross-actuator dependency. One thread per
/// actuator gives each servo its own pacing; a single shared loop trades
/// scheduling pressure for a shared delay.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Tasking {
    /// One tick thread per actuator, each touching only its own index.
    PerActuator,
    /// One tick thread iterating over all actuators with a single delay.
    Shared,
}

/// Motion parameters. All fields have working defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Angle in degrees every actuator starts at, clamped to `[0, 180]`.
    pub start_angle: i32,
    /// Ramp step per tick in degrees.
    pub step: i32,
    /// Tick period. A fixed configuration parameter, not derived from the
    /// step size.
    pub tick_period: Duration,
    /// Thread layout of the tick loop.
    pub tasking: Tasking,
    /// Whether a homing pass is required before the ramp may start. When
    /// disabled, actuators are driven with the uncalibrated default bounds.
    pub homing: bool,
    /// Homing search step in degrees.
    pub homing_step: i32,
    /// Settle time between homing steps, giving the servo time to move
    /// before the limit switch is polled.
    pub homing_settle: Duration,
    /// Clamp incoming targets to the calibrated travel bounds of homed
    /// actuators. Off by default.
    pub clamp_targets_to_bounds: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            start_angle: 90,
            step: 1,
            tick_period: Duration::from_millis(20),
            tasking: Tasking::Shared,
            homing: true,
            homing_step: 1,
            homing_settle: Duration::from_millis(10),
            clamp_targets_to_bounds: false,
        }
    }
}

/// Drives a bank of actuators toward their commanded targets.
///
/// See the [crate-level documentation](crate) for a usage example.
pub struct MotionController<P: PulseOutput + Send + 'static> {
    bank: Arc<Bank>,
    output: Arc<Mutex<P>>,
    config: Config,
    calibrated: bool,
    ramp: Option<ramp::Ramp>,
}

impl<P: PulseOutput + Send + 'static> MotionController<P> {
    /// Constructs a controller for `actuators` channels and asserts the
    /// start angle on every one of them.
    ///
    /// The pulse output must already be initialized; this writes one pulse
    /// per channel, which is undefined on an unconfigured peripheral.
    pub fn new(mut output: P, actuators: usize, config: Config) -> Result<MotionController<P>> {
        let mut bank = Bank::new(actuators, config.start_angle);
        bank.set_clamp_to_bounds(config.clamp_targets_to_bounds);

        for actuator in bank.iter() {
            output.write_pulse(actuator.index(), pulse::duty_for_angle(actuator.current()))?;
            info!(
                "Actuator {} initialized at angle {}",
                actuator.index(),
                actuator.current()
            );
        }

        Ok(MotionController {
            bank: Arc::new(bank),
            output: Arc::new(Mutex::new(output)),
            // With homing disabled there's nothing to calibrate against.
            calibrated: !config.homing,
            config,
            ramp: None,
        })
    }

    /// Returns a handle to the shared actuator bank.
    ///
    /// Clone it into whatever delivers commands; [`Bank::set_targets`] is
    /// safe to call concurrently with the running ramp.
    pub fn bank(&self) -> Arc<Bank> {
        Arc::clone(&self.bank)
    }

    /// Runs the homing pass for every actuator, strictly one at a time in
    /// index order.
    ///
    /// The limit switch is a single shared resource, so passes never
    /// overlap. A pass that doesn't find the deadstop within the step cap is
    /// reported as [`Outcome::Failed`] and leaves that actuator un-homed;
    /// the remaining actuators still attempt homing. Only capability I/O
    /// failures abort the whole pass.
    pub fn home<L: LimitSwitch>(&mut self, switch: &mut L) -> Result<Vec<Report>> {
        if self.ramp.is_some() {
            return Err(Error::RampRunning);
        }

        let mut output = self.output.lock().map_err(|_| Error::ThreadPanic)?;
        let reports = homing::home_all(&self.bank, &mut *output, switch, &self.config)?;

        // Every actuator has reached a terminal state, failed or not.
        self.calibrated = true;

        Ok(reports)
    }

    /// Starts the tick loop.
    ///
    /// Returns [`Error::NotCalibrated`] unless homing has been attempted for
    /// every actuator (or was disabled in the config). Actuators whose
    /// homing pass failed are never driven.
    pub fn start(&mut self) -> Result<()> {
        if !self.calibrated {
            return Err(Error::NotCalibrated);
        }
        if self.ramp.is_some() {
            return Ok(());
        }

        self.ramp = Some(ramp::Ramp::start(&self.bank, &self.output, &self.config));
        info!("Ramp started for {} actuators", self.bank.len());

        Ok(())
    }

    /// Returns `true` while the tick loop is running.
    pub fn is_running(&self) -> bool {
        self.ramp.is_some()
    }

    /// Changes the tick period.
    ///
    /// Takes effect on the running tick threads within one tick.
    pub fn set_tick_period(&mut self, tick_period: Duration) {
        self.config.tick_period = tick_period;
        if let Some(ref mut ramp) = self.ramp {
            ramp.reconfigure(tick_period);
        }
    }

    /// Stops the tick loop and waits for its threads to finish.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut ramp) = self.ramp.take() {
            ramp.stop()?;
        }

        Ok(())
    }

    /// Stores target angles for a command group. Convenience forward to
    /// [`Bank::set_targets`].
    pub fn set_targets(&self, group: Group, angles: &[i32]) {
        self.bank.set_targets(group, angles);
    }
}

impl<P: PulseOutput + Send + 'static> Drop for MotionController<P> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
