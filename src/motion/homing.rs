//! Travel-range discovery against a mechanical deadstop.
//!
//! Homing walks each actuator outward one step at a time until the limit
//! switch trips, first toward the positive travel extreme, then, after
//! retracing its steps back to the origin, toward the negative extreme. The
//! two step counts give the full mechanical travel; half of it, measured from
//! the negative limit, is the calibrated center. The actuator is then parked
//! there and its travel bounds published.
//!
//! The search is bounded by [`STEP_CAP`] instead of a wall-clock timeout: a
//! missing or disconnected switch must not hang startup forever. A capped
//! search retraces its steps and reports [`Outcome::Failed`]; the actuator
//! stays un-homed and is never driven by the ramp.
//!
//! Passes run strictly one actuator at a time in index order, because the
//! limit switch is a single resource shared by every actuator.

use log::{info, warn};
use spin_sleep::SpinSleeper;

use super::{Config, Result};
use crate::actuator::{Actuator, Bank};
use crate::drive::{LimitSwitch, PulseOutput};
use crate::pulse;

/// Maximum number of steps a homing seek may take in one direction before
/// giving up.
pub const STEP_CAP: u32 = 400;

/// Terminal state of one actuator's homing pass.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Outcome {
    /// The deadstop was found in both directions and the actuator is parked
    /// at its calibrated center.
    Homed {
        /// Steps taken to reach the positive limit.
        steps_pos: u32,
        /// Steps taken to reach the negative limit.
        steps_neg: u32,
        /// Half the total travel in steps; bounds are `90 ± half` (scaled by
        /// the step size).
        half: i32,
    },
    /// The limit switch never tripped within [`STEP_CAP`] steps. The
    /// actuator was returned to its pre-seek position and left un-homed.
    Failed {
        /// Steps taken by the seek that gave up.
        steps: u32,
    },
}

/// Homing result for a single actuator.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Report {
    /// Actuator index the pass ran for.
    pub index: u8,
    /// Terminal state the pass reached.
    pub outcome: Outcome,
}

enum Seek {
    Tripped { steps: u32 },
    Capped { steps: u32 },
}

pub(crate) fn home_all<P, L>(
    bank: &Bank,
    output: &mut P,
    switch: &mut L,
    config: &Config,
) -> Result<Vec<Report>>
where
    P: PulseOutput,
    L: LimitSwitch,
{
    let mut reports = Vec::with_capacity(bank.len());

    for actuator in bank.iter() {
        let outcome = home_one(actuator, output, switch, config)?;
        match outcome {
            Outcome::Homed {
                steps_pos,
                steps_neg,
                half,
            } => info!(
                "Actuator {} homed: +{} / -{} steps, center at half {}",
                actuator.index(),
                steps_pos,
                steps_neg,
                half
            ),
            Outcome::Failed { steps } => warn!(
                "Actuator {} failed homing: no limit within {} steps",
                actuator.index(),
                steps
            ),
        }

        reports.push(Report {
            index: actuator.index(),
            outcome,
        });
    }

    Ok(reports)
}

fn home_one<P, L>(
    actuator: &Actuator,
    output: &mut P,
    switch: &mut L,
    config: &Config,
) -> Result<Outcome>
where
    P: PulseOutput,
    L: LimitSwitch,
{
    let sleeper = SpinSleeper::default();

    // SeekPositive.
    let steps_pos = match seek(actuator, output, switch, config, &sleeper, 1)? {
        Seek::Tripped { steps } => steps,
        Seek::Capped { steps } => {
            travel(actuator, output, config, &sleeper, -1, steps)?;
            return Ok(Outcome::Failed { steps });
        }
    };

    // ReturnFromPositive: replay the counted steps in reverse, no polling.
    travel(actuator, output, config, &sleeper, -1, steps_pos)?;

    // SeekNegative.
    let steps_neg = match seek(actuator, output, switch, config, &sleeper, -1)? {
        Seek::Tripped { steps } => steps,
        Seek::Capped { steps } => {
            travel(actuator, output, config, &sleeper, 1, steps)?;
            return Ok(Outcome::Failed { steps });
        }
    };

    // ComputeCenter: integer division drops the remainder step of an odd
    // total, so the center is biased toward the negative limit by up to one
    // step.
    let total = steps_pos + steps_neg;
    let half = (total / 2) as i32;
    travel(actuator, output, config, &sleeper, 1, total / 2)?;

    actuator.finalize_homing(half * config.homing_step);

    Ok(Outcome::Homed {
        steps_pos,
        steps_neg,
        half,
    })
}

/// Steps outward in `direction` until the limit switch trips or the step cap
/// is exhausted. The switch is polled once after every step.
fn seek<P, L>(
    actuator: &Actuator,
    output: &mut P,
    switch: &mut L,
    config: &Config,
    sleeper: &SpinSleeper,
    direction: i32,
) -> Result<Seek>
where
    P: PulseOutput,
    L: LimitSwitch,
{
    let mut steps = 0u32;

    loop {
        if steps >= STEP_CAP {
            return Ok(Seek::Capped { steps });
        }

        step_once(actuator, output, config, sleeper, direction)?;
        steps += 1;

        if switch.limit_reached()? {
            return Ok(Seek::Tripped { steps });
        }
    }
}

/// Replays `steps` steps in `direction` deterministically, without polling
/// the limit switch.
fn travel<P>(
    actuator: &Actuator,
    output: &mut P,
    config: &Config,
    sleeper: &SpinSleeper,
    direction: i32,
    steps: u32,
) -> Result<()>
where
    P: PulseOutput,
{
    for _ in 0..steps {
        step_once(actuator, output, config, sleeper, direction)?;
    }

    Ok(())
}

fn step_once<P>(
    actuator: &Actuator,
    output: &mut P,
    config: &Config,
    sleeper: &SpinSleeper,
    direction: i32,
) -> Result<()>
where
    P: PulseOutput,
{
    let raw = actuator.raw() + direction * config.homing_step;
    actuator.set_raw(raw);
    output.write_pulse(actuator.index(), pulse::duty_for_raw_angle(raw))?;
    sleeper.sleep(config.homing_settle);

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::drive::{self, Error};

    struct CountingOutput {
        writes: u32,
    }

    impl PulseOutput for CountingOutput {
        fn write_pulse(&mut self, _channel: u8, _duty: u16) -> drive::Result<()> {
            self.writes += 1;
            Ok(())
        }
    }

    /// Limit switch scripted per seek: `Some(n)` trips on the n-th poll,
    /// `None` never trips (the seek runs into the step cap).
    struct ScriptedSwitch {
        seeks: Vec<Option<u32>>,
        seek_index: usize,
        polls: u32,
    }

    impl ScriptedSwitch {
        fn new(seeks: Vec<Option<u32>>) -> ScriptedSwitch {
            ScriptedSwitch {
                seeks,
                seek_index: 0,
                polls: 0,
            }
        }
    }

    impl LimitSwitch for ScriptedSwitch {
        fn limit_reached(&mut self) -> drive::Result<bool> {
            self.polls += 1;
            match self.seeks.get(self.seek_index).copied().flatten() {
                Some(trip_at) if self.polls == trip_at => {
                    self.seek_index += 1;
                    self.polls = 0;
                    Ok(true)
                }
                None if self.polls == STEP_CAP => {
                    self.seek_index += 1;
                    self.polls = 0;
                    Ok(false)
                }
                _ => Ok(false),
            }
        }
    }

    fn test_config() -> Config {
        Config {
            homing_settle: Duration::ZERO,
            ..Config::default()
        }
    }

    #[test]
    fn computes_center_and_bounds() {
        let bank = Bank::new(1, 90);
        let mut output = CountingOutput { writes: 0 };
        let mut switch = ScriptedSwitch::new(vec![Some(40), Some(20)]);

        let reports = home_all(&bank, &mut output, &mut switch, &test_config()).unwrap();

        assert_eq!(
            reports,
            vec![Report {
                index: 0,
                outcome: Outcome::Homed {
                    steps_pos: 40,
                    steps_neg: 20,
                    half: 30,
                },
            }]
        );

        let actuator = bank.get(0).unwrap();
        assert!(actuator.homed());
        assert_eq!(actuator.bounds(), Some((60, 120)));
        assert_eq!(actuator.current(), 90);
        assert_eq!(actuator.target(), 90);

        // 40 out, 40 back, 20 out, 30 to center.
        assert_eq!(output.writes, 130);
    }

    #[test]
    fn odd_totals_round_toward_negative_limit() {
        let bank = Bank::new(1, 90);
        let mut output = CountingOutput { writes: 0 };
        let mut switch = ScriptedSwitch::new(vec![Some(41), Some(20)]);

        let reports = home_all(&bank, &mut output, &mut switch, &test_config()).unwrap();

        // total = 61, the remainder step is dropped: the center sits one step
        // closer to the negative limit.
        assert_eq!(
            reports[0].outcome,
            Outcome::Homed {
                steps_pos: 41,
                steps_neg: 20,
                half: 30,
            }
        );
        assert_eq!(bank.get(0).unwrap().bounds(), Some((60, 120)));
    }

    #[test]
    fn missing_switch_fails_at_step_cap() {
        let bank = Bank::new(1, 90);
        let mut output = CountingOutput { writes: 0 };
        let mut switch = ScriptedSwitch::new(vec![None]);

        let reports = home_all(&bank, &mut output, &mut switch, &test_config()).unwrap();

        assert_eq!(
            reports[0].outcome,
            Outcome::Failed { steps: STEP_CAP }
        );

        let actuator = bank.get(0).unwrap();
        assert!(!actuator.homed());
        assert_eq!(actuator.bounds(), None);
        // The capped seek retraced its steps back to the origin.
        assert_eq!(actuator.raw(), 90);
    }

    #[test]
    fn failed_actuator_does_not_stop_the_pass() {
        let bank = Bank::new(2, 90);
        let mut output = CountingOutput { writes: 0 };
        // Actuator 0 never finds the limit; actuator 1 homes normally.
        let mut switch = ScriptedSwitch::new(vec![None, Some(10), Some(10)]);

        let reports = home_all(&bank, &mut output, &mut switch, &test_config()).unwrap();

        assert_eq!(reports[0].outcome, Outcome::Failed { steps: STEP_CAP });
        assert_eq!(
            reports[1].outcome,
            Outcome::Homed {
                steps_pos: 10,
                steps_neg: 10,
                half: 10,
            }
        );
        assert!(!bank.get(0).unwrap().homed());
        assert!(bank.get(1).unwrap().homed());
    }

    #[test]
    fn switch_errors_abort_the_pass() {
        struct BrokenSwitch;

        impl LimitSwitch for BrokenSwitch {
            fn limit_reached(&mut self) -> drive::Result<bool> {
                Err(Error::Driver)
            }
        }

        let bank = Bank::new(1, 90);
        let mut output = CountingOutput { writes: 0 };

        let result = home_all(&bank, &mut output, &mut BrokenSwitch, &test_config());
        assert!(matches!(result, Err(super::super::Error::Drive(_))));
    }
}
