//! Tick loop that converges actuators toward their targets.
//!
//! Each tick advances every driven actuator by one bounded step and writes
//! the resulting duty to its channel. The pulse is re-asserted even when the
//! actuator has reached its target; some servo hardware drifts without a
//! periodic refresh.
//!
//! Tick threads try to switch to real-time round-robin scheduling and reduce
//! their timer slack, which silently fails without the needed privileges.
//! Shutdown goes through an mpsc control channel; dropping the ramp stops
//! its threads.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use spin_sleep::SpinSleeper;

use super::{Config, Error, Result, Tasking};
use crate::actuator::Bank;
use crate::drive::PulseOutput;
use crate::pulse;

// One heartbeat log per ~10 s at the default 20 ms tick.
const ALIVE_TICKS: u64 = 500;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum Msg {
    Reconfigure(Duration),
    Stop,
}

/// Advances `current` one step toward `target` without crossing it.
pub(crate) fn step_toward(current: i32, target: i32, step: i32) -> i32 {
    if current < target {
        (current + step).min(target)
    } else if current > target {
        (current - step).max(target)
    } else {
        current
    }
}

struct Worker {
    thread: Option<thread::JoinHandle<Result<()>>>,
    sender: Sender<Msg>,
}

/// Handle over the running tick threads.
pub(crate) struct Ramp {
    workers: Vec<Worker>,
}

impl Ramp {
    /// Spawns tick threads per the configured [`Tasking`] shape.
    ///
    /// A thread that fails to spawn is logged and skipped; its actuators
    /// simply never ramp, while the rest of the system keeps running.
    pub(crate) fn start<P>(bank: &Arc<Bank>, output: &Arc<Mutex<P>>, config: &Config) -> Ramp
    where
        P: PulseOutput + Send + 'static,
    {
        let index_sets: Vec<Vec<usize>> = match config.tasking {
            Tasking::PerActuator => (0..bank.len()).map(|index| vec![index]).collect(),
            Tasking::Shared => vec![(0..bank.len()).collect()],
        };

        let mut workers = Vec::with_capacity(index_sets.len());

        for indices in index_sets {
            let (sender, receiver): (Sender<Msg>, Receiver<Msg>) = mpsc::channel();
            let bank = Arc::clone(bank);
            let output = Arc::clone(output);
            let step = config.step;
            let tick_period = config.tick_period;
            let require_homed = config.homing;
            let name = match indices.as_slice() {
                [index] => format!("legdrive-tick{}", index),
                _ => String::from("legdrive-tick"),
            };

            let spawned = thread::Builder::new().name(name).spawn(move || {
                tick_loop(
                    &bank,
                    &output,
                    &indices,
                    step,
                    tick_period,
                    require_homed,
                    &receiver,
                )
            });

            match spawned {
                Ok(thread) => workers.push(Worker {
                    thread: Some(thread),
                    sender,
                }),
                Err(err) => warn!("Failed to spawn tick thread: {}", err),
            }
        }

        Ramp { workers }
    }

    /// Changes the tick period of all running threads.
    pub(crate) fn reconfigure(&mut self, tick_period: Duration) {
        for worker in &self.workers {
            let _ = worker.sender.send(Msg::Reconfigure(tick_period));
        }
    }

    /// Asks all tick threads to stop and waits for them.
    pub(crate) fn stop(&mut self) -> Result<()> {
        for worker in &self.workers {
            let _ = worker.sender.send(Msg::Stop);
        }

        let mut first_error = None;
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                match thread.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => first_error = first_error.or(Some(err)),
                    Err(_) => first_error = first_error.or(Some(Error::ThreadPanic)),
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Ramp {
    fn drop(&mut self) {
        // Don't wait for tick threads while the main thread is panicking; a
        // thread that doesn't respond to Stop would block unwinding forever.
        if !thread::panicking() {
            let _ = self.stop();
        }
    }
}

fn tick_loop<P>(
    bank: &Bank,
    output: &Mutex<P>,
    indices: &[usize],
    step: i32,
    mut tick_period: Duration,
    require_homed: bool,
    receiver: &Receiver<Msg>,
) -> Result<()>
where
    P: PulseOutput,
{
    init_realtime();

    let sleeper = SpinSleeper::default();
    let mut ticks: u64 = 0;

    loop {
        while let Ok(msg) = receiver.try_recv() {
            match msg {
                Msg::Reconfigure(period) => tick_period = period,
                Msg::Stop => return Ok(()),
            }
        }

        {
            let mut output = output.lock().map_err(|_| Error::ThreadPanic)?;

            for &index in indices {
                let actuator = match bank.get(index) {
                    Some(actuator) => actuator,
                    None => continue,
                };
                // Never drive an actuator whose homing pass failed.
                if require_homed && !actuator.homed() {
                    continue;
                }

                let next = step_toward(actuator.current(), actuator.target(), step);
                actuator.set_current(next);

                // A bad write must not stop the loop; the pulse is
                // re-asserted next tick anyway.
                if let Err(err) = output.write_pulse(actuator.index(), pulse::duty_for_angle(next))
                {
                    warn!("Pulse write failed for actuator {}: {}", index, err);
                }
            }
        }

        ticks += 1;
        if ticks % ALIVE_TICKS == 0 {
            debug!("Tick loop alive after {} ticks", ticks);
        }

        sleeper.sleep(tick_period);
    }
}

/// Requests real-time round-robin scheduling at the highest priority and
/// 1 ns timer slack. Both silently fail without root.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn init_realtime() {
    unsafe {
        let params = libc::sched_param {
            sched_priority: libc::sched_get_priority_max(libc::SCHED_RR),
        };
        libc::sched_setscheduler(0, libc::SCHED_RR, &params);
        libc::prctl(libc::PR_SET_TIMERSLACK, 1);
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn init_realtime() {}
