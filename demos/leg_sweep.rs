// leg_sweep.rs - Sweeps the four actuators of a leg module between two poses
// in a loop, while handling any incoming SIGINT (Ctrl-C) and SIGTERM signals
// so the tick threads are stopped cleanly before the application exits.
//
// The pulse output is a console stub that prints each duty change, so the
// demo runs on any machine. Swap `Console` for a real `PulseOutput`
// implementation to drive hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// The simple-signal crate is used to handle incoming signals.
use simple_signal::{self, Signal};

use legdrive::actuator::Group;
use legdrive::drive::{self, PulseOutput};
use legdrive::motion::{Config, MotionController};

const NUM_ACTUATORS: usize = 4;

// Prints a line whenever a channel's duty changes.
struct Console {
    last: [Option<u16>; NUM_ACTUATORS],
}

impl PulseOutput for Console {
    fn write_pulse(&mut self, channel: u8, duty: u16) -> drive::Result<()> {
        if let Some(last) = self.last.get_mut(channel as usize) {
            if *last != Some(duty) {
                println!("channel {} <- duty {}", channel, duty);
                *last = Some(duty);
            }
        }

        Ok(())
    }
}

fn main() -> legdrive::motion::Result<()> {
    env_logger::init();

    let config = Config {
        homing: false, // nothing to home against in a console demo
        ..Config::default()
    };

    let console = Console {
        last: [None; NUM_ACTUATORS],
    };
    let mut leg = MotionController::new(console, NUM_ACTUATORS, config)?;
    leg.start()?;

    let running = Arc::new(AtomicBool::new(true));

    // When a SIGINT (Ctrl-C) or SIGTERM signal is caught, atomically set running to false.
    simple_signal::set_handler(&[Signal::Int, Signal::Term], {
        let running = running.clone();
        move |_| {
            running.store(false, Ordering::SeqCst);
        }
    });

    // Alternate between two poses until running is set to false.
    let bank = leg.bank();
    let mut toggle = false;
    while running.load(Ordering::SeqCst) {
        let (left, right) = if toggle {
            ([45, 135], [135, 45])
        } else {
            ([135, 45], [45, 135])
        };
        bank.set_targets(Group::Left, &left);
        bank.set_targets(Group::Right, &right);
        toggle = !toggle;

        thread::sleep(Duration::from_secs(3));
    }

    leg.stop()
}
