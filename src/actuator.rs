//! Shared actuator state and the command sink.
//!
//! Each actuator's state is a handful of machine-word fields, and every field
//! has exactly one writer for the lifetime of the system: the command sink
//! writes `target`, the tick loop writes `current`, and the homing pass writes
//! `raw`, the travel bounds and the `homed` flag before the tick loop is
//! allowed to run. Readers tolerate the most recently published value, so
//! relaxed atomic load/store is all the synchronization that's needed, with
//! no locks anywhere on the control path.
//!
//! A [`Bank`] owns all actuators of one leg module and exposes the write-side
//! contract used by the external command source: [`Bank::set_targets`].

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use log::debug;

use crate::pulse::{ANGLE_MAX, ANGLE_MIN};

/// Calibrated rest angle in degrees, the semantic mid-point of the travel
/// range discovered by homing.
pub const CENTER_ANGLE: i32 = 90;

/// Number of actuators addressed by one command group.
pub const GROUP_LEN: usize = 2;

/// Named subset of actuators addressed together by one inbound command.
///
/// Each group maps to a fixed, contiguous sub-range of actuator indices:
/// `Left` covers indices 0 and 1, `Right` covers 2 and 3.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Group {
    Left,
    Right,
}

impl Group {
    /// Returns the first actuator index covered by this group.
    pub fn base_index(self) -> usize {
        match self {
            Group::Left => 0,
            Group::Right => GROUP_LEN,
        }
    }
}

/// State of a single servo channel under position control.
///
/// Positions are integer degrees in `[0, 180]`. `raw` is an unclamped step
/// counter only meaningful during and after homing.
#[derive(Debug)]
pub struct Actuator {
    index: u8,
    current: AtomicI32,
    target: AtomicI32,
    raw: AtomicI32,
    homed: AtomicBool,
    min_bound: AtomicI32,
    max_bound: AtomicI32,
}

impl Actuator {
    fn new(index: u8, start_angle: i32) -> Actuator {
        Actuator {
            index,
            current: AtomicI32::new(start_angle),
            target: AtomicI32::new(start_angle),
            raw: AtomicI32::new(start_angle),
            homed: AtomicBool::new(false),
            min_bound: AtomicI32::new(ANGLE_MIN),
            max_bound: AtomicI32::new(ANGLE_MAX),
        }
    }

    /// Returns the actuator's index, which doubles as its hardware channel
    /// number.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Returns the most recently published current position in degrees.
    pub fn current(&self) -> i32 {
        self.current.load(Ordering::Relaxed)
    }

    /// Returns the commanded target position in degrees.
    pub fn target(&self) -> i32 {
        self.target.load(Ordering::Relaxed)
    }

    /// Returns `true` once a homing pass has completed successfully.
    pub fn homed(&self) -> bool {
        self.homed.load(Ordering::Relaxed)
    }

    /// Returns the calibrated travel bounds `(min, max)` in degrees, or
    /// `None` if the actuator hasn't been homed.
    ///
    /// Bounds of an un-homed actuator are meaningless, so they can't be read
    /// without this check.
    pub fn bounds(&self) -> Option<(i32, i32)> {
        if self.homed() {
            Some((
                self.min_bound.load(Ordering::Relaxed),
                self.max_bound.load(Ordering::Relaxed),
            ))
        } else {
            None
        }
    }

    /// Returns `true` while the current position hasn't reached the target.
    pub fn is_moving(&self) -> bool {
        self.current() != self.target()
    }

    pub(crate) fn set_current(&self, angle: i32) {
        self.current.store(angle, Ordering::Relaxed);
    }

    pub(crate) fn raw(&self) -> i32 {
        self.raw.load(Ordering::Relaxed)
    }

    pub(crate) fn set_raw(&self, raw: i32) {
        self.raw.store(raw, Ordering::Relaxed);
    }

    /// Publishes the result of a successful homing pass: centered rest pose
    /// and the discovered travel bounds. Called exactly once per actuator.
    pub(crate) fn finalize_homing(&self, half_angle: i32) {
        self.current.store(CENTER_ANGLE, Ordering::Relaxed);
        self.target.store(CENTER_ANGLE, Ordering::Relaxed);
        self.raw.store(CENTER_ANGLE, Ordering::Relaxed);
        self.min_bound
            .store(CENTER_ANGLE - half_angle, Ordering::Relaxed);
        self.max_bound
            .store(CENTER_ANGLE + half_angle, Ordering::Relaxed);
        self.homed.store(true, Ordering::Relaxed);
    }
}

/// All actuators of one leg module, plus the command sink.
#[derive(Debug)]
pub struct Bank {
    actuators: Vec<Actuator>,
    clamp_to_bounds: bool,
}

impl Bank {
    /// Constructs a `Bank` of `len` actuators, all starting with
    /// `current = target = start_angle`.
    ///
    /// `start_angle` is clamped to `[0, 180]`.
    pub fn new(len: usize, start_angle: i32) -> Bank {
        let start_angle = start_angle.clamp(ANGLE_MIN, ANGLE_MAX);
        let actuators = (0..len)
            .map(|index| Actuator::new(index as u8, start_angle))
            .collect();

        Bank {
            actuators,
            clamp_to_bounds: false,
        }
    }

    /// When enabled, targets for homed actuators are additionally clamped to
    /// their calibrated travel bounds.
    ///
    /// Disabled by default: commands outside the calibrated range are stored
    /// as-is and only the pulse-level clamp applies.
    pub(crate) fn set_clamp_to_bounds(&mut self, enabled: bool) {
        self.clamp_to_bounds = enabled;
    }

    /// Returns the number of actuators in the bank.
    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    /// Returns `true` if the bank contains no actuators.
    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    /// Returns the actuator with the specified index.
    pub fn get(&self, index: usize) -> Option<&Actuator> {
        self.actuators.get(index)
    }

    /// Returns an iterator over all actuators in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Actuator> {
        self.actuators.iter()
    }

    /// Stores target angles for the actuators covered by `group`.
    ///
    /// `angles[0]` goes to the group's first actuator, `angles[1]` to its
    /// second, and so on. An array shorter than the group leaves the
    /// remaining actuators' targets unchanged; entries beyond the group or
    /// the bank are ignored. Angles are clamped to `[0, 180]`.
    ///
    /// Safe to call from any thread while the tick loop is running: targets
    /// are single-word atomic stores, so a concurrent read never observes a
    /// torn value. Calling twice with the same angles is a no-op the second
    /// time.
    pub fn set_targets(&self, group: Group, angles: &[i32]) {
        for (offset, &angle) in angles.iter().take(GROUP_LEN).enumerate() {
            self.set_target(group.base_index() + offset, angle);
        }
    }

    /// Stores a target angle for a single actuator, clamped to `[0, 180]`.
    ///
    /// An index without a matching actuator is silently ignored.
    pub fn set_target(&self, index: usize, angle: i32) {
        let actuator = match self.actuators.get(index) {
            Some(actuator) => actuator,
            None => return,
        };

        let mut angle = angle.clamp(ANGLE_MIN, ANGLE_MAX);
        if self.clamp_to_bounds {
            if let Some((min, max)) = actuator.bounds() {
                angle = angle.clamp(min, max);
            }
        }

        actuator.target.store(angle, Ordering::Relaxed);
        debug!("Target angle set for actuator {}: {}", index, angle);
    }
}
