//! `MotionExecutor`: distance/time/angle-bounded motion primitives layered on top of a
//! [`ChassisSession`], with cooperative pause/resume/cancel.
//!
//! Every primitive takes the same shared `action` mutex, so only one can run at a time; a
//! second call blocks until the first finishes, is cancelled, or the process is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pm1_common::consts::{
    MIN_ARC_RADIUS, MOTION_LOOP_PERIOD_MS, MOVE_FLOOR_SPEED, MOVE_RAMP_DOWN_DISTANCE,
    MOVE_RAMP_UP_DISTANCE, ROTATE_FLOOR_SPEED, ROTATE_RAMP_DOWN_ANGLE, ROTATE_RAMP_UP_ANGLE,
};
use pm1_common::error::PmError;

use crate::session::ChassisSession;

/// Ramp a magnitude linearly from `floor` (at `extent == 0`) up to `target.abs()` (at
/// `extent >= ramp_distance`), preserving `target`'s sign.
fn ramp(target: f64, extent: f64, ramp_distance: f64, floor: f64) -> f64 {
    let max = target.abs();
    let magnitude = if extent >= ramp_distance {
        max
    } else if extent <= 0.0 {
        floor.min(max)
    } else {
        let k = (max - floor) / ramp_distance;
        (floor + k * extent).min(max)
    };
    if target >= 0.0 {
        magnitude
    } else {
        -magnitude
    }
}

/// The speed actually commanded at a point in a linear move: ramped up from the start and
/// ramped down toward the end, whichever is more conservative.
fn move_speed(target: f64, traveled: f64, rest: f64) -> f64 {
    let up = ramp(target, traveled, MOVE_RAMP_UP_DISTANCE, MOVE_FLOOR_SPEED);
    let down = ramp(target, rest, MOVE_RAMP_DOWN_DISTANCE, MOVE_FLOOR_SPEED);
    if target >= 0.0 {
        up.min(down)
    } else {
        up.max(down)
    }
}

/// As `move_speed`, for angular motion.
fn rotate_speed(target: f64, traveled: f64, rest: f64) -> f64 {
    let up = ramp(target, traveled, ROTATE_RAMP_UP_ANGLE, ROTATE_FLOOR_SPEED);
    let down = ramp(target, rest, ROTATE_RAMP_DOWN_ANGLE, ROTATE_FLOOR_SPEED);
    if target >= 0.0 {
        up.min(down)
    } else {
        up.max(down)
    }
}

/// Parameterised motion primitives on top of a [`ChassisSession`].
pub struct MotionExecutor {
    session: Arc<ChassisSession>,
    action: Mutex<()>,
    cancel: AtomicBool,
    paused: AtomicBool,
}

impl MotionExecutor {
    pub fn new(session: Arc<ChassisSession>) -> Self {
        Self {
            session,
            action: Mutex::new(()),
            cancel: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    /// Drive straight at `speed` (m/s) for `distance` metres (always >= 0; direction comes
    /// from the sign of `speed`).
    pub fn go_straight(&self, speed: f64, distance: f64) -> Result<(), PmError> {
        if distance < 0.0 {
            return Err(PmError::IllegalArgument);
        }
        if speed == 0.0 && distance != 0.0 {
            return Err(PmError::InfiniteAction);
        }
        self.distance_bounded(distance, |traveled, rest| (move_speed(speed, traveled, rest), 0.0))
    }

    pub fn go_straight_timing(&self, speed: f64, time_secs: f64) -> Result<(), PmError> {
        if time_secs <= 0.0 {
            return Err(PmError::IllegalArgument);
        }
        self.time_bounded(time_secs, (speed, 0.0))
    }

    /// Drive an arc of radius `radius` (signed; magnitude >= `MIN_ARC_RADIUS`) through `rad`
    /// radians of turn at linear speed `speed`.
    pub fn go_arc(&self, speed: f64, radius: f64, rad: f64) -> Result<(), PmError> {
        if rad < 0.0 || radius.abs() < MIN_ARC_RADIUS {
            return Err(PmError::IllegalArgument);
        }
        if speed == 0.0 && rad != 0.0 {
            return Err(PmError::InfiniteAction);
        }
        let distance = (radius * rad).abs();
        self.distance_bounded(distance, |traveled, rest| {
            let v = move_speed(speed, traveled, rest);
            (v, v / radius)
        })
    }

    pub fn go_arc_timing(&self, speed: f64, radius: f64, time_secs: f64) -> Result<(), PmError> {
        if time_secs <= 0.0 || radius.abs() < MIN_ARC_RADIUS {
            return Err(PmError::IllegalArgument);
        }
        self.time_bounded(time_secs, (speed, speed / radius))
    }

    /// Rotate in place by `rad` radians (>= 0) at angular speed `speed`.
    pub fn turn_around(&self, speed: f64, rad: f64) -> Result<(), PmError> {
        if rad < 0.0 {
            return Err(PmError::IllegalArgument);
        }
        if speed == 0.0 && rad != 0.0 {
            return Err(PmError::InfiniteAction);
        }
        self.angle_bounded(rad, |traveled, rest| (0.0, rotate_speed(speed, traveled, rest)))
    }

    pub fn turn_around_timing(&self, speed: f64, time_secs: f64) -> Result<(), PmError> {
        if time_secs <= 0.0 {
            return Err(PmError::IllegalArgument);
        }
        self.time_bounded(time_secs, (0.0, speed))
    }

    /// Freeze the in-progress primitive (if any) in place: the session brakes the wheels and
    /// holds the rudder at its current angle (`(0, NaN)` in physical terms — `SPEC_FULL.md`
    /// §4.7) until `resume()`.
    pub fn pause(&self) -> Result<(), PmError> {
        self.paused.store(true, Ordering::Release);
        self.session.freeze();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PmError> {
        self.paused.store(false, Ordering::Release);
        self.session.unfreeze();
        Ok(())
    }

    /// Ask the in-progress primitive (if any) to stop at its next control tick.
    pub fn cancel_all(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    fn distance_bounded(
        &self,
        target_distance: f64,
        compute: impl Fn(f64, f64) -> (f64, f64),
    ) -> Result<(), PmError> {
        let _guard = self.action.lock().unwrap();
        self.cancel.store(false, Ordering::Release);
        let origin = self.session.odometry().s;

        loop {
            if self.cancel.load(Ordering::Acquire) {
                let _ = self.session.set_target(0.0, 0.0);
                return Err(PmError::ActionCanceled);
            }
            let traveled = (self.session.odometry().s - origin).abs();
            let rest = target_distance - traveled;
            if rest <= 0.0 {
                break;
            }
            if !self.paused.load(Ordering::Acquire) {
                let (v, w) = compute(traveled, rest);
                let _ = self.session.set_target(v, w);
            }
            thread::sleep(Duration::from_millis(MOTION_LOOP_PERIOD_MS));
        }
        let _ = self.session.set_target(0.0, 0.0);
        Ok(())
    }

    fn angle_bounded(
        &self,
        target_angle: f64,
        compute: impl Fn(f64, f64) -> (f64, f64),
    ) -> Result<(), PmError> {
        let _guard = self.action.lock().unwrap();
        self.cancel.store(false, Ordering::Release);
        let origin = self.session.odometry().theta;

        loop {
            if self.cancel.load(Ordering::Acquire) {
                let _ = self.session.set_target(0.0, 0.0);
                return Err(PmError::ActionCanceled);
            }
            let traveled = (self.session.odometry().theta - origin).abs();
            let rest = target_angle - traveled;
            if rest <= 0.0 {
                break;
            }
            if !self.paused.load(Ordering::Acquire) {
                let (v, w) = compute(traveled, rest);
                let _ = self.session.set_target(v, w);
            }
            thread::sleep(Duration::from_millis(MOTION_LOOP_PERIOD_MS));
        }
        let _ = self.session.set_target(0.0, 0.0);
        Ok(())
    }

    fn time_bounded(&self, time_secs: f64, (v, w): (f64, f64)) -> Result<(), PmError> {
        let _guard = self.action.lock().unwrap();
        self.cancel.store(false, Ordering::Release);
        let tick = Duration::from_millis(MOTION_LOOP_PERIOD_MS);
        let mut deadline = Instant::now() + Duration::from_secs_f64(time_secs);

        while Instant::now() < deadline {
            if self.cancel.load(Ordering::Acquire) {
                let _ = self.session.set_target(0.0, 0.0);
                return Err(PmError::ActionCanceled);
            }
            if self.paused.load(Ordering::Acquire) {
                // Extend the deadline by the paused duration so a timed primitive still runs
                // for its full commanded time once resumed.
                deadline += tick;
            } else {
                let _ = self.session.set_target(v, w);
            }
            thread::sleep(tick);
        }
        let _ = self.session.set_target(0.0, 0.0);
        Ok(())
    }
}
