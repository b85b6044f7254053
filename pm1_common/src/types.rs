//! Core data-model types shared between the HAL and control layers.

use std::time::Instant;

/// A snapshot of one controller's encoder state, decoded and scaled.
#[derive(Debug, Clone, Copy)]
pub struct MotorSnapshot {
    /// Time the snapshot was taken.
    pub time: Instant,
    /// Decoded encoder reading, scaled by the controller's position constant (radians).
    pub position_rad: f64,
    /// Backward-difference speed estimate (radians/second).
    pub speed_rad_per_s: f64,
}

impl MotorSnapshot {
    /// A zeroed snapshot anchored at `time`, used before any frame has arrived.
    pub fn zeroed(time: Instant) -> Self {
        Self {
            time,
            position_rad: 0.0,
            speed_rad_per_s: 0.0,
        }
    }

    /// Fold in a freshly decoded position reading, deriving speed by backward difference.
    pub fn advance(&self, time: Instant, position_rad: f64) -> Self {
        let dt = time.saturating_duration_since(self.time).as_secs_f64();
        let speed_rad_per_s = if dt > 0.0 {
            (position_rad - self.position_rad) / dt
        } else {
            0.0
        };
        Self {
            time,
            position_rad,
            speed_rad_per_s,
        }
    }
}

/// Planar odometry estimate. `s` is non-decreasing arc length; `theta` accumulates and is
/// never wrapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Odometry {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub vx: f64,
    pub vy: f64,
    pub w: f64,
}

impl Odometry {
    /// The all-zero pose, used at session start and after `clear()`.
    pub const fn zero() -> Self {
        Self {
            s: 0.0,
            x: 0.0,
            y: 0.0,
            theta: 0.0,
            vx: 0.0,
            vy: 0.0,
            w: 0.0,
        }
    }

    /// The NaN-filled sentinel returned by the library surface when no session is active.
    pub const fn nan() -> Self {
        Self {
            s: f64::NAN,
            x: f64::NAN,
            y: f64::NAN,
            theta: f64::NAN,
            vx: f64::NAN,
            vy: f64::NAN,
            w: f64::NAN,
        }
    }
}

impl Default for Odometry {
    fn default() -> Self {
        Self::zero()
    }
}

/// Chassis geometry, in metres.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ChassisConfig {
    /// Rear wheel track.
    pub width: f64,
    /// Distance from the rear axle midpoint to the rudder.
    pub length: f64,
    /// Left wheel radius.
    pub left_radius: f64,
    /// Right wheel radius.
    pub right_radius: f64,
}

impl ChassisConfig {
    /// Geometry of the reference autolabor PM1 chassis, used as the crate's default.
    pub const fn reference() -> Self {
        Self {
            width: 0.571,
            length: 0.348,
            left_radius: 0.1075,
            right_radius: 0.1075,
        }
    }
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self::reference()
    }
}

/// Rear-wheel midpoint linear speed and rudder angle. `rudder = NaN` is the canonical
/// "freeze, do not steer" sentinel.
#[derive(Debug, Clone, Copy)]
pub struct PhysicalSetpoint {
    pub speed: f64,
    pub rudder: f64,
    /// Chassis angular rate (rad/s) commanded while rotating in place, i.e. while `rudder`
    /// holds the ±π/2 sentinel and `speed` is pinned at zero. The `(speed, rudder)`
    /// parameterization alone is singular there (speed carries no magnitude to recover ω
    /// from), so the originally-commanded rate travels alongside it. Meaningless whenever
    /// `rudder.cos()` is not close to zero.
    pub spin: f64,
}

impl PhysicalSetpoint {
    pub const fn new(speed: f64, rudder: f64) -> Self {
        Self { speed, rudder, spin: 0.0 }
    }

    /// A pure in-place rotation: zero rear-wheel speed, rudder at the steering sentinel, and
    /// `spin` carrying the commanded chassis angular rate.
    pub const fn turn_in_place(rudder: f64, spin: f64) -> Self {
        Self { speed: 0.0, rudder, spin }
    }

    /// Brake the wheels while holding the rudder at `rudder`.
    pub const fn brake_at(rudder: f64) -> Self {
        Self::new(0.0, rudder)
    }

    /// Is the rudder field the "freeze, do not steer" sentinel?
    pub fn is_frozen(&self) -> bool {
        self.rudder.is_nan()
    }
}

/// Chassis-frame linear and angular velocity set-point.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocitySetpoint {
    pub v: f64,
    pub w: f64,
}

impl VelocitySetpoint {
    pub const fn new(v: f64, w: f64) -> Self {
        Self { v, w }
    }
}

/// Supplemented lock state machine (see `SPEC_FULL.md` §1.2). Gates `set_target` on the
/// session and `drive`/motion primitives on the library surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChassisLockState {
    /// Driving is refused; the session holds the wheels braked.
    Locked,
    /// Driving is permitted.
    Unlocked,
}

impl Default for ChassisLockState {
    fn default() -> Self {
        ChassisLockState::Locked
    }
}
