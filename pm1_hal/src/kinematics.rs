//! Forward/inverse kinematic transforms between chassis-level (v, ω), physical-level
//! (rear-wheel speed, rudder angle) and individual wheel speeds, plus the per-tick odometry
//! integrator and the `optimize` profile limiter.
//!
//! All angles are radians, all distances are metres, and every function here is pure.

use pm1_common::config::OptimizeConfig;
use pm1_common::consts::{EPSILON, RUDDER_ALIGN_TOLERANCE};
use pm1_common::types::{ChassisConfig, PhysicalSetpoint, VelocitySetpoint};

/// `(v, ω) -> (speed, rudder)`.
pub fn velocity_to_physical(target: VelocitySetpoint, cfg: &ChassisConfig) -> PhysicalSetpoint {
    let VelocitySetpoint { v, w } = target;
    if w.abs() < EPSILON {
        PhysicalSetpoint::new(v, 0.0)
    } else if v.abs() < EPSILON {
        let rudder = if w > 0.0 {
            -std::f64::consts::FRAC_PI_2
        } else {
            std::f64::consts::FRAC_PI_2
        };
        PhysicalSetpoint::turn_in_place(rudder, w)
    } else {
        let rudder = -(w * cfg.length / v).atan();
        PhysicalSetpoint::new(v / rudder.cos(), rudder)
    }
}

/// Individual wheel angular speeds (rad/s) implied by a physical set-point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

/// `(speed, rudder) -> (left, right)` wheel angular speeds.
pub fn physical_to_wheels(setpoint: PhysicalSetpoint, cfg: &ChassisConfig) -> WheelSpeeds {
    if setpoint.rudder.cos().abs() < EPSILON {
        // Pure rotation: `speed` is pinned at zero here, so the (speed, rudder)
        // parameterization can't carry ω through the singularity — it travels separately as
        // `spin`. `right - left == spin · width`, matching `wheels_to_odometry_delta`'s
        // `a = (r - l) / width` convention.
        let half = setpoint.spin * cfg.width / 2.0;
        return WheelSpeeds {
            left: -half / cfg.left_radius,
            right: half / cfg.right_radius,
        };
    }
    // Recover the rear-axle speed before deriving the chassis angular rate: `setpoint.speed`
    // is the *rudder wheel's* speed (speed = v / cos(rudder)), not v itself.
    let v = setpoint.speed * setpoint.rudder.cos();
    let w_chassis = -v * setpoint.rudder.tan() / cfg.length;
    WheelSpeeds {
        left: (v - w_chassis * cfg.width / 2.0) / cfg.left_radius,
        right: (v + w_chassis * cfg.width / 2.0) / cfg.right_radius,
    }
}

/// The pose increment implied by a matched pair of wheel angular-displacement readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdometryDelta {
    /// Arc-length magnitude travelled.
    pub arc_len: f64,
    /// Angular magnitude turned.
    pub angle_abs: f64,
    /// Local-frame (robot-relative) translation.
    pub dx: f64,
    pub dy: f64,
    /// Signed heading delta.
    pub dtheta: f64,
}

/// `(Δleft_rad, Δright_rad) -> Δpose`, in the robot's local frame at the start of the step.
pub fn wheels_to_odometry_delta(
    delta_left_rad: f64,
    delta_right_rad: f64,
    cfg: &ChassisConfig,
) -> OdometryDelta {
    let l = cfg.left_radius * delta_left_rad;
    let r = cfg.right_radius * delta_right_rad;
    let s = (l + r) / 2.0;
    let a = (r - l) / cfg.width;

    let (dx, dy) = if a.abs() < EPSILON {
        (s, 0.0)
    } else {
        let radius = s / a;
        (radius * a.sin(), radius * (1.0 - a.cos()))
    };

    OdometryDelta {
        arc_len: s.abs(),
        angle_abs: a.abs(),
        dx,
        dy,
        dtheta: a,
    }
}

/// Per-tick limiter: clamps rudder slew and speed acceleration against `current`, and forces
/// speed to zero while the rudder has not yet converged to `target.rudder` (the rudder-lock
/// safety invariant — `SPEC_FULL.md` §4.4).
pub fn optimize(
    target: PhysicalSetpoint,
    current: PhysicalSetpoint,
    opt: &OptimizeConfig,
) -> PhysicalSetpoint {
    let rudder_delta = (target.rudder - current.rudder).clamp(-opt.max_rudder_step, opt.max_rudder_step);
    let rudder = current.rudder + rudder_delta;

    if (rudder - target.rudder).abs() > RUDDER_ALIGN_TOLERANCE {
        // Not yet steered: hold both translation and rotation at zero, same as the speed case.
        return PhysicalSetpoint::new(0.0, rudder);
    }

    let max_step = opt.max_speed_step();
    let speed_delta = (target.speed - current.speed).clamp(-max_step, max_step);
    let mut next = PhysicalSetpoint::new(current.speed + speed_delta, rudder);
    next.spin = target.spin;
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChassisConfig {
        ChassisConfig {
            width: 0.5,
            length: 0.3,
            left_radius: 0.1,
            right_radius: 0.1,
        }
    }

    #[test]
    fn velocity_to_physical_straight_when_omega_zero() {
        let p = velocity_to_physical(VelocitySetpoint::new(1.2, 0.0), &cfg());
        assert!((p.speed - 1.2).abs() < 1e-9);
        assert_eq!(p.rudder, 0.0);
    }

    #[test]
    fn velocity_to_physical_turn_in_place() {
        let p = velocity_to_physical(VelocitySetpoint::new(0.0, 1.0), &cfg());
        assert_eq!(p.speed, 0.0);
        assert!((p.rudder + std::f64::consts::FRAC_PI_2).abs() < 1e-9);

        let p2 = velocity_to_physical(VelocitySetpoint::new(0.0, -1.0), &cfg());
        assert!((p2.rudder - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn physical_to_wheels_equal_radii_zero_rudder() {
        let w = physical_to_wheels(PhysicalSetpoint::new(2.0, 0.0), &cfg());
        assert!((w.left - 20.0).abs() < 1e-9);
        assert!((w.right - 20.0).abs() < 1e-9);
    }

    #[test]
    fn round_trip_velocity_through_physical_and_wheels() {
        let c = cfg();
        for &(v, w) in &[(1.0, 0.5), (0.8, -0.3), (2.0, 0.1)] {
            let vel = VelocitySetpoint::new(v, w);
            let physical = velocity_to_physical(vel, &c);
            let wheels = physical_to_wheels(physical, &c);

            // Reconstruct chassis (v', w') from wheel speeds, inverse of physical_to_wheels.
            let left_lin = wheels.left * c.left_radius;
            let right_lin = wheels.right * c.right_radius;
            let v_prime = (left_lin + right_lin) / 2.0;
            let w_prime = (right_lin - left_lin) / c.width;

            assert!((v_prime - v).abs() < 1e-6, "v mismatch for ({v}, {w})");
            assert!((w_prime - w).abs() < 1e-6, "w mismatch for ({v}, {w})");
        }
    }

    #[test]
    fn round_trip_pure_rotation_through_physical_and_wheels() {
        let c = cfg();
        for &w in &[1.0, -0.7] {
            let vel = VelocitySetpoint::new(0.0, w);
            let physical = velocity_to_physical(vel, &c);
            let wheels = physical_to_wheels(physical, &c);

            let left_lin = wheels.left * c.left_radius;
            let right_lin = wheels.right * c.right_radius;
            let v_prime = (left_lin + right_lin) / 2.0;
            let w_prime = (right_lin - left_lin) / c.width;

            assert!(v_prime.abs() < 1e-9, "v should stay zero for pure rotation, got {v_prime}");
            assert!((w_prime - w).abs() < 1e-9, "w mismatch for pure rotation {w}");
        }
    }

    #[test]
    fn wheels_to_odometry_equal_deltas_go_straight() {
        let d = wheels_to_odometry_delta(1.0, 1.0, &cfg());
        assert!(d.dy.abs() < 1e-12);
        assert!(d.dtheta.abs() < 1e-12);
        assert!((d.dx - 1.0 * 0.1).abs() < 1e-12);
    }

    #[test]
    fn wheels_to_odometry_opposite_deltas_spin_in_place() {
        let d = wheels_to_odometry_delta(-1.0, 1.0, &cfg());
        assert!(d.dx.abs() < 1e-9);
        assert!(d.dy.abs() < 1e-9);
        assert!((d.dtheta - 2.0 * 0.1 / 0.5).abs() < 1e-9);
    }

    #[test]
    fn optimize_clamps_rudder_slew() {
        let opt = OptimizeConfig {
            max_rudder_step: 0.1,
            acceleration: 10.0,
            control_frequency: 50.0,
        };
        let current = PhysicalSetpoint::new(0.0, 0.0);
        let target = PhysicalSetpoint::new(0.0, 1.0);
        let out = optimize(target, current, &opt);
        assert!((out.rudder - 0.1).abs() < 1e-12);
    }

    #[test]
    fn optimize_clamps_speed_acceleration() {
        let opt = OptimizeConfig {
            max_rudder_step: 1.0,
            acceleration: 1.0,
            control_frequency: 50.0,
        };
        let current = PhysicalSetpoint::new(0.0, 0.0);
        let target = PhysicalSetpoint::new(5.0, 0.0);
        let out = optimize(target, current, &opt);
        assert!((out.speed - opt.max_speed_step()).abs() < 1e-12);
    }

    #[test]
    fn optimize_holds_speed_to_zero_while_rudder_not_aligned() {
        let opt = OptimizeConfig {
            max_rudder_step: 0.01,
            acceleration: 100.0,
            control_frequency: 50.0,
        };
        let current = PhysicalSetpoint::new(0.0, 0.0);
        let target = PhysicalSetpoint::new(3.0, 1.0);
        let out = optimize(target, current, &opt);
        assert_eq!(out.speed, 0.0);
    }

    #[test]
    fn optimize_passes_spin_through_once_rudder_is_aligned() {
        let opt = OptimizeConfig {
            max_rudder_step: 1.0,
            acceleration: 100.0,
            control_frequency: 50.0,
        };
        let current = PhysicalSetpoint::turn_in_place(std::f64::consts::FRAC_PI_2, 0.0);
        let target = PhysicalSetpoint::turn_in_place(std::f64::consts::FRAC_PI_2, 0.6);
        let out = optimize(target, current, &opt);
        assert_eq!(out.spin, 0.6);
    }

    #[test]
    fn optimize_zeroes_spin_while_rudder_not_aligned() {
        let opt = OptimizeConfig {
            max_rudder_step: 0.01,
            acceleration: 100.0,
            control_frequency: 50.0,
        };
        let current = PhysicalSetpoint::new(0.0, 0.0);
        let target = PhysicalSetpoint::turn_in_place(std::f64::consts::FRAC_PI_2, 0.6);
        let out = optimize(target, current, &opt);
        assert_eq!(out.spin, 0.0);
    }

    #[test]
    fn optimize_drives_once_rudder_is_aligned() {
        let opt = OptimizeConfig {
            max_rudder_step: 1.0,
            acceleration: 100.0,
            control_frequency: 50.0,
        };
        let current = PhysicalSetpoint::new(0.0, 0.2);
        let target = PhysicalSetpoint::new(3.0, 0.2);
        let out = optimize(target, current, &opt);
        assert!((out.speed - 3.0).abs() < 1e-9);
    }
}
