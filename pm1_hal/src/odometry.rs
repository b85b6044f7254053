//! Planar odometry accumulator.
//!
//! Updated only when a matched pair of (left, right) encoder readings sharing the same
//! wheel-poll sequence number has arrived. `clear()` resets the pose and arms a one-shot
//! `clear_flag` so that a reset racing an in-flight half-pair discards that pair instead of
//! integrating a stale baseline against a fresh one.

use std::time::Instant;

use pm1_common::types::{ChassisConfig, Odometry};

use crate::kinematics::wheels_to_odometry_delta;

/// Accumulates planar pose from paired wheel-encoder deltas.
pub struct OdometryAccumulator {
    cfg: ChassisConfig,
    pose: Odometry,
    left_baseline: Option<f64>,
    right_baseline: Option<f64>,
    pending_left: Option<(u64, f64)>,
    pending_right: Option<(u64, f64)>,
    last_commit_time: Option<Instant>,
    clear_flag: bool,
}

impl OdometryAccumulator {
    pub fn new(cfg: ChassisConfig) -> Self {
        Self {
            cfg,
            pose: Odometry::zero(),
            left_baseline: None,
            right_baseline: None,
            pending_left: None,
            pending_right: None,
            last_commit_time: None,
            clear_flag: false,
        }
    }

    /// Report a freshly decoded left-wheel encoder position (radians) from poll cycle `seq`.
    pub fn report_left(&mut self, seq: u64, position_rad: f64, now: Instant) {
        self.pending_left = Some((seq, position_rad));
        self.try_commit(now);
    }

    /// Report a freshly decoded right-wheel encoder position (radians) from poll cycle `seq`.
    pub fn report_right(&mut self, seq: u64, position_rad: f64, now: Instant) {
        self.pending_right = Some((seq, position_rad));
        self.try_commit(now);
    }

    fn try_commit(&mut self, now: Instant) {
        let (Some((left_seq, left_val)), Some((right_seq, right_val))) =
            (self.pending_left, self.pending_right)
        else {
            return;
        };
        if left_seq != right_seq {
            return;
        }
        self.pending_left = None;
        self.pending_right = None;

        if self.clear_flag {
            self.clear_flag = false;
            self.left_baseline = Some(left_val);
            self.right_baseline = Some(right_val);
            return;
        }

        match (self.left_baseline, self.right_baseline) {
            (Some(lb), Some(rb)) => {
                self.commit(left_val - lb, right_val - rb, now);
                self.left_baseline = Some(left_val);
                self.right_baseline = Some(right_val);
            }
            _ => {
                // First pair ever: establish the baseline without integrating motion.
                self.left_baseline = Some(left_val);
                self.right_baseline = Some(right_val);
            }
        }
    }

    fn commit(&mut self, delta_left_rad: f64, delta_right_rad: f64, now: Instant) {
        let delta = wheels_to_odometry_delta(delta_left_rad, delta_right_rad, &self.cfg);

        let (sin, cos) = self.pose.theta.sin_cos();
        let dx_world = delta.dx * cos - delta.dy * sin;
        let dy_world = delta.dx * sin + delta.dy * cos;

        let dt = self
            .last_commit_time
            .map(|t| now.saturating_duration_since(t).as_secs_f64());

        self.pose.x += dx_world;
        self.pose.y += dy_world;
        self.pose.s += delta.arc_len;
        self.pose.theta += delta.dtheta;

        if let Some(dt) = dt {
            if dt > 0.0 {
                self.pose.vx = dx_world / dt;
                self.pose.vy = dy_world / dt;
                self.pose.w = delta.dtheta / dt;
            }
        }
        self.last_commit_time = Some(now);
    }

    /// Reset the accumulated pose to zero and arm the clear flag.
    pub fn clear(&mut self) {
        self.pose = Odometry::zero();
        self.left_baseline = None;
        self.right_baseline = None;
        self.last_commit_time = None;
        self.clear_flag = true;
    }

    /// The current pose snapshot.
    pub fn pose(&self) -> Odometry {
        self.pose
    }
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
    fn first_pair_establishes_baseline_without_motion() {
        let mut acc = OdometryAccumulator::new(cfg());
        let t0 = Instant::now();
        acc.report_left(1, 10.0, t0);
        acc.report_right(1, 10.0, t0);
        assert_eq!(acc.pose(), Odometry::zero());
    }

    #[test]
    fn straight_line_accumulates_arc_length() {
        let mut acc = OdometryAccumulator::new(cfg());
        let t0 = Instant::now();
        acc.report_left(1, 0.0, t0);
        acc.report_right(1, 0.0, t0);

        let mut t = t0;
        for i in 2..=11u64 {
            t += std::time::Duration::from_millis(20);
            acc.report_left(i, (i - 1) as f64, t);
            acc.report_right(i, (i - 1) as f64, t);
        }
        let pose = acc.pose();
        assert!((pose.s - 10.0 * 0.1).abs() < 1e-9);
        assert!(pose.theta.abs() < 1e-12);
        assert!((pose.x - 1.0).abs() < 1e-9);
        assert!(pose.y.abs() < 1e-9);
    }

    #[test]
    fn mismatched_sequences_never_commit() {
        let mut acc = OdometryAccumulator::new(cfg());
        let t0 = Instant::now();
        acc.report_left(1, 5.0, t0);
        acc.report_right(1, 5.0, t0);
        // Now interleave with mismatched sequence numbers.
        acc.report_left(2, 6.0, t0);
        acc.report_right(3, 6.0, t0);
        acc.report_left(4, 7.0, t0);
        acc.report_right(5, 7.0, t0);
        // Baseline was only ever set by the first aligned pair; no further commit happened,
        // so pose stays at zero throughout.
        assert_eq!(acc.pose(), Odometry::zero());
    }

    #[test]
    fn aligned_sequence_after_mismatch_commits_exactly_once() {
        let mut acc = OdometryAccumulator::new(cfg());
        let t0 = Instant::now();
        acc.report_left(1, 0.0, t0);
        acc.report_right(1, 0.0, t0);

        acc.report_left(2, 1.0, t0); // mismatched, waiting
        acc.report_right(3, 1.0, t0); // still mismatched
        assert_eq!(acc.pose(), Odometry::zero());

        acc.report_right(2, 1.0, t0); // now aligns with the pending left at seq 2
        assert!(acc.pose().s > 0.0);
    }

    #[test]
    fn clear_between_half_pair_drops_the_pair() {
        let mut acc = OdometryAccumulator::new(cfg());
        let t0 = Instant::now();
        acc.report_left(1, 0.0, t0);
        acc.report_right(1, 0.0, t0);
        acc.report_left(2, 1.0, t0); // half of the next pair arrives

        acc.clear();
        assert_eq!(acc.pose(), Odometry::zero());

        // The matching right-wheel reading for the same cycle now arrives; this pair must be
        // dropped (consuming the clear flag) rather than committed against a stale baseline.
        acc.report_right(2, 1.0, t0);
        assert_eq!(acc.pose(), Odometry::zero());

        // The next aligned pair after that commits normally, starting from zero.
        acc.report_left(3, 1.2, t0);
        acc.report_right(3, 1.2, t0);
        assert!(acc.pose().s > 0.0);
    }
}
