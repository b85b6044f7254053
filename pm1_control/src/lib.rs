//! Chassis session, motion primitives and the process-wide library surface for the PM1
//! chassis SDK.
//!
//! [`session::ChassisSession`] and [`motion::MotionExecutor`] are the composable building
//! blocks; [`api`] wraps a single instance of each behind plain functions for callers that
//! just want `pm1_control::api::initialize(None)` followed by `go_straight`/`drive` calls.

pub mod api;
pub mod motion;
pub mod session;

pub use motion::MotionExecutor;
pub use session::ChassisSession;

pub use pm1_common::config::SessionConfig;
pub use pm1_common::error::PmError;
pub use pm1_common::types::{ChassisLockState, Odometry};
