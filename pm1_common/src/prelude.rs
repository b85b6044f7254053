//! Convenience re-exports for downstream crates.

pub use crate::config::{ConfigError, OptimizeConfig, SessionConfig};
pub use crate::error::PmError;
pub use crate::types::{
    ChassisConfig, ChassisLockState, MotorSnapshot, Odometry, PhysicalSetpoint, VelocitySetpoint,
};
