//! Shared types, configuration and error taxonomy for the PM1 chassis SDK.
//!
//! This crate has no behaviour of its own: it is the vocabulary the HAL layer
//! (`pm1_hal`) and the control layer (`pm1_control`) share so that neither
//! depends on the other's internals.

pub mod config;
pub mod consts;
pub mod error;
pub mod prelude;
pub mod types;

pub use error::PmError;
pub use types::{ChassisConfig, ChassisLockState, MotorSnapshot, Odometry, PhysicalSetpoint, VelocitySetpoint};
