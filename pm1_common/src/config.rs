//! TOML-loadable configuration for a chassis session.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_MAX_RUDDER_STEP;
use crate::types::ChassisConfig;

/// Per-tick limiter parameters consumed by `pm1_hal::kinematics::optimize`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Maximum rudder slew per call (radians).
    pub max_rudder_step: f64,
    /// Linear acceleration limit (m/s²) used to derive `max_speed_step`.
    pub acceleration: f64,
    /// Control loop frequency (Hz) used to derive `max_speed_step`.
    pub control_frequency: f64,
}

impl OptimizeConfig {
    /// Maximum speed change allowed per `optimize()` call: `acceleration / control_frequency`.
    pub fn max_speed_step(&self) -> f64 {
        self.acceleration / self.control_frequency
    }
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            max_rudder_step: DEFAULT_MAX_RUDDER_STEP,
            acceleration: 0.5,
            control_frequency: 50.0,
        }
    }
}

/// Top-level configuration bundle loaded from a session's TOML file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub chassis: ChassisConfig,
    pub optimize: OptimizeConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chassis: ChassisConfig::default(),
            optimize: OptimizeConfig::default(),
        }
    }
}

/// Configuration loading/validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config validation: {0}")]
    Validation(String),
}

impl SessionConfig {
    /// Load and validate a `SessionConfig` from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: SessionConfig =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter bounds. Called automatically by `load()`; call directly when a
    /// config is constructed in code rather than parsed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chassis;
        if c.width <= 0.0 {
            return Err(ConfigError::Validation("width must be positive".into()));
        }
        if c.length <= 0.0 {
            return Err(ConfigError::Validation("length must be positive".into()));
        }
        if c.left_radius <= 0.0 || c.right_radius <= 0.0 {
            return Err(ConfigError::Validation(
                "wheel radii must be positive".into(),
            ));
        }
        let o = &self.optimize;
        if o.acceleration <= 0.0 {
            return Err(ConfigError::Validation(
                "acceleration must be positive".into(),
            ));
        }
        if o.control_frequency <= 0.0 {
            return Err(ConfigError::Validation(
                "control_frequency must be positive".into(),
            ));
        }
        if o.max_rudder_step <= 0.0 {
            return Err(ConfigError::Validation(
                "max_rudder_step must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_width_rejected() {
        let mut cfg = SessionConfig::default();
        cfg.chassis.width = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn max_speed_step_derivation() {
        let o = OptimizeConfig {
            max_rudder_step: 1.0,
            acceleration: 1.0,
            control_frequency: 50.0,
        };
        assert!((o.max_speed_step() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn load_roundtrip_via_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        let text = r#"
            [chassis]
            width = 0.5
            length = 0.3
            left_radius = 0.1
            right_radius = 0.1

            [optimize]
            max_rudder_step = 0.5
            acceleration = 0.4
            control_frequency = 50.0
        "#;
        fs::write(&path, text).unwrap();
        let cfg = SessionConfig::load(&path).unwrap();
        assert_eq!(cfg.chassis.width, 0.5);
        assert_eq!(cfg.optimize.acceleration, 0.4);
    }
}
