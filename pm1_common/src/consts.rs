//! Protocol and mechanical constants shared across the workspace.

/// Sentinel byte that opens every frame on the wire.
pub const HEAD: u8 = 0xFE;

/// Wildcard node index: a descriptor with this index matches any node index on the wire.
pub const ANY_INDEX: u8 = 0x0F;

/// Wildcard node type (broadcast across controller families). Unused by ECU/TCU traffic but
/// kept for completeness of the header encoding.
pub const ANY_TYPE: u8 = 0x3F;

/// ECU (drive wheel) node type.
pub const NODE_TYPE_ECU: u8 = 0x11;
/// TCU (rudder) node type.
pub const NODE_TYPE_TCU: u8 = 0x12;

/// Message types shared by both node families.
pub const MSG_STATE: u8 = 0x80;

/// ECU-specific message types.
pub const MSG_ECU_TARGET_SPEED: u8 = 0x01;
pub const MSG_ECU_CURRENT_SPEED: u8 = 0x05;
pub const MSG_ECU_CURRENT_POSITION: u8 = 0x06;
pub const MSG_ECU_CLEAR: u8 = 0x07;
pub const MSG_ECU_TIMEOUT: u8 = 0x0A;

/// TCU-specific message types.
pub const MSG_TCU_TARGET_POSITION: u8 = 0x01;
pub const MSG_TCU_CURRENT_POSITION: u8 = 0x03;
pub const MSG_TCU_CURRENT_SPEED: u8 = 0x05;

/// Serial link speed. The vendor protocol is fixed at this baud rate; there is no negotiation.
pub const BAUD_RATE: u32 = 115_200;

/// ECU poll period.
pub const ECU_POLL_PERIOD_MS: u64 = 50;
/// TCU poll period.
pub const TCU_POLL_PERIOD_MS: u64 = 20;
/// Firmware-side set-point timeout programmed into the ECUs at handshake.
pub const ECU_FIRMWARE_TIMEOUT_MS: u16 = 200;
/// Host-side liveness gate: a target older than this is treated as stale.
pub const CONTROL_TIMEOUT_MS: u64 = 200;
/// Deadline for collecting all three STATE replies during handshake.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 1_000;

/// General floating-point tolerance used throughout the kinematic model.
pub const EPSILON: f64 = 1e-6;

/// Default rudder slew limit per `optimize()` call (radians).
pub const DEFAULT_MAX_RUDDER_STEP: f64 = std::f64::consts::FRAC_PI_4;
/// Tolerance within which the rudder is considered "aligned" with its target.
pub const RUDDER_ALIGN_TOLERANCE: f64 = std::f64::consts::PI / 36.0;

/// Trapezoidal profile: distance over which speed ramps up from the floor.
pub const MOVE_RAMP_UP_DISTANCE: f64 = 0.5;
/// Trapezoidal profile: distance before the target over which speed ramps down to the floor.
pub const MOVE_RAMP_DOWN_DISTANCE: f64 = 3.0;
/// Trapezoidal profile: minimum commanded linear speed while ramping.
pub const MOVE_FLOOR_SPEED: f64 = 0.1;

/// Trapezoidal profile (rotation): angle over which speed ramps up from the floor.
pub const ROTATE_RAMP_UP_ANGLE: f64 = std::f64::consts::FRAC_PI_4;
/// Trapezoidal profile (rotation): angle before the target over which speed ramps down.
pub const ROTATE_RAMP_DOWN_ANGLE: f64 = std::f64::consts::PI;
/// Trapezoidal profile (rotation): minimum commanded angular speed while ramping.
pub const ROTATE_FLOOR_SPEED: f64 = ROTATE_RAMP_DOWN_ANGLE / 18.0 * 2.0;

/// MotionExecutor tick period.
pub const MOTION_LOOP_PERIOD_MS: u64 = 10;

/// Minimum magnitude of turning radius accepted by `go_arc`.
pub const MIN_ARC_RADIUS: f64 = 0.05;

/// Scale applied to a raw ECU encoder tick count to obtain wheel angle (radians). The
/// vendor's encoder resolution was not present in the retained source; this assumes a
/// 4096-count quadrature encoder, consistent with the rest of the mechanical constants.
pub const WHEEL_POSITION_SCALE: f64 = std::f64::consts::TAU / 4096.0;

/// Scale applied to a raw TCU encoder tick count to obtain rudder angle (radians).
pub const RUDDER_POSITION_SCALE: f64 = std::f64::consts::TAU / 4096.0;
