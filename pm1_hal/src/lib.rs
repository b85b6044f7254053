//! Hardware abstraction layer: wire framing, the streaming parser, kinematic transforms, the
//! odometry accumulator, and the serial transport.
//!
//! This crate has no notion of a "session" or a "chassis" — it only knows about bytes, frames,
//! and the pure math that turns wheel motion into pose. `pm1_control` is where those pieces are
//! assembled into a running chassis.

pub mod codec;
pub mod descriptors;
pub mod kinematics;
pub mod odometry;
pub mod parse;
pub mod serial;

pub use codec::{Frame, NO_DATA_LEN, WITH_DATA_LEN};
pub use descriptors::Descriptor;
pub use odometry::OdometryAccumulator;
pub use parse::{ParseEngine, ParseError};
pub use serial::{list_ports, SerialLink, SerialPort, SimSerial};
