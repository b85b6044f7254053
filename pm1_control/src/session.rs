//! `ChassisSession`: owns the serial link, runs the three background workers (ECU poller, TCU
//! poller, reader), and exposes motor/odometry snapshots plus a velocity set-point.
//!
//! Outgoing set-points are computed reactively, on every TCU position reply, mirroring the
//! vendor firmware's actual cadence (the TCU poll period, 20ms, is the tightest control loop
//! the wire protocol supports).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pm1_common::config::SessionConfig;
use pm1_common::consts::{
    CONTROL_TIMEOUT_MS, ECU_FIRMWARE_TIMEOUT_MS, ECU_POLL_PERIOD_MS, HANDSHAKE_TIMEOUT_MS,
    RUDDER_POSITION_SCALE, TCU_POLL_PERIOD_MS, WHEEL_POSITION_SCALE,
};
use pm1_common::error::PmError;
use pm1_common::types::{ChassisLockState, MotorSnapshot, Odometry, PhysicalSetpoint, VelocitySetpoint};
use pm1_hal::codec::{get_big_endian, pack_big_endian};
use pm1_hal::descriptors::{ecu, tcu};
use pm1_hal::kinematics;
use pm1_hal::odometry::OdometryAccumulator;
use pm1_hal::parse::ParseEngine;
use pm1_hal::{Frame, SerialLink};

struct Shared {
    cfg: SessionConfig,
    odometry: Mutex<OdometryAccumulator>,
    left: Mutex<MotorSnapshot>,
    right: Mutex<MotorSnapshot>,
    rudder_rad: Mutex<f64>,
    current_physical: Mutex<PhysicalSetpoint>,
    target: Mutex<VelocitySetpoint>,
    last_target_at: Mutex<Instant>,
    lock_state: Mutex<ChassisLockState>,
    poll_seq: AtomicU64,
    running: AtomicBool,
    frozen: AtomicBool,
}

/// A live connection to one PM1-protocol chassis.
pub struct ChassisSession {
    link: Arc<dyn SerialLink>,
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
    ecu_poller: Option<JoinHandle<()>>,
    tcu_poller: Option<JoinHandle<()>>,
}

impl ChassisSession {
    /// Handshake with the three controllers, arm the firmware watchdog, and start polling.
    ///
    /// Fails with [`PmError::NotAPm1Chassis`] if any of ECU0/ECU1/TCU0 does not reply within
    /// [`HANDSHAKE_TIMEOUT_MS`].
    pub fn open(link: Arc<dyn SerialLink>, cfg: SessionConfig) -> Result<Self, PmError> {
        handshake(link.as_ref())?;

        link.send(
            pack_big_endian::<i16>(ecu::timeout(ecu::LEFT), ECU_FIRMWARE_TIMEOUT_MS as i16, 0)
                .as_bytes(),
        )?;
        link.send(
            pack_big_endian::<i16>(ecu::timeout(ecu::RIGHT), ECU_FIRMWARE_TIMEOUT_MS as i16, 0)
                .as_bytes(),
        )?;
        link.send(Frame::no_data(ecu::clear(ecu::LEFT), 0).as_bytes())?;
        link.send(Frame::no_data(ecu::clear(ecu::RIGHT), 0).as_bytes())?;

        let now = Instant::now();
        let shared = Arc::new(Shared {
            odometry: Mutex::new(OdometryAccumulator::new(cfg.chassis)),
            left: Mutex::new(MotorSnapshot::zeroed(now)),
            right: Mutex::new(MotorSnapshot::zeroed(now)),
            rudder_rad: Mutex::new(0.0),
            current_physical: Mutex::new(PhysicalSetpoint::new(0.0, 0.0)),
            target: Mutex::new(VelocitySetpoint::default()),
            last_target_at: Mutex::new(now),
            lock_state: Mutex::new(ChassisLockState::default()),
            poll_seq: AtomicU64::new(0),
            running: AtomicBool::new(true),
            frozen: AtomicBool::new(false),
            cfg,
        });

        let reader = spawn_reader(Arc::clone(&link), Arc::clone(&shared));
        let ecu_poller = spawn_ecu_poller(Arc::clone(&link), Arc::clone(&shared));
        let tcu_poller = spawn_tcu_poller(Arc::clone(&link), Arc::clone(&shared));

        Ok(Self {
            link,
            shared,
            reader: Some(reader),
            ecu_poller: Some(ecu_poller),
            tcu_poller: Some(tcu_poller),
        })
    }

    pub fn left(&self) -> MotorSnapshot {
        *self.shared.left.lock().unwrap()
    }

    pub fn right(&self) -> MotorSnapshot {
        *self.shared.right.lock().unwrap()
    }

    pub fn rudder(&self) -> f64 {
        *self.shared.rudder_rad.lock().unwrap()
    }

    pub fn odometry(&self) -> Odometry {
        self.shared.odometry.lock().unwrap().pose()
    }

    pub fn clear_odometry(&self) {
        self.shared.odometry.lock().unwrap().clear();
    }

    /// Set the desired chassis-frame velocity. Refused while locked.
    pub fn set_target(&self, v: f64, w: f64) -> Result<(), PmError> {
        if *self.shared.lock_state.lock().unwrap() == ChassisLockState::Locked {
            return Err(PmError::ChassisLocked);
        }
        *self.shared.target.lock().unwrap() = VelocitySetpoint::new(v, w);
        *self.shared.last_target_at.lock().unwrap() = Instant::now();
        Ok(())
    }

    /// Lock the chassis: the next emitted set-point brakes to zero and `set_target` is refused
    /// until `unlock()`.
    pub fn lock(&self) {
        *self.shared.lock_state.lock().unwrap() = ChassisLockState::Locked;
    }

    pub fn unlock(&self) {
        *self.shared.lock_state.lock().unwrap() = ChassisLockState::Unlocked;
    }

    pub fn check_state(&self) -> ChassisLockState {
        *self.shared.lock_state.lock().unwrap()
    }

    /// Freeze the chassis: brake the wheels and hold the rudder at whatever angle it currently
    /// measures, bypassing `optimize` entirely so it does not slew the rudder back toward zero.
    /// Used by `MotionExecutor::pause`.
    pub fn freeze(&self) {
        self.shared.frozen.store(true, Ordering::Release);
    }

    /// Release a prior `freeze()`; the next set-point emission resumes following `target`.
    pub fn unfreeze(&self) {
        self.shared.frozen.store(false, Ordering::Release);
    }
}

impl Drop for ChassisSession {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.link.break_read();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.ecu_poller.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.tcu_poller.take() {
            let _ = handle.join();
        }
    }
}

/// Query all three controllers' `STATE` and wait for all three replies, proving this is a
/// PM1-protocol chassis and not silence or a different device on the other end of the wire.
fn handshake(link: &dyn SerialLink) -> Result<(), PmError> {
    link.send(Frame::no_data(ecu::state(ecu::LEFT), 0).as_bytes())?;
    link.send(Frame::no_data(ecu::state(ecu::RIGHT), 0).as_bytes())?;
    link.send(Frame::no_data(tcu::state(), 0).as_bytes())?;

    let deadline = Instant::now() + Duration::from_millis(HANDSHAKE_TIMEOUT_MS);
    let mut engine = ParseEngine::new();
    let mut buf = [0u8; 64];
    let (mut ecu0, mut ecu1, mut tcu0) = (false, false, false);

    while Instant::now() < deadline && !(ecu0 && ecu1 && tcu0) {
        let n = link.read(&mut buf).unwrap_or(0);
        for &byte in &buf[..n] {
            if let Some(Ok(frame)) = engine.feed(byte) {
                let d = frame.descriptor();
                if d == ecu::state(ecu::LEFT) {
                    ecu0 = true;
                } else if d == ecu::state(ecu::RIGHT) {
                    ecu1 = true;
                } else if d == tcu::state() {
                    tcu0 = true;
                }
            }
        }
    }

    if ecu0 && ecu1 && tcu0 {
        return Ok(());
    }

    let mut missing = Vec::new();
    if !ecu0 {
        missing.push("ECU0");
    }
    if !ecu1 {
        missing.push("ECU1");
    }
    if !tcu0 {
        missing.push("TCU0");
    }
    Err(PmError::NotAPm1Chassis(format!(
        "no STATE reply from {}",
        missing.join(", ")
    )))
}

fn spawn_ecu_poller(link: Arc<dyn SerialLink>, shared: Arc<Shared>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut next = Instant::now();
        while shared.running.load(Ordering::Acquire) {
            next += Duration::from_millis(ECU_POLL_PERIOD_MS);
            if let Err(e) = link.send(Frame::no_data(ecu::current_position(ecu::LEFT), 0).as_bytes()) {
                tracing::debug!(error = %e, "ecu poller: left query send failed");
            }
            if let Err(e) = link.send(Frame::no_data(ecu::current_position(ecu::RIGHT), 0).as_bytes()) {
                tracing::debug!(error = %e, "ecu poller: right query send failed");
            }
            shared.poll_seq.fetch_add(1, Ordering::AcqRel);

            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
    })
}

fn spawn_tcu_poller(link: Arc<dyn SerialLink>, shared: Arc<Shared>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut next = Instant::now();
        while shared.running.load(Ordering::Acquire) {
            next += Duration::from_millis(TCU_POLL_PERIOD_MS);
            if let Err(e) = link.send(Frame::no_data(tcu::current_position(), 0).as_bytes()) {
                tracing::debug!(error = %e, "tcu poller: query send failed");
            }

            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
    })
}

fn spawn_reader(link: Arc<dyn SerialLink>, shared: Arc<Shared>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut engine = ParseEngine::new();
        let mut buf = [0u8; 256];
        while shared.running.load(Ordering::Acquire) {
            let n = match link.read(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "reader: read failed");
                    0
                }
            };
            for &byte in &buf[..n] {
                match engine.feed(byte) {
                    Some(Ok(frame)) => dispatch(&link, &shared, frame),
                    Some(Err(_)) => tracing::debug!("reader: dropped a frame (crc error)"),
                    None => {}
                }
            }
        }
    })
}

fn dispatch(link: &Arc<dyn SerialLink>, shared: &Arc<Shared>, frame: Frame) {
    let now = Instant::now();
    let d = frame.descriptor();

    if d == ecu::current_position(ecu::LEFT) {
        let raw = get_big_endian::<i32>(&frame) as f64 * WHEEL_POSITION_SCALE;
        let mut left = shared.left.lock().unwrap();
        *left = left.advance(now, raw);
        drop(left);
        let seq = shared.poll_seq.load(Ordering::Acquire);
        shared.odometry.lock().unwrap().report_left(seq, raw, now);
    } else if d == ecu::current_position(ecu::RIGHT) {
        let raw = get_big_endian::<i32>(&frame) as f64 * WHEEL_POSITION_SCALE;
        let mut right = shared.right.lock().unwrap();
        *right = right.advance(now, raw);
        drop(right);
        let seq = shared.poll_seq.load(Ordering::Acquire);
        shared.odometry.lock().unwrap().report_right(seq, raw, now);
    } else if d == tcu::current_position() {
        let raw = get_big_endian::<i16>(&frame) as f64 * RUDDER_POSITION_SCALE;
        *shared.rudder_rad.lock().unwrap() = raw;
        emit_setpoint(link, shared, raw);
    }
}

/// Recompute and push the outgoing set-point. Triggered by every TCU position reply, which is
/// this session's tightest control cadence (`TCU_POLL_PERIOD_MS`).
///
/// Whenever driving is not currently warranted — the chassis is locked, frozen by a paused
/// primitive, or the target has gone stale past `CONTROL_TIMEOUT_MS` — the set-point is the
/// `(0, 0, current_rudder)` sentinel (`SPEC_FULL.md` §4.6): brake the wheels and hold the
/// rudder exactly where it measures, rather than routing `(v, ω) = (0, 0)` through
/// `velocity_to_physical`/`optimize`, which would instead slew the rudder back toward zero.
fn emit_setpoint(link: &Arc<dyn SerialLink>, shared: &Arc<Shared>, measured_rudder: f64) {
    let locked = *shared.lock_state.lock().unwrap() == ChassisLockState::Locked;
    let frozen = shared.frozen.load(Ordering::Acquire);
    let stale = {
        let last = *shared.last_target_at.lock().unwrap();
        Instant::now().saturating_duration_since(last) > Duration::from_millis(CONTROL_TIMEOUT_MS)
    };

    let mut current = shared.current_physical.lock().unwrap();
    current.rudder = measured_rudder;

    let next = if locked || frozen || stale {
        PhysicalSetpoint::brake_at(measured_rudder)
    } else {
        let velocity_target = *shared.target.lock().unwrap();
        let physical_target = kinematics::velocity_to_physical(velocity_target, &shared.cfg.chassis);
        kinematics::optimize(physical_target, *current, &shared.cfg.optimize)
    };
    *current = next;
    drop(current);

    let wheels = kinematics::physical_to_wheels(next, &shared.cfg.chassis);
    let left_ticks = (wheels.left / WHEEL_POSITION_SCALE) as i32;
    let right_ticks = (wheels.right / WHEEL_POSITION_SCALE) as i32;
    let rudder_ticks = (next.rudder / RUDDER_POSITION_SCALE) as i16;

    let _ = link.send(pack_big_endian::<i32>(ecu::target_speed(ecu::LEFT), left_ticks, 0).as_bytes());
    let _ = link.send(pack_big_endian::<i32>(ecu::target_speed(ecu::RIGHT), right_ticks, 0).as_bytes());
    let _ = link.send(pack_big_endian::<i16>(tcu::target_position(), rudder_ticks, 0).as_bytes());
}
