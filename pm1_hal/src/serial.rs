//! Serial transport: a pluggable `SerialLink` trait, a POSIX `SerialPort` backed by raw
//! termios, and an in-memory `SimSerial` for hardware-free tests — mirroring the HAL's
//! pluggable-driver pattern (`SPEC_FULL.md` §2) rather than hard-wiring one transport.

use std::collections::VecDeque;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use nix::sys::termios::{self, BaudRate, SetArg};
use pm1_common::error::PmError;

static_assertions::const_assert_eq!(pm1_common::consts::BAUD_RATE, 115_200);

/// Period the reader thread sleeps while it has seen nothing at all yet.
const CHECK_PERIOD: Duration = Duration::from_millis(2);
/// Period the reader thread sleeps between successive non-empty reads, and while draining the
/// last few idle cycles before giving the caller back a short buffer.
const WAIT_PERIOD: Duration = Duration::from_millis(2);
/// Consecutive empty reads, after at least one byte has arrived, before a partial read returns.
const DRAIN_IDLE_CYCLES: u32 = 4;

/// A byte-oriented transport between the session and the wire. Implementations must support
/// one reader thread calling `read` while another thread concurrently calls `break_read` to
/// interrupt it — this is how the session tears down its reader thread on shutdown.
pub trait SerialLink: Send + Sync {
    /// Write `bytes` in full, or fail.
    fn send(&self, bytes: &[u8]) -> Result<(), PmError>;

    /// Block until at least one byte has arrived (or `break_read` is called), then drain
    /// whatever is available into `buf`. Returns the number of bytes written, which is zero
    /// only if another call to `read` is already in progress or `break_read` fired first.
    fn read(&self, buf: &mut [u8]) -> Result<usize, PmError>;

    /// Interrupt any in-progress `read`, causing it to return immediately. Idempotent: safe to
    /// call with no reader currently blocked.
    fn break_read(&self);
}

/// A real serial port opened in raw mode at `BAUD_RATE` 8N1.
pub struct SerialPort {
    fd: OwnedFd,
    read_mutex: Mutex<()>,
    break_flag: AtomicBool,
}

impl SerialPort {
    /// Open and configure `path`. Fails if the device does not exist, cannot be opened in
    /// read/write mode, or does not accept the fixed baud rate / raw-mode termios settings.
    pub fn open(path: &Path) -> Result<Self, PmError> {
        let fd = open_raw(path)?;
        configure_raw_mode(&fd)?;
        tracing::debug!(path = %path.display(), "serial port opened");
        Ok(Self {
            fd,
            read_mutex: Mutex::new(()),
            break_flag: AtomicBool::new(false),
        })
    }
}

fn open_raw(path: &Path) -> Result<OwnedFd, PmError> {
    let c_path = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|_| PmError::io("device path contains a NUL byte"))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let raw = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_NOCTTY | libc::O_NONBLOCK) };
    if raw < 0 {
        let err = std::io::Error::last_os_error();
        tracing::warn!(path = %path.display(), error = %err, "failed to open serial device");
        return Err(PmError::io(err.to_string()));
    }
    // SAFETY: `raw` is a just-opened, otherwise-unowned file descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

fn configure_raw_mode(fd: &OwnedFd) -> Result<(), PmError> {
    let borrowed: BorrowedFd = fd.as_fd_borrowed();
    let mut options = termios::tcgetattr(borrowed).map_err(|e| PmError::io(e.to_string()))?;
    // The protocol's baud rate is fixed (checked by the `const_assert_eq!` above); there is no
    // negotiation, so we bake `B115200` in directly rather than mapping from a runtime value.
    termios::cfsetispeed(&mut options, BaudRate::B115200).map_err(|e| PmError::io(e.to_string()))?;
    termios::cfsetospeed(&mut options, BaudRate::B115200).map_err(|e| PmError::io(e.to_string()))?;
    options.control_flags.insert(termios::ControlFlags::CS8);
    options.local_flags.remove(
        termios::LocalFlags::ICANON
            | termios::LocalFlags::ECHO
            | termios::LocalFlags::ECHOE
            | termios::LocalFlags::ISIG,
    );
    termios::tcsetattr(borrowed, SetArg::TCSANOW, &options).map_err(|e| PmError::io(e.to_string()))?;
    Ok(())
}

/// A tiny extension so `OwnedFd` reads as a `BorrowedFd` without spelling out the unsafe call
/// at every use site.
trait AsFdBorrowed {
    fn as_fd_borrowed(&self) -> BorrowedFd<'_>;
}

impl AsFdBorrowed for OwnedFd {
    fn as_fd_borrowed(&self) -> BorrowedFd<'_> {
        // SAFETY: borrowed for no longer than `self` is alive.
        unsafe { BorrowedFd::borrow_raw(self.as_raw_fd()) }
    }
}

impl SerialLink for SerialPort {
    fn send(&self, bytes: &[u8]) -> Result<(), PmError> {
        if bytes.is_empty() {
            return Ok(());
        }
        // SAFETY: `fd` is valid and owned for the lifetime of `self`.
        let written = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
            )
        };
        if written != bytes.len() as isize {
            let err = std::io::Error::last_os_error();
            tracing::warn!(error = %err, "serial write short or failed");
            return Err(PmError::io(err.to_string()));
        }
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, PmError> {
        let Ok(_guard) = self.read_mutex.try_lock() else {
            return Ok(0);
        };

        let mut total = 0usize;
        let mut idle_since_first_byte = 0u32;
        while !self.break_flag.load(Ordering::Acquire) && total < buf.len() {
            // SAFETY: writing into the caller's `buf[total..]`, which has `buf.len() - total`
            // bytes of remaining capacity.
            let n = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    buf[total..].as_mut_ptr() as *mut libc::c_void,
                    buf.len() - total,
                )
            };
            if n > 0 {
                total += n as usize;
                idle_since_first_byte = 0;
                continue;
            }
            if total == 0 {
                std::thread::sleep(CHECK_PERIOD);
            } else {
                idle_since_first_byte += 1;
                if idle_since_first_byte >= DRAIN_IDLE_CYCLES {
                    break;
                }
                std::thread::sleep(WAIT_PERIOD);
            }
        }
        Ok(total)
    }

    fn break_read(&self) {
        self.break_flag.store(true, Ordering::Release);
        while self.read_mutex.try_lock().is_err() {
            std::thread::yield_now();
        }
        self.break_flag.store(false, Ordering::Release);
    }
}

/// In-memory transport for tests: `push_inbound` simulates wire traffic arriving, `sent` drains
/// everything written via `send`.
pub struct SimSerial {
    inbound: Mutex<VecDeque<u8>>,
    outbound: Mutex<Vec<u8>>,
    read_mutex: Mutex<()>,
    break_flag: AtomicBool,
}

impl SimSerial {
    pub fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            outbound: Mutex::new(Vec::new()),
            read_mutex: Mutex::new(()),
            break_flag: AtomicBool::new(false),
        }
    }

    /// Enqueue bytes as if they just arrived on the wire.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.inbound.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Drain and return everything written via `send` so far.
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut self.outbound.lock().unwrap())
    }
}

impl Default for SimSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for SimSerial {
    fn send(&self, bytes: &[u8]) -> Result<(), PmError> {
        self.outbound.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, PmError> {
        let Ok(_guard) = self.read_mutex.try_lock() else {
            return Ok(0);
        };
        let mut idle = 0u32;
        loop {
            if self.break_flag.load(Ordering::Acquire) {
                return Ok(0);
            }
            let mut inbound = self.inbound.lock().unwrap();
            if !inbound.is_empty() {
                let n = buf.len().min(inbound.len());
                for slot in buf.iter_mut().take(n) {
                    *slot = inbound.pop_front().unwrap();
                }
                return Ok(n);
            }
            drop(inbound);
            idle += 1;
            if idle > 1000 {
                return Ok(0);
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    fn break_read(&self) {
        self.break_flag.store(true, Ordering::Release);
        while self.read_mutex.try_lock().is_err() {
            std::thread::yield_now();
        }
        self.break_flag.store(false, Ordering::Release);
    }
}

/// Autodiscover candidate serial devices on Linux: `/dev/serial/by-id/*` (stable, preferred),
/// then raw `/dev/ttyUSB*` and `/dev/ttyACM*` nodes.
pub fn list_ports() -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();

    if let Ok(entries) = std::fs::read_dir("/dev/serial/by-id") {
        for entry in entries.flatten() {
            found.push(entry.path());
        }
    }

    if let Ok(entries) = std::fs::read_dir("/dev") {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("ttyUSB") || name.starts_with("ttyACM") {
                found.push(entry.path());
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_serial_round_trips_a_send() {
        let link = SimSerial::new();
        link.send(&[1, 2, 3]).unwrap();
        assert_eq!(link.take_sent(), vec![1, 2, 3]);
        assert!(link.take_sent().is_empty());
    }

    #[test]
    fn sim_serial_read_returns_pushed_bytes() {
        let link = SimSerial::new();
        link.push_inbound(&[9, 8, 7]);
        let mut buf = [0u8; 8];
        let n = link.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[9, 8, 7]);
    }

    #[test]
    fn sim_serial_break_read_unblocks_a_waiting_reader() {
        use std::sync::Arc;
        let link = Arc::new(SimSerial::new());
        let reader = {
            let link = Arc::clone(&link);
            std::thread::spawn(move || {
                let mut buf = [0u8; 8];
                link.read(&mut buf).unwrap()
            })
        };
        std::thread::sleep(Duration::from_millis(10));
        link.break_read();
        let n = reader.join().unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn sim_serial_concurrent_read_is_a_no_op() {
        use std::sync::Arc;
        let link = Arc::new(SimSerial::new());
        let first = {
            let link = Arc::clone(&link);
            std::thread::spawn(move || {
                let mut buf = [0u8; 8];
                link.read(&mut buf).unwrap()
            })
        };
        std::thread::sleep(Duration::from_millis(5));
        let mut buf = [0u8; 8];
        let second = link.read(&mut buf).unwrap();
        assert_eq!(second, 0);
        link.break_read();
        first.join().unwrap();
    }
}
