//! MCU serial link: raw termios transport, wire codecs, USB worker.
//!
//! TX frame (gimbal command, 11 bytes):
//!
//! ```text
//! [0xAA][yaw:f32 LE][pitch:f32 LE][fire:u8][xor8 of bytes 0..10]
//! ```
//!
//! RX frame (bullet speed, 6 bytes):
//!
//! ```text
//! [0xAB][speed:f32 LE][xor8 of bytes 0..5]
//! ```
//!
//! 115 200 baud, 8N1, no flow control.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use autoaim_common::consts::EDGE_POLL_BACKOFF;
use autoaim_common::{PipelineError, PipelineResult};
use autoaim_shared::{SharedLatest, SharedScalars, VersionCursor};
use tracing::{debug, error, info, warn};

/// TX frame length in bytes.
pub const TX_FRAME_LEN: usize = 11;
/// TX frame header byte.
pub const TX_HEADER: u8 = 0xAA;
/// RX frame length in bytes.
pub const RX_FRAME_LEN: usize = 6;
/// RX frame header byte.
pub const RX_HEADER: u8 = 0xAB;

/// XOR of all bytes.
#[inline]
fn xor8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a gimbal command into the 11-byte wire frame.
pub fn encode_command(yaw: f32, pitch: f32, fire: bool) -> [u8; TX_FRAME_LEN] {
    let mut frame = [0u8; TX_FRAME_LEN];
    frame[0] = TX_HEADER;
    frame[1..5].copy_from_slice(&yaw.to_le_bytes());
    frame[5..9].copy_from_slice(&pitch.to_le_bytes());
    frame[9] = u8::from(fire);
    frame[10] = xor8(&frame[..10]);
    frame
}

/// Decode an 11-byte wire frame back into `(yaw, pitch, fire)`.
///
/// # Errors
/// `MalformedFrame` on a bad header or checksum.
pub fn decode_command(frame: &[u8; TX_FRAME_LEN]) -> PipelineResult<(f32, f32, bool)> {
    if frame[0] != TX_HEADER {
        return Err(PipelineError::MalformedFrame {
            reason: format!("bad header {:#04x}", frame[0]),
        });
    }
    if xor8(&frame[..10]) != frame[10] {
        return Err(PipelineError::MalformedFrame {
            reason: "checksum mismatch".to_string(),
        });
    }
    let yaw = f32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
    let pitch = f32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
    Ok((yaw, pitch, frame[9] != 0))
}

/// Encode a bullet-speed report into the 6-byte RX frame (MCU side;
/// used here by the loopback link and tests).
pub fn encode_bullet_speed(speed: f32) -> [u8; RX_FRAME_LEN] {
    let mut frame = [0u8; RX_FRAME_LEN];
    frame[0] = RX_HEADER;
    frame[1..5].copy_from_slice(&speed.to_le_bytes());
    frame[5] = xor8(&frame[..5]);
    frame
}

/// Streaming parser for bullet-speed frames.
///
/// Tolerates partial reads and garbage between frames: bytes are
/// buffered, the stream is resynchronised on the header byte, and
/// frames failing the checksum are skipped one byte at a time.
#[derive(Debug, Default)]
pub struct BulletSpeedParser {
    buf: Vec<u8>,
}

/// Upper bound on buffered RX bytes before the oldest are dropped.
const RX_BUF_CAP: usize = 256;

impl BulletSpeedParser {
    /// Empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes; returns the newest valid speed, if any.
    pub fn push(&mut self, bytes: &[u8]) -> Option<f32> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > RX_BUF_CAP {
            let excess = self.buf.len() - RX_BUF_CAP;
            self.buf.drain(..excess);
        }

        let mut latest = None;
        let mut start = 0;
        while self.buf.len() - start >= RX_FRAME_LEN {
            if self.buf[start] != RX_HEADER {
                start += 1;
                continue;
            }
            let frame = &self.buf[start..start + RX_FRAME_LEN];
            if xor8(&frame[..RX_FRAME_LEN - 1]) != frame[RX_FRAME_LEN - 1] {
                debug!("bullet-speed frame failed checksum, resyncing");
                start += 1;
                continue;
            }
            let speed = f32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
            if speed.is_finite() && speed > 0.0 {
                latest = Some(speed);
            }
            start += RX_FRAME_LEN;
        }
        self.buf.drain(..start);
        latest
    }
}

/// Byte transport to the MCU.
///
/// `send` writes one frame and returns the byte count actually written;
/// `recv` returns immediately with 0 when nothing is pending.
pub trait McuLink: Send {
    /// Write one outbound frame.
    fn send(&mut self, frame: &[u8]) -> PipelineResult<usize>;

    /// Read pending inbound bytes, non-blocking.
    fn recv(&mut self, buf: &mut [u8]) -> PipelineResult<usize>;
}

/// Raw POSIX serial port configured for 115 200 8N1.
pub struct SerialPort {
    file: File,
    path: String,
}

impl SerialPort {
    /// Open and configure the device.
    ///
    /// # Errors
    /// `DeviceUnavailable` when the device cannot be opened or the
    /// termios configuration is rejected.
    pub fn open(path: &str, baud: u32) -> PipelineResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| PipelineError::DeviceUnavailable {
                device: path.to_string(),
                reason: e.to_string(),
            })?;

        configure_tty(&file, baud).map_err(|e| PipelineError::DeviceUnavailable {
            device: path.to_string(),
            reason: e.to_string(),
        })?;

        info!(device = path, baud, "serial port opened");
        Ok(Self {
            file,
            path: path.to_string(),
        })
    }

    /// Device path this port was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Put the tty into raw 8N1 mode at the requested baud rate.
fn configure_tty(file: &File, baud: u32) -> Result<(), std::io::Error> {
    use nix::sys::termios::{
        cfmakeraw, cfsetispeed, cfsetospeed, tcgetattr, tcsetattr, BaudRate, ControlFlags,
        SetArg, SpecialCharacterIndices,
    };

    let rate = match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        460_800 => BaudRate::B460800,
        921_600 => BaudRate::B921600,
        other => {
            warn!(baud = other, "unsupported baud rate, using 115200");
            BaudRate::B115200
        }
    };

    let mut tty = tcgetattr(file).map_err(io_from_errno)?;
    cfmakeraw(&mut tty);
    cfsetospeed(&mut tty, rate).map_err(io_from_errno)?;
    cfsetispeed(&mut tty, rate).map_err(io_from_errno)?;

    // 8N1, no flow control, receiver enabled.
    tty.control_flags &= !(ControlFlags::PARENB | ControlFlags::CSTOPB | ControlFlags::CRTSCTS);
    tty.control_flags = (tty.control_flags & !ControlFlags::CSIZE) | ControlFlags::CS8;
    tty.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;

    // Non-blocking reads; pending-byte checks go through poll().
    tty.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    tty.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

    tcsetattr(file, SetArg::TCSANOW, &tty).map_err(io_from_errno)?;
    Ok(())
}

fn io_from_errno(e: nix::errno::Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

impl McuLink for SerialPort {
    fn send(&mut self, frame: &[u8]) -> PipelineResult<usize> {
        let written = self.file.write(frame)?;
        Ok(written)
    }

    fn recv(&mut self, buf: &mut [u8]) -> PipelineResult<usize> {
        use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        let ready = poll(&mut fds, PollTimeout::ZERO).map_err(io_from_errno)?;
        if ready == 0 {
            return Ok(0);
        }
        let readable = fds[0]
            .revents()
            .map(|r| r.contains(PollFlags::POLLIN))
            .unwrap_or(false);
        if !readable {
            return Ok(0);
        }
        let n = self.file.read(buf)?;
        Ok(n)
    }
}

/// Prediction-edge-triggered TX plus opportunistic RX.
pub struct UsbWorker<L: McuLink> {
    link: L,
    shared: Arc<SharedLatest>,
    scalars: Arc<SharedScalars>,
    stop: Arc<AtomicBool>,
    prediction_cursor: VersionCursor,
    parser: BulletSpeedParser,
    frames_sent: u64,
}

impl<L: McuLink> UsbWorker<L> {
    /// Create a worker around an opened link.
    pub fn new(
        link: L,
        shared: Arc<SharedLatest>,
        scalars: Arc<SharedScalars>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            link,
            shared,
            scalars,
            stop,
            prediction_cursor: VersionCursor::new(),
            parser: BulletSpeedParser::new(),
            frames_sent: 0,
        }
    }

    /// Run until the stop flag is set.
    pub fn run(&mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            self.pump_rx();

            let Some(cmd) = self.prediction_cursor.poll(&self.shared.prediction) else {
                std::thread::sleep(EDGE_POLL_BACKOFF);
                continue;
            };

            let frame = encode_command(cmd.yaw, cmd.pitch, cmd.fire);
            match self.link.send(&frame) {
                Ok(n) if n == TX_FRAME_LEN => {
                    self.frames_sent += 1;
                }
                Ok(n) => {
                    let e = PipelineError::WriteShort {
                        written: n,
                        expected: TX_FRAME_LEN,
                    };
                    error!(error = %e, "command frame not fully written");
                }
                Err(e) => {
                    error!(error = %e, "serial write failed");
                }
            }
        }
        info!(
            final_version = self.prediction_cursor.last_seen(),
            frames_sent = self.frames_sent,
            "usb worker stopped"
        );
    }

    /// Drain pending RX bytes into the bullet-speed parser.
    fn pump_rx(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            match self.link.recv(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(speed) = self.parser.push(&buf[..n]) {
                        self.scalars.bullet_speed.store(speed);
                        debug!(speed, "bullet speed updated from MCU");
                    }
                }
                Err(e) => {
                    debug!(error = %e, "serial read failed");
                    break;
                }
            }
        }
    }
}
