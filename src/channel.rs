//! Byte transport to the printer.
//!
//! Replies arrive asynchronously relative to command writes, and some
//! commands get no reply at all, so every read is bounded by a deadline.
//! Reads wait for readiness, then drain the device until the requested
//! bytes are in or it reports end of input:
//!
//! ```text
//! AwaitingReadiness --readable--> Draining --full--> done
//!        |                            |
//!        +--timeout/hang-up--> error  +--end of input--> done (capped) / error (strict)
//! ```
//!
//! The printer occasionally signals readiness and then returns a single
//! empty read before the real bytes, so the first empty read of every drain
//! is tolerated. A second one ends the drain.

use std::io;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::error::{Error, Result};

/// Operations the job orchestrator needs from a device handle.
///
/// A handle must not be shared between callers: two jobs writing to the
/// same channel interleave their command bytes.
pub trait Channel {
    /// Write the whole buffer. No partial write is observable.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Fill `buf` completely before `timeout` elapses.
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Collect whatever arrives within `timeout`, up to `buf.len()` bytes.
    ///
    /// Returns 0 when nothing arrives. Never fails on end of input or
    /// timeout.
    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Release the handle. It is considered closed even if this fails.
    fn close(&mut self) -> Result<()>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_all(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        (**self).read_exact(buf, timeout)
    }

    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_available(buf, timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_all(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        (**self).read_exact(buf, timeout)
    }

    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_available(buf, timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    TimedOut,
    /// Error or hang-up condition on the handle.
    HangUp,
    /// The handle is not open.
    Invalid,
    /// The wait returned without any condition we asked for.
    Spurious(i16),
}

/// System calls underneath a [`Port`].
///
/// Errors of kind [`io::ErrorKind::Interrupted`] are retried by the caller.
pub trait RawIo {
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<Readiness>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn close(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collect {
    /// Stop without error on end of input or timeout.
    Capped,
    /// Anything short of a full buffer is an error.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    AwaitingReadiness,
    Draining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainEnd {
    Full,
    EndOfInput,
}

/// Read until `buf` is full or the device reports end of input.
///
/// Only the very first read of a drain may come back empty without ending
/// it.
fn drain<R: RawIo + ?Sized>(io: &mut R, buf: &mut [u8]) -> io::Result<(usize, DrainEnd)> {
    let mut read = 0;
    let mut first = true;

    while read < buf.len() {
        match io.read(&mut buf[read..]) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
            Ok(0) if first => {
                trace!("tolerating spurious empty read");
                first = false;
            }
            Ok(0) => return Ok((read, DrainEnd::EndOfInput)),
            Ok(n) => {
                read += n;
                first = false;
            }
        }
    }

    Ok((read, DrainEnd::Full))
}

fn collect<R: RawIo + ?Sized>(
    io: &mut R,
    buf: &mut [u8],
    deadline: Instant,
    mode: Collect,
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }

    let mut state = ReadState::AwaitingReadiness;
    loop {
        state = match state {
            ReadState::AwaitingReadiness => {
                // A zero wait still polls once without blocking.
                let remaining = deadline.saturating_duration_since(Instant::now());
                let readiness = match io.wait_readable(remaining) {
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(Error::Channel(err)),
                    Ok(readiness) => readiness,
                };

                match (readiness, mode) {
                    (Readiness::Readable, _) => ReadState::Draining,
                    (Readiness::TimedOut, Collect::Capped) => return Ok(0),
                    (Readiness::TimedOut, Collect::Strict) => return Err(Error::Timeout),
                    (Readiness::HangUp, _) => return Err(Error::Disconnected),
                    (Readiness::Invalid, _) => {
                        return Err(Error::Protocol("device handle is not open".to_string()))
                    }
                    (Readiness::Spurious(revents), _) => {
                        return Err(Error::Protocol(format!(
                            "readiness wait returned without data, revents 0x{:x}",
                            revents
                        )))
                    }
                }
            }
            ReadState::Draining => {
                let (read, end) = drain(io, buf)?;
                return match (end, mode) {
                    (DrainEnd::Full, _) | (DrainEnd::EndOfInput, Collect::Capped) => Ok(read),
                    (DrainEnd::EndOfInput, Collect::Strict) if read == 0 => Err(Error::Protocol(
                        "device reported readiness but had no data".to_string(),
                    )),
                    (DrainEnd::EndOfInput, Collect::Strict) => Err(Error::ShortRead {
                        expected: buf.len(),
                        received: read,
                    }),
                };
            }
        };
    }
}

/// Write the whole buffer, retrying interrupted writes.
pub fn write_all<R: RawIo + ?Sized>(io: &mut R, buf: &[u8]) -> Result<()> {
    let mut wrote = 0;

    while wrote < buf.len() {
        match io.write(&buf[wrote..]) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Channel(err)),
            Ok(0) => {
                return Err(Error::Channel(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "device accepted no bytes",
                )))
            }
            Ok(n) => wrote += n,
        }
    }

    Ok(())
}

/// Strict deadline-bounded read into `buf`.
pub fn read_exact<R: RawIo + ?Sized>(io: &mut R, buf: &mut [u8], timeout: Duration) -> Result<()> {
    collect(io, buf, Instant::now() + timeout, Collect::Strict).map(|_| ())
}

/// Capped deadline-bounded read into `buf`, returning the bytes collected.
pub fn read_available<R: RawIo + ?Sized>(
    io: &mut R,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<usize> {
    collect(io, buf, Instant::now() + timeout, Collect::Capped)
}

/// [`Channel`] over raw system calls.
pub struct Port<R: RawIo> {
    io: R,
    reject_trailing_data: bool,
}

impl<R: RawIo> Port<R> {
    pub fn new(io: R) -> Self {
        Port {
            io,
            reject_trailing_data: false,
        }
    }

    /// Fail a read when more bytes are immediately available after the
    /// reply.
    ///
    /// Off by default: the printer may already have queued its next reply,
    /// which must stay unread for the next `read_exact`.
    pub fn reject_trailing_data(self, flag: bool) -> Self {
        Port {
            reject_trailing_data: flag,
            ..self
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.io
    }

    fn check_trailing(&mut self) -> Result<()> {
        let mut trailing = [0u8; 128];
        let n = read_available(&mut self.io, &mut trailing, Duration::ZERO)?;
        if n == 0 {
            return Ok(());
        }

        warn!("unexpected {} trailing bytes: {:02X?}", n, &trailing[..n]);
        Err(Error::TrailingData(trailing[..n].to_vec()))
    }
}

impl<R: RawIo> Channel for Port<R> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        trace!("write {} bytes", buf.len());
        write_all(&mut self.io, buf)
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        read_exact(&mut self.io, buf, timeout)?;
        if self.reject_trailing_data {
            self.check_trailing()?;
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        read_available(&mut self.io, buf, timeout)
    }

    fn close(&mut self) -> Result<()> {
        debug!("closing device handle");
        self.io.close().map_err(Error::Channel)
    }
}
