//! Low-level I/O on a Linux usblp character device (`/dev/usb/lpN`).
//!
//! Replies have to be polled for, so the device is driven through a raw
//! file descriptor rather than `std::fs::File`.

use std::ffi::CString;
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::time::Duration;

use log::{debug, info};

use crate::channel::{Port, RawIo, Readiness};
use crate::error::{Error, Result};
use crate::registry::UsbId;

/// A device handle ready for the job orchestrator.
pub type Handle = Port<Device>;

/// Open a printer device node.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Handle> {
    Ok(Port::new(Device::open(path)?))
}

/// usblp ioctl number returning the vendor and product id as two ints.
const IOCNR_GET_VID_PID: u8 = 6;

const fn ioc_read(ty: u8, nr: u8, size: usize) -> u64 {
    const IOC_READ: u64 = 2;
    (IOC_READ << 30) | ((size as u64) << 16) | ((ty as u64) << 8) | nr as u64
}

/// An open usblp device node.
pub struct Device {
    path: String,
    fd: Option<OwnedFd>,
}

impl Device {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let c_path = CString::new(path.as_str()).map_err(|_| {
            Error::Channel(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid device path: {}", path),
            ))
        })?;

        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(Error::Channel(io::Error::last_os_error()));
        }
        info!("opened {} (fd {})", path, fd);

        Ok(Device {
            path,
            fd: Some(unsafe { OwnedFd::from_raw_fd(fd) }),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn raw_fd(&self) -> io::Result<RawFd> {
        self.fd
            .as_ref()
            .map(|fd| fd.as_raw_fd())
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    /// USB vendor and product id of the printer behind this node.
    pub fn id(&self) -> Result<UsbId> {
        let fd = self.raw_fd()?;
        let mut ids: [libc::c_int; 2] = [0; 2];
        let request = ioc_read(b'P', IOCNR_GET_VID_PID, std::mem::size_of_val(&ids));

        let ret = unsafe { libc::ioctl(fd, request as _, ids.as_mut_ptr()) };
        if ret < 0 {
            return Err(Error::Channel(io::Error::last_os_error()));
        }

        let id = UsbId::new(ids[0] as u16, ids[1] as u16);
        debug!("{} has usb id {}", self.path, id);
        Ok(id)
    }
}

fn readiness(revents: libc::c_short) -> Readiness {
    if revents & libc::POLLNVAL != 0 {
        Readiness::Invalid
    } else if revents & (libc::POLLERR | libc::POLLHUP) != 0 {
        Readiness::HangUp
    } else if revents & libc::POLLIN != 0 {
        Readiness::Readable
    } else {
        Readiness::Spurious(revents)
    }
}

impl RawIo for Device {
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<Readiness> {
        let mut pfd = libc::pollfd {
            fd: self.raw_fd()?,
            events: libc::POLLIN,
            revents: 0,
        };
        // A negative timeout would block forever.
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        match ret {
            n if n < 0 => Err(io::Error::last_os_error()),
            0 => Ok(Readiness::TimedOut),
            _ => Ok(readiness(pfd.revents)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let fd = self.raw_fd()?;
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let fd = self.raw_fd()?;
        let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.fd.take() {
            Some(fd) => {
                if unsafe { libc::close(fd.into_raw_fd()) } < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_vid_pid_request_code() {
        // _IOR('P', 6, int[2])
        assert_eq!(ioc_read(b'P', IOCNR_GET_VID_PID, 8), 0x8008_5006);
    }

    #[test]
    fn revents_classification() {
        assert_eq!(readiness(libc::POLLIN), Readiness::Readable);
        assert_eq!(readiness(libc::POLLIN | libc::POLLHUP), Readiness::HangUp);
        assert_eq!(readiness(libc::POLLERR), Readiness::HangUp);
        assert_eq!(readiness(libc::POLLNVAL), Readiness::Invalid);
        assert_eq!(readiness(libc::POLLOUT), Readiness::Spurious(libc::POLLOUT));
    }

    #[test]
    fn missing_node_is_a_channel_error() {
        assert!(matches!(
            Device::open("/nonexistent/usb/lp9"),
            Err(Error::Channel(_))
        ));
    }

    #[test]
    fn closed_device_rejects_io() {
        let mut device = Device {
            path: "/dev/usb/lp0".to_string(),
            fd: None,
        };
        assert!(device.write(&[0x00]).is_err());
        assert!(device.close().is_ok());
    }
}
