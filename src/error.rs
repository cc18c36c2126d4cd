//! Error types for P-Touch printer operations.
//!
//! This module defines all possible errors that can occur while talking to
//! the printer over its character device, decoding its status replies and
//! sequencing a print job.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::media::{MediaType, MediaWidth};
use crate::registry::UsbId;
use crate::status::{Error1, Error2, StatusKind};

/// Main error type for P-Touch printer operations.
///
/// Every variant is fatal to the job in progress. The driver never retries
/// on its own; callers restart the whole job once the cause is fixed.
#[derive(Error, Debug)]
pub enum Error {
    /// Read or write on the device handle failed.
    ///
    /// Interrupted system calls are retried inside the channel layer and
    /// never surface here.
    #[error("channel error: {0}")]
    Channel(#[from] io::Error),

    /// End of input arrived before a complete reply was collected.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// No data arrived before the read deadline.
    #[error("deadline exceeded waiting for the printer")]
    Timeout,

    /// The readiness wait reported an error or hang-up condition.
    #[error("printer disconnected")]
    Disconnected,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected trailing data after reply: {0:02X?}")]
    TrailingData(Vec<u8>),

    #[error("status reply too short: {0} bytes")]
    ShortStatus(usize),

    /// A status reply of a different kind than the one being waited for.
    #[error("unexpected status: got {observed}, expected {expected}")]
    ProtocolMismatch {
        observed: StatusKind,
        expected: StatusKind,
    },

    /// Hardware-level printer error.
    ///
    /// Wraps the error bits reported by the device itself, such as cover
    /// open or no media.
    #[error(transparent)]
    Printer(PrinterError),

    #[error("unsupported media width {0}")]
    UnsupportedMedia(MediaWidth),

    #[error("unsupported media type {0}")]
    UnsupportedMediaType(MediaType),

    /// A page does not fit the geometry of the loaded media.
    #[error(
        "page {page} is {width}x{height}px, media needs exactly {expected_width}px wide and at least {min_length}px long"
    )]
    ImageBounds {
        page: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        min_length: u32,
    },

    #[error("{width}px row at pin offset {offset} overflows a {total}-pin head")]
    LineOverflow { width: u32, offset: u32, total: u32 },

    #[error("raster line of {0} bytes exceeds the 16-bit length field")]
    LineTooLong(usize),

    #[error("print job has no pages")]
    EmptyJob,

    #[error("no printer registered for usb id {0}")]
    UnsupportedDevice(UsbId),
}

impl From<PrinterError> for Error {
    fn from(err: PrinterError) -> Self {
        Error::Printer(err)
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Hardware-specific errors reported by the printer.
///
/// Parsed from bytes 8 and 9 of a status reply. Both bit sets are kept as
/// reported, including bits without a documented meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterError {
    pub err1: Error1,
    pub err2: Error2,
}

impl PrinterError {
    /// Returns `None` when neither bit set carries an error.
    pub fn from_bits(err1: Error1, err2: Error2) -> Option<Self> {
        if err1.is_empty() && err2.is_empty() {
            None
        } else {
            Some(PrinterError { err1, err2 })
        }
    }

    pub fn contains1(&self, flag: Error1) -> bool {
        self.err1.contains(flag)
    }

    pub fn contains2(&self, flag: Error2) -> bool {
        self.err2.contains(flag)
    }
}

impl fmt::Display for PrinterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.err1.is_empty(), self.err2.is_empty()) {
            (false, false) => write!(f, "printer reported {}|{}", self.err1, self.err2),
            (false, true) => write!(f, "printer reported {}", self.err1),
            _ => write!(f, "printer reported {}", self.err2),
        }
    }
}

impl std::error::Error for PrinterError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_bits_is_no_error() {
        assert!(PrinterError::from_bits(Error1::empty(), Error2::empty()).is_none());
    }

    #[test]
    fn named_conditions_in_message() {
        let err = PrinterError::from_bits(Error1::NO_MEDIA, Error2::COVER_OPEN).unwrap();
        assert!(err.contains1(Error1::NO_MEDIA));
        assert!(err.contains2(Error2::COVER_OPEN));
        assert_eq!(err.to_string(), "printer reported NoMedia|CoverOpen");
    }

    #[test]
    fn mismatch_names_both_kinds() {
        let err = Error::ProtocolMismatch {
            observed: StatusKind::Notification,
            expected: StatusKind::PhaseChange,
        };
        assert_eq!(
            err.to_string(),
            "unexpected status: got Notification, expected PhaseChange"
        );
    }
}
