//! Status request and reply decoding.
//!
//! The printer answers a status request, and reports job progress on its
//! own, with a fixed 32 byte reply. Only a handful of bytes matter here:
//!
//! | offset | field       |
//! |--------|-------------|
//! | 8      | error 1     |
//! | 9      | error 2     |
//! | 10     | media width |
//! | 11     | media type  |
//! | 18     | status type |
//! | 19     | phase       |

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use log::debug;

use crate::channel::Channel;
use crate::error::{Error, PrinterError, Result};
use crate::media::{MediaType, MediaWidth};

/// Size of every status reply.
pub const STATUS_LEN: usize = 32;

/// ESC i S
pub const STATUS_REQUEST: [u8; 3] = [0x1B, 0x69, 0x53];

bitflags! {
    /// Error information 1 (byte 8).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Error1: u8 {
        const NO_MEDIA = 0b0000_0001;
        const CUTTER_JAM = 0b0000_0100;
        const WEAK_BATTERIES = 0b0000_1000;
        const HIGH_VOLTAGE_ADAPTER = 0b0100_0000;
    }

    /// Error information 2 (byte 9).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Error2: u8 {
        const REPLACE_MEDIA = 0b0000_0001;
        const COVER_OPEN = 0b0001_0000;
        const OVERHEATING = 0b0010_0000;
    }
}

/// Joins the names of the set bits with `|`, listing undocumented bits as
/// `Unknown(0x..)`.
fn write_bits(f: &mut fmt::Formatter<'_>, bits: u8, known: u8, names: &[(u8, &str)]) -> fmt::Result {
    if bits == 0 {
        return write!(f, "None");
    }

    let mut set: Vec<String> = names
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect();

    let unknown = bits & !known;
    if unknown != 0 {
        set.push(format!("Unknown(0x{:x})", unknown));
    }

    write!(f, "{}", set.join("|"))
}

impl fmt::Display for Error1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bits(
            f,
            self.bits(),
            Self::all().bits(),
            &[
                (Self::NO_MEDIA.bits(), "NoMedia"),
                (Self::CUTTER_JAM.bits(), "CutterJam"),
                (Self::WEAK_BATTERIES.bits(), "WeakBatteries"),
                (Self::HIGH_VOLTAGE_ADAPTER.bits(), "HighVoltageAdapter"),
            ],
        )
    }
}

impl fmt::Display for Error2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bits(
            f,
            self.bits(),
            Self::all().bits(),
            &[
                (Self::REPLACE_MEDIA.bits(), "ReplaceMedia"),
                (Self::COVER_OPEN.bits(), "CoverOpen"),
                (Self::OVERHEATING.bits(), "Overheating"),
            ],
        )
    }
}

/// What a status reply is about (byte 18).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    ReplyToRequest,
    PrintingCompleted,
    ErrorOccurred,
    ExitedInteractiveMode,
    PoweredOff,
    Notification,
    PhaseChange,
    Unknown(u8),
}

impl StatusKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::ReplyToRequest,
            0x01 => Self::PrintingCompleted,
            0x02 => Self::ErrorOccurred,
            0x03 => Self::ExitedInteractiveMode,
            0x04 => Self::PoweredOff,
            0x05 => Self::Notification,
            0x06 => Self::PhaseChange,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::ReplyToRequest => 0x00,
            Self::PrintingCompleted => 0x01,
            Self::ErrorOccurred => 0x02,
            Self::ExitedInteractiveMode => 0x03,
            Self::PoweredOff => 0x04,
            Self::Notification => 0x05,
            Self::PhaseChange => 0x06,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown(0x{:02x})", code),
            known => write!(f, "{:?}", known),
        }
    }
}

/// Device phase (byte 19), only meaningful on phase change replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Editing,
    Printing,
    Unknown(u8),
}

impl Phase {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Editing,
            0x01 => Self::Printing,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown(0x{:02x})", code),
            known => write!(f, "{:?}", known),
        }
    }
}

///
/// Status received from the printer encoded to Rust friendly type.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub err1: Error1,
    pub err2: Error2,
    pub media_width: MediaWidth,
    pub media_type: MediaType,
    pub kind: StatusKind,
    pub phase: Phase,
}

impl Status {
    /// Decode a status reply. Bytes other than the documented fields are
    /// ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < STATUS_LEN {
            return Err(Error::ShortStatus(buf.len()));
        }

        Ok(Status {
            err1: Error1::from_bits_retain(buf[8]),
            err2: Error2::from_bits_retain(buf[9]),
            media_width: MediaWidth::from_code(buf[10]),
            media_type: MediaType::from_code(buf[11]),
            kind: StatusKind::from_code(buf[18]),
            phase: Phase::from_code(buf[19]),
        })
    }

    /// Fails unless this reply is of the kind being waited for.
    pub fn expect(&self, want: StatusKind) -> Result<&Self> {
        if self.kind == want {
            Ok(self)
        } else {
            Err(Error::ProtocolMismatch {
                observed: self.kind,
                expected: want,
            })
        }
    }

    /// Device error conditions, if any bit is set.
    pub fn error(&self) -> Option<PrinterError> {
        PrinterError::from_bits(self.err1, self.err2)
    }

    /// Fails with the device reported conditions, if any.
    pub fn check(&self) -> Result<()> {
        match self.error() {
            Some(err) => Err(Error::Printer(err)),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} phase={} media={} {} err1={} err2={}",
            self.kind, self.phase, self.media_width, self.media_type, self.err1, self.err2
        )
    }
}

/// Send a status information request.
pub fn request_status<C: Channel + ?Sized>(channel: &mut C) -> Result<()> {
    channel.write_all(&STATUS_REQUEST)
}

/// Read and decode one status reply, whatever its kind.
pub fn read_status<C: Channel + ?Sized>(channel: &mut C, timeout: Duration) -> Result<Status> {
    let mut buf = [0u8; STATUS_LEN];
    channel.read_exact(&mut buf, timeout)?;
    debug!("Raw status code: {:02X?}", buf);

    let status = Status::decode(&buf)?;
    debug!("Parsed status: {}", status);
    Ok(status)
}
