//! P-Touch Printer Driver
//!
//! This crate drives Brother P-Touch PT series label printers (PT-700)
//! attached through the Linux `usblp` driver as `/dev/usb/lpN`.
//!
//! Pages are monochrome bitmaps whose width is the printable span of the
//! loaded tape and whose height runs along the tape. They are chain printed
//! as one job so the blank leader tape is only fed once.
//!
//! A device handle must only be used by one caller at a time; concurrent
//! jobs on the same handle interleave their command bytes.
//!
//! # Example
//!
//! ```rust,no_run
//! use ptouch_lp::{Config, MonoImage, Printer};
//!
//! let mut handle = ptouch_lp::open("/dev/usb/lp0").unwrap();
//! let mut printer = Printer::new(&mut handle, Config::new());
//!
//! let info = printer.info().unwrap();
//! let label = MonoImage::from_fn(info.bounds.width, 200, |x, y| (x + y) % 8 == 0);
//! printer.print(&[label]).unwrap();
//! ```

mod channel;
mod error;
mod media;
mod printer;
mod raster;
mod registry;
mod status;
mod usblp;

pub use crate::{
    channel::{Channel, Port, RawIo, Readiness},
    error::{Error, PrinterError, Result},
    media::{Geometry, MediaType, MediaWidth, DPI, MIN_LENGTH_DOTS, TOTAL_PINS},
    printer::{Bounds, Config, JobState, LabelPrinter, Printer, PrinterInfo},
    raster::{empty_line, pack_line, Bitmap, CommandBuffer, LineCommand, MonoImage},
    registry::{Constructor, Registry, UsbId, BROTHER_VENDOR_ID, PT700_PRODUCT_ID},
    status::{Error1, Error2, Phase, Status, StatusKind, STATUS_LEN, STATUS_REQUEST},
    usblp::{open, Device, Handle},
};
