//! Printer models keyed by USB identity.
//!
//! The table is built by the caller and passed to whoever opens devices;
//! nothing registers itself behind the caller's back.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::printer::{Config, LabelPrinter, Printer};
use crate::usblp::{self, Handle};

/// Brother Industries.
pub const BROTHER_VENDOR_ID: u16 = 0x04F9;

/// Brother PT-700 (P-touch Edge).
pub const PT700_PRODUCT_ID: u16 = 0x2061;

/// USB vendor and product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    pub const fn new(vendor: u16, product: u16) -> Self {
        UsbId { vendor, product }
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// Builds a printer driver around an already open device.
pub type Constructor = fn(Handle, Config) -> Box<dyn LabelPrinter>;

fn pt700(handle: Handle, config: Config) -> Box<dyn LabelPrinter> {
    Box::new(Printer::new(handle, config))
}

/// Explicit table of supported printers.
#[derive(Default)]
pub struct Registry {
    constructors: HashMap<UsbId, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registry knowing every model this crate drives.
    pub fn with_defaults() -> Self {
        Registry::new().register(UsbId::new(BROTHER_VENDOR_ID, PT700_PRODUCT_ID), pt700)
    }

    pub fn register(mut self, id: UsbId, constructor: Constructor) -> Self {
        self.constructors.insert(id, constructor);
        self
    }

    pub fn lookup(&self, id: UsbId) -> Result<Constructor> {
        self.constructors
            .get(&id)
            .copied()
            .ok_or(Error::UnsupportedDevice(id))
    }

    pub fn is_supported(&self, id: UsbId) -> bool {
        self.constructors.contains_key(&id)
    }

    /// Open `path`, identify the printer behind it and build its driver.
    ///
    /// The open handle is handed to the driver, so the node is opened once.
    pub fn open<P: AsRef<Path>>(&self, path: P, config: Config) -> Result<Box<dyn LabelPrinter>> {
        let handle = usblp::open(path.as_ref())?;
        let id = handle.get_ref().id()?;

        match self.lookup(id) {
            Ok(constructor) => {
                info!("{} is a supported printer ({})", path.as_ref().display(), id);
                Ok(constructor(handle, config))
            }
            Err(err) => {
                debug!("no driver for {}", id);
                Err(err)
            }
        }
    }
}
