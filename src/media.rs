use std::fmt;

use crate::error::{Error, Result};

/// Number of pins across the PT-700 print head.
pub const TOTAL_PINS: u32 = 128;

/// Print head resolution, both across and along the tape.
pub const DPI: u32 = 180;

/// Shortest label the printer produces, in raster lines (about 24.5mm).
pub const MIN_LENGTH_DOTS: u32 = 172;

/// Tape width reported at byte 10 of a status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaWidth {
    NoMedia,
    Width3_5,
    Width6,
    Width9,
    Width12,
    Width18,
    Width24,
    Unknown(u8),
}

/// Dimensions derived from a tape width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Printable dots across the tape, which is the exact bitmap width.
    pub pixel_span: u32,
    /// Minimum number of raster lines in a label.
    pub min_length: u32,
    /// Unused pins on either side of the printable area.
    pub pin_offset: u32,
}

impl MediaWidth {
    pub const KNOWN: [MediaWidth; 6] = [
        MediaWidth::Width3_5,
        MediaWidth::Width6,
        MediaWidth::Width9,
        MediaWidth::Width12,
        MediaWidth::Width18,
        MediaWidth::Width24,
    ];

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::NoMedia,
            4 => Self::Width3_5,
            6 => Self::Width6,
            9 => Self::Width9,
            12 => Self::Width12,
            18 => Self::Width18,
            24 => Self::Width24,
            other => Self::Unknown(other),
        }
    }

    /// Byte used for this width in status replies and print information.
    pub fn code(&self) -> u8 {
        match self {
            Self::NoMedia => 0,
            Self::Width3_5 => 4,
            Self::Width6 => 6,
            Self::Width9 => 9,
            Self::Width12 => 12,
            Self::Width18 => 18,
            Self::Width24 => 24,
            Self::Unknown(code) => *code,
        }
    }

    /// Geometry of the loaded tape.
    ///
    /// PT printers expect full head width data even with narrow tape, so the
    /// printable area is centered by skipping `pin_offset` pins.
    pub fn geometry(&self) -> Result<Geometry> {
        let pixel_span = match self {
            Self::Width3_5 => 24,
            Self::Width6 => 32,
            Self::Width9 => 50,
            Self::Width12 => 70,
            Self::Width18 => 112,
            Self::Width24 => 128,
            Self::NoMedia | Self::Unknown(_) => return Err(Error::UnsupportedMedia(*self)),
        };

        Ok(Geometry {
            pixel_span,
            min_length: MIN_LENGTH_DOTS,
            pin_offset: (TOTAL_PINS - pixel_span) / 2,
        })
    }
}

impl fmt::Display for MediaWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMedia => write!(f, "NoMedia"),
            Self::Width3_5 => write!(f, "3.5mm"),
            Self::Unknown(code) => write!(f, "Unknown({})", code),
            known => write!(f, "{}mm", known.code()),
        }
    }
}

/// Tape material reported at byte 11 of a status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    NoMedia,
    Laminated,
    NonLaminated,
    HeatShrink21,
    HeatShrink31,
    Incompatible,
    Unknown(u8),
}

impl MediaType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::NoMedia,
            0x01 => Self::Laminated,
            0x03 => Self::NonLaminated,
            0x11 => Self::HeatShrink21,
            0x17 => Self::HeatShrink31,
            0xFF => Self::Incompatible,
            other => Self::Unknown(other),
        }
    }

    /// Whether a job may be sent with this tape loaded.
    pub fn is_printable(&self) -> bool {
        matches!(
            self,
            Self::Laminated | Self::NonLaminated | Self::HeatShrink21 | Self::HeatShrink31
        )
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMedia => write!(f, "None"),
            Self::Laminated => write!(f, "Laminated"),
            Self::NonLaminated => write!(f, "NonLaminated"),
            Self::HeatShrink21 => write!(f, "HeatShrink2:1"),
            Self::HeatShrink31 => write!(f, "HeatShrink3:1"),
            Self::Incompatible => write!(f, "Incompatible"),
            Self::Unknown(code) => write!(f, "Unknown(0x{:02x})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_offset_centers_span() {
        for width in MediaWidth::KNOWN.iter() {
            let g = width.geometry().unwrap();
            assert!(g.pin_offset + g.pixel_span <= TOTAL_PINS, "{}", width);
            assert_eq!(g.pin_offset, (TOTAL_PINS - g.pixel_span) / 2, "{}", width);
        }
    }

    #[test]
    fn table_values() {
        let g = MediaWidth::Width12.geometry().unwrap();
        assert_eq!(g.pixel_span, 70);
        assert_eq!(g.pin_offset, 29);
        assert_eq!(g.min_length, MIN_LENGTH_DOTS);
        assert_eq!(MediaWidth::Width24.geometry().unwrap().pin_offset, 0);
    }

    #[test]
    fn unknown_width_is_not_defaulted() {
        assert!(matches!(
            MediaWidth::from_code(36).geometry(),
            Err(Error::UnsupportedMedia(MediaWidth::Unknown(36)))
        ));
        assert!(matches!(
            MediaWidth::NoMedia.geometry(),
            Err(Error::UnsupportedMedia(MediaWidth::NoMedia))
        ));
    }

    #[test]
    fn codes_round_trip_and_display() {
        for width in MediaWidth::KNOWN.iter() {
            assert_eq!(MediaWidth::from_code(width.code()), *width);
        }
        assert_eq!(MediaWidth::Width3_5.to_string(), "3.5mm");
        assert_eq!(MediaWidth::Width18.to_string(), "18mm");
        assert_eq!(MediaWidth::from_code(7).to_string(), "Unknown(7)");
        assert_eq!(MediaType::from_code(0x42).to_string(), "Unknown(0x42)");
    }
}
